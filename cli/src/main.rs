mod output;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use modelgen_core::{Resolution, ResolveOptions, SchemaBundle, resolve_bundle};
use modelgen_loader::{BundleLoader, IrManifest, ResolveConfig};

use crate::output::{OutputFormat, format_plan, format_report, format_schema};

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status when output was produced but some types failed to resolve.
const EXIT_PARTIAL: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "modelgen")]
#[command(about = "Resolve cross-module schema declarations into a model IR")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve declarations and write the model IR.
    Resolve(ResolveArgs),
    /// Resolve declarations and print only the error report.
    Check(CheckArgs),
    /// Print the module link order.
    Order(InputArgs),
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Declaration files and/or directories of declaration files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// YAML run configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of worker threads (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
    /// Treat references to undeclared module dependencies as errors.
    #[arg(long)]
    strict_dependencies: bool,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: OutputFormat,
    /// Write the IR to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write an IR manifest with per-type checksums.
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Report format (markdown and outline print plain text).
    #[arg(long, default_value = "outline")]
    format: OutputFormat,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Resolve(args) => run_resolve(args),
        Command::Check(args) => run_check(args),
        Command::Order(args) => run_order(args),
    };

    match result {
        Ok(0) => {}
        Ok(errors) => {
            eprintln!("error: {errors} resolution error(s); affected types were left out");
            std::process::exit(EXIT_PARTIAL);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

/// Each `run_*` returns the number of resolution errors.
fn run_resolve(args: ResolveArgs) -> Result<usize, String> {
    let (bundle, resolution) = load_and_resolve(&args.input)?;

    let rendered = format_schema(&resolution.schema, args.format)?;
    match &args.output {
        Some(path) => {
            write_file(path, &rendered)?;
            println!(
                "Resolved {} model(s) into '{}'.",
                resolution.schema.len(),
                path.display()
            );
        }
        None => print!("{rendered}"),
    }

    if let Some(path) = &args.manifest {
        let manifest = IrManifest::from_resolution(PACKAGE_VERSION, &bundle.version, &resolution)
            .map_err(|err| format!("Failed to build manifest: {err}"))?;
        ensure_parent_dir(path)?;
        manifest
            .save(path)
            .map_err(|err| format!("Failed to write '{}': {err}", path.display()))?;
    }

    if !resolution.report.is_clean() || !resolution.report.warnings.is_empty() {
        eprint!("{}", format_report(&resolution.report, OutputFormat::Outline)?);
    }
    Ok(resolution.report.errors.len())
}

fn run_check(args: CheckArgs) -> Result<usize, String> {
    let (bundle, resolution) = load_and_resolve(&args.input)?;
    print!("{}", format_report(&resolution.report, args.format)?);
    if matches!(args.format, OutputFormat::Markdown | OutputFormat::Outline) {
        println!(
            "Checked {} declaration(s) in {} module(s); {} model(s) resolved.",
            bundle.declaration_count(),
            bundle.module_names().len(),
            resolution.schema.len()
        );
    }
    Ok(resolution.report.errors.len())
}

fn run_order(args: InputArgs) -> Result<usize, String> {
    let (_, resolution) = load_and_resolve(&args)?;
    print!("{}", format_plan(&resolution.schema.plan)?);
    if !resolution.report.is_clean() {
        eprint!("{}", format_report(&resolution.report, OutputFormat::Outline)?);
    }
    Ok(resolution.report.errors.len())
}

fn load_and_resolve(args: &InputArgs) -> Result<(SchemaBundle, Resolution), String> {
    let options = load_options(args)?;
    let bundle = args
        .inputs
        .iter()
        .fold(BundleLoader::new(), |loader, path| loader.from_path(path))
        .load()
        .map_err(|err| format!("Failed to load declarations: {err}"))?;
    let resolution = resolve_bundle(&bundle, &options);
    Ok((bundle, resolution))
}

/// Configuration file values, overridden by command-line flags.
fn load_options(args: &InputArgs) -> Result<ResolveOptions, String> {
    let config = match &args.config {
        Some(path) => ResolveConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => ResolveConfig::default(),
    };
    let mut options = config.to_options().map_err(|err| err.to_string())?;
    if let Some(jobs) = args.jobs {
        options = options.with_jobs(jobs);
    }
    if args.strict_dependencies {
        options = options.with_strict_module_dependencies(true);
    }
    Ok(options)
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), String> {
    ensure_parent_dir(path)?;
    fs::write(path, contents).map_err(|err| format!("Failed to write '{}': {err}", path.display()))
}
