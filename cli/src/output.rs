//! Output formatting for resolved schemas and error reports.
//!
//! JSON and YAML serialize the IR directly. Markdown and outline output are
//! produced by [`Emitter`] implementations, the same way a code generator
//! would consume the schema.

use std::fmt::Write;

use modelgen_core::{
    Emitter, EnumModel, ErrorReport, FieldRole, LinkPlan, ObjectModel, ResolvedField,
    ResolvedModel, ResolvedSchema, UnionModel,
};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Markdown,
    Outline,
}

/// Formats a resolved schema in the requested output format.
pub fn format_schema(schema: &ResolvedSchema, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(schema)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(schema).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => render(schema, MarkdownEmitter::default()),
        OutputFormat::Outline => render(schema, OutlineEmitter::default()),
    }
}

/// Formats an error report. Markdown and outline both use the plain text form.
pub fn format_report(report: &ErrorReport, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown | OutputFormat::Outline => {
            let mut out = String::new();
            write_report_text(&mut out, report).map_err(|e| format!("rendering failed: {e}"))?;
            Ok(out)
        }
    }
}

/// Formats the link plan, one group per line.
pub fn format_plan(plan: &LinkPlan) -> Result<String, String> {
    let mut out = String::new();
    write_plan(&mut out, plan).map_err(|e| format!("rendering failed: {e}"))?;
    Ok(out)
}

fn write_plan(out: &mut String, plan: &LinkPlan) -> std::fmt::Result {
    for (i, group) in plan.groups.iter().enumerate() {
        let marker = if group.mutual { " (mutual)" } else { "" };
        writeln!(out, "{}. {}{marker}", i + 1, group.modules.join(", "))?;
    }
    Ok(())
}

fn render<E>(schema: &ResolvedSchema, mut emitter: E) -> Result<String, String>
where
    E: Emitter<Error = std::fmt::Error> + Into<String>,
{
    schema
        .emit(&mut emitter)
        .map_err(|e| format!("rendering failed: {e}"))?;
    Ok(emitter.into())
}

fn write_report_text(out: &mut String, report: &ErrorReport) -> std::fmt::Result {
    if report.is_clean() && report.warnings.is_empty() {
        return writeln!(out, "No problems found.");
    }
    write!(out, "{report}")?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    writeln!(
        out,
        "{} error(s), {} warning(s)",
        report.errors.len(),
        report.warnings.len()
    )
}

fn field_flags(field: &ResolvedField) -> String {
    let mut flags = Vec::new();
    if field.optional {
        flags.push("optional".to_string());
    }
    if let Some(parent) = &field.inherited_from {
        flags.push(format!("from {parent}"));
    }
    if !field.references.is_empty() {
        let targets: Vec<String> = field.references.iter().map(ToString::to_string).collect();
        flags.push(format!("id of {}", targets.join(", ")));
    }
    flags.join("; ")
}

/// Indented plain-text tree grouped by module.
#[derive(Default)]
struct OutlineEmitter {
    out: String,
    module: Option<String>,
}

impl OutlineEmitter {
    fn header(&mut self, model: &ResolvedModel, detail: &str) -> std::fmt::Result {
        if self.module.as_deref() != Some(model.id.module.as_str()) {
            writeln!(self.out, "module {}", model.id.module)?;
            self.module = Some(model.id.module.clone());
        }
        writeln!(self.out, "  {} {}{detail}", model.kind(), model.id.name)
    }

    fn fields(&mut self, fields: &[ResolvedField]) -> std::fmt::Result {
        for field in fields {
            let optional = if field.optional { "?" } else { "" };
            write!(self.out, "    {}{optional}: {}", field.name, field.ty)?;
            if let FieldRole::Constant { value } = &field.role {
                write!(self.out, " = {value:?}")?;
            }
            if let Some(parent) = &field.inherited_from {
                write!(self.out, " (from {parent})")?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }
}

impl Emitter for OutlineEmitter {
    type Error = std::fmt::Error;

    fn emit_object(&mut self, model: &ResolvedModel, object: &ObjectModel) -> std::fmt::Result {
        let mut detail = String::new();
        if !object.implements.is_empty() {
            let parents: Vec<String> = object.implements.iter().map(ToString::to_string).collect();
            write!(detail, " : {}", parents.join(", "))?;
        }
        if let Some(value) = &object.discriminator {
            write!(detail, " [{value}]")?;
        }
        self.header(model, &detail)?;
        self.fields(&object.fields)
    }

    fn emit_enum(&mut self, model: &ResolvedModel, enumeration: &EnumModel) -> std::fmt::Result {
        self.header(model, "")?;
        writeln!(self.out, "    {}", enumeration.members.join(" | "))
    }

    fn emit_union(&mut self, model: &ResolvedModel, union: &UnionModel) -> std::fmt::Result {
        self.header(model, &format!(" by {}", union.discriminator_property))?;
        self.fields(&union.fields)?;
        for variant in &union.variants {
            writeln!(self.out, "    {:?} => {}", variant.discriminator, variant.variant)?;
        }
        Ok(())
    }
}

impl From<OutlineEmitter> for String {
    fn from(emitter: OutlineEmitter) -> Self {
        emitter.out
    }
}

/// One section per model with a field table.
#[derive(Default)]
struct MarkdownEmitter {
    out: String,
}

impl MarkdownEmitter {
    fn heading(&mut self, model: &ResolvedModel) -> std::fmt::Result {
        writeln!(self.out, "## {} `{}`\n", model.kind(), model.id)?;
        if let Some(desc) = &model.description {
            writeln!(self.out, "{desc}\n")?;
        }
        if let Some(version) = &model.version {
            writeln!(self.out, "**Version:** {version}\n")?;
        }
        Ok(())
    }

    fn field_table(&mut self, fields: &[ResolvedField]) -> std::fmt::Result {
        if fields.is_empty() {
            return Ok(());
        }
        writeln!(self.out, "| Field | Type | Notes | Description |")?;
        writeln!(self.out, "|-------|------|-------|-------------|")?;
        for field in fields {
            let desc = field.description.as_deref().unwrap_or("");
            writeln!(
                self.out,
                "| `{}` | `{}` | {} | {desc} |",
                field.name,
                field.ty,
                field_flags(field)
            )?;
        }
        writeln!(self.out)
    }
}

impl Emitter for MarkdownEmitter {
    type Error = std::fmt::Error;

    fn emit_object(&mut self, model: &ResolvedModel, object: &ObjectModel) -> std::fmt::Result {
        self.heading(model)?;
        for parent in &object.implements {
            writeln!(self.out, "- implements `{parent}`")?;
        }
        if let Some(value) = &object.discriminator {
            writeln!(self.out, "- discriminator `{value}`")?;
        }
        if let Some(extra) = object.additional_properties.as_ref().filter(|a| a.widened) {
            writeln!(self.out, "- additionalProperties widened to `{}`", extra.value)?;
        }
        if !object.implements.is_empty() || object.discriminator.is_some() {
            writeln!(self.out)?;
        }
        self.field_table(&object.fields)
    }

    fn emit_enum(&mut self, model: &ResolvedModel, enumeration: &EnumModel) -> std::fmt::Result {
        self.heading(model)?;
        for member in &enumeration.members {
            writeln!(self.out, "- `{member}`")?;
        }
        writeln!(self.out)
    }

    fn emit_union(&mut self, model: &ResolvedModel, union: &UnionModel) -> std::fmt::Result {
        self.heading(model)?;
        self.field_table(&union.fields)?;
        writeln!(self.out, "| `{}` | Variant |", union.discriminator_property)?;
        writeln!(self.out, "|------|---------|")?;
        for variant in &union.variants {
            writeln!(self.out, "| `{}` | `{}` |", variant.discriminator, variant.variant)?;
        }
        writeln!(self.out)
    }
}

impl From<MarkdownEmitter> for String {
    fn from(emitter: MarkdownEmitter) -> Self {
        emitter.out
    }
}
