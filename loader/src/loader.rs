//! Declaration loading from bundle files, module files and directories.
//!
//! Two document shapes are accepted, in JSON (`.json`) or YAML (`.yaml`,
//! `.yml`):
//!
//! - a [`SchemaBundle`]: `version`, optional `modules`, and `declarations`;
//! - a [`ModuleFile`]: one `module` with its `types`. Types that leave their
//!   `module` empty are placed in the file's module.
//!
//! ```no_run
//! use modelgen_loader::BundleLoader;
//!
//! let bundle = BundleLoader::new()
//!     .from_dir("schemas/")
//!     .from_file("overrides.yaml")
//!     .load()
//!     .unwrap();
//! println!("{} declarations", bundle.declaration_count());
//! ```
//!
//! Sources are concatenated in the order they were added; within a
//! directory, files are read in path order. Later declarations only replace
//! earlier ones when they carry the override flag.

use std::collections::BTreeSet;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use modelgen_core::{ModuleDecl, SchemaBundle, TypeDeclaration};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LoaderError, Result};

/// Bundle version used when no source provides one.
pub const DEFAULT_BUNDLE_VERSION: &str = "0.0.0";

/// Serialization format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Format for `path`, or `None` for unknown extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Self::Json),
            Some("yaml" | "yml") => Some(Self::Yaml),
            _ => None,
        }
    }

    fn of(path: &Path) -> Result<Self> {
        Self::from_path(path).ok_or_else(|| LoaderError::UnsupportedFormat(path.to_path_buf()))
    }
}

/// A file describing a single module.
///
/// # Examples
///
/// ```
/// use modelgen_core::TypeDeclaration;
/// use modelgen_loader::ModuleFile;
///
/// let file = ModuleFile::new("Orders").with_type(TypeDeclaration::object("", "Order"));
/// let (module, types) = file.into_parts().unwrap();
/// assert_eq!(module.name, "Orders");
/// assert_eq!(types[0].module, "Orders");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFile {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeSet<String>>,
    #[serde(default)]
    pub types: Vec<TypeDeclaration>,
}

impl ModuleFile {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            description: None,
            dependencies: None,
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, decl: TypeDeclaration) -> Self {
        self.types.push(decl);
        self
    }

    /// Splits the file into its module declaration and type declarations.
    ///
    /// Fails with a message when a type names a different module.
    pub fn into_parts(self) -> std::result::Result<(ModuleDecl, Vec<TypeDeclaration>), String> {
        let mut types = self.types;
        for decl in &mut types {
            if decl.module.is_empty() {
                decl.module = self.module.clone();
            } else if decl.module != self.module {
                return Err(format!(
                    "type `{}` declares module `{}` inside module file `{}`",
                    decl.name, decl.module, self.module
                ));
            }
        }
        let module = ModuleDecl {
            name: self.module,
            description: self.description,
            dependencies: self.dependencies,
        };
        Ok((module, types))
    }
}

/// A parsed input document.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Bundle(SchemaBundle),
    Module(ModuleFile),
}

/// Reads a bundle or module file.
///
/// A mapping with a `module` key is a module file; anything else must parse
/// as a bundle.
///
/// # Errors
///
/// Returns [`LoaderError::UnsupportedFormat`] for unknown extensions,
/// [`LoaderError::Io`] if the file cannot be read, and a JSON, YAML or
/// [`LoaderError::InvalidDocument`] error if the content does not match
/// either shape.
pub fn read_document(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let format = Format::of(path)?;
    let reader = BufReader::new(std::fs::File::open(path)?);
    let value: serde_json::Value = match format {
        Format::Json => serde_json::from_reader(reader)?,
        Format::Yaml => serde_yaml::from_reader(reader)?,
    };

    let Some(object) = value.as_object() else {
        return Err(LoaderError::InvalidDocument {
            path: path.to_path_buf(),
            detail: "expected a mapping at the top level".into(),
        });
    };
    if object.contains_key("module") {
        debug!(path = %path.display(), "read module file");
        Ok(Document::Module(serde_json::from_value(value)?))
    } else {
        debug!(path = %path.display(), "read bundle");
        Ok(Document::Bundle(serde_json::from_value(value)?))
    }
}

/// Loads a single bundle file.
pub fn load_bundle(path: impl AsRef<Path>) -> Result<SchemaBundle> {
    BundleLoader::new().from_file(path.as_ref()).load()
}

/// Writes a bundle as pretty JSON or YAML, depending on the extension.
pub fn save_bundle(bundle: &SchemaBundle, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = Format::of(path)?;
    let writer = BufWriter::new(std::fs::File::create(path)?);
    match format {
        Format::Json => serde_json::to_writer_pretty(writer, bundle)?,
        Format::Yaml => serde_yaml::to_writer(writer, bundle)?,
    }
    Ok(())
}

/// Where declarations are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    /// Every `*.json`, `*.yaml` and `*.yml` file directly inside a directory.
    Directory(PathBuf),
    /// One bundle or module file.
    File(PathBuf),
}

/// Builder that concatenates several sources into one [`SchemaBundle`].
#[derive(Debug, Clone, Default)]
pub struct BundleLoader {
    sources: Vec<BundleSource>,
    version: Option<String>,
    name: Option<String>,
}

impl BundleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of declaration files.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(BundleSource::Directory(path.into()));
        self
    }

    /// Adds a single declaration file.
    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(BundleSource::File(path.into()));
        self
    }

    /// Adds `path` as a directory or file source depending on what it is.
    pub fn from_path(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            self.from_dir(path)
        } else {
            self.from_file(path)
        }
    }

    /// Sets the bundle version, overriding any version read from a bundle.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn sources(&self) -> &[BundleSource] {
        &self.sources
    }

    /// Reads every source in order and concatenates the results.
    ///
    /// The first bundle read supplies the version, name and description
    /// unless they were set on the builder.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::NoSourcesAvailable`] when no source was added,
    /// or the first error raised while reading a source. Loading stops at
    /// the first failure.
    pub fn load(&self) -> Result<SchemaBundle> {
        if self.sources.is_empty() {
            return Err(LoaderError::NoSourcesAvailable);
        }

        let mut bundle = SchemaBundle::new(DEFAULT_BUNDLE_VERSION);
        bundle.name = self.name.clone();
        let mut version = self.version.clone();

        for path in self.document_paths()? {
            match read_document(&path)? {
                Document::Bundle(other) => {
                    if version.is_none() {
                        version = Some(other.version.clone());
                    }
                    if bundle.name.is_none() {
                        bundle.name = other.name.clone();
                    }
                    if bundle.description.is_none() {
                        bundle.description = other.description.clone();
                    }
                    bundle.extend(other);
                }
                Document::Module(file) => {
                    let (module, types) = file
                        .into_parts()
                        .map_err(|detail| LoaderError::InvalidDocument {
                            path: path.clone(),
                            detail,
                        })?;
                    bundle.modules.push(module);
                    bundle.declarations.extend(types);
                }
            }
        }

        if let Some(version) = version {
            bundle.version = version;
        }
        debug!(
            modules = bundle.modules.len(),
            declarations = bundle.declarations.len(),
            "loaded bundle"
        );
        Ok(bundle)
    }

    fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for source in &self.sources {
            match source {
                BundleSource::File(path) => paths.push(path.clone()),
                BundleSource::Directory(dir) => {
                    let mut found = Vec::new();
                    for entry in std::fs::read_dir(dir)? {
                        let path = entry?.path();
                        if path.is_file() && Format::from_path(&path).is_some() {
                            found.push(path);
                        }
                    }
                    found.sort();
                    debug!(dir = %dir.display(), files = found.len(), "scanned directory");
                    paths.extend(found);
                }
            }
        }
        Ok(paths)
    }
}
