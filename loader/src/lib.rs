//! Loading declarations, run configuration and IR manifests for modelgen.
//!
//! This crate sits between files on disk and the I/O-free resolution core:
//! it reads declaration bundles and per-module files (JSON or YAML) into a
//! [`SchemaBundle`](modelgen_core::SchemaBundle), loads the YAML run
//! configuration into [`ResolveOptions`](modelgen_core::ResolveOptions), and
//! records resolved models in a checksummed manifest.
//!
//! # Quick start
//!
//! ```no_run
//! use modelgen_core::resolve_bundle;
//! use modelgen_loader::{BundleLoader, IrManifest, ResolveConfig};
//!
//! let bundle = BundleLoader::new()
//!     .from_dir("schemas/")
//!     .load()
//!     .unwrap();
//! let options = ResolveConfig::load("modelgen.yml").unwrap().to_options().unwrap();
//!
//! let resolution = resolve_bundle(&bundle, &options);
//! let manifest = IrManifest::from_resolution("0.1.0", &bundle.version, &resolution).unwrap();
//! manifest.save("ir-manifest.json").unwrap();
//! ```

mod config;
mod error;
mod loader;
mod manifest;

pub use config::{CONFIG_VERSION, ExecutionConfig, ResolutionConfig, ResolveConfig};
pub use error::{LoaderError, Result};
pub use loader::{
    BundleLoader, BundleSource, DEFAULT_BUNDLE_VERSION, Document, Format, ModuleFile,
    load_bundle, read_document, save_bundle,
};
pub use manifest::{IrManifest, MANIFEST_VERSION, ModelEntry};
