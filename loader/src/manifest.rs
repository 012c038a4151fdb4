//! IR manifests for tracking generated models between runs.
//!
//! The manifest records, per resolved type, its module, kind, revision and
//! the SHA-256 of its canonical JSON. Generators can compare the manifest of
//! the previous run with the current one and regenerate only what changed:
//!
//! - **Checksum**: the resolved model differs (fields, discriminators,
//!   widening, descriptions).
//! - **Presence**: the type appeared, or disappeared (removed or failed).
//!
//! # Examples
//!
//! ```no_run
//! use modelgen_core::{ResolveOptions, SchemaBundle, resolve_bundle};
//! use modelgen_loader::IrManifest;
//!
//! let bundle = SchemaBundle::new("1.0.0");
//! let resolution = resolve_bundle(&bundle, &ResolveOptions::default());
//!
//! let manifest = IrManifest::from_resolution("0.1.0", &bundle.version, &resolution).unwrap();
//! manifest.save("ir-manifest.json").unwrap();
//! let previous = IrManifest::load("ir-manifest.json").unwrap();
//! assert!(previous.diff(&manifest).is_empty());
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use modelgen_core::{Resolution, ResolvedModel, TypeKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// Per-type record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub module: String,
    pub kind: TypeKind,
    /// Registry revision; 0 unless the type was overridden.
    pub revision: u32,
    /// SHA-256 hex digest of the model's canonical JSON.
    pub checksum: String,
}

/// Manifest of one resolution run.
///
/// Persisted as pretty-printed JSON next to generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrManifest {
    /// Declaration contract version (mirrors [`modelgen_core::SCHEMA_CONTRACT_VERSION`]).
    pub schema_version: String,
    /// Manifest format version.
    pub version: String,
    /// Version of the tool that produced the manifest.
    pub tool_version: String,
    /// Version of the resolved bundle.
    pub bundle_version: String,
    /// RFC 3339 timestamp of when the manifest was generated.
    pub generated_at: String,
    /// Digest over every model checksum and the link order.
    pub fingerprint: String,
    /// Number of resolution errors in the run.
    pub error_count: usize,
    /// Entries keyed by `Module.Name`.
    pub models: BTreeMap<String, ModelEntry>,
}

impl IrManifest {
    /// Builds a manifest for a resolution result.
    ///
    /// # Errors
    ///
    /// Returns [`Json`](crate::LoaderError::Json) if a model cannot be
    /// serialized.
    pub fn from_resolution(
        tool_version: &str,
        bundle_version: &str,
        resolution: &Resolution,
    ) -> Result<Self> {
        let mut models = BTreeMap::new();
        for model in &resolution.schema.models {
            models.insert(
                model.id.to_string(),
                ModelEntry {
                    module: model.id.module.clone(),
                    kind: model.kind(),
                    revision: model.revision,
                    checksum: Self::checksum(model)?,
                },
            );
        }

        let mut hasher = Sha256::new();
        for (id, entry) in &models {
            hasher.update(id.as_bytes());
            hasher.update(b" ");
            hasher.update(entry.checksum.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(serde_json::to_vec(&resolution.schema.plan)?);

        Ok(Self {
            schema_version: modelgen_core::SCHEMA_CONTRACT_VERSION.to_string(),
            version: MANIFEST_VERSION.to_string(),
            tool_version: tool_version.to_string(),
            bundle_version: bundle_version.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            fingerprint: format!("{:x}", hasher.finalize()),
            error_count: resolution.report.errors.len(),
            models,
        })
    }

    /// SHA-256 hex digest of the model's JSON.
    ///
    /// IR types only use ordered collections, so the digest is stable across
    /// runs and thread counts.
    pub fn checksum(model: &ResolvedModel) -> Result<String> {
        let bytes = serde_json::to_vec(model)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::LoaderError::Io) if the file cannot be read, or
    /// [`Json`](crate::LoaderError::Json) if the content is not valid
    /// manifest JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let manifest = serde_json::from_reader(reader)?;
        Ok(manifest)
    }

    /// Saves the manifest as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Sorted ids of types that differ between `self` and `other`.
    ///
    /// A type differs if it exists in only one manifest or its checksum
    /// changed. Timestamps and tool versions are ignored.
    pub fn diff(&self, other: &IrManifest) -> Vec<String> {
        let mut changed: Vec<String> = self
            .models
            .iter()
            .filter(|(id, entry)| {
                other
                    .models
                    .get(*id)
                    .is_none_or(|theirs| theirs.checksum != entry.checksum)
            })
            .map(|(id, _)| id.clone())
            .collect();
        changed.extend(
            other
                .models
                .keys()
                .filter(|id| !self.models.contains_key(*id))
                .cloned(),
        );
        changed.sort();
        changed
    }

    /// Looks up the entry for `Module.Name`.
    pub fn get(&self, id: &str) -> Option<&ModelEntry> {
        self.models.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
