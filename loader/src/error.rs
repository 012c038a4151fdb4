//! Error types for loading declarations, configuration and manifests.
//!
//! Provides a unified error type covering all failure modes: I/O,
//! serialization, unsupported file formats and malformed documents.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading inputs or writing manifests.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File extension is neither JSON nor YAML.
    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Document parsed but does not describe a bundle or module file.
    #[error("invalid document {}: {detail}", .path.display())]
    InvalidDocument { path: PathBuf, detail: String },

    /// Configuration values out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The loader was given no sources.
    #[error("no declaration sources configured")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`LoaderError`].
pub type Result<T> = std::result::Result<T, LoaderError>;
