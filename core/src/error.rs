//! Resolution errors and the aggregated error report.
//!
//! Every error is attributed to a subject: the type (or, for module-level
//! problems, the module) it concerns. The resolution pipeline collects all
//! errors it finds instead of stopping at the first one, then sorts them into
//! an [`ErrorReport`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TypeId;

/// An error found while registering or resolving types.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ResolveError {
    /// Lookup of a type that is not registered.
    #[error("schema not found: {id}")]
    SchemaNotFound { id: TypeId },
    /// Second registration of a name without the override flag.
    #[error("duplicate type definition: {id} (mark the later declaration as override to replace it)")]
    DuplicateTypeDefinition { id: TypeId },
    /// A reference whose target does not exist.
    #[error("unresolved reference from {from} to {target}: {detail}")]
    UnresolvedReference {
        from: TypeId,
        target: TypeId,
        detail: String,
    },
    /// Two variants of one union share a discriminator value.
    #[error("discriminator `{value}` is used by more than one variant of {union}: {}", join_ids(variants))]
    DiscriminatorCollision {
        union: TypeId,
        value: String,
        variants: Vec<TypeId>,
    },
    /// Revisions of a type disagree on the additionalProperties value type.
    #[error("inconsistent additionalProperties type for {id}: {detail}")]
    InconsistentAdditionalPropertiesType { id: TypeId, detail: String },
    /// The type takes part in an inheritance cycle.
    #[error("cyclic inheritance involving {id}: {}", join_ids(cycle))]
    CyclicInheritance { id: TypeId, cycle: Vec<TypeId> },
    /// A union variant with no discriminator value.
    #[error("variant {variant} of union {union} has no discriminator value for `{property}`")]
    MissingDiscriminator {
        variant: TypeId,
        union: TypeId,
        property: String,
    },
    /// A variant that cannot take part in its union.
    #[error("invalid variant {id}: {detail}")]
    InvalidVariant { id: TypeId, detail: String },
    /// A declaration that is structurally malformed.
    #[error("invalid declaration {id}: {detail}")]
    InvalidDeclaration { id: TypeId, detail: String },
    /// A module declaration that is malformed.
    #[error("invalid module {module}: {detail}")]
    InvalidModule { module: String, detail: String },
    /// A cross-module reference to a module the source did not declare.
    #[error("{id} references module {module}, which {} does not declare as a dependency", id.module)]
    UndeclaredModuleDependency { id: TypeId, module: String },
    /// The type depends on a type that failed.
    #[error("{id} depends on failed type {cause}")]
    DependencyFailed { id: TypeId, cause: TypeId },
}

fn join_ids(ids: &[TypeId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Kind of a [`ResolveError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaNotFound,
    DuplicateTypeDefinition,
    UnresolvedReference,
    DiscriminatorCollision,
    InconsistentAdditionalPropertiesType,
    CyclicInheritance,
    MissingDiscriminator,
    InvalidVariant,
    InvalidDeclaration,
    InvalidModule,
    UndeclaredModuleDependency,
    DependencyFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SchemaNotFound => "schema_not_found",
            Self::DuplicateTypeDefinition => "duplicate_type_definition",
            Self::UnresolvedReference => "unresolved_reference",
            Self::DiscriminatorCollision => "discriminator_collision",
            Self::InconsistentAdditionalPropertiesType => "inconsistent_additional_properties_type",
            Self::CyclicInheritance => "cyclic_inheritance",
            Self::MissingDiscriminator => "missing_discriminator",
            Self::InvalidVariant => "invalid_variant",
            Self::InvalidDeclaration => "invalid_declaration",
            Self::InvalidModule => "invalid_module",
            Self::UndeclaredModuleDependency => "undeclared_module_dependency",
            Self::DependencyFailed => "dependency_failed",
        };
        f.write_str(name)
    }
}

impl ResolveError {
    /// Returns the payload-free kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaNotFound { .. } => ErrorKind::SchemaNotFound,
            Self::DuplicateTypeDefinition { .. } => ErrorKind::DuplicateTypeDefinition,
            Self::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            Self::DiscriminatorCollision { .. } => ErrorKind::DiscriminatorCollision,
            Self::InconsistentAdditionalPropertiesType { .. } => {
                ErrorKind::InconsistentAdditionalPropertiesType
            }
            Self::CyclicInheritance { .. } => ErrorKind::CyclicInheritance,
            Self::MissingDiscriminator { .. } => ErrorKind::MissingDiscriminator,
            Self::InvalidVariant { .. } => ErrorKind::InvalidVariant,
            Self::InvalidDeclaration { .. } => ErrorKind::InvalidDeclaration,
            Self::InvalidModule { .. } => ErrorKind::InvalidModule,
            Self::UndeclaredModuleDependency { .. } => ErrorKind::UndeclaredModuleDependency,
            Self::DependencyFailed { .. } => ErrorKind::DependencyFailed,
        }
    }

    /// The type this error is attributed to, if any.
    ///
    /// A type that is the subject of an error is excluded from the output
    /// model. Module-level errors have no subject type.
    pub fn subject(&self) -> Option<&TypeId> {
        match self {
            Self::SchemaNotFound { id }
            | Self::DuplicateTypeDefinition { id }
            | Self::InconsistentAdditionalPropertiesType { id, .. }
            | Self::CyclicInheritance { id, .. }
            | Self::InvalidVariant { id, .. }
            | Self::InvalidDeclaration { id, .. }
            | Self::UndeclaredModuleDependency { id, .. }
            | Self::DependencyFailed { id, .. } => Some(id),
            Self::UnresolvedReference { from, .. } => Some(from),
            Self::DiscriminatorCollision { union, .. } => Some(union),
            Self::MissingDiscriminator { variant, .. } => Some(variant),
            Self::InvalidModule { .. } => None,
        }
    }

    /// Module the error is attributed to.
    pub fn module(&self) -> &str {
        match self {
            Self::InvalidModule { module, .. } => module,
            other => other.subject().map(|id| id.module.as_str()).unwrap_or(""),
        }
    }

    fn sort_key(&self) -> (String, String, ErrorKind, String) {
        (
            self.module().to_string(),
            self.subject().map(|id| id.name.clone()).unwrap_or_default(),
            self.kind(),
            self.to_string(),
        )
    }
}

/// All errors and warnings of one resolution run.
///
/// Errors are sorted by module, type name and kind so that the report is
/// identical across runs and thread counts.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let report = ErrorReport::new(
///     vec![
///         ResolveError::SchemaNotFound { id: TypeId::new("B", "Y") },
///         ResolveError::SchemaNotFound { id: TypeId::new("A", "X") },
///     ],
///     vec![],
/// );
/// assert_eq!(report.errors[0].subject(), Some(&TypeId::new("A", "X")));
/// assert!(report.has_kind(ErrorKind::SchemaNotFound));
/// assert!(!report.is_clean());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Errors, sorted.
    pub errors: Vec<ResolveError>,
    /// Non-fatal diagnostics, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ErrorReport {
    /// Builds a sorted, de-duplicated report.
    pub fn new(mut errors: Vec<ResolveError>, mut warnings: Vec<String>) -> Self {
        errors.sort_by_cached_key(ResolveError::sort_key);
        errors.dedup();
        warnings.sort();
        warnings.dedup();
        Self { errors, warnings }
    }

    /// Returns `true` when no errors were found. Warnings do not count.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `true` if any error has the given kind.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }

    /// Number of errors with the given kind.
    pub fn count_kind(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind() == kind).count()
    }

    /// Errors attributed to `id`.
    pub fn for_type<'a>(&'a self, id: &'a TypeId) -> impl Iterator<Item = &'a ResolveError> + 'a {
        self.errors.iter().filter(move |e| e.subject() == Some(id))
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "error[{}]: {error}", error.kind())?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}
