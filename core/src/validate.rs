//! Declaration and bundle validation.
//!
//! Catches structural problems in declarations before they are normalized:
//! empty or malformed names, duplicate fields and members, and content that
//! does not match the declared kind (an enum with fields, an object with
//! variants). The field name `additionalProperties` is reserved for the map
//! of undeclared properties that models carry.
//!
//! # Examples
//!
//! ```
//! use modelgen_core::*;
//!
//! let status = TypeDeclaration::enumeration("Orders", "Status").with_member("OPEN");
//! assert!(validate_declaration(&status).is_empty());
//!
//! // An enum with no members is rejected.
//! let empty = TypeDeclaration::enumeration("Orders", "Empty");
//! assert!(!validate_declaration(&empty).is_empty());
//! ```

use std::collections::HashSet;

use crate::{
    ADDITIONAL_PROPERTIES_FIELD, EnumMember, FieldDecl, ResolveError, SchemaBundle, TypeDeclaration, TypeDescriptor, TypeId,
    TypeKind, VariantDecl,
};

/// Validates a full bundle.
///
/// Checks for an empty version string and for modules declared more than
/// once. Declarations are validated individually when they are registered.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let bundle = SchemaBundle::new("1.0.0")
///     .with_module(ModuleDecl::new("Orders"))
///     .with_module(ModuleDecl::new("Orders"));
/// let errors = validate_bundle(&bundle);
/// assert!(errors.iter().any(|e| matches!(e, ResolveError::InvalidModule { .. })));
/// ```
pub fn validate_bundle(bundle: &SchemaBundle) -> Vec<ResolveError> {
    let mut errors = Vec::new();

    if bundle.version.trim().is_empty() {
        errors.push(ResolveError::InvalidModule {
            module: String::new(),
            detail: "bundle version cannot be empty".to_string(),
        });
        return errors;
    }

    let mut seen_modules: HashSet<&str> = HashSet::new();
    for module in &bundle.modules {
        if !is_module_name(&module.name) {
            errors.push(ResolveError::InvalidModule {
                module: module.name.clone(),
                detail: "module name must be non-empty and contain no whitespace".to_string(),
            });
            continue;
        }
        if !seen_modules.insert(module.name.as_str()) {
            errors.push(ResolveError::InvalidModule {
                module: module.name.clone(),
                detail: "module declared more than once".to_string(),
            });
        }
    }

    errors
}

/// Validates a single declaration.
///
/// Returns at most one error: the first problem found.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let object = TypeDeclaration::object("Orders", "Order")
///     .with_field(FieldDecl::new("id", TypeDescriptor::string()))
///     .with_field(FieldDecl::new("id", TypeDescriptor::integer()));
/// let errors = validate_declaration(&object);
/// assert!(matches!(&errors[0], ResolveError::InvalidDeclaration { detail, .. } if detail.contains("duplicate field")));
/// ```
pub fn validate_declaration(decl: &TypeDeclaration) -> Vec<ResolveError> {
    let id = decl.id();
    let mut errors = Vec::new();

    if !is_module_name(&decl.module) {
        errors.push(invalid(&id, "module name must be non-empty and contain no whitespace"));
        return errors;
    }
    if !is_identifier(&decl.name) {
        errors.push(invalid(&id, format!("`{}` is not a valid type name", decl.name)));
        return errors;
    }

    let detail = match decl.kind {
        TypeKind::Object => check_object(decl),
        TypeKind::Enum => check_enum(decl),
        TypeKind::Union => check_union(decl),
    };
    if let Some(detail) = detail {
        errors.push(invalid(&id, detail));
    }

    errors
}

fn check_object(decl: &TypeDeclaration) -> Option<String> {
    if !decl.members.is_empty() {
        return Some("is an object but declares enum members".to_string());
    }
    if !decl.variants.is_empty() {
        return Some("is an object but declares union variants".to_string());
    }
    if decl.discriminator_property.is_some() {
        return Some("discriminator_property only applies to unions".to_string());
    }
    check_fields(&decl.fields)
        .or_else(|| decl.additional_properties.as_ref().and_then(check_descriptor))
}

fn check_enum(decl: &TypeDeclaration) -> Option<String> {
    if !decl.fields.is_empty() {
        return Some("is an enum but declares fields".to_string());
    }
    if !decl.variants.is_empty() {
        return Some("is an enum but declares union variants".to_string());
    }
    if decl.additional_properties.is_some() {
        return Some("is an enum but declares additional properties".to_string());
    }
    if decl.implements.iter().chain(&decl.extends).next().is_some() {
        return Some("enums cannot implement unions".to_string());
    }
    check_members(&decl.members)
}

fn check_union(decl: &TypeDeclaration) -> Option<String> {
    if !decl.members.is_empty() {
        return Some("is a union but declares enum members".to_string());
    }
    if decl.additional_properties.is_some() {
        return Some("additional properties belong on variants, not on unions".to_string());
    }
    if decl
        .discriminator_property
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Some("discriminator_property cannot be empty".to_string());
    }
    if let Some(detail) = check_fields(&decl.fields) {
        return Some(detail);
    }
    for variant in &decl.variants {
        if let VariantDecl::Inline(inline) = variant {
            let detail = check_fields(&inline.fields)
                .or_else(|| inline.additional_properties.as_ref().and_then(check_descriptor));
            if detail.is_some() {
                return detail;
            }
        }
    }
    None
}

fn check_fields(fields: &[FieldDecl]) -> Option<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    for field in fields {
        let name = field.name.trim();
        if name.is_empty() {
            return Some("field name cannot be empty".to_string());
        }
        if !seen.insert(name) {
            return Some(format!("duplicate field: {name}"));
        }
        if name == ADDITIONAL_PROPERTIES_FIELD {
            return Some(format!("field name `{name}` is reserved"));
        }
        if field.constant.is_some() && !matches!(field.ty, TypeDescriptor::Scalar(_)) {
            return Some(format!("constant field `{name}` must have a scalar type"));
        }
        if let Some(detail) = check_descriptor(&field.ty) {
            return Some(format!("field `{name}`: {detail}"));
        }
    }
    None
}

fn check_members(members: &[EnumMember]) -> Option<String> {
    if members.is_empty() {
        return Some("enum must declare at least one member".to_string());
    }
    let mut seen: HashSet<&str> = HashSet::new();
    for member in members {
        let name = member.name.trim();
        if name.is_empty() {
            return Some("enum member name cannot be empty".to_string());
        }
        if !seen.insert(name) {
            return Some(format!("duplicate enum member: {name}"));
        }
    }
    None
}

fn check_descriptor(desc: &TypeDescriptor) -> Option<String> {
    match desc {
        TypeDescriptor::List(item) => check_descriptor(item),
        TypeDescriptor::Map { value, .. } => check_descriptor(value),
        TypeDescriptor::Object(inline) => check_fields(&inline.fields)
            .or_else(|| inline.additional_properties.as_deref().and_then(check_descriptor)),
        TypeDescriptor::Enum(members) => check_members(members),
        TypeDescriptor::Scalar(_) | TypeDescriptor::Ref(_) | TypeDescriptor::Any => None,
    }
}

fn invalid(id: &TypeId, detail: impl Into<String>) -> ResolveError {
    ResolveError::InvalidDeclaration {
        id: id.clone(),
        detail: detail.into(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn is_module_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}
