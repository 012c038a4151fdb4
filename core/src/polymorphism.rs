//! Union membership and discriminator resolution.
//!
//! A union's variants are the types it lists explicitly plus every type that
//! names it as a parent. Each variant needs exactly one discriminator value,
//! either declared as a literal or carried by a constant field named after the
//! union's discriminator property, and values must be unique within a union.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{FrozenRegistry, ResolveError, TypeDefinition, TypeId, TypeKind};

/// One row of a union's discriminator table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantEntry {
    pub discriminator: String,
    pub variant: TypeId,
}

/// Discriminator table of one union.
///
/// Explicit variants come first in declaration order, then implementors in
/// [`TypeId`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionTable {
    pub union: TypeId,
    pub discriminator_property: String,
    pub variants: Vec<VariantEntry>,
}

impl UnionTable {
    /// Discriminator value of `variant`, if it is a member.
    pub fn discriminator_of(&self, variant: &TypeId) -> Option<&str> {
        self.variants
            .iter()
            .find(|entry| entry.variant == *variant)
            .map(|entry| entry.discriminator.as_str())
    }
}

/// Result of polymorphism resolution.
#[derive(Debug, Clone, Default)]
pub struct Polymorphism {
    /// Discriminator table per union.
    pub unions: BTreeMap<TypeId, UnionTable>,
    /// Unions each type is a variant of, declared parents first.
    pub capabilities: BTreeMap<TypeId, Vec<TypeId>>,
    pub errors: Vec<ResolveError>,
}

impl Polymorphism {
    /// Unions `id` is a variant of.
    pub fn capabilities_of(&self, id: &TypeId) -> &[TypeId] {
        self.capabilities.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builds union tables and capability sets from a frozen registry.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let mut registry = SchemaRegistry::new();
/// registry.register_declaration(&TypeDeclaration::union("M", "Shape"));
/// registry.register_declaration(
///     &TypeDeclaration::object("M", "Circle")
///         .implementing(TypeRef::local("Shape"))
///         .with_field(FieldDecl::constant("kind", "CIRCLE")),
/// );
/// let registry = registry.freeze();
///
/// let poly = PolymorphismResolver::new(&registry).resolve();
/// assert!(poly.errors.is_empty());
/// let table = &poly.unions[&TypeId::new("M", "Shape")];
/// assert_eq!(table.discriminator_of(&TypeId::new("M", "Circle")), Some("CIRCLE"));
/// ```
pub struct PolymorphismResolver<'r> {
    registry: &'r FrozenRegistry,
}

impl<'r> PolymorphismResolver<'r> {
    pub fn new(registry: &'r FrozenRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve(&self) -> Polymorphism {
        let mut errors = Vec::new();
        let mut capabilities = self.declared_capabilities(&mut errors);
        let members = self.union_members(&mut capabilities, &mut errors);

        let mut unions = BTreeMap::new();
        for (union_id, variants) in members {
            let Some(union) = self.registry.get(&union_id).and_then(TypeDefinition::as_union)
            else {
                continue;
            };
            let table = self.discriminator_table(
                &union_id,
                &union.discriminator_property,
                &variants,
                &mut errors,
            );
            debug!(union = %union_id, variants = table.variants.len(), "resolved union");
            unions.insert(union_id, table);
        }

        Polymorphism {
            unions,
            capabilities,
            errors,
        }
    }

    /// Declared parents that exist, checking that each one is a union.
    fn declared_capabilities(
        &self,
        errors: &mut Vec<ResolveError>,
    ) -> BTreeMap<TypeId, Vec<TypeId>> {
        let mut capabilities = BTreeMap::new();
        for (_, def) in self.registry.iter() {
            let mut parents = Vec::new();
            for parent_id in &def.parents {
                let Some(parent) = self.registry.get(parent_id) else {
                    continue;
                };
                if parent.kind() != TypeKind::Union {
                    errors.push(ResolveError::InvalidVariant {
                        id: def.id.clone(),
                        detail: format!(
                            "parent {parent_id} is an {}; only unions can be implemented",
                            parent.kind()
                        ),
                    });
                    continue;
                }
                parents.push(parent_id.clone());
            }
            capabilities.insert(def.id.clone(), parents);
        }
        capabilities
    }

    /// Members of every union; explicit variants also gain the union as a
    /// capability.
    fn union_members(
        &self,
        capabilities: &mut BTreeMap<TypeId, Vec<TypeId>>,
        errors: &mut Vec<ResolveError>,
    ) -> BTreeMap<TypeId, Vec<TypeId>> {
        let mut members: BTreeMap<TypeId, Vec<TypeId>> = BTreeMap::new();

        for (_, def) in self.registry.iter() {
            let Some(union) = def.as_union() else {
                continue;
            };
            let list = members.entry(def.id.clone()).or_default();
            for variant_id in &union.variants {
                if *variant_id == def.id {
                    continue;
                }
                let Some(variant) = self.registry.get(variant_id) else {
                    continue;
                };
                if variant.kind() == TypeKind::Enum {
                    errors.push(ResolveError::InvalidVariant {
                        id: def.id.clone(),
                        detail: format!("variant {variant_id} is an enum"),
                    });
                    continue;
                }
                if !list.contains(variant_id) {
                    list.push(variant_id.clone());
                }
                let caps = capabilities.entry(variant_id.clone()).or_default();
                if !caps.contains(&def.id) {
                    caps.push(def.id.clone());
                }
            }
        }

        // Implementors in TypeId order, after the explicit variants.
        for (_, def) in self.registry.iter() {
            for parent in &def.parents {
                if let Some(list) = members.get_mut(parent) {
                    if !list.contains(&def.id) {
                        list.push(def.id.clone());
                    }
                }
            }
        }
        members
    }

    fn discriminator_table(
        &self,
        union_id: &TypeId,
        property: &str,
        variants: &[TypeId],
        errors: &mut Vec<ResolveError>,
    ) -> UnionTable {
        let mut entries = Vec::new();
        let mut by_value: BTreeMap<String, Vec<TypeId>> = BTreeMap::new();

        for variant_id in variants {
            let Some(variant) = self.registry.get(variant_id) else {
                continue;
            };
            let candidates = discriminator_candidates(variant, property);
            let mut values = candidates.iter();
            match (values.next(), values.next()) {
                (None, _) => errors.push(ResolveError::MissingDiscriminator {
                    variant: variant_id.clone(),
                    union: union_id.clone(),
                    property: property.to_string(),
                }),
                (Some(value), None) => {
                    by_value
                        .entry(value.clone())
                        .or_default()
                        .push(variant_id.clone());
                    entries.push(VariantEntry {
                        discriminator: value.clone(),
                        variant: variant_id.clone(),
                    });
                }
                (Some(_), Some(_)) => errors.push(ResolveError::InvalidVariant {
                    id: variant_id.clone(),
                    detail: format!(
                        "conflicting discriminator values for union {union_id}: {}",
                        candidates.iter().cloned().collect::<Vec<_>>().join(", ")
                    ),
                }),
            }
        }

        for (value, mut owners) in by_value {
            if owners.len() > 1 {
                owners.sort();
                errors.push(ResolveError::DiscriminatorCollision {
                    union: union_id.clone(),
                    value,
                    variants: owners,
                });
            }
        }

        UnionTable {
            union: union_id.clone(),
            discriminator_property: property.to_string(),
            variants: entries,
        }
    }
}

/// Distinct discriminator values a variant declares for `property`.
fn discriminator_candidates(variant: &TypeDefinition, property: &str) -> BTreeSet<String> {
    let mut values = BTreeSet::new();
    if let Some(literal) = variant.discriminator() {
        values.insert(literal.to_string());
    }
    for field in variant.fields() {
        if field.name == property {
            if let Some(constant) = &field.constant {
                values.insert(constant.clone());
            }
        }
    }
    values
}
