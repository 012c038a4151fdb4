//! Field set composition.
//!
//! A type's final field list is its own declared fields followed by the data
//! fields it inherits from the unions it is a variant of, with
//! additionalProperties (when declared) appended last. Constant fields that
//! only carry a union's discriminator are dropped: the discriminator is
//! recorded in the union table instead.
//!
//! Composition is memoized per type in a [`OnceLock`] slot, so concurrent
//! requests for the same type compute it once and a parent shared by many
//! variants is composed a single time.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    DefinitionBody, Field, FieldType, FrozenRegistry, ResolveError, TypeDefinition, TypeId,
    TypeIndex,
};

/// What to do when revisions of a type disagree on additionalProperties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WideningPolicy {
    /// Use the untyped value type and mark the result as widened.
    #[default]
    Widen,
    /// Report [`ResolveError::InconsistentAdditionalPropertiesType`].
    Strict,
}

/// Role of a composed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum FieldRole {
    /// Regular data field.
    Data,
    /// Constant field that is not a discriminator of a parent union.
    Constant { value: String },
    /// Catch-all map of undeclared properties.
    AdditionalProperties,
}

/// A field of a composed field set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedField {
    pub field: Field,
    pub role: FieldRole,
    /// Union the field was inherited from; `None` for own fields.
    pub inherited_from: Option<TypeId>,
}

/// Resolved additionalProperties of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedAdditionalProperties {
    pub value: FieldType,
    /// `true` when revisions disagreed and the value type was widened.
    pub widened: bool,
}

/// Final field set of one type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedFields {
    pub fields: Vec<ComposedField>,
    pub additional_properties: Option<ComposedAdditionalProperties>,
}

impl ComposedFields {
    /// Field names in order, additionalProperties excluded.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field.name.as_str()).collect()
    }
}

type Slot = OnceLock<Result<ComposedFields, ResolveError>>;

/// Computes field sets over a frozen registry.
///
/// Types in `excluded` (failed or cyclic) are never composed and are skipped
/// when they appear as parents; their dependents are failed separately.
pub struct FieldSetComposer<'a> {
    registry: &'a FrozenRegistry,
    capabilities: &'a BTreeMap<TypeId, Vec<TypeId>>,
    excluded: &'a BTreeSet<TypeIndex>,
    policy: WideningPolicy,
    slots: Vec<Slot>,
    #[cfg(test)]
    computations: AtomicUsize,
}

impl<'a> FieldSetComposer<'a> {
    pub fn new(
        registry: &'a FrozenRegistry,
        capabilities: &'a BTreeMap<TypeId, Vec<TypeId>>,
        excluded: &'a BTreeSet<TypeIndex>,
        policy: WideningPolicy,
    ) -> Self {
        Self {
            registry,
            capabilities,
            excluded,
            policy,
            slots: (0..registry.len()).map(|_| OnceLock::new()).collect(),
            #[cfg(test)]
            computations: AtomicUsize::new(0),
        }
    }

    /// Composed field set of `idx`, computed at most once.
    pub fn compose(&self, idx: TypeIndex) -> Result<&ComposedFields, ResolveError> {
        match self.slots[idx.get()].get_or_init(|| self.compute(idx)) {
            Ok(fields) => Ok(fields),
            Err(err) => Err(err.clone()),
        }
    }

    /// Composes every type in `indices` in parallel on the current rayon pool.
    ///
    /// Excluded types are skipped. Results are keyed by index, so their order
    /// does not depend on scheduling.
    pub fn compose_all(
        &self,
        indices: &[TypeIndex],
    ) -> BTreeMap<TypeIndex, Result<ComposedFields, ResolveError>> {
        indices
            .par_iter()
            .filter(|idx| !self.excluded.contains(*idx))
            .map(|idx| (*idx, self.compose(*idx).cloned()))
            .collect()
    }

    fn compute(&self, idx: TypeIndex) -> Result<ComposedFields, ResolveError> {
        #[cfg(test)]
        self.computations.fetch_add(1, Ordering::Relaxed);
        let def = self.registry.definition(idx);
        if matches!(def.body, DefinitionBody::Enum(_)) {
            return Ok(ComposedFields::default());
        }

        let parents = self
            .capabilities
            .get(&def.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let discriminators = self.discriminator_properties(parents);

        let mut fields: Vec<ComposedField> = Vec::new();
        let mut names: BTreeSet<String> = BTreeSet::new();
        for field in def.fields() {
            let role = match &field.constant {
                Some(_) if discriminators.contains(field.name.as_str()) => continue,
                Some(value) => FieldRole::Constant {
                    value: value.clone(),
                },
                None => FieldRole::Data,
            };
            names.insert(field.name.clone());
            fields.push(ComposedField {
                field: field.clone(),
                role,
                inherited_from: None,
            });
        }

        for parent_id in parents {
            let Some(parent_idx) = self.registry.index_of(parent_id) else {
                continue;
            };
            if self.excluded.contains(&parent_idx) {
                continue;
            }
            let Ok(parent) = self.compose(parent_idx) else {
                continue;
            };
            for inherited in &parent.fields {
                if inherited.role != FieldRole::Data || names.contains(&inherited.field.name) {
                    continue;
                }
                names.insert(inherited.field.name.clone());
                fields.push(ComposedField {
                    field: inherited.field.clone(),
                    role: FieldRole::Data,
                    inherited_from: inherited
                        .inherited_from
                        .clone()
                        .or_else(|| Some(parent_id.clone())),
                });
            }
        }

        Ok(ComposedFields {
            fields,
            additional_properties: self.additional_properties(idx, def)?,
        })
    }

    fn discriminator_properties(&self, parents: &[TypeId]) -> BTreeSet<&'a str> {
        parents
            .iter()
            .filter_map(|parent| self.registry.get(parent))
            .filter_map(TypeDefinition::as_union)
            .map(|union| union.discriminator_property.as_str())
            .collect()
    }

    /// additionalProperties of the current revision, checked against every
    /// earlier revision that also declared it.
    ///
    /// Value types are compared as declared. An inline value type is a
    /// reference to the hoisted `{Owner}AdditionalProperties` in every
    /// revision, so a change to its body alone is not widened; the hoisted
    /// type of the current revision is the one emitted.
    fn additional_properties(
        &self,
        idx: TypeIndex,
        def: &TypeDefinition,
    ) -> Result<Option<ComposedAdditionalProperties>, ResolveError> {
        let Some(current) = def.additional_properties() else {
            return Ok(None);
        };

        let mut distinct: Vec<&FieldType> = Vec::new();
        for revision in self.registry.revisions(idx) {
            if let Some(value) = revision.additional_properties() {
                if !distinct.contains(&value) {
                    distinct.push(value);
                }
            }
        }

        if distinct.len() <= 1 {
            return Ok(Some(ComposedAdditionalProperties {
                value: current.clone(),
                widened: false,
            }));
        }

        let detail = format!(
            "{} revisions declare {} different value types",
            self.registry.entry(idx).history.len() + 1,
            distinct.len()
        );
        match self.policy {
            WideningPolicy::Widen => {
                warn!(type_id = %def.id, "{detail}; widening additionalProperties to any");
                Ok(Some(ComposedAdditionalProperties {
                    value: FieldType::Any,
                    widened: true,
                }))
            }
            WideningPolicy::Strict => Err(ResolveError::InconsistentAdditionalPropertiesType {
                id: def.id.clone(),
                detail,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        FieldDecl, PolymorphismResolver, ScalarType, SchemaRegistry, TypeDeclaration,
        TypeDescriptor, TypeRef,
    };

    fn setup(decls: &[TypeDeclaration]) -> (FrozenRegistry, BTreeMap<TypeId, Vec<TypeId>>) {
        let mut registry = SchemaRegistry::new();
        for decl in decls {
            assert!(registry.register_declaration(decl).is_empty());
        }
        let registry = registry.freeze();
        let capabilities = PolymorphismResolver::new(&registry).resolve().capabilities;
        (registry, capabilities)
    }

    fn compose(
        decls: &[TypeDeclaration],
        name: &str,
        policy: WideningPolicy,
    ) -> Result<ComposedFields, ResolveError> {
        let (registry, capabilities) = setup(decls);
        let excluded = BTreeSet::new();
        let composer = FieldSetComposer::new(&registry, &capabilities, &excluded, policy);
        let idx = registry.index_of(&TypeId::new("M", name)).unwrap();
        composer.compose(idx).cloned()
    }

    #[test]
    fn test_own_fields_then_inherited() {
        let decls = [
            TypeDeclaration::union("M", "Named")
                .with_field(FieldDecl::new("name", TypeDescriptor::string()))
                .with_field(FieldDecl::new("id", TypeDescriptor::string())),
            TypeDeclaration::object("M", "Item")
                .implementing(TypeRef::local("Named"))
                .with_field(FieldDecl::constant("kind", "ITEM"))
                .with_field(FieldDecl::new("id", TypeDescriptor::integer()))
                .with_field(FieldDecl::new("price", TypeDescriptor::scalar(ScalarType::Number))),
        ];
        let composed = compose(&decls, "Item", WideningPolicy::Widen).unwrap();

        assert_eq!(composed.names(), vec!["id", "price", "name"]);
        assert_eq!(composed.fields[0].field.ty, FieldType::Scalar(ScalarType::Integer));
        assert_eq!(
            composed.fields[2].inherited_from,
            Some(TypeId::new("M", "Named"))
        );
    }

    #[test]
    fn test_inherits_through_nested_unions() {
        let decls = [
            TypeDeclaration::union("M", "Root")
                .with_field(FieldDecl::new("root", TypeDescriptor::string())),
            TypeDeclaration::union("M", "Mid")
                .implementing(TypeRef::local("Root"))
                .with_discriminator("MID")
                .with_field(FieldDecl::new("mid", TypeDescriptor::string())),
            TypeDeclaration::object("M", "Leaf")
                .implementing(TypeRef::local("Mid"))
                .with_discriminator("LEAF"),
        ];
        let composed = compose(&decls, "Leaf", WideningPolicy::Widen).unwrap();
        assert_eq!(composed.names(), vec!["mid", "root"]);
        assert_eq!(
            composed.fields[1].inherited_from,
            Some(TypeId::new("M", "Root"))
        );
    }

    #[test]
    fn test_non_discriminator_constant_is_kept() {
        let decls = [TypeDeclaration::object("M", "A")
            .with_field(FieldDecl::constant("kind", "A"))
            .with_field(FieldDecl::constant("schema", "v2"))];
        let composed = compose(&decls, "A", WideningPolicy::Widen).unwrap();
        assert_eq!(composed.names(), vec!["kind", "schema"]);
        assert_eq!(
            composed.fields[1].role,
            FieldRole::Constant {
                value: "v2".into()
            }
        );
    }

    #[test]
    fn test_additional_properties_widening() {
        let decls = [
            TypeDeclaration::object("M", "Bag")
                .with_additional_properties(TypeDescriptor::string()),
            TypeDeclaration::object("M", "Bag")
                .with_additional_properties(TypeDescriptor::integer())
                .as_override(),
        ];

        let widened = compose(&decls, "Bag", WideningPolicy::Widen).unwrap();
        assert_eq!(
            widened.additional_properties,
            Some(ComposedAdditionalProperties {
                value: FieldType::Any,
                widened: true,
            })
        );

        let strict = compose(&decls, "Bag", WideningPolicy::Strict);
        assert!(matches!(
            strict,
            Err(ResolveError::InconsistentAdditionalPropertiesType { .. })
        ));
    }

    #[test]
    fn test_additional_properties_consistent_revisions() {
        let decls = [
            TypeDeclaration::object("M", "Bag")
                .with_additional_properties(TypeDescriptor::string()),
            TypeDeclaration::object("M", "Bag").as_override(),
            TypeDeclaration::object("M", "Bag")
                .with_additional_properties(TypeDescriptor::string())
                .as_override(),
        ];
        let composed = compose(&decls, "Bag", WideningPolicy::Strict).unwrap();
        assert_eq!(
            composed.additional_properties,
            Some(ComposedAdditionalProperties {
                value: FieldType::Scalar(ScalarType::String),
                widened: false,
            })
        );
    }

    #[test]
    fn test_inline_additional_properties_compared_by_reference() {
        let inline = |field: &str| {
            TypeDescriptor::object(
                crate::InlineObject::default()
                    .with_field(FieldDecl::new(field, TypeDescriptor::string())),
            )
        };
        let decls = [
            TypeDeclaration::object("M", "Bag").with_additional_properties(inline("a")),
            TypeDeclaration::object("M", "Bag")
                .with_additional_properties(inline("b"))
                .as_override(),
        ];
        let composed = compose(&decls, "Bag", WideningPolicy::Strict).unwrap();
        assert_eq!(
            composed.additional_properties,
            Some(ComposedAdditionalProperties {
                value: FieldType::Reference(TypeId::new("M", "BagAdditionalProperties")),
                widened: false,
            })
        );
    }

    #[test]
    fn test_shared_parent_composed_once_across_threads() {
        let mut decls = vec![
            TypeDeclaration::union("M", "Shared")
                .with_field(FieldDecl::new("id", TypeDescriptor::string())),
        ];
        for i in 0..32 {
            decls.push(
                TypeDeclaration::object("M", &format!("V{i}"))
                    .implementing(TypeRef::local("Shared"))
                    .with_discriminator(&format!("V{i}")),
            );
        }
        let (registry, capabilities) = setup(&decls);
        let excluded = BTreeSet::new();
        let composer =
            FieldSetComposer::new(&registry, &capabilities, &excluded, WideningPolicy::Widen);
        let shared = registry.index_of(&TypeId::new("M", "Shared")).unwrap();
        let mut indices: Vec<TypeIndex> = Vec::new();
        for _ in 0..4 {
            indices.extend(registry.indices());
        }

        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
        let results = pool.install(|| composer.compose_all(&indices));
        let same_slot = pool.install(|| {
            (0..64).into_par_iter().all(|_| {
                std::ptr::eq(composer.compose(shared).unwrap(), composer.compose(shared).unwrap())
            })
        });

        assert_eq!(results.len(), 33);
        assert!(same_slot);
        assert_eq!(composer.computations.load(Ordering::Relaxed), 33);
        assert!(results.values().all(|fields| {
            fields.as_ref().unwrap().fields.iter().any(|f| f.field.name == "id")
        }));
    }

    #[test]
    fn test_compose_all_skips_excluded() {
        let (registry, capabilities) = setup(&[
            TypeDeclaration::object("M", "A"),
            TypeDeclaration::object("M", "B"),
        ]);
        let excluded = BTreeSet::from([registry.index_of(&TypeId::new("M", "B")).unwrap()]);
        let composer =
            FieldSetComposer::new(&registry, &capabilities, &excluded, WideningPolicy::Widen);
        let indices: Vec<TypeIndex> = registry.indices().collect();

        let results = composer.compose_all(&indices);
        assert_eq!(results.len(), 1);
        assert!(results.contains_key(&registry.index_of(&TypeId::new("M", "A")).unwrap()));
    }
}
