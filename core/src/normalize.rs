//! Declaration normalization.
//!
//! Turns one [`TypeDeclaration`] into the definitions it stands for. Inline
//! objects and enums become named definitions, using the names a code
//! generator would give them:
//!
//! | inline position                     | hoisted name                   |
//! |-------------------------------------|--------------------------------|
//! | field `field` of `Owner`            | `Owner` + PascalCase(`field`)  |
//! | additionalProperties of `Owner`     | `OwnerAdditionalProperties`    |
//! | n-th inline variant of union `U`    | `UOneOf{n}` (1-based)          |
//!
//! Hoisting recurses, so a field of a hoisted object is named after the
//! hoisted object.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::{
    DefinitionBody, EnumDefinition, EnumMember, Field, FieldDecl, FieldType, ObjectDefinition,
    TypeDeclaration, TypeDefinition, TypeDescriptor, TypeId, TypeKind, TypeRef, UnionDefinition,
    VariantDecl,
};

/// Normalizes a declaration into its definition plus hoisted inline types.
///
/// The declared type comes first; hoisted definitions follow in the order
/// they were encountered. Declarations are expected to have passed
/// [`validate_declaration`](crate::validate_declaration).
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let decl = TypeDeclaration::object("Module", "Object2")
///     .with_additional_properties(TypeDescriptor::object(
///         InlineObject::default().with_field(FieldDecl::new("a", TypeDescriptor::string())),
///     ));
///
/// let defs = normalize_declaration(&decl, DEFAULT_DISCRIMINATOR_PROPERTY);
/// let names: Vec<_> = defs.iter().map(|d| d.id.name.as_str()).collect();
/// assert_eq!(names, vec!["Object2", "Object2AdditionalProperties"]);
/// assert_eq!(defs[1].owner, Some(TypeId::new("Module", "Object2")));
/// ```
pub fn normalize_declaration(
    decl: &TypeDeclaration,
    default_discriminator_property: &str,
) -> Vec<TypeDefinition> {
    let id = decl.id();
    let mut hoister = Hoister {
        module: &decl.module,
        root: id.clone(),
        is_override: decl.is_override,
        version: decl.version.clone(),
        hoisted: Vec::new(),
    };

    if !decl.methods.is_empty() {
        debug!(type_id = %id, methods = decl.methods.len(), "dropping behavioural members");
    }

    let body = match decl.kind {
        TypeKind::Object => DefinitionBody::Object(ObjectDefinition {
            fields: hoister.fields(&decl.name, &decl.fields),
            discriminator: decl.discriminator.clone(),
            additional_properties: decl.additional_properties.as_ref().map(|desc| {
                hoister.descriptor(&format!("{}AdditionalProperties", decl.name), desc)
            }),
        }),
        TypeKind::Enum => DefinitionBody::Enum(enum_definition(&id, &decl.members)),
        TypeKind::Union => {
            let fields = hoister.fields(&decl.name, &decl.fields);
            let mut variants = Vec::with_capacity(decl.variants.len());
            let mut inline_count = 0;
            for variant in &decl.variants {
                match variant {
                    VariantDecl::Ref(target) => {
                        let variant_id = target.qualify(&decl.module);
                        if variant_id == id {
                            warn!(type_id = %id, "ignoring union listed as its own variant");
                            continue;
                        }
                        if variants.contains(&variant_id) {
                            debug!(type_id = %id, variant = %variant_id, "variant listed twice");
                            continue;
                        }
                        variants.push(variant_id);
                    }
                    VariantDecl::Inline(inline) => {
                        inline_count += 1;
                        let name = format!("{}OneOf{inline_count}", decl.name);
                        let body = DefinitionBody::Object(ObjectDefinition {
                            fields: hoister.fields(&name, &inline.fields),
                            discriminator: inline.discriminator.clone(),
                            additional_properties: inline.additional_properties.as_ref().map(
                                |desc| hoister.descriptor(&format!("{name}AdditionalProperties"), desc),
                            ),
                        });
                        let variant_id = hoister.hoist(
                            &name,
                            inline.description.clone(),
                            vec![id.clone()],
                            body,
                        );
                        variants.push(variant_id);
                    }
                }
            }
            DefinitionBody::Union(UnionDefinition {
                fields,
                variants,
                discriminator_property: decl
                    .discriminator_property
                    .clone()
                    .unwrap_or_else(|| default_discriminator_property.to_string()),
                discriminator: decl.discriminator.clone(),
            })
        }
    };

    let definition = TypeDefinition {
        parents: normalize_parents(&id, decl.declared_parents()),
        id,
        description: decl.description.clone(),
        version: decl.version.clone(),
        revision: 0,
        is_override: decl.is_override,
        owner: None,
        body,
    };

    let mut defs = Vec::with_capacity(1 + hoister.hoisted.len());
    defs.push(definition);
    defs.extend(hoister.hoisted);
    defs
}

/// De-duplicates parents, keeping first-seen order and dropping self references.
fn normalize_parents<'a>(id: &TypeId, parents: impl Iterator<Item = &'a TypeRef>) -> Vec<TypeId> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for parent in parents {
        let parent_id = parent.qualify(&id.module);
        if parent_id == *id {
            warn!(type_id = %id, "ignoring self-implementation");
            continue;
        }
        if seen.insert(parent_id.clone()) {
            out.push(parent_id);
        } else {
            debug!(type_id = %id, parent = %parent_id, "parent declared twice");
        }
    }
    out
}

fn enum_definition(id: &TypeId, members: &[EnumMember]) -> EnumDefinition {
    if members.iter().any(|m| m.value.is_some() || !m.methods.is_empty()) {
        debug!(type_id = %id, "dropping enum member data and behaviour");
    }
    EnumDefinition {
        members: members.iter().map(|m| m.name.clone()).collect(),
    }
}

struct Hoister<'a> {
    module: &'a str,
    root: TypeId,
    is_override: bool,
    version: Option<String>,
    hoisted: Vec<TypeDefinition>,
}

impl Hoister<'_> {
    fn fields(&mut self, owner: &str, decls: &[FieldDecl]) -> Vec<Field> {
        decls.iter().map(|decl| self.field(owner, decl)).collect()
    }

    fn field(&mut self, owner: &str, decl: &FieldDecl) -> Field {
        let hoist_name = format!("{owner}{}", pascal_case(&decl.name));
        Field {
            name: decl.name.clone(),
            ty: self.descriptor(&hoist_name, &decl.ty),
            optional: decl.optional,
            constant: decl.constant.clone(),
            references: decl
                .references
                .iter()
                .map(|r| r.qualify(self.module))
                .collect(),
            description: decl.description.clone(),
        }
    }

    /// Converts a descriptor, hoisting inline types under `hoist_name`.
    ///
    /// List items and map values keep the name of their container.
    fn descriptor(&mut self, hoist_name: &str, desc: &TypeDescriptor) -> FieldType {
        match desc {
            TypeDescriptor::Scalar(scalar) => FieldType::Scalar(*scalar),
            TypeDescriptor::Ref(target) => FieldType::Reference(target.qualify(self.module)),
            TypeDescriptor::List(item) => {
                FieldType::List(Box::new(self.descriptor(hoist_name, item)))
            }
            TypeDescriptor::Map { key, value } => FieldType::Map {
                key: *key,
                value: Box::new(self.descriptor(hoist_name, value)),
            },
            TypeDescriptor::Any => FieldType::Any,
            TypeDescriptor::Object(inline) => {
                let body = DefinitionBody::Object(ObjectDefinition {
                    fields: self.fields(hoist_name, &inline.fields),
                    discriminator: None,
                    additional_properties: inline.additional_properties.as_deref().map(|value| {
                        self.descriptor(&format!("{hoist_name}AdditionalProperties"), value)
                    }),
                });
                let id = self.hoist(hoist_name, inline.description.clone(), Vec::new(), body);
                FieldType::Reference(id)
            }
            TypeDescriptor::Enum(members) => {
                let id = TypeId::new(self.module, hoist_name);
                let body = DefinitionBody::Enum(enum_definition(&id, members));
                FieldType::Reference(self.hoist(hoist_name, None, Vec::new(), body))
            }
        }
    }

    fn hoist(
        &mut self,
        name: &str,
        description: Option<String>,
        parents: Vec<TypeId>,
        body: DefinitionBody,
    ) -> TypeId {
        let id = TypeId::new(self.module, name);
        debug!(type_id = %id, owner = %self.root, "hoisting inline definition");
        self.hoisted.push(TypeDefinition {
            id: id.clone(),
            description,
            version: self.version.clone(),
            revision: 0,
            is_override: self.is_override,
            owner: Some(self.root.clone()),
            parents,
            body,
        });
        id
    }
}

/// Converts a property name to PascalCase: `"shipping_address"` and
/// `"shipping-address"` both become `"ShippingAddress"`, `"items"` becomes
/// `"Items"`.
fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_DISCRIMINATOR_PROPERTY, InlineObject, InlineVariant};

    fn names(defs: &[TypeDefinition]) -> Vec<&str> {
        defs.iter().map(|d| d.id.name.as_str()).collect()
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("items"), "Items");
        assert_eq!(pascal_case("shipping_address"), "ShippingAddress");
        assert_eq!(pascal_case("x-tags"), "XTags");
        assert_eq!(pascal_case("camelCase"), "CamelCase");
    }

    #[test]
    fn test_normalize_hoists_nested_inline_types() {
        let address = InlineObject::default()
            .with_field(FieldDecl::new("street", TypeDescriptor::string()))
            .with_field(FieldDecl::new(
                "kind",
                TypeDescriptor::inline_enum(["HOME", "WORK"]),
            ));
        let decl = TypeDeclaration::object("Shop", "Customer").with_field(FieldDecl::new(
            "addresses",
            TypeDescriptor::list(TypeDescriptor::object(address)),
        ));

        let defs = normalize_declaration(&decl, DEFAULT_DISCRIMINATOR_PROPERTY);
        assert_eq!(
            names(&defs),
            vec!["Customer", "CustomerAddressesKind", "CustomerAddresses"]
        );
        assert_eq!(
            defs[0].fields()[0].ty,
            FieldType::List(Box::new(FieldType::Reference(TypeId::new(
                "Shop",
                "CustomerAddresses"
            ))))
        );
        assert!(defs[1..].iter().all(|d| d.owner == Some(defs[0].id.clone())));
    }

    #[test]
    fn test_normalize_inline_union_variants() {
        let decl = TypeDeclaration::union("Module", "Interface")
            .with_variant(VariantDecl::Inline(InlineVariant {
                discriminator: Some("INSIDE1".into()),
                ..InlineVariant::default()
            }))
            .with_variant(VariantDecl::Ref(TypeRef::local("Named")))
            .with_variant(VariantDecl::Inline(InlineVariant {
                discriminator: Some("INSIDE2".into()),
                ..InlineVariant::default()
            }));

        let defs = normalize_declaration(&decl, DEFAULT_DISCRIMINATOR_PROPERTY);
        assert_eq!(
            names(&defs),
            vec!["Interface", "InterfaceOneOf1", "InterfaceOneOf2"]
        );
        let union = defs[0].as_union().unwrap();
        assert_eq!(union.discriminator_property, "kind");
        assert_eq!(
            union.variants,
            vec![
                TypeId::new("Module", "InterfaceOneOf1"),
                TypeId::new("Module", "Named"),
                TypeId::new("Module", "InterfaceOneOf2"),
            ]
        );
        assert_eq!(defs[1].parents, vec![TypeId::new("Module", "Interface")]);
        assert_eq!(defs[2].discriminator(), Some("INSIDE2"));
    }

    #[test]
    fn test_normalize_parents_dedup_and_self() {
        let decl = TypeDeclaration::object("M", "A")
            .implementing(TypeRef::local("I"))
            .implementing(TypeRef::local("A"))
            .extending(TypeRef::new("M", "I"))
            .extending(TypeRef::new("N", "J"));

        let defs = normalize_declaration(&decl, DEFAULT_DISCRIMINATOR_PROPERTY);
        assert_eq!(
            defs[0].parents,
            vec![TypeId::new("M", "I"), TypeId::new("N", "J")]
        );
    }

    #[test]
    fn test_normalize_drops_self_and_repeated_variants() {
        let decl = TypeDeclaration::union("M", "U")
            .with_variant(VariantDecl::Ref(TypeRef::local("U")))
            .with_variant(VariantDecl::Ref(TypeRef::local("A")))
            .with_variant(VariantDecl::Ref(TypeRef::new("M", "A")));

        let defs = normalize_declaration(&decl, DEFAULT_DISCRIMINATOR_PROPERTY);
        assert_eq!(defs[0].as_union().unwrap().variants, vec![TypeId::new("M", "A")]);
    }

    #[test]
    fn test_normalize_carries_override_to_hoisted() {
        let decl = TypeDeclaration::object("M", "A")
            .with_field(FieldDecl::new(
                "b",
                TypeDescriptor::object(InlineObject::default()),
            ))
            .as_override();

        let defs = normalize_declaration(&decl, DEFAULT_DISCRIMINATOR_PROPERTY);
        assert!(defs.iter().all(|d| d.is_override));
    }

    #[test]
    fn test_normalize_enum_keeps_member_names_only() {
        let decl = TypeDeclaration::enumeration("M", "Status")
            .with_member("OPEN")
            .with_enum_member(EnumMember {
                methods: vec!["label".into()],
                ..EnumMember::new("CLOSED")
            })
            .with_method("parse");

        let defs = normalize_declaration(&decl, DEFAULT_DISCRIMINATOR_PROPERTY);
        assert_eq!(
            defs[0].body,
            DefinitionBody::Enum(EnumDefinition {
                members: vec!["OPEN".into(), "CLOSED".into()],
            })
        );
    }
}
