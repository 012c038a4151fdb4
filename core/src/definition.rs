//! Normalized type definitions held by the registry.
//!
//! A [`TypeDefinition`] is what a [`TypeDeclaration`](crate::TypeDeclaration)
//! becomes once inline objects and enums are hoisted, references are qualified
//! with their module, and parents are de-duplicated. Every link to another
//! type is a [`TypeId`].

use serde::{Deserialize, Serialize};

use crate::{ScalarType, TypeId, TypeKind};

/// Type of a normalized field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Scalar(ScalarType),
    Reference(TypeId),
    List(Box<FieldType>),
    Map {
        key: ScalarType,
        value: Box<FieldType>,
    },
    Any,
}

impl FieldType {
    /// Appends every type referenced by this field type to `out`.
    pub fn collect_references(&self, out: &mut Vec<TypeId>) {
        match self {
            Self::Reference(id) => out.push(id.clone()),
            Self::List(item) => item.collect_references(out),
            Self::Map { value, .. } => value.collect_references(out),
            Self::Scalar(_) | Self::Any => {}
        }
    }
}

/// A normalized field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub optional: bool,
    /// Literal value of a constant field.
    pub constant: Option<String>,
    /// Types whose identifiers the field stores.
    pub references: Vec<TypeId>,
    pub description: Option<String>,
}

impl Field {
    /// Returns `true` for constant (static/final) fields.
    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    pub fields: Vec<Field>,
    /// Discriminator literal when the object is a union variant.
    pub discriminator: Option<String>,
    pub additional_properties: Option<FieldType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionDefinition {
    /// Fields shared by every variant.
    pub fields: Vec<Field>,
    /// Explicitly listed variants, in declaration order.
    pub variants: Vec<TypeId>,
    pub discriminator_property: String,
    /// Discriminator literal when the union is itself a variant.
    pub discriminator: Option<String>,
}

/// Kind-specific part of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefinitionBody {
    Object(ObjectDefinition),
    Enum(EnumDefinition),
    Union(UnionDefinition),
}

/// A registered, normalized type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub id: TypeId,
    pub description: Option<String>,
    /// Informational version label from the declaration.
    pub version: Option<String>,
    /// Registry revision; 0 for the first registration, +1 per override.
    pub revision: u32,
    /// Whether the declaration carried the override flag.
    pub is_override: bool,
    /// Declaration a hoisted inline definition was extracted from.
    pub owner: Option<TypeId>,
    /// Parent unions, de-duplicated, in declaration order.
    pub parents: Vec<TypeId>,
    pub body: DefinitionBody,
}

impl TypeDefinition {
    /// Kind of the definition.
    pub fn kind(&self) -> TypeKind {
        match self.body {
            DefinitionBody::Object(_) => TypeKind::Object,
            DefinitionBody::Enum(_) => TypeKind::Enum,
            DefinitionBody::Union(_) => TypeKind::Union,
        }
    }

    /// Declared fields; empty for enums.
    pub fn fields(&self) -> &[Field] {
        match &self.body {
            DefinitionBody::Object(object) => &object.fields,
            DefinitionBody::Union(union) => &union.fields,
            DefinitionBody::Enum(_) => &[],
        }
    }

    /// Declared discriminator literal, if any.
    pub fn discriminator(&self) -> Option<&str> {
        match &self.body {
            DefinitionBody::Object(object) => object.discriminator.as_deref(),
            DefinitionBody::Union(union) => union.discriminator.as_deref(),
            DefinitionBody::Enum(_) => None,
        }
    }

    /// Declared additionalProperties value type (objects only).
    pub fn additional_properties(&self) -> Option<&FieldType> {
        match &self.body {
            DefinitionBody::Object(object) => object.additional_properties.as_ref(),
            _ => None,
        }
    }

    /// Union body, if this is a union.
    pub fn as_union(&self) -> Option<&UnionDefinition> {
        match &self.body {
            DefinitionBody::Union(union) => Some(union),
            _ => None,
        }
    }

    /// Whether this definition was hoisted out of another declaration.
    pub fn is_hoisted(&self) -> bool {
        self.owner.is_some()
    }
}
