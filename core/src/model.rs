//! Resolved intermediate representation.
//!
//! The IR is what code generators consume. Every model is final: fields are
//! composed, references are [`TypeId`]s of other models in the same schema,
//! union tables are complete, and nothing remains to be looked up. An
//! [`Emitter`] walks the models in link order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    ComposedFields, DefinitionBody, FieldRole, FieldType, LinkPlan, ResolveError, ScalarType,
    TypeDefinition, TypeId, TypeKind, UnionTable, VariantEntry,
};

/// Semantic type of a resolved field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Scalar(ScalarType),
    /// Another model of the schema.
    Reference(TypeId),
    List(Box<SemanticType>),
    Map {
        key: ScalarType,
        value: Box<SemanticType>,
    },
    Any,
}

impl From<&FieldType> for SemanticType {
    fn from(ty: &FieldType) -> Self {
        match ty {
            FieldType::Scalar(scalar) => Self::Scalar(*scalar),
            FieldType::Reference(id) => Self::Reference(id.clone()),
            FieldType::List(item) => Self::List(Box::new(Self::from(&**item))),
            FieldType::Map { key, value } => Self::Map {
                key: *key,
                value: Box::new(Self::from(&**value)),
            },
            FieldType::Any => Self::Any,
        }
    }
}

/// Renders `list<uuid>`, `map<string, Orders.Order>`, `any`.
impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Reference(id) => write!(f, "{id}"),
            Self::List(item) => write!(f, "list<{item}>"),
            Self::Map { key, value } => write!(f, "map<{key}, {value}>"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Name of the synthesized additionalProperties field.
pub const ADDITIONAL_PROPERTIES_FIELD: &str = "additionalProperties";

/// A field of a resolved model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SemanticType,
    pub optional: bool,
    #[serde(flatten)]
    pub role: FieldRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<TypeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<TypeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// additionalProperties of an object model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalPropertiesModel {
    pub value: SemanticType,
    /// `true` when conflicting revisions forced the value type to `Any`.
    pub widened: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectModel {
    /// Fields in final order; an additionalProperties map, if any, is last.
    pub fields: Vec<ResolvedField>,
    /// Unions this object is a variant of.
    pub implements: Vec<TypeId>,
    /// Discriminator value identifying this object in its unions.
    pub discriminator: Option<String>,
    pub additional_properties: Option<AdditionalPropertiesModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumModel {
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantModel {
    pub discriminator: String,
    pub variant: TypeId,
}

impl From<&VariantEntry> for VariantModel {
    fn from(entry: &VariantEntry) -> Self {
        Self {
            discriminator: entry.discriminator.clone(),
            variant: entry.variant.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionModel {
    pub discriminator_property: String,
    /// Fields shared by every variant.
    pub fields: Vec<ResolvedField>,
    /// Complete discriminator table.
    pub variants: Vec<VariantModel>,
    /// Unions this union is itself a variant of.
    pub implements: Vec<TypeId>,
    pub discriminator: Option<String>,
}

/// Kind-specific part of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelBody {
    Object(ObjectModel),
    Enum(EnumModel),
    Union(UnionModel),
}

/// One resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModel {
    pub id: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Registry revision the model was built from.
    pub revision: u32,
    pub body: ModelBody,
}

impl ResolvedModel {
    pub fn kind(&self) -> TypeKind {
        match self.body {
            ModelBody::Object(_) => TypeKind::Object,
            ModelBody::Enum(_) => TypeKind::Enum,
            ModelBody::Union(_) => TypeKind::Union,
        }
    }

    /// Fields in final order; empty for enums.
    pub fn fields(&self) -> &[ResolvedField] {
        match &self.body {
            ModelBody::Object(object) => &object.fields,
            ModelBody::Union(union) => &union.fields,
            ModelBody::Enum(_) => &[],
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields().iter().map(|f| f.name.as_str()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&ResolvedField> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn as_object(&self) -> Option<&ObjectModel> {
        match &self.body {
            ModelBody::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&UnionModel> {
        match &self.body {
            ModelBody::Union(union) => Some(union),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumModel> {
        match &self.body {
            ModelBody::Enum(enumeration) => Some(enumeration),
            _ => None,
        }
    }
}

/// Code generator back end.
///
/// [`ResolvedSchema::emit`] calls one method per model, in link order. The
/// first error stops the walk and is returned unchanged.
pub trait Emitter {
    type Error;

    fn emit_object(&mut self, model: &ResolvedModel, object: &ObjectModel)
    -> Result<(), Self::Error>;

    fn emit_enum(&mut self, model: &ResolvedModel, enumeration: &EnumModel)
    -> Result<(), Self::Error>;

    fn emit_union(&mut self, model: &ResolvedModel, union: &UnionModel) -> Result<(), Self::Error>;
}

/// The resolved schema: every successfully resolved model, in link order.
///
/// Models are ordered by the position of their module in the [`LinkPlan`],
/// then by [`TypeId`].
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let bundle = SchemaBundle::new("1.0.0")
///     .with_declaration(TypeDeclaration::enumeration("M", "Status").with_member("OPEN"));
/// let resolution = resolve_bundle(&bundle, &ResolveOptions::default());
///
/// let status = resolution.schema.lookup("M", "Status").unwrap();
/// assert_eq!(status.as_enum().unwrap().members, vec!["OPEN".to_string()]);
/// assert!(resolution.schema.lookup("M", "Missing").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSchema {
    pub models: Vec<ResolvedModel>,
    pub plan: LinkPlan,
}

impl ResolvedSchema {
    pub fn get(&self, id: &TypeId) -> Option<&ResolvedModel> {
        self.models.iter().find(|model| model.id == *id)
    }

    pub fn lookup(&self, module: &str, name: &str) -> Result<&ResolvedModel, ResolveError> {
        let id = TypeId::new(module, name);
        self.get(&id).ok_or(ResolveError::SchemaNotFound { id })
    }

    pub fn contains(&self, id: &TypeId) -> bool {
        self.get(id).is_some()
    }

    pub fn models_in_module<'a>(
        &'a self,
        module: &'a str,
    ) -> impl Iterator<Item = &'a ResolvedModel> + 'a {
        self.models.iter().filter(move |model| model.id.module == module)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Walks every model in order, handing each to `emitter`.
    pub fn emit<E: Emitter>(&self, emitter: &mut E) -> Result<(), E::Error> {
        for model in &self.models {
            match &model.body {
                ModelBody::Object(object) => emitter.emit_object(model, object)?,
                ModelBody::Enum(enumeration) => emitter.emit_enum(model, enumeration)?,
                ModelBody::Union(union) => emitter.emit_union(model, union)?,
            }
        }
        Ok(())
    }
}

/// Assembles resolved models from the outputs of the resolution stages.
pub struct ModelBuilder<'a> {
    unions: &'a BTreeMap<TypeId, UnionTable>,
    capabilities: &'a BTreeMap<TypeId, Vec<TypeId>>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        unions: &'a BTreeMap<TypeId, UnionTable>,
        capabilities: &'a BTreeMap<TypeId, Vec<TypeId>>,
    ) -> Self {
        Self {
            unions,
            capabilities,
        }
    }

    /// Builds the model of one definition from its composed field set.
    pub fn build(&self, def: &TypeDefinition, composed: &ComposedFields) -> ResolvedModel {
        let implements = self.capabilities.get(&def.id).cloned().unwrap_or_default();
        let discriminator = self.discriminator(def, &implements);
        let fields: Vec<ResolvedField> = composed
            .fields
            .iter()
            .map(|composed| ResolvedField {
                name: composed.field.name.clone(),
                ty: (&composed.field.ty).into(),
                optional: composed.field.optional,
                role: composed.role.clone(),
                inherited_from: composed.inherited_from.clone(),
                references: composed.field.references.clone(),
                description: composed.field.description.clone(),
            })
            .collect();

        let body = match &def.body {
            DefinitionBody::Object(_) => {
                let additional_properties =
                    composed
                        .additional_properties
                        .as_ref()
                        .map(|extra| AdditionalPropertiesModel {
                            value: (&extra.value).into(),
                            widened: extra.widened,
                        });
                let mut fields = fields;
                if let Some(extra) = &additional_properties {
                    fields.push(ResolvedField {
                        name: ADDITIONAL_PROPERTIES_FIELD.to_string(),
                        ty: SemanticType::Map {
                            key: ScalarType::String,
                            value: Box::new(extra.value.clone()),
                        },
                        optional: true,
                        role: FieldRole::AdditionalProperties,
                        inherited_from: None,
                        references: Vec::new(),
                        description: None,
                    });
                }
                ModelBody::Object(ObjectModel {
                    fields,
                    implements,
                    discriminator,
                    additional_properties,
                })
            }
            DefinitionBody::Enum(enumeration) => ModelBody::Enum(EnumModel {
                members: enumeration.members.clone(),
            }),
            DefinitionBody::Union(union) => ModelBody::Union(UnionModel {
                discriminator_property: union.discriminator_property.clone(),
                fields,
                variants: self
                    .unions
                    .get(&def.id)
                    .map(|table| table.variants.iter().map(VariantModel::from).collect())
                    .unwrap_or_default(),
                implements,
                discriminator,
            }),
        };

        ResolvedModel {
            id: def.id.clone(),
            description: def.description.clone(),
            version: def.version.clone(),
            revision: def.revision,
            body,
        }
    }

    /// Declared literal, else the value recorded by the first parent union.
    fn discriminator(&self, def: &TypeDefinition, implements: &[TypeId]) -> Option<String> {
        if let Some(literal) = def.discriminator() {
            return Some(literal.to_string());
        }
        implements
            .iter()
            .filter_map(|union| self.unions.get(union))
            .find_map(|table| table.discriminator_of(&def.id))
            .map(str::to_string)
    }
}
