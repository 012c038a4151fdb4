//! Declaration types consumed by the resolution engine.
//!
//! These types form the input contract produced by an external schema
//! loader. A [`TypeDeclaration`] is the raw, un-normalized description of one
//! object, enum, or union; the registry turns it into one or more
//! [`TypeDefinition`](crate::TypeDefinition)s. All types serialize with
//! [`serde`] so they can be read from JSON or YAML bundles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Version of the declaration contract (semver).
///
/// Embedded in every [`SchemaBundle`](crate::SchemaBundle) to track
/// compatibility between loaders and the engine.
pub const SCHEMA_CONTRACT_VERSION: &str = "1.0.0";

/// Discriminator property used by unions that do not name one.
pub const DEFAULT_DISCRIMINATOR_PROPERTY: &str = "kind";

/// Stable identity of a type: the module that owns it and its name.
///
/// Every reference in the engine is a `TypeId`, never an embedded copy of
/// the target definition. Ordering is by module, then name, which is the
/// order used for all deterministic output.
///
/// # Examples
///
/// ```
/// use modelgen_core::TypeId;
///
/// let id = TypeId::new("Module", "Object");
/// assert_eq!(id.to_string(), "Module.Object");
/// assert!(TypeId::new("A", "Z") < TypeId::new("B", "A"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId {
    /// Owning module.
    pub module: String,
    /// Type name, unique within the module.
    pub name: String,
}

impl TypeId {
    /// Creates an identity from a module and a type name.
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Symbolic reference to a type as written in a declaration.
///
/// Written as `"Module.Name"` for a cross-module reference or `"Name"` for a
/// type in the declaring module. The module part may itself contain dots;
/// the name is everything after the last dot.
///
/// # Examples
///
/// ```
/// use modelgen_core::{TypeId, TypeRef};
///
/// let local: TypeRef = "Object".parse().unwrap();
/// assert_eq!(local.qualify("Module"), TypeId::new("Module", "Object"));
///
/// let remote: TypeRef = "Module2.Object2".parse().unwrap();
/// assert_eq!(remote.qualify("Module"), TypeId::new("Module2", "Object2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    /// Target module, or `None` for the declaring module.
    pub module: Option<String>,
    /// Target type name.
    pub name: String,
}

impl TypeRef {
    /// Reference to `name` inside `module`.
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            name: name.into(),
        }
    }

    /// Reference to `name` in the declaring module.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            module: None,
            name: name.into(),
        }
    }

    /// Resolves the reference to a full identity relative to `current_module`.
    pub fn qualify(&self, current_module: &str) -> TypeId {
        TypeId::new(
            self.module.as_deref().unwrap_or(current_module),
            self.name.clone(),
        )
    }
}

impl From<TypeId> for TypeRef {
    fn from(id: TypeId) -> Self {
        Self {
            module: Some(id.module),
            name: id.name,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{module}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("type reference cannot be empty".to_string());
        }
        match s.rsplit_once('.') {
            Some((module, name)) if !module.is_empty() && !name.is_empty() => {
                Ok(Self::new(module, name))
            }
            Some(_) => Err(format!("malformed type reference: {s}")),
            None => Ok(Self::local(s)),
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

/// Kind of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Record with named fields.
    Object,
    /// Closed set of member names.
    Enum,
    /// Discriminated union (oneOf / interface) over variant types.
    Union,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Enum => write!(f, "enum"),
            Self::Union => write!(f, "union"),
        }
    }
}

/// Primitive value types.
///
/// # Examples
///
/// ```
/// use modelgen_core::ScalarType;
///
/// assert_eq!(ScalarType::default(), ScalarType::String);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Text (the default, and the implicit key type of maps).
    #[default]
    String,
    /// Whole number.
    Integer,
    /// Floating point number.
    Number,
    /// Boolean.
    Boolean,
    /// UUID formatted string.
    Uuid,
    /// Calendar date.
    Date,
    /// Timestamp.
    DateTime,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Uuid => "uuid",
            Self::Date => "date",
            Self::DateTime => "date_time",
        };
        f.write_str(name)
    }
}

/// Declared type of a field, list item, map value or additionalProperties.
///
/// Inline [`Object`](TypeDescriptor::Object) and [`Enum`](TypeDescriptor::Enum)
/// descriptors are hoisted into named definitions during registration.
///
/// # Examples
///
/// ```
/// use modelgen_core::{ScalarType, TypeDescriptor, TypeRef};
///
/// let tags = TypeDescriptor::list(TypeDescriptor::string());
/// assert!(matches!(tags, TypeDescriptor::List(_)));
///
/// let counts = TypeDescriptor::map(TypeDescriptor::scalar(ScalarType::Integer));
/// assert!(matches!(counts, TypeDescriptor::Map { key: ScalarType::String, .. }));
///
/// let link = TypeDescriptor::reference(TypeRef::new("Module", "Object"));
/// assert!(matches!(link, TypeDescriptor::Ref(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// Primitive value.
    Scalar(ScalarType),
    /// Link to a named type.
    Ref(TypeRef),
    /// Ordered collection.
    List(Box<TypeDescriptor>),
    /// Map with scalar keys.
    Map {
        /// Key type; string unless stated otherwise.
        #[serde(default)]
        key: ScalarType,
        /// Value type.
        value: Box<TypeDescriptor>,
    },
    /// Anonymous nested object.
    Object(InlineObject),
    /// Anonymous nested enum.
    Enum(Vec<EnumMember>),
    /// Untyped value.
    Any,
}

impl TypeDescriptor {
    /// Scalar of the given type.
    pub fn scalar(scalar: ScalarType) -> Self {
        Self::Scalar(scalar)
    }

    /// String scalar.
    pub fn string() -> Self {
        Self::Scalar(ScalarType::String)
    }

    /// Integer scalar.
    pub fn integer() -> Self {
        Self::Scalar(ScalarType::Integer)
    }

    /// Reference to a named type.
    pub fn reference(target: TypeRef) -> Self {
        Self::Ref(target)
    }

    /// List of `item`.
    pub fn list(item: TypeDescriptor) -> Self {
        Self::List(Box::new(item))
    }

    /// String-keyed map of `value`.
    pub fn map(value: TypeDescriptor) -> Self {
        Self::Map {
            key: ScalarType::String,
            value: Box::new(value),
        }
    }

    /// Inline object.
    pub fn object(object: InlineObject) -> Self {
        Self::Object(object)
    }

    /// Inline enum with the given member names.
    pub fn inline_enum<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(members.into_iter().map(EnumMember::new).collect())
    }
}

/// Anonymous object nested inside another declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineObject {
    /// Optional description carried to the hoisted definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    /// Value type of extra, undeclared properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<TypeDescriptor>>,
}

impl InlineObject {
    /// Adds a field.
    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}

/// A declared field.
///
/// # Examples
///
/// ```
/// use modelgen_core::{FieldDecl, TypeDescriptor};
///
/// let id = FieldDecl::new("id", TypeDescriptor::string());
/// assert!(!id.optional);
///
/// let kind = FieldDecl::constant("kind", "INSIDE1");
/// assert_eq!(kind.constant.as_deref(), Some("INSIDE1"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Property name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    /// Whether the property may be absent.
    #[serde(default)]
    pub optional: bool,
    /// Literal value for static/final constant fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
    /// Types whose identifiers this (scalar) field stores.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<TypeRef>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDecl {
    /// Creates a required field.
    pub fn new(name: &str, ty: TypeDescriptor) -> Self {
        Self {
            name: name.to_string(),
            ty,
            optional: false,
            constant: None,
            references: Vec::new(),
            description: None,
        }
    }

    /// Creates a string constant field, typically a discriminator.
    pub fn constant(name: &str, value: &str) -> Self {
        Self {
            constant: Some(value.to_string()),
            ..Self::new(name, TypeDescriptor::string())
        }
    }

    /// Marks the field optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Records that the field holds an identifier of `target`.
    pub fn referencing(mut self, target: TypeRef) -> Self {
        self.references.push(target);
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }
}

/// Enum member as declared.
///
/// Only [`name`](EnumMember::name) is semantically significant; description,
/// attached value and behaviour are accepted so real-world input parses, and
/// are discarded during normalization. Deserializes from either a bare string
/// or a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EnumMemberRepr")]
pub struct EnumMember {
    /// Constant name.
    pub name: String,
    /// Per-member documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Per-member data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Behaviour attached to the member.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

impl EnumMember {
    /// Member with a name only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            value: None,
            methods: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnumMemberRepr {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        value: Option<serde_json::Value>,
        #[serde(default)]
        methods: Vec<String>,
    },
}

impl From<EnumMemberRepr> for EnumMember {
    fn from(repr: EnumMemberRepr) -> Self {
        match repr {
            EnumMemberRepr::Name(name) => Self::new(name),
            EnumMemberRepr::Detailed {
                name,
                description,
                value,
                methods,
            } => Self {
                name,
                description,
                value,
                methods,
            },
        }
    }
}

/// A union variant: a reference to a named type or an inline object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantDecl {
    /// Named variant type.
    Ref(TypeRef),
    /// Anonymous variant, hoisted as `{Union}OneOf{n}`.
    Inline(InlineVariant),
}

/// Anonymous union variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineVariant {
    /// Discriminator literal for this variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    /// Value type of extra, undeclared properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<TypeDescriptor>,
}

/// One type declaration as handed over by the schema loader.
///
/// Use [`object`](TypeDeclaration::object),
/// [`enumeration`](TypeDeclaration::enumeration) or
/// [`union`](TypeDeclaration::union) and chain the builder methods.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let variant = TypeDeclaration::object("Module", "InterfaceOneOf1")
///     .implementing(TypeRef::local("Interface"))
///     .with_field(FieldDecl::constant("kind", "INSIDE1"))
///     .with_field(FieldDecl::new("name", TypeDescriptor::string()));
///
/// assert_eq!(variant.kind, TypeKind::Object);
/// assert_eq!(variant.id(), TypeId::new("Module", "InterfaceOneOf1"));
/// assert_eq!(variant.implements.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    /// Owning module. May be left empty in module files; the loader fills it.
    #[serde(default)]
    pub module: String,
    /// Type name.
    pub name: String,
    /// Declared kind.
    pub kind: TypeKind,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Object or union fields, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDecl>,
    /// Enum members, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<EnumMember>,
    /// Union variants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantDecl>,
    /// Parent unions/interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<TypeRef>,
    /// Parents declared through `extends`; merged with `implements`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<TypeRef>,
    /// Discriminator literal when this type is a union variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    /// Property carrying the discriminator (unions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator_property: Option<String>,
    /// Value type of extra, undeclared properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<TypeDescriptor>,
    /// Marks an intentional redefinition of an existing type.
    #[serde(default, rename = "override")]
    pub is_override: bool,
    /// Informational version label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Behavioural members; accepted and dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

impl TypeDeclaration {
    fn with_kind(module: &str, name: &str, kind: TypeKind) -> Self {
        Self {
            module: module.to_string(),
            name: name.to_string(),
            kind,
            description: None,
            fields: Vec::new(),
            members: Vec::new(),
            variants: Vec::new(),
            implements: Vec::new(),
            extends: Vec::new(),
            discriminator: None,
            discriminator_property: None,
            additional_properties: None,
            is_override: false,
            version: None,
            methods: Vec::new(),
        }
    }

    /// Starts an object declaration.
    pub fn object(module: &str, name: &str) -> Self {
        Self::with_kind(module, name, TypeKind::Object)
    }

    /// Starts an enum declaration.
    pub fn enumeration(module: &str, name: &str) -> Self {
        Self::with_kind(module, name, TypeKind::Enum)
    }

    /// Starts a union declaration.
    pub fn union(module: &str, name: &str) -> Self {
        Self::with_kind(module, name, TypeKind::Union)
    }

    /// Identity of the declared type.
    pub fn id(&self) -> TypeId {
        TypeId::new(self.module.clone(), self.name.clone())
    }

    /// Adds a field.
    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an enum member by name.
    pub fn with_member(mut self, name: &str) -> Self {
        self.members.push(EnumMember::new(name));
        self
    }

    /// Adds a fully described enum member.
    pub fn with_enum_member(mut self, member: EnumMember) -> Self {
        self.members.push(member);
        self
    }

    /// Adds a union variant.
    pub fn with_variant(mut self, variant: VariantDecl) -> Self {
        self.variants.push(variant);
        self
    }

    /// Declares a parent union/interface.
    pub fn implementing(mut self, parent: TypeRef) -> Self {
        self.implements.push(parent);
        self
    }

    /// Declares a parent through `extends`.
    pub fn extending(mut self, parent: TypeRef) -> Self {
        self.extends.push(parent);
        self
    }

    /// Sets the discriminator literal.
    pub fn with_discriminator(mut self, value: &str) -> Self {
        self.discriminator = Some(value.to_string());
        self
    }

    /// Sets the discriminator property of a union.
    pub fn with_discriminator_property(mut self, property: &str) -> Self {
        self.discriminator_property = Some(property.to_string());
        self
    }

    /// Sets the additionalProperties value type.
    pub fn with_additional_properties(mut self, value: TypeDescriptor) -> Self {
        self.additional_properties = Some(value);
        self
    }

    /// Marks the declaration as an intentional override.
    pub fn as_override(mut self) -> Self {
        self.is_override = true;
        self
    }

    /// Sets the informational version label.
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Attaches a behavioural member (dropped during resolution).
    pub fn with_method(mut self, method: &str) -> Self {
        self.methods.push(method.to_string());
        self
    }

    /// All declared parents, `implements` first then `extends`.
    pub fn declared_parents(&self) -> impl Iterator<Item = &TypeRef> {
        self.implements.iter().chain(self.extends.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_parsing() {
        let r: TypeRef = "Module.Object".parse().unwrap();
        assert_eq!(r, TypeRef::new("Module", "Object"));

        let nested: TypeRef = "com.example.Object".parse().unwrap();
        assert_eq!(nested.module.as_deref(), Some("com.example"));
        assert_eq!(nested.name, "Object");

        assert!("".parse::<TypeRef>().is_err());
        assert!("Module.".parse::<TypeRef>().is_err());
        assert!(".Object".parse::<TypeRef>().is_err());
    }

    #[test]
    fn test_type_ref_serializes_as_string() {
        let r = TypeRef::new("Module", "Object");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"Module.Object\"");
        let back: TypeRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_enum_member_accepts_string_or_map() {
        let members: Vec<EnumMember> = serde_json::from_str(
            r#"["ACTIVE", {"name": "CLOSED", "value": 3, "methods": ["label"]}]"#,
        )
        .unwrap();
        assert_eq!(members[0].name, "ACTIVE");
        assert_eq!(members[1].name, "CLOSED");
        assert_eq!(members[1].methods, vec!["label".to_string()]);
    }

    #[test]
    fn test_declaration_from_json() {
        let decl: TypeDeclaration = serde_json::from_str(
            r#"{
                "module": "Module",
                "name": "Object",
                "kind": "object",
                "fields": [
                    {"name": "id", "type": {"scalar": "uuid"}},
                    {"name": "tags", "type": {"list": {"scalar": "string"}}, "optional": true},
                    {"name": "other", "type": {"ref": "Module2.Object2"}},
                    {"name": "extra", "type": "any"}
                ],
                "additional_properties": {"map": {"value": {"scalar": "integer"}}},
                "override": true
            }"#,
        )
        .unwrap();

        assert_eq!(decl.kind, TypeKind::Object);
        assert!(decl.is_override);
        assert_eq!(decl.fields.len(), 4);
        assert_eq!(decl.fields[0].ty, TypeDescriptor::scalar(ScalarType::Uuid));
        assert!(decl.fields[1].optional);
        assert_eq!(
            decl.fields[2].ty,
            TypeDescriptor::reference(TypeRef::new("Module2", "Object2"))
        );
        assert_eq!(decl.fields[3].ty, TypeDescriptor::Any);
        assert!(matches!(
            decl.additional_properties,
            Some(TypeDescriptor::Map { key: ScalarType::String, .. })
        ));
    }

    #[test]
    fn test_variant_decl_untagged() {
        let variants: Vec<VariantDecl> = serde_json::from_str(
            r#"["Module.Variant", {"discriminator": "INLINE", "fields": []}]"#,
        )
        .unwrap();
        assert_eq!(
            variants[0],
            VariantDecl::Ref(TypeRef::new("Module", "Variant"))
        );
        assert!(matches!(&variants[1], VariantDecl::Inline(v) if v.discriminator.as_deref() == Some("INLINE")));
    }
}
