//! Schema resolution and polymorphism engine.
//!
//! This crate turns loosely specified, cross-referencing type declarations
//! into a fully resolved, language-neutral model that code generators can
//! consume without further lookups:
//!
//! - [`TypeDeclaration`] / [`SchemaBundle`]: the input contract produced by a
//!   schema loader.
//! - [`SchemaRegistry`]: validates, normalizes (inline types are hoisted into
//!   named definitions) and stores definitions, enforcing override rules.
//! - [`TypeGraph`]: typed dependency edges between types, unresolved
//!   references and inheritance cycles.
//! - [`PolymorphismResolver`]: union membership and discriminator tables.
//! - [`FieldSetComposer`]: final field lists with inherited fields and
//!   additionalProperties widening.
//! - [`CrossModuleLinker`]: module dependencies, mutual module groups and
//!   link order.
//! - [`ResolvedSchema`]: the resolved models, walked by an [`Emitter`].
//!
//! [`resolve_bundle`] runs every stage and returns the partial schema together
//! with an [`ErrorReport`] of everything that failed.
//!
//! # Example
//!
//! ```
//! use modelgen_core::*;
//!
//! let bundle = SchemaBundle::new("1.0.0")
//!     .with_declaration(
//!         TypeDeclaration::object("Orders", "Order")
//!             .with_field(FieldDecl::new("id", TypeDescriptor::scalar(ScalarType::Uuid)))
//!             .with_field(FieldDecl::new(
//!                 "customer",
//!                 TypeDescriptor::reference(TypeRef::new("Customers", "Customer")),
//!             )),
//!     )
//!     .with_declaration(
//!         TypeDeclaration::object("Customers", "Customer")
//!             .with_field(FieldDecl::new("name", TypeDescriptor::string())),
//!     );
//!
//! let resolution = resolve_bundle(&bundle, &ResolveOptions::default());
//! assert!(resolution.is_clean());
//!
//! let order: Vec<&str> = resolution.schema.plan.order().collect();
//! assert_eq!(order, vec!["Customers", "Orders"]);
//!
//! let customer = resolution.schema.lookup("Orders", "Order").unwrap().field("customer").unwrap();
//! assert_eq!(customer.ty, SemanticType::Reference(TypeId::new("Customers", "Customer")));
//! ```

mod bundle;
mod definition;
mod error;
mod fields;
mod graph;
mod linker;
mod model;
mod normalize;
mod polymorphism;
mod registry;
mod resolve;
mod types;
mod validate;

pub use bundle::{ModuleDecl, SchemaBundle};
pub use definition::{
    DefinitionBody, EnumDefinition, Field, FieldType, ObjectDefinition, TypeDefinition,
    UnionDefinition,
};
pub use error::{ErrorKind, ErrorReport, ResolveError};
pub use fields::{
    ComposedAdditionalProperties, ComposedField, ComposedFields, FieldRole, FieldSetComposer,
    WideningPolicy,
};
pub use graph::{EdgeKind, TypeGraph, UnresolvedRef};
pub use linker::{CrossModuleLinker, LinkOutcome, LinkPlan, ModuleGroup};
pub use model::{
    ADDITIONAL_PROPERTIES_FIELD, AdditionalPropertiesModel, Emitter, EnumModel, ModelBody,
    ModelBuilder, ObjectModel, ResolvedField, ResolvedModel, ResolvedSchema, SemanticType,
    UnionModel, VariantModel,
};
pub use normalize::normalize_declaration;
pub use polymorphism::{Polymorphism, PolymorphismResolver, UnionTable, VariantEntry};
pub use registry::{FrozenRegistry, ModuleInfo, RegistryEntry, SchemaRegistry, TypeIndex};
pub use resolve::{Resolution, ResolveOptions, register_bundle, resolve_bundle, resolve_registry};
pub use types::*;
pub use validate::{validate_bundle, validate_declaration};
