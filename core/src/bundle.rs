use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::TypeDeclaration;

/// A module as declared by the schema loader.
///
/// `dependencies` lists the modules this module is allowed to reference.
/// `None` means the module did not declare its dependencies, so no check
/// is made; `Some` of an empty set means it references nothing outside
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDecl {
    /// Module name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared module dependencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeSet<String>>,
}

impl ModuleDecl {
    /// Module with no declared dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            dependencies: None,
        }
    }

    /// Declares a dependency on `module`.
    pub fn depending_on(mut self, module: &str) -> Self {
        self.dependencies
            .get_or_insert_with(BTreeSet::new)
            .insert(module.to_string());
        self
    }
}

/// Serializable bundle of modules and type declarations.
///
/// A bundle is the complete input of one resolution run. Declarations are
/// kept in input order; that order decides which of two same-named
/// declarations is "earlier" when an override is applied.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let mut bundle = SchemaBundle::new("1.0.0");
/// bundle.name = Some("shop".into());
/// bundle.modules.push(ModuleDecl::new("Orders"));
/// bundle.declarations.push(TypeDeclaration::object("Orders", "Order"));
/// bundle.declarations.push(TypeDeclaration::enumeration("Orders", "Status").with_member("OPEN"));
///
/// assert_eq!(bundle.declaration_count(), 2);
/// assert_eq!(bundle.module_names(), vec!["Orders".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Declaration contract version (populated from
    /// [`SCHEMA_CONTRACT_VERSION`](crate::SCHEMA_CONTRACT_VERSION)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Bundle format version (semver string).
    pub version: String,
    /// Optional bundle name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional bundle description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explicitly declared modules.
    #[serde(default)]
    pub modules: Vec<ModuleDecl>,
    /// Type declarations, in input order.
    #[serde(default)]
    pub declarations: Vec<TypeDeclaration>,
}

impl SchemaBundle {
    /// Creates an empty bundle.
    ///
    /// The `schema_version` is automatically set from
    /// [`SCHEMA_CONTRACT_VERSION`](crate::SCHEMA_CONTRACT_VERSION).
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            schema_version: Some(crate::SCHEMA_CONTRACT_VERSION.to_string()),
            version: version.into(),
            name: None,
            description: None,
            modules: Vec::new(),
            declarations: Vec::new(),
        }
    }

    /// Adds a declaration.
    pub fn with_declaration(mut self, decl: TypeDeclaration) -> Self {
        self.declarations.push(decl);
        self
    }

    /// Adds a module declaration.
    pub fn with_module(mut self, module: ModuleDecl) -> Self {
        self.modules.push(module);
        self
    }

    /// Returns the number of type declarations.
    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }

    /// Sorted, de-duplicated names of every module mentioned by the bundle.
    pub fn module_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .modules
            .iter()
            .map(|m| m.name.as_str())
            .chain(self.declarations.iter().map(|d| d.module.as_str()))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Appends all modules and declarations of `other`, keeping order.
    pub fn extend(&mut self, other: SchemaBundle) {
        self.modules.extend(other.modules);
        self.declarations.extend(other.declarations);
    }
}
