//! Schema registry.
//!
//! [`SchemaRegistry`] is the mutable store used while declarations are being
//! registered. Once every module is in, [`SchemaRegistry::freeze`] turns it
//! into a [`FrozenRegistry`]: an arena of definitions addressed by
//! [`TypeIndex`], sorted by [`TypeId`], which the later resolution stages
//! share read-only across threads.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    DEFAULT_DISCRIMINATOR_PROPERTY, ModuleDecl, ResolveError, TypeDeclaration, TypeDefinition,
    TypeId, normalize_declaration, validate_declaration,
};

/// A module known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: Option<String>,
    /// Declared dependencies; `None` when the module never declared any.
    pub dependencies: Option<BTreeSet<String>>,
    /// `false` for modules that only appeared through a type declaration.
    pub declared: bool,
}

impl ModuleInfo {
    fn implicit(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            dependencies: None,
            declared: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    current: TypeDefinition,
    history: Vec<TypeDefinition>,
}

/// Mutable store of registered definitions, keyed by module and name.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let mut registry = SchemaRegistry::new();
/// let decl = TypeDeclaration::object("Module", "Object");
/// assert!(registry.register_declaration(&decl).is_empty());
///
/// // A second declaration of the same name needs the override flag.
/// let errors = registry.register_declaration(&decl);
/// assert!(matches!(errors[0], ResolveError::DuplicateTypeDefinition { .. }));
///
/// assert!(registry.register_declaration(&decl.clone().as_override()).is_empty());
/// assert_eq!(registry.lookup("Module", "Object").unwrap().revision, 1);
/// ```
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    modules: BTreeMap<String, ModuleInfo>,
    slots: BTreeMap<TypeId, Slot>,
    default_discriminator_property: String,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Creates an empty registry using `"kind"` as default discriminator property.
    pub fn new() -> Self {
        Self::with_discriminator_property(DEFAULT_DISCRIMINATOR_PROPERTY)
    }

    /// Creates an empty registry with a custom default discriminator property.
    pub fn with_discriminator_property(property: &str) -> Self {
        Self {
            modules: BTreeMap::new(),
            slots: BTreeMap::new(),
            default_discriminator_property: property.to_string(),
        }
    }

    /// Records a module declaration.
    ///
    /// A module that was only seen implicitly is upgraded; declaring the same
    /// module twice is an error.
    pub fn declare_module(&mut self, decl: &ModuleDecl) -> Result<(), ResolveError> {
        let entry = self
            .modules
            .entry(decl.name.clone())
            .or_insert_with(|| ModuleInfo::implicit(&decl.name));
        if entry.declared {
            return Err(ResolveError::InvalidModule {
                module: decl.name.clone(),
                detail: "module declared more than once".to_string(),
            });
        }
        entry.description = decl.description.clone();
        entry.dependencies = decl.dependencies.clone();
        entry.declared = true;
        Ok(())
    }

    /// Registers one normalized definition under `module`.
    ///
    /// The first registration of a name gets revision 0. A later one is
    /// accepted only when it carries the override flag: it becomes the
    /// current definition with the next revision, the replaced one is kept in
    /// the history, and definitions hoisted from the replaced one are evicted.
    /// Without the flag the registry is left unchanged.
    pub fn register(&mut self, module: &str, mut def: TypeDefinition) -> Result<(), ResolveError> {
        def.id.module = module.to_string();
        self.modules
            .entry(module.to_string())
            .or_insert_with(|| ModuleInfo::implicit(module));

        let Some(slot) = self.slots.get_mut(&def.id) else {
            def.revision = 0;
            debug!(type_id = %def.id, "registered type");
            self.slots.insert(
                def.id.clone(),
                Slot {
                    current: def,
                    history: Vec::new(),
                },
            );
            return Ok(());
        };

        if !def.is_override {
            return Err(ResolveError::DuplicateTypeDefinition { id: def.id });
        }

        def.revision = slot.current.revision + 1;
        info!(type_id = %def.id, revision = def.revision, "override replaces earlier definition");
        let id = def.id.clone();
        let previous = std::mem::replace(&mut slot.current, def);
        let replaced_root = previous.owner.is_none();
        slot.history.push(previous);

        if replaced_root {
            self.evict_hoisted(&id);
        }
        Ok(())
    }

    fn evict_hoisted(&mut self, owner: &TypeId) {
        let stale: Vec<TypeId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.current.owner.as_ref() == Some(owner))
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            debug!(type_id = %id, owner = %owner, "evicting definition hoisted from replaced type");
            self.slots.remove(&id);
        }
    }

    /// Validates, normalizes and registers a declaration.
    ///
    /// Returns every error found; an empty vector means the declaration and
    /// all its hoisted definitions were registered. When the declared type
    /// itself is rejected, none of its hoisted definitions are registered.
    pub fn register_declaration(&mut self, decl: &TypeDeclaration) -> Vec<ResolveError> {
        let errors = validate_declaration(decl);
        if !errors.is_empty() {
            return errors;
        }

        let mut defs =
            normalize_declaration(decl, &self.default_discriminator_property).into_iter();
        let Some(root) = defs.next() else {
            return Vec::new();
        };
        if let Err(err) = self.register(&decl.module, root) {
            debug!(type_id = %decl.id(), hoisted = defs.len(), "declaration rejected");
            return vec![err];
        }
        defs.filter_map(|def| self.register(&decl.module, def).err())
            .collect()
    }

    /// Returns the current definition of `module.name`.
    pub fn lookup(&self, module: &str, name: &str) -> Result<&TypeDefinition, ResolveError> {
        let id = TypeId::new(module, name);
        match self.slots.get(&id) {
            Some(slot) => Ok(&slot.current),
            None => Err(ResolveError::SchemaNotFound { id }),
        }
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: &TypeId) -> bool {
        self.slots.contains_key(id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Moves every module and type of `other` into this registry.
    ///
    /// Used to merge registries filled in parallel, one per module. A type
    /// present in both is reported as a duplicate and the existing entry
    /// wins.
    pub fn absorb(&mut self, other: SchemaRegistry) -> Vec<ResolveError> {
        let mut errors = Vec::new();
        for (name, module) in other.modules {
            match self.modules.get_mut(&name) {
                Some(existing) if module.declared => {
                    if existing.declared {
                        errors.push(ResolveError::InvalidModule {
                            module: name,
                            detail: "module declared more than once".to_string(),
                        });
                    } else {
                        *existing = module;
                    }
                }
                Some(_) => {}
                None => {
                    self.modules.insert(name, module);
                }
            }
        }
        for (id, slot) in other.slots {
            if self.slots.contains_key(&id) {
                errors.push(ResolveError::DuplicateTypeDefinition { id });
            } else {
                self.slots.insert(id, slot);
            }
        }
        errors
    }

    /// Freezes the registry into an immutable, index-addressed arena.
    pub fn freeze(self) -> FrozenRegistry {
        let mut index = BTreeMap::new();
        let mut entries = Vec::with_capacity(self.slots.len());
        for (position, (id, slot)) in self.slots.into_iter().enumerate() {
            index.insert(id, TypeIndex(position));
            entries.push(RegistryEntry {
                definition: slot.current,
                history: slot.history,
            });
        }
        FrozenRegistry {
            modules: self.modules,
            entries,
            index,
        }
    }
}

/// Position of a definition in a [`FrozenRegistry`].
///
/// Indices follow [`TypeId`] order, so iterating indices in ascending order
/// visits types sorted by module and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeIndex(usize);

impl TypeIndex {
    /// Raw arena position.
    pub fn get(self) -> usize {
        self.0
    }
}

/// A frozen definition together with the revisions it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub definition: TypeDefinition,
    /// Replaced revisions, oldest first.
    pub history: Vec<TypeDefinition>,
}

/// Immutable registry shared by the resolution stages.
#[derive(Debug, Clone)]
pub struct FrozenRegistry {
    modules: BTreeMap<String, ModuleInfo>,
    entries: Vec<RegistryEntry>,
    index: BTreeMap<TypeId, TypeIndex>,
}

impl FrozenRegistry {
    /// Returns the current definition of `module.name`.
    pub fn lookup(&self, module: &str, name: &str) -> Result<&TypeDefinition, ResolveError> {
        let id = TypeId::new(module, name);
        self.get(&id).ok_or(ResolveError::SchemaNotFound { id })
    }

    /// Returns the current definition of `id`, if registered.
    pub fn get(&self, id: &TypeId) -> Option<&TypeDefinition> {
        self.index_of(id).map(|idx| self.definition(idx))
    }

    /// Arena index of `id`.
    pub fn index_of(&self, id: &TypeId) -> Option<TypeIndex> {
        self.index.get(id).copied()
    }

    /// Definition at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` was not produced by this registry.
    pub fn definition(&self, idx: TypeIndex) -> &TypeDefinition {
        &self.entries[idx.0].definition
    }

    /// Entry (definition plus history) at `idx`.
    pub fn entry(&self, idx: TypeIndex) -> &RegistryEntry {
        &self.entries[idx.0]
    }

    /// Revisions replaced by overrides at `idx`, oldest first.
    pub fn history(&self, idx: TypeIndex) -> &[TypeDefinition] {
        &self.entries[idx.0].history
    }

    /// Every revision at `idx`, oldest first, ending with the current one.
    pub fn revisions(&self, idx: TypeIndex) -> impl Iterator<Item = &TypeDefinition> {
        let entry = &self.entries[idx.0];
        entry.history.iter().chain(std::iter::once(&entry.definition))
    }

    /// All definitions in [`TypeId`] order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeIndex, &TypeDefinition)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (TypeIndex(i), &entry.definition))
    }

    /// All indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = TypeIndex> + use<> {
        (0..self.entries.len()).map(TypeIndex)
    }

    /// Known modules in name order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.values()
    }

    /// Module by name.
    pub fn module(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.get(name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDecl, InlineObject, TypeDescriptor, TypeKind};

    fn with_inline(name: &str, field: &str) -> TypeDeclaration {
        TypeDeclaration::object("M", name).with_field(FieldDecl::new(
            field,
            TypeDescriptor::object(InlineObject::default()),
        ))
    }

    #[test]
    fn test_duplicate_without_override_leaves_registry_unchanged() {
        let mut registry = SchemaRegistry::new();
        let first = TypeDeclaration::object("M", "A").with_description("first");
        let second = TypeDeclaration::enumeration("M", "A").with_member("X");

        assert!(registry.register_declaration(&first).is_empty());
        let errors = registry.register_declaration(&second);
        assert_eq!(
            errors,
            vec![ResolveError::DuplicateTypeDefinition {
                id: TypeId::new("M", "A")
            }]
        );

        let current = registry.lookup("M", "A").unwrap();
        assert_eq!(current.kind(), TypeKind::Object);
        assert_eq!(current.description.as_deref(), Some("first"));
        assert_eq!(current.revision, 0);
    }

    #[test]
    fn test_rejected_declaration_registers_no_hoisted_types() {
        let mut registry = SchemaRegistry::new();
        assert!(registry.register_declaration(&TypeDeclaration::object("M", "A")).is_empty());

        let errors = registry.register_declaration(&with_inline("A", "b"));
        assert_eq!(
            errors,
            vec![ResolveError::DuplicateTypeDefinition {
                id: TypeId::new("M", "A")
            }]
        );
        assert!(!registry.contains(&TypeId::new("M", "AB")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_override_keeps_history() {
        let mut registry = SchemaRegistry::new();
        registry.register_declaration(&TypeDeclaration::object("M", "A"));
        registry.register_declaration(&TypeDeclaration::object("M", "A").as_override());
        registry.register_declaration(
            &TypeDeclaration::object("M", "A")
                .with_description("third")
                .as_override(),
        );

        let frozen = registry.freeze();
        let idx = frozen.index_of(&TypeId::new("M", "A")).unwrap();
        let revisions: Vec<u32> = frozen.revisions(idx).map(|d| d.revision).collect();
        assert_eq!(revisions, vec![0, 1, 2]);
        assert_eq!(frozen.definition(idx).description.as_deref(), Some("third"));
    }

    #[test]
    fn test_override_evicts_stale_hoisted_types() {
        let mut registry = SchemaRegistry::new();
        assert!(registry.register_declaration(&with_inline("A", "old")).is_empty());
        assert!(registry.contains(&TypeId::new("M", "AOld")));

        let replacement = with_inline("A", "new").as_override();
        assert!(registry.register_declaration(&replacement).is_empty());
        assert!(!registry.contains(&TypeId::new("M", "AOld")));
        assert!(registry.contains(&TypeId::new("M", "ANew")));
    }

    #[test]
    fn test_override_reregisters_same_hoisted_type() {
        let mut registry = SchemaRegistry::new();
        registry.register_declaration(&with_inline("A", "b"));
        let errors = registry.register_declaration(&with_inline("A", "b").as_override());
        assert!(errors.is_empty());
        assert_eq!(registry.lookup("M", "AB").unwrap().revision, 0);
    }

    #[test]
    fn test_lookup_missing() {
        let registry = SchemaRegistry::new();
        assert_eq!(
            registry.lookup("M", "Nope").unwrap_err(),
            ResolveError::SchemaNotFound {
                id: TypeId::new("M", "Nope")
            }
        );
    }

    #[test]
    fn test_declare_module_twice() {
        let mut registry = SchemaRegistry::new();
        registry.register_declaration(&TypeDeclaration::object("M", "A"));
        assert!(registry.declare_module(&ModuleDecl::new("M")).is_ok());
        assert!(registry.declare_module(&ModuleDecl::new("M")).is_err());
    }

    #[test]
    fn test_absorb_merges_disjoint_registries() {
        let mut a = SchemaRegistry::new();
        a.register_declaration(&TypeDeclaration::object("A", "X"));
        let mut b = SchemaRegistry::new();
        b.register_declaration(&TypeDeclaration::object("B", "Y"));
        b.declare_module(&ModuleDecl::new("B").depending_on("A"))
            .unwrap();

        assert!(a.absorb(b).is_empty());
        let frozen = a.freeze();
        let ids: Vec<String> = frozen.iter().map(|(_, d)| d.id.to_string()).collect();
        assert_eq!(ids, vec!["A.X", "B.Y"]);
        assert!(frozen.module("B").unwrap().declared);
        assert!(!frozen.module("A").unwrap().declared);
    }
}
