//! Cross-module linking.
//!
//! Module dependencies are derived from the type graph: module `A` depends on
//! `B` when a type of `A` references a type of `B`. A union does not depend on
//! the modules of variants that only name it through `implements`. Mutually dependent
//! modules are allowed and grouped together; the groups are then ordered so
//! that dependencies come before their dependents.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{ResolveError, TypeGraph, TypeId};

/// Modules linked together as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGroup {
    /// Member modules, sorted.
    pub modules: Vec<String>,
    /// `true` when the members depend on each other.
    pub mutual: bool,
}

/// Link order of all modules.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let mut registry = SchemaRegistry::new();
/// registry.register_declaration(
///     &TypeDeclaration::object("Orders", "Order")
///         .with_field(FieldDecl::new("customer", TypeDescriptor::reference(TypeRef::new("Customers", "Customer")))),
/// );
/// registry.register_declaration(&TypeDeclaration::object("Customers", "Customer"));
/// let registry = registry.freeze();
/// let graph = TypeGraph::build(&registry);
///
/// let outcome = CrossModuleLinker::new(&graph).link();
/// let order: Vec<&str> = outcome.plan.order().collect();
/// assert_eq!(order, vec!["Customers", "Orders"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPlan {
    /// Groups in link order, dependencies first.
    pub groups: Vec<ModuleGroup>,
    /// Observed dependencies of each module, from type references.
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl LinkPlan {
    /// Modules in link order.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|group| group.modules.iter().map(String::as_str))
    }

    /// Position of `module` in the link order.
    pub fn position(&self, module: &str) -> Option<usize> {
        self.order().position(|m| m == module)
    }

    /// The group containing `module`.
    pub fn group_of(&self, module: &str) -> Option<&ModuleGroup> {
        self.groups
            .iter()
            .find(|group| group.modules.iter().any(|m| m == module))
    }
}

/// Output of [`CrossModuleLinker::link`].
#[derive(Debug, Clone, Default)]
pub struct LinkOutcome {
    pub plan: LinkPlan,
    pub errors: Vec<ResolveError>,
    pub warnings: Vec<String>,
}

/// Links modules over a type graph.
pub struct CrossModuleLinker<'g, 'r> {
    graph: &'g TypeGraph<'r>,
    strict_dependencies: bool,
}

impl<'g, 'r> CrossModuleLinker<'g, 'r> {
    pub fn new(graph: &'g TypeGraph<'r>) -> Self {
        Self {
            graph,
            strict_dependencies: false,
        }
    }

    /// Treats references to undeclared module dependencies as errors
    /// instead of warnings.
    pub fn strict_dependencies(mut self, strict: bool) -> Self {
        self.strict_dependencies = strict;
        self
    }

    pub fn link(&self) -> LinkOutcome {
        let registry = self.graph.registry();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for unresolved in self.graph.unresolved() {
            if unresolved.from.module != unresolved.target.module {
                errors.push(unresolved.to_error(registry));
            }
        }

        let mut dependencies: BTreeMap<String, BTreeSet<String>> = registry
            .modules()
            .map(|module| (module.name.clone(), BTreeSet::new()))
            .collect();
        // First referencing type per (module, dependency), for attribution.
        let mut witnesses: BTreeMap<(String, String), TypeId> = BTreeMap::new();
        for (from, to, _) in self.graph.declared_edges() {
            let from = &registry.definition(from).id;
            let to = &registry.definition(to).id;
            if from.module == to.module {
                continue;
            }
            dependencies
                .entry(from.module.clone())
                .or_default()
                .insert(to.module.clone());
            let key = (from.module.clone(), to.module.clone());
            match witnesses.get(&key) {
                Some(existing) if existing <= from => {}
                _ => {
                    witnesses.insert(key, from.clone());
                }
            }
        }

        for module in registry.modules() {
            let Some(declared) = &module.dependencies else {
                continue;
            };
            for dep in declared {
                if registry.module(dep).is_none() {
                    warnings.push(format!(
                        "module {} declares unknown dependency {dep}",
                        module.name
                    ));
                }
            }
            let observed = dependencies.get(&module.name).cloned().unwrap_or_default();
            for dep in observed.difference(declared) {
                let Some(id) = witnesses.get(&(module.name.clone(), dep.clone())) else {
                    continue;
                };
                if self.strict_dependencies {
                    errors.push(ResolveError::UndeclaredModuleDependency {
                        id: id.clone(),
                        module: dep.clone(),
                    });
                } else {
                    warn!(module = %module.name, dependency = %dep, "undeclared module dependency");
                    warnings.push(format!(
                        "{id} references module {dep}, which {} does not declare as a dependency",
                        module.name
                    ));
                }
            }
        }

        let groups = order_groups(&dependencies);
        debug!(
            modules = dependencies.len(),
            groups = groups.len(),
            "linked modules"
        );

        LinkOutcome {
            plan: LinkPlan {
                groups,
                dependencies,
            },
            errors,
            warnings,
        }
    }
}

/// Groups strongly connected modules and orders the groups dependencies
/// first, breaking ties by the first module name.
fn order_groups(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Vec<ModuleGroup> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let nodes: BTreeMap<&str, NodeIndex> = dependencies
        .keys()
        .map(|name| (name.as_str(), graph.add_node(name.as_str())))
        .collect();
    for (module, deps) in dependencies {
        for dep in deps {
            if let (Some(from), Some(to)) = (nodes.get(module.as_str()), nodes.get(dep.as_str())) {
                graph.add_edge(*from, *to, ());
            }
        }
    }

    let components: Vec<ModuleGroup> = tarjan_scc(&graph)
        .into_iter()
        .map(|component| {
            let mut modules: Vec<String> =
                component.iter().map(|node| graph[*node].to_string()).collect();
            modules.sort();
            ModuleGroup {
                mutual: modules.len() > 1,
                modules,
            }
        })
        .collect();

    let group_of: BTreeMap<&str, usize> = components
        .iter()
        .enumerate()
        .flat_map(|(i, group)| group.modules.iter().map(move |m| (m.as_str(), i)))
        .collect();

    // Kahn's algorithm over the condensed graph; the ready set is keyed by the
    // group's first module so ties resolve alphabetically.
    let mut waiting_on: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    for (module, deps) in dependencies {
        let from = group_of[module.as_str()];
        for dep in deps {
            let Some(&to) = group_of.get(dep.as_str()) else {
                continue;
            };
            if from != to {
                waiting_on[from].insert(to);
                dependents[to].insert(from);
            }
        }
    }

    let mut ready: BTreeSet<(&str, usize)> = components
        .iter()
        .enumerate()
        .filter(|(i, _)| waiting_on[*i].is_empty())
        .map(|(i, group)| (group.modules[0].as_str(), i))
        .collect();
    let mut order = Vec::with_capacity(components.len());
    while let Some(next) = ready.pop_first() {
        let (_, i) = next;
        order.push(i);
        for &dependent in &dependents[i] {
            waiting_on[dependent].remove(&i);
            if waiting_on[dependent].is_empty() {
                ready.insert((components[dependent].modules[0].as_str(), dependent));
            }
        }
    }

    order.into_iter().map(|i| components[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        FieldDecl, ModuleDecl, SchemaRegistry, TypeDeclaration, TypeDescriptor, TypeRef,
    };

    fn reference(module: &str, name: &str, field: &str, target: TypeRef) -> TypeDeclaration {
        TypeDeclaration::object(module, name)
            .with_field(FieldDecl::new(field, TypeDescriptor::reference(target)))
    }

    #[test]
    fn test_mutual_modules_grouped() {
        let mut registry = SchemaRegistry::new();
        registry.register_declaration(&reference("A", "X", "y", TypeRef::new("B", "Y")));
        registry.register_declaration(&reference("B", "Y", "x", TypeRef::new("A", "X")));
        registry.register_declaration(&reference("C", "Z", "x", TypeRef::new("A", "X")));
        registry.register_declaration(&TypeDeclaration::object("D", "W"));
        let registry = registry.freeze();
        let graph = TypeGraph::build(&registry);

        let outcome = CrossModuleLinker::new(&graph).link();
        assert!(outcome.errors.is_empty());
        assert_eq!(
            outcome.plan.groups,
            vec![
                ModuleGroup {
                    modules: vec!["A".into(), "B".into()],
                    mutual: true
                },
                ModuleGroup {
                    modules: vec!["C".into()],
                    mutual: false
                },
                ModuleGroup {
                    modules: vec!["D".into()],
                    mutual: false
                },
            ]
        );
        assert!(outcome.plan.position("A") < outcome.plan.position("C"));
    }

    #[test]
    fn test_unregistered_module_is_unresolved() {
        let mut registry = SchemaRegistry::new();
        registry.register_declaration(&reference("A", "X", "y", TypeRef::new("Ghost", "Y")));
        let registry = registry.freeze();
        let graph = TypeGraph::build(&registry);

        let outcome = CrossModuleLinker::new(&graph).link();
        assert!(matches!(
            &outcome.errors[0],
            ResolveError::UnresolvedReference { detail, .. } if detail.contains("module `Ghost` is not registered")
        ));
    }

    #[test]
    fn test_union_does_not_depend_on_implementor_modules() {
        let mut registry = SchemaRegistry::new();
        registry
            .declare_module(&ModuleDecl {
                dependencies: Some(BTreeSet::new()),
                ..ModuleDecl::new("A")
            })
            .unwrap();
        registry
            .declare_module(&ModuleDecl::new("B").depending_on("A"))
            .unwrap();
        registry.register_declaration(&TypeDeclaration::union("A", "Iface"));
        registry.register_declaration(
            &TypeDeclaration::object("B", "V1")
                .implementing(TypeRef::new("A", "Iface"))
                .with_field(FieldDecl::constant("kind", "V1")),
        );
        let registry = registry.freeze();
        let graph = TypeGraph::build(&registry);

        let outcome = CrossModuleLinker::new(&graph).strict_dependencies(true).link();
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.plan.dependencies["A"], BTreeSet::new());
        assert_eq!(outcome.plan.order().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(outcome.plan.groups.iter().all(|group| !group.mutual));
    }

    #[test]
    fn test_undeclared_dependency_warns_or_fails() {
        let mut registry = SchemaRegistry::new();
        registry
            .declare_module(&ModuleDecl::new("A").depending_on("Nowhere"))
            .unwrap();
        registry.register_declaration(&reference("A", "X", "y", TypeRef::new("B", "Y")));
        registry.register_declaration(&TypeDeclaration::object("B", "Y"));
        let registry = registry.freeze();
        let graph = TypeGraph::build(&registry);

        let lenient = CrossModuleLinker::new(&graph).link();
        assert!(lenient.errors.is_empty());
        assert_eq!(lenient.warnings.len(), 2);

        let strict = CrossModuleLinker::new(&graph).strict_dependencies(true).link();
        assert_eq!(
            strict.errors,
            vec![ResolveError::UndeclaredModuleDependency {
                id: TypeId::new("A", "X"),
                module: "B".into(),
            }]
        );
    }
}
