//! Type dependency graph.
//!
//! Nodes are the types of a [`FrozenRegistry`]; edges are typed references
//! between them. References whose target is not registered are kept aside as
//! [`UnresolvedRef`]s instead of being dropped, so they can be reported and
//! the referencing type excluded from the output.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DefinitionBody, FrozenRegistry, ResolveError, TypeDefinition, TypeId, TypeIndex};

/// Kind of a dependency between two types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// A field (or list item / map value) holds the target type.
    Contains,
    /// The additionalProperties values have the target type.
    AdditionalProperties,
    /// A field stores identifiers of the target type.
    References,
    /// The source is a variant of the target union.
    Implements,
    /// The target is a variant of the source union.
    Variant,
}

/// A reference whose target is not registered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnresolvedRef {
    pub from: TypeId,
    pub target: TypeId,
    pub kind: EdgeKind,
    /// Field through which the reference was made.
    pub via: Option<String>,
}

impl UnresolvedRef {
    /// Converts into an error attributed to the referencing type.
    pub fn to_error(&self, registry: &FrozenRegistry) -> ResolveError {
        let location = match &self.via {
            Some(field) => format!("field `{field}`"),
            None => format!("{:?} edge", self.kind).to_lowercase(),
        };
        let detail = if registry.module(&self.target.module).is_none() {
            format!("{location}: module `{}` is not registered", self.target.module)
        } else {
            format!("{location}: no such type in module `{}`", self.target.module)
        };
        ResolveError::UnresolvedReference {
            from: self.from.clone(),
            target: self.target.clone(),
            detail,
        }
    }
}

/// Directed graph of type dependencies over a frozen registry.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let mut registry = SchemaRegistry::new();
/// registry.register_declaration(
///     &TypeDeclaration::object("M", "Order")
///         .with_field(FieldDecl::new("customer", TypeDescriptor::reference(TypeRef::local("Customer")))),
/// );
/// registry.register_declaration(&TypeDeclaration::object("M", "Customer"));
/// let registry = registry.freeze();
///
/// let graph = TypeGraph::build(&registry);
/// let order = TypeId::new("M", "Order");
/// let customer = TypeId::new("M", "Customer");
/// assert_eq!(graph.refs_out(&order), vec![(customer.clone(), EdgeKind::Contains)]);
/// assert_eq!(graph.refs_in(&customer), vec![(order, EdgeKind::Contains)]);
/// assert!(graph.unresolved().is_empty());
/// ```
#[derive(Debug)]
pub struct TypeGraph<'r> {
    registry: &'r FrozenRegistry,
    graph: DiGraph<TypeIndex, EdgeKind>,
    nodes: Vec<NodeIndex>,
    unresolved: Vec<UnresolvedRef>,
}

impl<'r> TypeGraph<'r> {
    /// Builds the graph from every definition of `registry`.
    ///
    /// Membership of a union is recorded in both directions: the variant gets
    /// an `Implements` edge to the union and the union a `Variant` edge to
    /// the variant, whether the membership was declared on the union or on
    /// the variant.
    pub fn build(registry: &'r FrozenRegistry) -> Self {
        let mut graph = DiGraph::with_capacity(registry.len(), registry.len());
        let nodes: Vec<NodeIndex> = registry.indices().map(|idx| graph.add_node(idx)).collect();
        let mut edges: BTreeSet<(TypeIndex, TypeIndex, EdgeKind)> = BTreeSet::new();
        let mut unresolved: BTreeMap<(TypeId, TypeId), UnresolvedRef> = BTreeMap::new();

        for (idx, def) in registry.iter() {
            for (target, kind, via) in outgoing_references(def) {
                match registry.index_of(&target) {
                    Some(target_idx) => {
                        edges.insert((idx, target_idx, kind));
                        match kind {
                            EdgeKind::Implements => {
                                edges.insert((target_idx, idx, EdgeKind::Variant));
                            }
                            EdgeKind::Variant => {
                                edges.insert((target_idx, idx, EdgeKind::Implements));
                            }
                            _ => {}
                        }
                    }
                    None => {
                        unresolved
                            .entry((def.id.clone(), target.clone()))
                            .or_insert(UnresolvedRef {
                                from: def.id.clone(),
                                target,
                                kind,
                                via,
                            });
                    }
                }
            }
        }

        for (from, to, kind) in edges {
            graph.add_edge(nodes[from.get()], nodes[to.get()], kind);
        }
        debug!(
            types = registry.len(),
            edges = graph.edge_count(),
            unresolved = unresolved.len(),
            "built type graph"
        );

        Self {
            registry,
            graph,
            nodes,
            unresolved: unresolved.into_values().collect(),
        }
    }

    /// The registry the graph was built from.
    pub fn registry(&self) -> &'r FrozenRegistry {
        self.registry
    }

    /// Resolves a reference made by `from` to the target's current definition.
    pub fn resolve(&self, from: &TypeId, target: &TypeId) -> Result<&'r TypeDefinition, ResolveError> {
        self.registry
            .get(target)
            .ok_or_else(|| ResolveError::UnresolvedReference {
                from: from.clone(),
                target: target.clone(),
                detail: "no such type".to_string(),
            })
    }

    /// Types `id` depends on, sorted by target then edge kind.
    pub fn refs_out(&self, id: &TypeId) -> Vec<(TypeId, EdgeKind)> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Types that depend on `id`, sorted by source then edge kind.
    pub fn refs_in(&self, id: &TypeId) -> Vec<(TypeId, EdgeKind)> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &TypeId, direction: Direction) -> Vec<(TypeId, EdgeKind)> {
        let Some(idx) = self.registry.index_of(id) else {
            return Vec::new();
        };
        let mut out: Vec<(TypeIndex, EdgeKind)> = self
            .graph
            .edges_directed(self.nodes[idx.get()], direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (self.graph[other], *edge.weight())
            })
            .collect();
        out.sort();
        out.into_iter()
            .map(|(other, kind)| (self.registry.definition(other).id.clone(), kind))
            .collect()
    }

    /// References whose target is not registered, sorted.
    pub fn unresolved(&self) -> &[UnresolvedRef] {
        &self.unresolved
    }

    /// Every edge as `(source, target, kind)`.
    pub fn edges(&self) -> impl Iterator<Item = (TypeIndex, TypeIndex, EdgeKind)> + '_ {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()],
                self.graph[edge.target()],
                *edge.weight(),
            )
        })
    }

    /// Edges a definition makes itself.
    ///
    /// Leaves out the mirrored half of a union membership: a union declared
    /// by its variant's `implements` gets no `Variant` edge here, and a
    /// variant listed only by its union gets no `Implements` edge.
    pub fn declared_edges(&self) -> impl Iterator<Item = (TypeIndex, TypeIndex, EdgeKind)> + '_ {
        self.edges().filter(|(from, to, kind)| {
            let def = self.registry.definition(*from);
            let target = &self.registry.definition(*to).id;
            match kind {
                EdgeKind::Implements => def.parents.contains(target),
                EdgeKind::Variant => def
                    .as_union()
                    .is_some_and(|union| union.variants.contains(target)),
                _ => true,
            }
        })
    }

    /// Groups of types whose membership relations form a cycle.
    ///
    /// A type that is a member of itself forms a group of one. Each group is
    /// sorted and groups are ordered by their first member.
    pub fn inheritance_cycles(&self) -> Vec<Vec<TypeId>> {
        let mut inheritance: DiGraph<TypeIndex, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = self
            .registry
            .indices()
            .map(|idx| inheritance.add_node(idx))
            .collect();
        for (from, to, kind) in self.edges() {
            if kind == EdgeKind::Implements {
                inheritance.add_edge(nodes[from.get()], nodes[to.get()], ());
            }
        }

        let mut cycles: Vec<Vec<TypeId>> = tarjan_scc(&inheritance)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || inheritance.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut ids: Vec<TypeId> = component
                    .into_iter()
                    .map(|node| self.registry.definition(inheritance[node]).id.clone())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Every type that transitively depends on one of `roots`.
    ///
    /// Maps each dependent (roots excluded) to the root it was reached from.
    /// Roots are visited in ascending order, breadth first, so the attributed
    /// cause is the same on every run.
    pub fn dependents_closure(&self, roots: &BTreeSet<TypeIndex>) -> BTreeMap<TypeIndex, TypeIndex> {
        let mut cause: BTreeMap<TypeIndex, TypeIndex> = BTreeMap::new();
        let mut queue: VecDeque<(TypeIndex, TypeIndex)> =
            roots.iter().map(|root| (*root, *root)).collect();

        while let Some((current, root)) = queue.pop_front() {
            let mut dependents: Vec<TypeIndex> = self
                .graph
                .neighbors_directed(self.nodes[current.get()], Direction::Incoming)
                .map(|node| self.graph[node])
                .collect();
            dependents.sort();
            dependents.dedup();
            for dependent in dependents {
                if roots.contains(&dependent) || cause.contains_key(&dependent) {
                    continue;
                }
                cause.insert(dependent, root);
                queue.push_back((dependent, root));
            }
        }
        cause
    }
}

/// Every reference a definition makes, in declaration order.
fn outgoing_references(def: &TypeDefinition) -> Vec<(TypeId, EdgeKind, Option<String>)> {
    let mut out = Vec::new();
    for field in def.fields() {
        let mut targets = Vec::new();
        field.ty.collect_references(&mut targets);
        out.extend(
            targets
                .into_iter()
                .map(|target| (target, EdgeKind::Contains, Some(field.name.clone()))),
        );
        out.extend(
            field
                .references
                .iter()
                .map(|target| (target.clone(), EdgeKind::References, Some(field.name.clone()))),
        );
    }
    match &def.body {
        DefinitionBody::Object(object) => {
            if let Some(value) = &object.additional_properties {
                let mut targets = Vec::new();
                value.collect_references(&mut targets);
                out.extend(targets.into_iter().map(|target| {
                    (
                        target,
                        EdgeKind::AdditionalProperties,
                        Some("additionalProperties".to_string()),
                    )
                }));
            }
        }
        DefinitionBody::Union(union) => {
            out.extend(
                union
                    .variants
                    .iter()
                    .map(|variant| (variant.clone(), EdgeKind::Variant, None)),
            );
        }
        DefinitionBody::Enum(_) => {}
    }
    out.extend(
        def.parents
            .iter()
            .map(|parent| (parent.clone(), EdgeKind::Implements, None)),
    );
    out
}
