//! The resolution pipeline.
//!
//! Registration runs per module in parallel. After the single barrier (all
//! modules registered, registry frozen) the stages run in order: type graph,
//! inheritance cycles, polymorphism, module linking, then parallel field
//! composition. Every error is recorded and attributed; failed types and the
//! types that transitively depend on them are left out of the schema while
//! everything else is resolved.

use std::collections::{BTreeMap, BTreeSet};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    CrossModuleLinker, DEFAULT_DISCRIMINATOR_PROPERTY, ErrorReport, FieldSetComposer,
    FrozenRegistry, ModelBuilder, PolymorphismResolver, ResolveError, ResolvedSchema,
    SchemaBundle, SchemaRegistry, TypeDeclaration, TypeGraph, TypeIndex, WideningPolicy,
    validate_bundle,
};

/// Options of one resolution run.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let options = ResolveOptions::default()
///     .with_jobs(2)
///     .with_widening_policy(WideningPolicy::Strict);
/// assert_eq!(options.default_discriminator_property, "kind");
/// assert_eq!(options.jobs, Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Policy for additionalProperties that differ across revisions.
    pub additional_properties: WideningPolicy,
    /// Discriminator property of unions that do not name one.
    pub default_discriminator_property: String,
    /// Worker threads; `None` or 0 uses the global rayon pool.
    pub jobs: Option<usize>,
    /// Report references to undeclared module dependencies as errors.
    pub strict_module_dependencies: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            additional_properties: WideningPolicy::default(),
            default_discriminator_property: DEFAULT_DISCRIMINATOR_PROPERTY.to_string(),
            jobs: None,
            strict_module_dependencies: false,
        }
    }
}

impl ResolveOptions {
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_widening_policy(mut self, policy: WideningPolicy) -> Self {
        self.additional_properties = policy;
        self
    }

    pub fn with_discriminator_property(mut self, property: &str) -> Self {
        self.default_discriminator_property = property.to_string();
        self
    }

    pub fn with_strict_module_dependencies(mut self, strict: bool) -> Self {
        self.strict_module_dependencies = strict;
        self
    }
}

/// Outcome of a run: the partial schema plus every problem found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub schema: ResolvedSchema,
    pub report: ErrorReport,
}

impl Resolution {
    /// Returns `true` when every type resolved.
    pub fn is_clean(&self) -> bool {
        self.report.is_clean()
    }
}

/// Resolves a complete bundle.
///
/// # Examples
///
/// ```
/// use modelgen_core::*;
///
/// let bundle = SchemaBundle::new("1.0.0")
///     .with_declaration(TypeDeclaration::union("M", "Shape"))
///     .with_declaration(
///         TypeDeclaration::object("M", "Circle")
///             .implementing(TypeRef::local("Shape"))
///             .with_field(FieldDecl::constant("kind", "CIRCLE"))
///             .with_field(FieldDecl::new("radius", TypeDescriptor::scalar(ScalarType::Number))),
///     );
///
/// let resolution = resolve_bundle(&bundle, &ResolveOptions::default());
/// assert!(resolution.is_clean());
///
/// let circle = resolution.schema.lookup("M", "Circle").unwrap();
/// assert_eq!(circle.field_names(), vec!["radius"]);
/// let shape = resolution.schema.lookup("M", "Shape").unwrap();
/// assert_eq!(shape.as_union().unwrap().variants[0].discriminator, "CIRCLE");
/// ```
pub fn resolve_bundle(bundle: &SchemaBundle, options: &ResolveOptions) -> Resolution {
    run_in_pool(options.jobs, || {
        let (registry, errors) = register_bundle(bundle, options);
        resolve_frozen(registry.freeze(), options, errors)
    })
}

/// Resolves an already populated registry.
pub fn resolve_registry(registry: FrozenRegistry, options: &ResolveOptions) -> Resolution {
    run_in_pool(options.jobs, || resolve_frozen(registry, options, Vec::new()))
}

/// Registers every module of `bundle`, one registry per module in parallel,
/// then merges them in module-name order.
///
/// Declarations of a module are registered in input order, which decides
/// which of two same-named declarations is the earlier one.
pub fn register_bundle(
    bundle: &SchemaBundle,
    options: &ResolveOptions,
) -> (SchemaRegistry, Vec<ResolveError>) {
    let property = options.default_discriminator_property.as_str();
    let mut errors = validate_bundle(bundle);

    let mut by_module: BTreeMap<&str, Vec<&TypeDeclaration>> = BTreeMap::new();
    for decl in &bundle.declarations {
        by_module.entry(decl.module.as_str()).or_default().push(decl);
    }
    let by_module: Vec<(&str, Vec<&TypeDeclaration>)> = by_module.into_iter().collect();

    let locals: Vec<(SchemaRegistry, Vec<ResolveError>)> = by_module
        .par_iter()
        .map(|(module, decls)| {
            let mut local = SchemaRegistry::with_discriminator_property(property);
            let mut local_errors = Vec::new();
            for decl in decls {
                local_errors.extend(local.register_declaration(decl));
            }
            debug!(module = %module, types = local.len(), "registered module");
            (local, local_errors)
        })
        .collect();

    let mut registry = SchemaRegistry::with_discriminator_property(property);
    for module in &bundle.modules {
        if let Err(err) = registry.declare_module(module) {
            errors.push(err);
        }
    }
    for (local, local_errors) in locals {
        errors.extend(local_errors);
        errors.extend(registry.absorb(local));
    }
    (registry, errors)
}

fn run_in_pool<R, F>(jobs: Option<usize>, op: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    let Some(jobs) = jobs.filter(|jobs| *jobs > 0) else {
        return op();
    };
    match ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(op),
        Err(err) => {
            warn!(error = %err, "could not build thread pool; using the global pool");
            op()
        }
    }
}

fn resolve_frozen(
    registry: FrozenRegistry,
    options: &ResolveOptions,
    mut errors: Vec<ResolveError>,
) -> Resolution {
    let graph = TypeGraph::build(&registry);
    for unresolved in graph.unresolved() {
        if unresolved.from.module == unresolved.target.module {
            errors.push(unresolved.to_error(&registry));
        }
    }

    for cycle in graph.inheritance_cycles() {
        for id in &cycle {
            errors.push(ResolveError::CyclicInheritance {
                id: id.clone(),
                cycle: cycle.clone(),
            });
        }
    }

    let polymorphism = PolymorphismResolver::new(&registry).resolve();
    errors.extend(polymorphism.errors.iter().cloned());

    let link = CrossModuleLinker::new(&graph)
        .strict_dependencies(options.strict_module_dependencies)
        .link();
    errors.extend(link.errors);

    let mut roots = failed_roots(&registry, &errors);
    let mut dependents = graph.dependents_closure(&roots);
    let excluded: BTreeSet<TypeIndex> = roots.iter().chain(dependents.keys()).copied().collect();

    let composer = FieldSetComposer::new(
        &registry,
        &polymorphism.capabilities,
        &excluded,
        options.additional_properties,
    );
    let candidates: Vec<TypeIndex> = registry.indices().collect();
    let mut composed = BTreeMap::new();
    let mut composition_failed = false;
    for (idx, result) in composer.compose_all(&candidates) {
        match result {
            Ok(fields) => {
                composed.insert(idx, fields);
            }
            Err(err) => {
                roots.insert(idx);
                composition_failed = true;
                errors.push(err);
            }
        }
    }
    if composition_failed {
        dependents = graph.dependents_closure(&roots);
    }

    for (dependent, cause) in &dependents {
        errors.push(ResolveError::DependencyFailed {
            id: registry.definition(*dependent).id.clone(),
            cause: registry.definition(*cause).id.clone(),
        });
    }

    let positions: BTreeMap<&str, usize> = link
        .plan
        .order()
        .enumerate()
        .map(|(position, module)| (module, position))
        .collect();
    let builder = ModelBuilder::new(&polymorphism.unions, &polymorphism.capabilities);
    let mut models: Vec<_> = registry
        .iter()
        .filter(|(idx, _)| !roots.contains(idx) && !dependents.contains_key(idx))
        .filter_map(|(idx, def)| composed.get(&idx).map(|fields| builder.build(def, fields)))
        .collect();
    models.sort_by(|a, b| {
        let pa = positions.get(a.id.module.as_str()).copied().unwrap_or(usize::MAX);
        let pb = positions.get(b.id.module.as_str()).copied().unwrap_or(usize::MAX);
        pa.cmp(&pb).then_with(|| a.id.cmp(&b.id))
    });

    let report = ErrorReport::new(errors, link.warnings);
    info!(
        types = registry.len(),
        resolved = models.len(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "resolution finished"
    );

    Resolution {
        schema: ResolvedSchema {
            models,
            plan: link.plan,
        },
        report,
    }
}

/// Registered types that are the subject of an error.
fn failed_roots(registry: &FrozenRegistry, errors: &[ResolveError]) -> BTreeSet<TypeIndex> {
    errors
        .iter()
        .filter_map(ResolveError::subject)
        .filter_map(|id| registry.index_of(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, FieldDecl, ModuleDecl, TypeDescriptor, TypeId, TypeRef};

    #[test]
    fn test_register_bundle_reports_duplicates_across_input() {
        let bundle = SchemaBundle::new("1.0.0")
            .with_declaration(TypeDeclaration::object("M", "A"))
            .with_declaration(TypeDeclaration::object("N", "B"))
            .with_declaration(TypeDeclaration::object("M", "A"));

        let (registry, errors) = register_bundle(&bundle, &ResolveOptions::default());
        assert_eq!(registry.len(), 2);
        assert_eq!(
            errors,
            vec![ResolveError::DuplicateTypeDefinition {
                id: TypeId::new("M", "A")
            }]
        );
    }

    #[test]
    fn test_duplicate_excludes_type_from_schema() {
        let bundle = SchemaBundle::new("1.0.0")
            .with_declaration(TypeDeclaration::object("M", "A"))
            .with_declaration(TypeDeclaration::object("M", "A"))
            .with_declaration(TypeDeclaration::object("M", "B"));

        let resolution = resolve_bundle(&bundle, &ResolveOptions::default());
        assert!(!resolution.schema.contains(&TypeId::new("M", "A")));
        assert!(resolution.schema.contains(&TypeId::new("M", "B")));
        assert!(resolution.report.has_kind(ErrorKind::DuplicateTypeDefinition));
    }

    #[test]
    fn test_models_follow_link_order() {
        let bundle = SchemaBundle::new("1.0.0")
            .with_module(ModuleDecl::new("A").depending_on("Z"))
            .with_declaration(TypeDeclaration::object("A", "Top").with_field(FieldDecl::new(
                "z",
                TypeDescriptor::reference(TypeRef::new("Z", "Leaf")),
            )))
            .with_declaration(TypeDeclaration::object("Z", "Leaf"));

        let resolution = resolve_bundle(&bundle, &ResolveOptions::default().with_jobs(2));
        assert!(resolution.is_clean(), "{}", resolution.report);
        let ids: Vec<String> = resolution
            .schema
            .models
            .iter()
            .map(|m| m.id.to_string())
            .collect();
        assert_eq!(ids, vec!["Z.Leaf", "A.Top"]);
    }

    #[test]
    fn test_zero_jobs_uses_global_pool() {
        let bundle =
            SchemaBundle::new("1.0.0").with_declaration(TypeDeclaration::object("M", "A"));
        let resolution = resolve_bundle(&bundle, &ResolveOptions::default().with_jobs(0));
        assert_eq!(resolution.schema.len(), 1);
    }
}
