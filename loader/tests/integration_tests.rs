use std::io::Write;
use std::path::Path;

use modelgen_core::{
    ErrorKind, FieldDecl, ResolveOptions, ScalarType, SchemaBundle, TypeDeclaration,
    TypeDescriptor, TypeRef, WideningPolicy, resolve_bundle,
};
use modelgen_loader::{
    BundleLoader, IrManifest, LoaderError, ModuleFile, ResolveConfig, load_bundle, save_bundle,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_module(dir: &Path, file_name: &str, module: &ModuleFile) {
    let path = dir.join(file_name);
    let mut f = std::fs::File::create(path).unwrap();
    serde_json::to_writer_pretty(&mut f, module).unwrap();
    f.flush().unwrap();
}

fn customers() -> ModuleFile {
    ModuleFile::new("Customers").with_type(
        TypeDeclaration::object("", "Customer")
            .with_field(FieldDecl::new("id", TypeDescriptor::scalar(ScalarType::Uuid)))
            .with_field(FieldDecl::new("name", TypeDescriptor::string())),
    )
}

fn orders() -> ModuleFile {
    let mut file = ModuleFile::new("Orders").with_type(
        TypeDeclaration::object("", "Order")
            .with_field(FieldDecl::new("id", TypeDescriptor::scalar(ScalarType::Uuid)))
            .with_field(FieldDecl::new(
                "customer",
                TypeDescriptor::reference(TypeRef::new("Customers", "Customer")),
            )),
    );
    file.dependencies = Some(["Customers".to_string()].into());
    file
}

// ---------------------------------------------------------------------------
// Directory loading
// ---------------------------------------------------------------------------

#[test]
fn test_directory_loading_resolves() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "20-orders.json", &orders());
    write_module(dir.path(), "10-customers.json", &customers());
    std::fs::write(dir.path().join("README.md"), "not a schema").unwrap();

    let bundle = BundleLoader::new().from_dir(dir.path()).load().unwrap();
    let modules: Vec<&str> = bundle.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(modules, vec!["Customers", "Orders"]);
    assert_eq!(bundle.declaration_count(), 2);

    let resolution = resolve_bundle(&bundle, &ResolveOptions::default());
    assert!(resolution.is_clean(), "{}", resolution.report);
    let order: Vec<&str> = resolution.schema.plan.order().collect();
    assert_eq!(order, vec!["Customers", "Orders"]);
}

#[test]
fn test_yaml_module_file() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = r#"
module: Shapes
description: Geometry
types:
  - name: Shape
    kind: union
    discriminator_property: type
    fields:
      - name: area
        type:
          scalar: number
  - name: Circle
    kind: object
    implements: [Shape]
    fields:
      - name: type
        type:
          scalar: string
        constant: CIRCLE
      - name: radius
        type:
          scalar: number
"#;
    std::fs::write(dir.path().join("shapes.yml"), yaml).unwrap();

    let bundle = BundleLoader::new().from_path(dir.path()).load().unwrap();
    assert_eq!(bundle.modules[0].description.as_deref(), Some("Geometry"));

    let resolution = resolve_bundle(&bundle, &ResolveOptions::default());
    assert!(resolution.is_clean(), "{}", resolution.report);
    let circle = resolution.schema.lookup("Shapes", "Circle").unwrap();
    assert_eq!(circle.field_names(), vec!["radius", "area"]);
    assert_eq!(
        circle.as_object().unwrap().discriminator.as_deref(),
        Some("CIRCLE")
    );
}

#[test]
fn test_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = BundleLoader::new()
        .from_dir(dir.path().join("absent"))
        .load()
        .unwrap_err();
    assert!(matches!(err, LoaderError::Io(_)));
}

#[test]
fn test_foreign_type_in_module_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = ModuleFile::new("Orders").with_type(TypeDeclaration::object("Billing", "Invoice"));
    write_module(dir.path(), "orders.json", &file);

    let err = BundleLoader::new().from_dir(dir.path()).load().unwrap_err();
    assert!(matches!(err, LoaderError::InvalidDocument { .. }));
    assert!(err.to_string().contains("orders.json"));
}

// ---------------------------------------------------------------------------
// Bundles and overrides
// ---------------------------------------------------------------------------

#[test]
fn test_override_file_after_directory() {
    let dir = tempfile::tempdir().unwrap();
    let schemas = dir.path().join("schemas");
    std::fs::create_dir_all(&schemas).unwrap();
    write_module(&schemas, "customers.json", &customers());

    let patch = SchemaBundle::new("1.1.0").with_declaration(
        TypeDeclaration::object("Customers", "Customer")
            .with_field(FieldDecl::new("id", TypeDescriptor::scalar(ScalarType::Uuid)))
            .with_field(FieldDecl::new("email", TypeDescriptor::string()))
            .as_override(),
    );
    let patch_path = dir.path().join("patch.yaml");
    save_bundle(&patch, &patch_path).unwrap();

    let bundle = BundleLoader::new()
        .from_dir(&schemas)
        .from_file(&patch_path)
        .load()
        .unwrap();
    assert_eq!(bundle.version, "1.1.0");

    let resolution = resolve_bundle(&bundle, &ResolveOptions::default());
    let customer = resolution.schema.lookup("Customers", "Customer").unwrap();
    assert_eq!(customer.field_names(), vec!["id", "email"]);
    assert_eq!(customer.revision, 1);

    // Reversed order: the override comes first, the plain declaration is a duplicate.
    let reversed = BundleLoader::new()
        .from_file(&patch_path)
        .from_dir(&schemas)
        .load()
        .unwrap();
    let resolution = resolve_bundle(&reversed, &ResolveOptions::default());
    assert!(resolution.report.has_kind(ErrorKind::DuplicateTypeDefinition));
}

#[test]
fn test_bundle_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");

    let bundle = SchemaBundle::new("1.0.0")
        .with_declaration(TypeDeclaration::enumeration("M", "Color").with_member("RED"));
    save_bundle(&bundle, &path).unwrap();

    assert_eq!(load_bundle(&path).unwrap(), bundle);
}

// ---------------------------------------------------------------------------
// Manifest workflow
// ---------------------------------------------------------------------------

#[test]
fn test_manifest_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ir-manifest.json");

    let base = SchemaBundle::new("1.0.0")
        .with_declaration(
            TypeDeclaration::object("Customers", "Customer")
                .with_field(FieldDecl::new("name", TypeDescriptor::string())),
        )
        .with_declaration(
            TypeDeclaration::object("Orders", "Order").with_field(FieldDecl::new(
                "customer",
                TypeDescriptor::reference(TypeRef::new("Customers", "Customer")),
            )),
        );
    let first = resolve_bundle(&base, &ResolveOptions::default());
    let manifest = IrManifest::from_resolution("0.1.0", &base.version, &first).unwrap();
    manifest.save(&path).unwrap();

    let loaded = IrManifest::load(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.contains("Orders.Order"));

    // Change one type; only it shows up in the diff.
    let changed = base.clone().with_declaration(
        TypeDeclaration::object("Customers", "Customer")
            .with_field(FieldDecl::new("name", TypeDescriptor::string()))
            .with_field(FieldDecl::new("vip", TypeDescriptor::scalar(ScalarType::Boolean)))
            .as_override(),
    );
    let second = resolve_bundle(&changed, &ResolveOptions::default());
    let updated = IrManifest::from_resolution("0.1.0", &changed.version, &second).unwrap();

    assert_eq!(loaded.diff(&updated), vec!["Customers.Customer"]);
    assert_ne!(loaded.fingerprint, updated.fingerprint);
}

// ---------------------------------------------------------------------------
// Config workflow
// ---------------------------------------------------------------------------

#[test]
fn test_config_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modelgen.yml");

    let yaml = r#"
version: "1.0"
resolution:
  additional_properties: strict
  strict_module_dependencies: true
execution:
  jobs: 2
"#;
    std::fs::write(&path, yaml).unwrap();

    let config = ResolveConfig::load(&path).unwrap();
    let options = config.to_options().unwrap();
    assert_eq!(options.additional_properties, WideningPolicy::Strict);
    assert_eq!(options.jobs, Some(2));

    // Orders references Customers without declaring the dependency.
    let mut orders = orders();
    orders.dependencies = Some(Default::default());
    let schemas = dir.path().join("schemas");
    std::fs::create_dir_all(&schemas).unwrap();
    write_module(&schemas, "customers.json", &customers());
    write_module(&schemas, "orders.json", &orders);

    let bundle = BundleLoader::new().from_dir(&schemas).load().unwrap();
    let strict = resolve_bundle(&bundle, &options);
    assert!(strict.report.has_kind(ErrorKind::UndeclaredModuleDependency));

    let relaxed = resolve_bundle(&bundle, &ResolveConfig::default().to_options().unwrap());
    assert!(relaxed.report.errors.is_empty());
    assert!(!relaxed.report.warnings.is_empty());

    let path2 = dir.path().join("modelgen2.yml");
    config.save(&path2).unwrap();
    assert_eq!(ResolveConfig::load(&path2).unwrap(), config);
}
