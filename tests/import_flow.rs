//! End-to-end import tests against the in-process catalog

mod common;

use std::collections::BTreeSet;

use asyncapi_importer::catalog::memory::MemoryCatalog;
use asyncapi_importer::catalog::{CatalogService, DomainLookup};
use asyncapi_importer::model::{
    ApplicationContent, EventApiContent, EventContent, LevelKind, ObjectKind, SchemaContent,
    VersionContent, VersionRef, VersionState,
};
use asyncapi_importer::{ImportError, ImportPipeline};
use common::{catalog, fixture, import, latest, object_id, options, FaultyCatalog, DOMAIN};

#[test]
fn test_first_import_creates_everything() {
    let catalog = catalog();
    let summary = import(&catalog, options(), "orders.yaml");

    assert_eq!(summary.domain.as_deref(), Some(DOMAIN));
    assert_eq!(summary.kind(ObjectKind::Enum).objects_created, 1);
    assert_eq!(summary.kind(ObjectKind::Schema).objects_created, 2);
    assert_eq!(summary.kind(ObjectKind::Event).objects_created, 2);
    assert_eq!(summary.kind(ObjectKind::Event).versions_created, 2);
    assert_eq!(summary.skipped().count(), 0);

    // Payment is only published, so it is not mapped by default
    assert_eq!(catalog.object_count(ObjectKind::Schema), 2);
    assert_eq!(catalog.object_count(ObjectKind::Application), 0);

    let order = latest(&catalog, ObjectKind::Schema, "Order");
    let region = latest(&catalog, ObjectKind::Enum, "region");
    assert_eq!(order.version.as_deref(), Some("1.0.0"));
    assert_eq!(order.state, VersionState::Draft);

    let event = EventContent::from_payload(latest(&catalog, ObjectKind::Event, "OrderCreated").payload).unwrap();
    assert_eq!(event.schema_version, Some(VersionRef::catalog(&order.id)));
    assert_eq!(event.delivery.topic(), "order/{region}/created");
    let variable = &event.delivery.levels[1];
    assert_eq!(variable.kind, LevelKind::Variable);
    assert_eq!(variable.enum_version, Some(VersionRef::catalog(&region.id)));
}

#[test]
fn test_reimport_is_idempotent() {
    let catalog = catalog();
    import(&catalog, options(), "orders.yaml");
    let before = catalog.version_count(ObjectKind::Event) + catalog.version_count(ObjectKind::Schema);

    let summary = import(&catalog, options(), "orders.yaml");

    assert_eq!(summary.objects_created(), 0);
    assert_eq!(summary.versions_changed(), 0);
    assert_eq!(summary.kind(ObjectKind::Schema).versions_reused, 2);
    assert_eq!(summary.kind(ObjectKind::Enum).versions_reused, 1);
    assert_eq!(summary.kind(ObjectKind::Event).versions_reused, 2);
    assert_eq!(
        catalog.version_count(ObjectKind::Event) + catalog.version_count(ObjectKind::Schema),
        before
    );
}

#[test]
fn test_json_and_yaml_with_different_layout_match() {
    let catalog = catalog();
    import(&catalog, options(), "orders.yaml");

    let summary = import(&catalog, options(), "orders.json");

    assert_eq!(summary.versions_changed(), 0);
    assert_eq!(summary.kind(ObjectKind::Schema).versions_reused, 2);
    assert_eq!(summary.kind(ObjectKind::Enum).versions_reused, 1);
}

#[test]
fn test_changed_schema_updates_draft_in_place() {
    let catalog = catalog();
    import(&catalog, options(), "orders.yaml");
    let draft = latest(&catalog, ObjectKind::Schema, "Order");

    let summary = import(&catalog, options(), "orders-v2.yaml");

    let schemas = summary.kind(ObjectKind::Schema);
    assert_eq!(schemas.versions_updated, 1);
    assert_eq!(schemas.versions_reused, 1);
    assert_eq!(schemas.versions_created, 0);

    let updated = latest(&catalog, ObjectKind::Schema, "Order");
    assert_eq!(updated.id, draft.id);
    assert_eq!(updated.version.as_deref(), Some("1.0.0"));
    let content = SchemaContent::from_payload(updated.payload).unwrap();
    assert!(content.canonical().contains("currency"));

    // The event still points at the same version id
    assert_eq!(summary.kind(ObjectKind::Event).versions_reused, 2);
}

#[test]
fn test_changed_schema_supersedes_released_version() {
    let catalog = catalog();
    import(&catalog, options(), "orders.yaml");
    let released = latest(&catalog, ObjectKind::Schema, "Order");
    catalog.set_state(&released.id, VersionState::Released).unwrap();
    let event_before = latest(&catalog, ObjectKind::Event, "OrderCreated");
    catalog.set_state(&event_before.id, VersionState::Released).unwrap();

    let summary = import(&catalog, options(), "orders-v2.yaml");

    let successor = latest(&catalog, ObjectKind::Schema, "Order");
    assert_ne!(successor.id, released.id);
    assert_eq!(successor.version.as_deref(), Some("2.0.0"));
    assert_eq!(summary.kind(ObjectKind::Schema).versions_created, 1);

    // OrderCreated now needs the new schema version; its released version
    // gets a successor, OrderShipped is unchanged
    let events = summary.kind(ObjectKind::Event);
    assert_eq!(events.versions_created, 1);
    assert_eq!(events.versions_reused, 1);
    let event = latest(&catalog, ObjectKind::Event, "OrderCreated");
    assert_eq!(event.version.as_deref(), Some("2.0.0"));
    let content = EventContent::from_payload(event.payload).unwrap();
    assert_eq!(content.schema_version, Some(VersionRef::catalog(&successor.id)));
}

#[test]
fn test_version_strategy_minor() {
    let catalog = catalog();
    import(&catalog, options(), "orders.yaml");
    let released = latest(&catalog, ObjectKind::Schema, "Order");
    catalog.set_state(&released.id, VersionState::Released).unwrap();

    let mut minor = options();
    minor.reconcile.strategy = asyncapi_importer::VersionStrategy::Minor;
    import(&catalog, minor, "orders-v2.yaml");

    assert_eq!(latest(&catalog, ObjectKind::Schema, "Order").version.as_deref(), Some("1.1.0"));
}

#[test]
fn test_newest_of_several_drafts_is_updated() {
    let catalog = catalog();
    let domain = catalog.get_domain(DomainLookup::Name(DOMAIN)).unwrap();
    let order = catalog.create_object(ObjectKind::Schema, "Order", &domain.id).unwrap();
    let stale = SchemaContent::parse(r#"{"type":"string"}"#).unwrap().to_payload();
    let older = catalog.create_version(&order.id, &stale, "1.0.0").unwrap();
    let newer = catalog.create_version(&order.id, &stale, "1.1.0").unwrap();

    let summary = import(&catalog, options(), "orders.yaml");

    assert_eq!(summary.kind(ObjectKind::Schema).versions_updated, 1);
    let updated = catalog.version(&newer.id).unwrap();
    assert_ne!(updated.payload, stale);
    assert_eq!(updated.version.as_deref(), Some("1.1.0"));
    assert_eq!(catalog.version(&older.id).unwrap().payload, stale);
}

#[test]
fn test_rejected_object_is_isolated() {
    let memory = catalog();
    let mut faulty = FaultyCatalog::new(&memory);
    faulty.reject_object = Some("Shipment".into());

    let summary = import(&faulty, options(), "orders.yaml");

    let skipped: Vec<_> = summary.skipped().map(|(kind, s)| (kind, s.name.clone(), s.stage.clone())).collect();
    assert!(skipped.contains(&(ObjectKind::Schema, "Shipment".to_string(), "import".to_string())));
    assert!(skipped.contains(&(ObjectKind::Event, "OrderShipped".to_string(), "resolve".to_string())));
    assert_eq!(skipped.len(), 2);

    // Siblings went through
    assert_eq!(summary.kind(ObjectKind::Event).versions_created, 1);
    object_id(&memory, ObjectKind::Event, "OrderCreated");
    assert!(memory.object_by_name(ObjectKind::Event, None, "OrderShipped").is_none());
}

#[test]
fn test_unavailable_catalog_aborts_run() {
    let memory = catalog();
    let mut faulty = FaultyCatalog::new(&memory);
    faulty.unavailable = true;

    let err = ImportPipeline::new(&faulty, options())
        .run_text(&fixture("orders.yaml"))
        .unwrap_err();

    assert!(matches!(err, ImportError::CatalogUnavailable(_)));
    assert!(err.is_fatal());
    assert_eq!(memory.object_count(ObjectKind::Schema), 0);
}

#[test]
fn test_conflicting_versions_rejected_before_catalog_calls() {
    let spec = r#"
asyncapi: 2.6.0
info:
  title: Conflicts
  version: 1.0.0
channels:
  order/created:
    subscribe:
      message:
        name: OrderCreated
        payload:
          title: Order
          type: object
  order/placed:
    subscribe:
      message:
        name: OrderCreated
        payload:
          title: Order
          type: string
"#;
    let memory = catalog();
    let faulty = FaultyCatalog::new(&memory);

    let err = ImportPipeline::new(&faulty, options()).run_text(spec).unwrap_err();

    match err {
        ImportError::InvalidImportSet(violations) => {
            assert!(violations.iter().any(|v| v.kind == ObjectKind::Schema && v.name == "Order" && v.versions == 2));
            assert!(violations.iter().any(|v| v.kind == ObjectKind::Event && v.name == "OrderCreated"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(faulty.calls(), 0);
}

#[test]
fn test_unsupported_document_rejected_before_catalog_calls() {
    let memory = catalog();
    let faulty = FaultyCatalog::new(&memory);

    let err = ImportPipeline::new(&faulty, options())
        .run_text("asyncapi: 3.0.0\ninfo:\n  title: Next\n")
        .unwrap_err();

    assert!(matches!(err, ImportError::MalformedSpec(_)));
    assert_eq!(faulty.calls(), 0);
}

#[test]
fn test_unknown_domain_aborts_run() {
    let catalog = MemoryCatalog::new();
    let err = ImportPipeline::new(&catalog, options())
        .run_text(&fixture("orders.yaml"))
        .unwrap_err();
    assert!(matches!(err, ImportError::Catalog(_)));
    assert_eq!(catalog.object_count(ObjectKind::Schema), 0);
}

#[test]
fn test_application_and_event_api_import() {
    let catalog = catalog();
    let mut opts = options();
    opts.mapper.include_publish_operations = true;
    opts.mapper.application = true;
    opts.mapper.event_api = true;

    let summary = import(&catalog, opts, "orders.yaml");

    assert_eq!(summary.kind(ObjectKind::Application).objects_created, 1);
    assert_eq!(summary.kind(ObjectKind::EventApi).objects_created, 1);
    assert_eq!(catalog.object_count(ObjectKind::Schema), 3);

    let id = |name: &str| VersionRef::catalog(latest(&catalog, ObjectKind::Event, name).id);
    let produced: BTreeSet<_> = [id("OrderCreated"), id("OrderShipped")].into_iter().collect();
    let consumed: BTreeSet<_> = [id("PaymentReceived")].into_iter().collect();

    let app = ApplicationContent::from_payload(latest(&catalog, ObjectKind::Application, "Order Service").payload)
        .unwrap();
    assert_eq!(app.produced, produced);
    assert_eq!(app.consumed, consumed);

    let api = EventApiContent::from_payload(latest(&catalog, ObjectKind::EventApi, "Order Service").payload)
        .unwrap();
    assert_eq!(api.produced, consumed);
    assert_eq!(api.consumed, produced);
}

#[test]
fn test_catalog_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");

    {
        let catalog = MemoryCatalog::open(&path).unwrap();
        catalog.add_domain(DOMAIN).unwrap();
        import(&catalog, options(), "orders.yaml");
        catalog.save().unwrap();
    }

    let reopened = MemoryCatalog::open(&path).unwrap();
    let summary = import(&reopened, options(), "orders.yaml");
    assert_eq!(summary.versions_changed(), 0);
    assert_eq!(summary.kind(ObjectKind::Event).versions_reused, 2);
}

#[test]
fn test_match_found_past_first_version_page() {
    let catalog = catalog();
    let release = |catalog: &MemoryCatalog| {
        for kind in [ObjectKind::Enum, ObjectKind::Schema, ObjectKind::Event] {
            for name in ["region", "Order", "Shipment", "OrderCreated", "OrderShipped"] {
                if let Some(object) = catalog.object_by_name(kind, None, name) {
                    for version in catalog.versions_of(&object.id) {
                        if version.state.is_draft() {
                            catalog.set_state(&version.id, VersionState::Released).unwrap();
                        }
                    }
                }
            }
        }
    };
    import(&catalog, options(), "orders.yaml");
    let first = latest(&catalog, ObjectKind::Schema, "Order");
    release(&catalog);
    import(&catalog, options(), "orders-v2.yaml");
    release(&catalog);
    assert_eq!(catalog.versions_of(&first.object_id).len(), 2);
    let before = catalog.version_count(ObjectKind::Schema) + catalog.version_count(ObjectKind::Event);

    let mut paged = options();
    paged.reconcile.version_page_size = 1;
    paged.reconcile.object_page_size = 1;
    let summary = import(&catalog, paged, "orders.yaml");

    // Order 1.0.0 is the older version and only appears on the second page
    assert_eq!(summary.versions_changed(), 0);
    assert_eq!(summary.kind(ObjectKind::Schema).versions_reused, 2);
    assert_eq!(summary.kind(ObjectKind::Event).versions_reused, 2);
    assert_eq!(
        catalog.version_count(ObjectKind::Schema) + catalog.version_count(ObjectKind::Event),
        before
    );
}
