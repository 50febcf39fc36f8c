//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use asyncapi_importer::catalog::memory::MemoryCatalog;
use asyncapi_importer::catalog::{
    CatalogError, CatalogResult, CatalogService, Domain, DomainLookup, ObjectQuery, Page,
    PageRequest, RemoteObject, RemoteVersion,
};
use asyncapi_importer::model::{ObjectKind, VersionPayload};
use asyncapi_importer::reconcile::{ReconcileOptions, RunContext};
use asyncapi_importer::{ImportOptions, ImportPipeline, ImportSummary};

pub const DOMAIN: &str = "orders";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).unwrap()
}

/// A catalog holding the `orders` domain
pub fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.add_domain(DOMAIN).unwrap();
    catalog
}

pub fn options() -> ImportOptions {
    let mut options = ImportOptions::new(DOMAIN);
    options.reconcile = ReconcileOptions { workers: 4, ..Default::default() };
    options
}

pub fn import(catalog: &dyn CatalogService, options: ImportOptions, fixture_name: &str) -> ImportSummary {
    ImportPipeline::new(catalog, options)
        .with_context(RunContext::new(format!("test-{}", fixture_name)))
        .run_text(&fixture(fixture_name))
        .unwrap()
}

/// Id of the object named `name` in the `orders` domain
pub fn object_id(catalog: &MemoryCatalog, kind: ObjectKind, name: &str) -> String {
    let domain = catalog.get_domain(DomainLookup::Name(DOMAIN)).unwrap();
    catalog
        .object_by_name(kind, Some(domain.id.as_str()), name)
        .unwrap_or_else(|| panic!("no {} named {}", kind, name))
        .id
}

/// Newest version of the object named `name`
pub fn latest(catalog: &MemoryCatalog, kind: ObjectKind, name: &str) -> RemoteVersion {
    let id = object_id(catalog, kind, name);
    catalog.latest_version(kind, &id).unwrap().unwrap()
}

/// Wraps a catalog, failing selected calls and counting every call
pub struct FaultyCatalog<'a> {
    inner: &'a MemoryCatalog,
    /// Reject creating objects with this name
    pub reject_object: Option<String>,
    /// Report every call as unavailable
    pub unavailable: bool,
    calls: AtomicUsize,
}

impl<'a> FaultyCatalog<'a> {
    pub fn new(inner: &'a MemoryCatalog) -> Self {
        Self { inner, reject_object: None, unavailable: false, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> CatalogResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CatalogError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

impl CatalogService for FaultyCatalog<'_> {
    fn get_domain(&self, lookup: DomainLookup<'_>) -> CatalogResult<Domain> {
        self.enter()?;
        self.inner.get_domain(lookup)
    }

    fn list_objects(&self, query: &ObjectQuery<'_>, page: PageRequest) -> CatalogResult<Page<RemoteObject>> {
        self.enter()?;
        self.inner.list_objects(query, page)
    }

    fn list_versions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        page: PageRequest,
    ) -> CatalogResult<Page<RemoteVersion>> {
        self.enter()?;
        self.inner.list_versions(kind, object_id, page)
    }

    fn create_object(&self, kind: ObjectKind, name: &str, domain_id: &str) -> CatalogResult<RemoteObject> {
        self.enter()?;
        if self.reject_object.as_deref() == Some(name) {
            return Err(CatalogError::Rejected(format!("{} '{}' refused", kind, name)));
        }
        self.inner.create_object(kind, name, domain_id)
    }

    fn create_version(
        &self,
        object_id: &str,
        payload: &VersionPayload,
        version: &str,
    ) -> CatalogResult<RemoteVersion> {
        self.enter()?;
        self.inner.create_version(object_id, payload, version)
    }

    fn update_version(&self, version_id: &str, payload: &VersionPayload) -> CatalogResult<RemoteVersion> {
        self.enter()?;
        self.inner.update_version(version_id, payload)
    }
}
