//! In-process catalog store
//!
//! A [`CatalogService`] over a local store, persisted as one JSON file.
//! New versions start in draft; only drafts may be updated.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    CatalogError, CatalogResult, CatalogService, Domain, DomainLookup, ObjectQuery, Page,
    PageRequest, RemoteObject, RemoteVersion,
};
use crate::error::Result;
use crate::model::{NameScope, ObjectKind, VersionPayload, VersionRef, VersionState};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Store {
    next_id: u64,
    domains: Vec<Domain>,
    objects: BTreeMap<String, StoredObject>,
    versions: BTreeMap<String, StoredVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredObject {
    object: RemoteObject,
    /// Version ids, oldest first
    version_ids: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVersion {
    version: RemoteVersion,
    kind: ObjectKind,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Store {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:06}", prefix, self.next_id)
    }

    fn object(&self, id: &str) -> CatalogResult<&StoredObject> {
        self.objects
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(format!("object {}", id)))
    }

    /// Reject payloads that point at local or unknown versions
    fn check_references(&self, payload: &VersionPayload) -> CatalogResult<()> {
        for (kind, reference) in payload.dependencies() {
            match reference {
                VersionRef::Local { .. } => {
                    return Err(CatalogError::Rejected(format!(
                        "unresolved local {} reference {}",
                        kind, reference
                    )))
                }
                VersionRef::Catalog(id) => match self.versions.get(id) {
                    Some(stored) if stored.kind == kind => {}
                    _ => {
                        return Err(CatalogError::Rejected(format!(
                            "unknown {} version {}",
                            kind, id
                        )))
                    }
                },
            }
        }
        Ok(())
    }
}

fn id_prefix(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Schema => "sch",
        ObjectKind::Enum => "enm",
        ObjectKind::Event => "evt",
        ObjectKind::Application => "app",
        ObjectKind::EventApi => "api",
    }
}

/// File-backed catalog
pub struct MemoryCatalog {
    path: Option<PathBuf>,
    store: RwLock<Store>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// An empty catalog with no backing file
    pub fn new() -> Self {
        Self { path: None, store: RwLock::new(Store::default()) }
    }

    /// Open a catalog file, starting empty if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Store::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Store::default()
        };

        Ok(Self { path: Some(path), store: RwLock::new(store) })
    }

    /// Path of the backing file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the store to its backing file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&*self.store.read())?;
        fs::write(path, content)?;
        debug!(path = %path.display(), "Saved catalog");
        Ok(())
    }

    /// Register an application domain
    pub fn add_domain(&self, name: &str) -> CatalogResult<Domain> {
        let mut store = self.store.write();
        if store.domains.iter().any(|d| d.name == name) {
            return Err(CatalogError::Rejected(format!("domain '{}' already exists", name)));
        }
        let domain = Domain { id: store.allocate("dom"), name: name.to_string() };
        store.domains.push(domain.clone());
        Ok(domain)
    }

    /// Move a version to another lifecycle state
    pub fn set_state(&self, version_id: &str, state: VersionState) -> CatalogResult<RemoteVersion> {
        let mut store = self.store.write();
        let stored = store
            .versions
            .get_mut(version_id)
            .ok_or_else(|| CatalogError::NotFound(format!("version {}", version_id)))?;
        stored.version.state = state;
        stored.updated_at = Utc::now();
        Ok(stored.version.clone())
    }

    /// Every version of an object, oldest first
    pub fn versions_of(&self, object_id: &str) -> Vec<RemoteVersion> {
        let store = self.store.read();
        store
            .objects
            .get(object_id)
            .map(|object| {
                object
                    .version_ids
                    .iter()
                    .filter_map(|id| store.versions.get(id))
                    .map(|v| v.version.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A single version by id
    pub fn version(&self, version_id: &str) -> Option<RemoteVersion> {
        self.store.read().versions.get(version_id).map(|v| v.version.clone())
    }

    /// First object of `kind` named `name`, optionally within a domain
    pub fn object_by_name(
        &self,
        kind: ObjectKind,
        domain_id: Option<&str>,
        name: &str,
    ) -> Option<RemoteObject> {
        self.store
            .read()
            .objects
            .values()
            .map(|o| &o.object)
            .find(|o| {
                o.kind == kind && o.name == name && domain_id.map_or(true, |d| o.domain_id == d)
            })
            .cloned()
    }

    /// Number of objects of a kind
    pub fn object_count(&self, kind: ObjectKind) -> usize {
        self.store.read().objects.values().filter(|o| o.object.kind == kind).count()
    }

    /// Number of versions of a kind
    pub fn version_count(&self, kind: ObjectKind) -> usize {
        self.store.read().versions.values().filter(|v| v.kind == kind).count()
    }
}

impl CatalogService for MemoryCatalog {
    fn get_domain(&self, lookup: DomainLookup<'_>) -> CatalogResult<Domain> {
        let store = self.store.read();
        let (found, key) = match lookup {
            DomainLookup::Name(name) => (store.domains.iter().find(|d| d.name == name), name),
            DomainLookup::Id(id) => (store.domains.iter().find(|d| d.id == id), id),
        };
        found.cloned().ok_or_else(|| {
            CatalogError::NotFound(format!("application domain '{}'", key))
        })
    }

    fn list_objects(
        &self,
        query: &ObjectQuery<'_>,
        page: PageRequest,
    ) -> CatalogResult<Page<RemoteObject>> {
        let store = self.store.read();
        let matches: Vec<RemoteObject> = store
            .objects
            .values()
            .map(|o| &o.object)
            .filter(|o| o.kind == query.kind)
            .filter(|o| query.domain_id.map_or(true, |d| o.domain_id == d))
            .filter(|o| query.name.map_or(true, |n| o.name == n))
            .cloned()
            .collect();
        Ok(Page::slice(matches, page))
    }

    fn list_versions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        page: PageRequest,
    ) -> CatalogResult<Page<RemoteVersion>> {
        let store = self.store.read();
        let object = store
            .objects
            .get(object_id)
            .filter(|o| o.object.kind == kind)
            .ok_or_else(|| CatalogError::NotFound(format!("{} {}", kind, object_id)))?;

        let newest_first: Vec<RemoteVersion> = object
            .version_ids
            .iter()
            .rev()
            .filter_map(|id| store.versions.get(id))
            .map(|v| v.version.clone())
            .collect();
        Ok(Page::slice(newest_first, page))
    }

    fn create_object(&self, kind: ObjectKind, name: &str, domain_id: &str) -> CatalogResult<RemoteObject> {
        let mut store = self.store.write();
        if !store.domains.iter().any(|d| d.id == domain_id) {
            return Err(CatalogError::Rejected(format!("unknown application domain {}", domain_id)));
        }

        let clash = store.objects.values().map(|o| &o.object).any(|o| {
            o.kind == kind
                && o.name == name
                && (kind.name_scope() == NameScope::Account || o.domain_id == domain_id)
        });
        if clash {
            return Err(CatalogError::Rejected(format!("{} '{}' already exists", kind, name)));
        }

        let object = RemoteObject {
            id: store.allocate(id_prefix(kind)),
            name: name.to_string(),
            kind,
            domain_id: domain_id.to_string(),
            shared: false,
        };
        store.objects.insert(
            object.id.clone(),
            StoredObject { object: object.clone(), version_ids: Vec::new(), created_at: Utc::now() },
        );
        Ok(object)
    }

    fn create_version(
        &self,
        object_id: &str,
        payload: &VersionPayload,
        version: &str,
    ) -> CatalogResult<RemoteVersion> {
        let mut store = self.store.write();
        let kind = store.object(object_id)?.object.kind;
        if kind != payload.kind() {
            return Err(CatalogError::Rejected(format!(
                "{} payload sent to {} {}",
                payload.kind(),
                kind,
                object_id
            )));
        }
        store.check_references(payload)?;

        let now = Utc::now();
        let id = store.allocate("ver");
        let created = RemoteVersion {
            id: id.clone(),
            object_id: object_id.to_string(),
            version: Some(version.to_string()),
            state: VersionState::Draft,
            payload: payload.clone(),
        };
        store.versions.insert(
            id.clone(),
            StoredVersion { version: created.clone(), kind, created_at: now, updated_at: now },
        );
        if let Some(object) = store.objects.get_mut(object_id) {
            object.version_ids.push(id);
        }
        Ok(created)
    }

    fn update_version(&self, version_id: &str, payload: &VersionPayload) -> CatalogResult<RemoteVersion> {
        let mut store = self.store.write();
        store.check_references(payload)?;

        let stored = store
            .versions
            .get_mut(version_id)
            .ok_or_else(|| CatalogError::NotFound(format!("{} version {}", payload.kind(), version_id)))?;
        if stored.kind != payload.kind() {
            return Err(CatalogError::Rejected(format!(
                "{} payload sent to {} version {}",
                payload.kind(),
                stored.kind,
                version_id
            )));
        }
        if !stored.version.state.is_draft() {
            return Err(CatalogError::Rejected(format!(
                "version {} is {} and cannot be updated",
                version_id, stored.version.state
            )));
        }

        stored.version.payload = payload.clone();
        stored.updated_at = Utc::now();
        Ok(stored.version.clone())
    }
}
