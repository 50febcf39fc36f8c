//! Catalog Service
//!
//! Read, create and update access to the versioned event catalog. The
//! reconciler only talks to the catalog through [`CatalogService`]; every
//! call may block on I/O.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ObjectKind, VersionPayload, VersionState};

/// Result type for catalog calls
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Catalog errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog service unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous lookup: {count} {kind} objects named '{name}'")]
    Ambiguous {
        kind: ObjectKind,
        name: String,
        count: usize,
    },

    #[error("{kind} '{name}' belongs to domain {found}, not {expected}")]
    ForeignDomain {
        kind: ObjectKind,
        name: String,
        found: String,
        expected: String,
    },

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// An application domain, the container scope of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub name: String,
}

/// How to find a domain
#[derive(Debug, Clone, Copy)]
pub enum DomainLookup<'a> {
    Name(&'a str),
    Id(&'a str),
}

/// Filter for object listings
#[derive(Debug, Clone, Copy)]
pub struct ObjectQuery<'a> {
    pub kind: ObjectKind,
    pub domain_id: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> ObjectQuery<'a> {
    pub fn kind(kind: ObjectKind) -> Self {
        Self { kind, domain_id: None, name: None }
    }

    pub fn in_domain(mut self, domain_id: &'a str) -> Self {
        self.domain_id = Some(domain_id);
        self
    }

    pub fn named(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }
}

/// One page of a listing request; pages are numbered from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { page: 1, size }
    }

    pub fn next(self) -> Self {
        Self { page: self.page + 1, ..self }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    /// Cut the requested page out of a full result list
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let size = request.size.max(1);
        let page = request.page.max(1);
        let total_items = all.len();
        let total_pages = total_items.div_ceil(size);
        let items = all.into_iter().skip((page - 1) * size).take(size).collect();
        Self { items, page, total_pages, total_items }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// An object as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    pub kind: ObjectKind,
    pub domain_id: String,
    #[serde(default)]
    pub shared: bool,
}

/// A version as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVersion {
    pub id: String,
    pub object_id: String,
    pub version: Option<String>,
    pub state: VersionState,
    pub payload: VersionPayload,
}

/// Access to the remote catalog
pub trait CatalogService: Send + Sync {
    /// Look up a domain by name or id
    fn get_domain(&self, lookup: DomainLookup<'_>) -> CatalogResult<Domain>;

    /// List objects matching `query`
    fn list_objects(
        &self,
        query: &ObjectQuery<'_>,
        page: PageRequest,
    ) -> CatalogResult<Page<RemoteObject>>;

    /// List versions of one object, newest first
    fn list_versions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        page: PageRequest,
    ) -> CatalogResult<Page<RemoteVersion>>;

    fn create_object(&self, kind: ObjectKind, name: &str, domain_id: &str) -> CatalogResult<RemoteObject>;

    /// Create a version of `object_id` carrying `version` as its version string
    fn create_version(
        &self,
        object_id: &str,
        payload: &VersionPayload,
        version: &str,
    ) -> CatalogResult<RemoteVersion>;

    /// Replace the content of a draft version
    fn update_version(&self, version_id: &str, payload: &VersionPayload) -> CatalogResult<RemoteVersion>;

    /// Exact-name lookup; more than one match is an error
    fn find_object(&self, query: &ObjectQuery<'_>, page_size: usize) -> CatalogResult<Option<RemoteObject>> {
        let page = self.list_objects(query, PageRequest::first(page_size))?;
        if page.total_items > 1 || page.items.len() > 1 {
            return Err(CatalogError::Ambiguous {
                kind: query.kind,
                name: query.name.unwrap_or_default().to_string(),
                count: page.total_items.max(page.items.len()),
            });
        }
        Ok(page.items.into_iter().next())
    }

    /// Every object matching `query`, across all pages
    fn all_objects(&self, query: &ObjectQuery<'_>, page_size: usize) -> CatalogResult<Vec<RemoteObject>> {
        let mut request = PageRequest::first(page_size);
        let mut objects = Vec::new();
        loop {
            let page = self.list_objects(query, request)?;
            let more = page.has_next();
            objects.extend(page.items);
            if !more {
                return Ok(objects);
            }
            request = request.next();
        }
    }

    /// The newest version of an object, if it has any
    fn latest_version(&self, kind: ObjectKind, object_id: &str) -> CatalogResult<Option<RemoteVersion>> {
        let page = self.list_versions(kind, object_id, PageRequest::first(1))?;
        Ok(page.items.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slice() {
        let page = Page::slice((1..=25).collect::<Vec<_>>(), PageRequest { page: 3, size: 10 });
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 25);
        assert!(!page.has_next());

        let first = Page::slice((1..=25).collect::<Vec<_>>(), PageRequest::first(10));
        assert!(first.has_next());
    }

    #[test]
    fn test_empty_page() {
        let page: Page<u32> = Page::slice(Vec::new(), PageRequest::first(10));
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next());
    }

    #[test]
    fn test_object_query_builder() {
        let query = ObjectQuery::kind(ObjectKind::Event).in_domain("d1").named("OrderCreated");
        assert_eq!(query.domain_id, Some("d1"));
        assert_eq!(query.name, Some("OrderCreated"));
    }
}
