//! Canonical Model
//!
//! Objects and versions built from one specification document, mutated in
//! place by matching and importing. Each kind differs only in its version
//! content type, so objects are generic over [`VersionContent`].

pub mod address;
pub mod content;

pub use address::{AddressLevel, AddressType, DeliveryDescriptor, LevelKind};
pub use content::{
    ApplicationContent, EnumContent, EventApiContent, EventContent, SchemaContent, VersionContent,
    VersionPayload,
};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::error::Violation;

/// Kind of catalog object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Schema,
    Enum,
    Event,
    Application,
    EventApi,
}

impl ObjectKind {
    /// All kinds in dependency order
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Enum,
        ObjectKind::Schema,
        ObjectKind::Event,
        ObjectKind::Application,
        ObjectKind::EventApi,
    ];

    /// Scope in which object names are unique
    pub fn name_scope(&self) -> NameScope {
        match self {
            ObjectKind::Enum => NameScope::Account,
            _ => NameScope::Domain,
        }
    }

    /// Label used in log lines and summaries
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Schema => "schema",
            ObjectKind::Enum => "enum",
            ObjectKind::Event => "event",
            ObjectKind::Application => "application",
            ObjectKind::EventApi => "event API",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where an object name must be unique
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameScope {
    /// Unique within one application domain
    Domain,
    /// Unique across every domain of the account
    Account,
}

/// Lifecycle state of a catalog version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VersionState {
    #[default]
    Draft,
    Released,
    Deprecated,
    Retired,
}

impl VersionState {
    /// Only draft versions may be updated in place
    pub fn is_draft(&self) -> bool {
        matches!(self, VersionState::Draft)
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionState::Draft => "draft",
            VersionState::Released => "released",
            VersionState::Deprecated => "deprecated",
            VersionState::Retired => "retired",
        };
        f.write_str(s)
    }
}

/// Reference from one version to a version it depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionRef {
    /// A version of the canonical model, by object name and version index
    Local { name: String, index: usize },
    /// A version already in the catalog
    Catalog(String),
}

impl VersionRef {
    pub fn local(name: impl Into<String>, index: usize) -> Self {
        VersionRef::Local { name: name.into(), index }
    }

    pub fn catalog(id: impl Into<String>) -> Self {
        VersionRef::Catalog(id.into())
    }

    /// The catalog id, if this reference has been resolved
    pub fn catalog_id(&self) -> Option<&str> {
        match self {
            VersionRef::Catalog(id) => Some(id),
            VersionRef::Local { .. } => None,
        }
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRef::Local { name, index } => write!(f, "{}#{}", name, index),
            VersionRef::Catalog(id) => f.write_str(id),
        }
    }
}

/// Summary of the newest catalog version seen while matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestVersion {
    pub id: String,
    pub version: Option<String>,
    pub state: VersionState,
}

/// One version of a canonical object
#[derive(Debug, Clone)]
pub struct ObjectVersion<C> {
    pub content: C,
    /// Catalog id once matched, created or updated
    pub id: Option<String>,
    pub state: Option<VersionState>,
    pub version: Option<String>,
    /// A catalog version with equal content exists
    pub match_found: bool,
    /// Newest catalog version, recorded when no content match was found
    pub latest: Option<LatestVersion>,
}

impl<C> ObjectVersion<C> {
    pub fn new(content: C) -> Self {
        Self {
            content,
            id: None,
            state: None,
            version: None,
            match_found: false,
            latest: None,
        }
    }

    pub fn latest_in_draft(&self) -> bool {
        self.latest.as_ref().map(|l| l.state.is_draft()).unwrap_or(false)
    }
}

/// A canonical object of any kind
#[derive(Debug, Clone)]
pub struct CatalogObject<C> {
    pub name: String,
    /// Catalog id once matched or created
    pub id: Option<String>,
    pub domain_id: Option<String>,
    pub shared: bool,
    /// An object with this name exists in the catalog
    pub match_found: bool,
    pub versions: Vec<ObjectVersion<C>>,
    /// Increment baseline
    pub latest_version: Option<String>,
    /// Reason this object was dropped from the run
    pub failure: Option<String>,
}

impl<C: VersionContent> CatalogObject<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            domain_id: None,
            shared: false,
            match_found: false,
            versions: Vec::new(),
            latest_version: None,
            failure: None,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        C::KIND
    }

    /// Index of a version with equal content, adding one if none exists
    pub fn intern_version(&mut self, content: C) -> usize {
        if let Some(index) = self.versions.iter().position(|v| v.content.same_content(&content)) {
            return index;
        }
        self.versions.push(ObjectVersion::new(content));
        self.versions.len() - 1
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }
}

/// Objects of one kind, by name
pub type ObjectMap<C> = BTreeMap<String, CatalogObject<C>>;

/// Every canonical object derived from one specification document
#[derive(Debug, Clone, Default)]
pub struct CanonicalModel {
    pub enums: ObjectMap<EnumContent>,
    pub schemas: ObjectMap<SchemaContent>,
    pub events: ObjectMap<EventContent>,
    pub applications: ObjectMap<ApplicationContent>,
    pub event_apis: ObjectMap<EventApiContent>,
}

impl CanonicalModel {
    /// Check that every object carries exactly one version.
    pub fn validate(&self) -> crate::error::Result<()> {
        let mut violations = Vec::new();
        collect_violations(&self.enums, &mut violations);
        collect_violations(&self.schemas, &mut violations);
        collect_violations(&self.events, &mut violations);
        collect_violations(&self.applications, &mut violations);
        collect_violations(&self.event_apis, &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(crate::error::ImportError::InvalidImportSet(violations))
        }
    }

    /// Stamp the target domain on every object
    pub fn assign_domain(&mut self, domain_id: &str) {
        fn stamp<C>(objects: &mut ObjectMap<C>, domain_id: &str) {
            for object in objects.values_mut() {
                object.domain_id = Some(domain_id.to_string());
            }
        }
        stamp(&mut self.enums, domain_id);
        stamp(&mut self.schemas, domain_id);
        stamp(&mut self.events, domain_id);
        stamp(&mut self.applications, domain_id);
        stamp(&mut self.event_apis, domain_id);
    }

    /// Object count for one kind
    pub fn count(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Enum => self.enums.len(),
            ObjectKind::Schema => self.schemas.len(),
            ObjectKind::Event => self.events.len(),
            ObjectKind::Application => self.applications.len(),
            ObjectKind::EventApi => self.event_apis.len(),
        }
    }

    /// Catalog ids of every version that has one, keyed by local reference.
    /// Failed objects are left out.
    pub fn local_ids(&self) -> LocalIds {
        let mut ids = LocalIds::new();
        collect_ids(&self.enums, &mut ids);
        collect_ids(&self.schemas, &mut ids);
        collect_ids(&self.events, &mut ids);
        collect_ids(&self.applications, &mut ids);
        collect_ids(&self.event_apis, &mut ids);
        ids
    }

    /// Catalog ids of every version of one kind, after import
    pub fn version_ids(&self, kind: ObjectKind) -> HashSet<String> {
        fn ids<C>(objects: &ObjectMap<C>) -> HashSet<String> {
            objects
                .values()
                .flat_map(|o| o.versions.iter())
                .filter_map(|v| v.id.clone())
                .collect()
        }
        match kind {
            ObjectKind::Enum => ids(&self.enums),
            ObjectKind::Schema => ids(&self.schemas),
            ObjectKind::Event => ids(&self.events),
            ObjectKind::Application => ids(&self.applications),
            ObjectKind::EventApi => ids(&self.event_apis),
        }
    }
}

/// Local version reference to catalog id
pub type LocalIds = HashMap<(ObjectKind, VersionRef), String>;

fn collect_ids<C: VersionContent>(objects: &ObjectMap<C>, out: &mut LocalIds) {
    for object in objects.values().filter(|o| !o.is_failed()) {
        for (index, version) in object.versions.iter().enumerate() {
            if let Some(id) = &version.id {
                out.insert((C::KIND, VersionRef::local(&object.name, index)), id.clone());
            }
        }
    }
}

fn collect_violations<C: VersionContent>(objects: &ObjectMap<C>, out: &mut Vec<Violation>) {
    for object in objects.values() {
        if object.versions.len() != 1 {
            out.push(Violation {
                kind: C::KIND,
                name: object.name.clone(),
                versions: object.versions.len(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;

    #[test]
    fn test_intern_version_deduplicates_by_content() {
        let mut object: CatalogObject<EnumContent> = CatalogObject::new("region");
        let a = object.intern_version(EnumContent::new(["US", "EU"]));
        let b = object.intern_version(EnumContent::new(["EU", "US"]));
        let c = object.intern_version(EnumContent::new(["US", "EU", "APAC"]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(object.versions.len(), 2);
    }

    #[test]
    fn test_validate_rejects_multiple_versions() {
        let mut model = CanonicalModel::default();
        let mut schema: CatalogObject<SchemaContent> = CatalogObject::new("Order");
        schema.intern_version(SchemaContent::parse(r#"{"type":"object"}"#).unwrap());
        schema.intern_version(SchemaContent::parse(r#"{"type":"string"}"#).unwrap());
        model.schemas.insert("Order".into(), schema);

        match model.validate() {
            Err(ImportError::InvalidImportSet(violations)) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].kind, ObjectKind::Schema);
                assert_eq!(violations[0].versions, 2);
            }
            other => panic!("expected InvalidImportSet, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_versionless_object() {
        let mut model = CanonicalModel::default();
        model.applications.insert("App".into(), CatalogObject::new("App"));
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_enum_names_are_account_scoped() {
        assert_eq!(ObjectKind::Enum.name_scope(), NameScope::Account);
        assert_eq!(ObjectKind::Event.name_scope(), NameScope::Domain);
    }

    #[test]
    fn test_latest_in_draft() {
        let mut version = ObjectVersion::new(EnumContent::new(["A"]));
        assert!(!version.latest_in_draft());
        version.latest = Some(LatestVersion {
            id: "v1".into(),
            version: Some("1.0.0".into()),
            state: VersionState::Draft,
        });
        assert!(version.latest_in_draft());
    }
}
