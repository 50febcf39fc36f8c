//! Remapping tables
//!
//! Superseded version id to replacement id, one table per dependency kind.
//! Workers write concurrently within a stage; later stages read after the
//! stage barrier.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::ObjectKind;

/// Thread-safe map from a superseded version id to its replacement
#[derive(Debug, Default)]
pub struct RemapTable {
    entries: RwLock<HashMap<String, String>>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `old` is replaced by `new`
    pub fn record(&self, old: impl Into<String>, new: impl Into<String>) {
        self.entries.write().insert(old.into(), new.into());
    }

    /// Replacement for `old`, if any
    pub fn get(&self, old: &str) -> Option<String> {
        self.entries.read().get(old).cloned()
    }

    pub fn contains_key(&self, old: &str) -> bool {
        self.entries.read().contains_key(old)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// The schema, enum and event tables of one run
#[derive(Debug, Default)]
pub struct RemapTables {
    pub schemas: RemapTable,
    pub enums: RemapTable,
    pub events: RemapTable,
}

impl RemapTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for a kind; applications and event APIs have none since
    /// nothing depends on them
    pub fn table(&self, kind: ObjectKind) -> Option<&RemapTable> {
        match kind {
            ObjectKind::Schema => Some(&self.schemas),
            ObjectKind::Enum => Some(&self.enums),
            ObjectKind::Event => Some(&self.events),
            ObjectKind::Application | ObjectKind::EventApi => None,
        }
    }

    /// Replacement for a version id of the given kind
    pub fn lookup(&self, kind: ObjectKind, old: &str) -> Option<String> {
        self.table(kind).and_then(|t| t.get(old))
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.enums.is_empty() && self.events.is_empty()
    }
}
