//! Run summary
//!
//! Per-kind counts of created, updated and reused versions, cascade
//! re-versions, and every object skipped with its reason.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::ObjectKind;
use crate::reconcile::{CascadeAction, ImportOutcome, VersionAction};

/// An object dropped from the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedObject {
    pub name: String,
    /// Stage the object failed in
    pub stage: String,
    pub reason: String,
}

/// Counts for one object kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSummary {
    pub objects_created: usize,
    pub versions_created: usize,
    pub versions_updated: usize,
    pub versions_reused: usize,
    pub cascade_updated: usize,
    pub cascade_created: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedObject>,
}

impl KindSummary {
    fn is_empty(&self) -> bool {
        *self == KindSummary::default()
    }
}

/// Result of one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub kinds: BTreeMap<ObjectKind, KindSummary>,
}

impl ImportSummary {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into(), domain: None, kinds: BTreeMap::new() }
    }

    /// Counts for a kind; zero when nothing happened to it
    pub fn kind(&self, kind: ObjectKind) -> KindSummary {
        self.kinds.get(&kind).cloned().unwrap_or_default()
    }

    fn kind_mut(&mut self, kind: ObjectKind) -> &mut KindSummary {
        self.kinds.entry(kind).or_default()
    }

    pub fn record_import(&mut self, kind: ObjectKind, outcome: &ImportOutcome) {
        let counts = self.kind_mut(kind);
        if outcome.object_created {
            counts.objects_created += 1;
        }
        for action in &outcome.actions {
            match action {
                VersionAction::Reused => counts.versions_reused += 1,
                VersionAction::Created => counts.versions_created += 1,
                VersionAction::Updated => counts.versions_updated += 1,
            }
        }
    }

    pub fn record_cascade(&mut self, kind: ObjectKind, action: CascadeAction) {
        let counts = self.kind_mut(kind);
        match action {
            CascadeAction::Updated => counts.cascade_updated += 1,
            CascadeAction::Created => counts.cascade_created += 1,
        }
    }

    pub fn record_skip(&mut self, kind: ObjectKind, name: &str, stage: &str, reason: impl Into<String>) {
        self.kind_mut(kind).skipped.push(SkippedObject {
            name: name.to_string(),
            stage: stage.to_string(),
            reason: reason.into(),
        });
    }

    /// Objects created across all kinds
    pub fn objects_created(&self) -> usize {
        self.kinds.values().map(|k| k.objects_created).sum()
    }

    /// Versions created or updated across all kinds, cascade included
    pub fn versions_changed(&self) -> usize {
        self.kinds
            .values()
            .map(|k| k.versions_created + k.versions_updated + k.cascade_created + k.cascade_updated)
            .sum()
    }

    /// Every skipped object with its kind
    pub fn skipped(&self) -> impl Iterator<Item = (ObjectKind, &SkippedObject)> {
        self.kinds
            .iter()
            .flat_map(|(kind, counts)| counts.skipped.iter().map(move |s| (*kind, s)))
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => writeln!(f, "Import {} into domain '{}'", self.run_id, domain)?,
            None => writeln!(f, "Import {}", self.run_id)?,
        }

        for kind in ObjectKind::ALL {
            let counts = self.kind(kind);
            if counts.is_empty() {
                continue;
            }
            writeln!(
                f,
                "  {:<12} objects created: {}, versions created: {}, updated: {}, reused: {}",
                kind.label(),
                counts.objects_created,
                counts.versions_created,
                counts.versions_updated,
                counts.versions_reused
            )?;
            if counts.cascade_created + counts.cascade_updated > 0 {
                writeln!(
                    f,
                    "  {:<12} cascade versions created: {}, updated: {}",
                    "",
                    counts.cascade_created,
                    counts.cascade_updated
                )?;
            }
        }

        for (kind, skipped) in self.skipped() {
            writeln!(f, "  skipped {} '{}' ({}): {}", kind, skipped.name, skipped.stage, skipped.reason)?;
        }
        Ok(())
    }
}
