//! Version content and content identity
//!
//! Each object kind carries its own content type. [`VersionContent`] is the
//! per-kind capability record the reconciler is generic over: the kind tag,
//! the content-equality rule, conversion to and from the wire payload, and
//! access to the version references a content holds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::{DeliveryDescriptor, ObjectKind, VersionRef};
use crate::digest::ContentDigest;
use crate::error::{ImportError, Result};

/// Content of one version of some object kind
pub trait VersionContent: Clone + fmt::Debug + Send + Sync + 'static {
    /// Kind of object this content belongs to
    const KIND: ObjectKind;

    /// Whether two versions represent the same content
    fn same_content(&self, other: &Self) -> bool;

    /// Wire form sent to the catalog
    fn to_payload(&self) -> VersionPayload;

    /// Read content back from the wire form; `None` when the kind differs
    fn from_payload(payload: VersionPayload) -> Option<Self>;

    /// References to versions this content depends on, with their kind
    fn dependencies(&self) -> Vec<(ObjectKind, &VersionRef)> {
        Vec::new()
    }

    /// Rebuild this content with references replaced by `f`.
    ///
    /// Returns `None` when `f` replaced nothing.
    fn rewrite_refs(
        &self,
        _f: &mut dyn FnMut(ObjectKind, &VersionRef) -> Option<VersionRef>,
    ) -> Option<Self> {
        None
    }
}

/// Version content as exchanged with the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionPayload {
    Schema(SchemaContent),
    Enum(EnumContent),
    Event(EventContent),
    Application(ApplicationContent),
    EventApi(EventApiContent),
}

impl VersionPayload {
    pub fn kind(&self) -> ObjectKind {
        match self {
            VersionPayload::Schema(_) => ObjectKind::Schema,
            VersionPayload::Enum(_) => ObjectKind::Enum,
            VersionPayload::Event(_) => ObjectKind::Event,
            VersionPayload::Application(_) => ObjectKind::Application,
            VersionPayload::EventApi(_) => ObjectKind::EventApi,
        }
    }

    /// Every version reference held by this payload
    pub fn dependencies(&self) -> Vec<(ObjectKind, &VersionRef)> {
        match self {
            VersionPayload::Schema(c) => c.dependencies(),
            VersionPayload::Enum(c) => c.dependencies(),
            VersionPayload::Event(c) => c.dependencies(),
            VersionPayload::Application(c) => c.dependencies(),
            VersionPayload::EventApi(c) => c.dependencies(),
        }
    }
}

// --- Schema ---

/// JSON schema text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaContent {
    pub content: String,
}

impl SchemaContent {
    /// Parse schema text and store it in canonical compact form
    pub fn parse(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ImportError::MalformedSpec(format!("schema is not valid JSON: {}", e)))?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        Self { content: value.to_string() }
    }

    /// Canonical compact text: whitespace removed and object keys sorted.
    /// Text that is not JSON is returned trimmed.
    pub fn canonical(&self) -> String {
        match serde_json::from_str::<serde_json::Value>(&self.content) {
            Ok(value) => value.to_string(),
            Err(_) => self.content.trim().to_string(),
        }
    }

    /// Indented text, as uploaded to the catalog
    pub fn pretty(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.content)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok())
            .unwrap_or_else(|| self.content.clone())
    }

    pub fn digest(&self) -> ContentDigest {
        ContentDigest::of(&self.canonical())
    }
}

impl VersionContent for SchemaContent {
    const KIND: ObjectKind = ObjectKind::Schema;

    fn same_content(&self, other: &Self) -> bool {
        self.content == other.content || self.canonical() == other.canonical()
    }

    fn to_payload(&self) -> VersionPayload {
        VersionPayload::Schema(SchemaContent { content: self.pretty() })
    }

    fn from_payload(payload: VersionPayload) -> Option<Self> {
        match payload {
            VersionPayload::Schema(content) => Some(content),
            _ => None,
        }
    }
}

// --- Enum ---

/// Enumerated values; order and repetition do not affect identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumContent {
    pub values: Vec<String>,
}

impl EnumContent {
    /// Build from values, dropping repeats but keeping first-seen order
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let values = values
            .into_iter()
            .map(Into::into)
            .filter(|v: &String| seen.insert(v.clone()))
            .collect();
        Self { values }
    }

    pub fn value_set(&self) -> BTreeSet<&str> {
        self.values.iter().map(String::as_str).collect()
    }
}

impl VersionContent for EnumContent {
    const KIND: ObjectKind = ObjectKind::Enum;

    fn same_content(&self, other: &Self) -> bool {
        self.value_set() == other.value_set()
    }

    fn to_payload(&self) -> VersionPayload {
        VersionPayload::Enum(self.clone())
    }

    fn from_payload(payload: VersionPayload) -> Option<Self> {
        match payload {
            VersionPayload::Enum(content) => Some(content),
            _ => None,
        }
    }
}

// --- Event ---

/// Schema version reference plus delivery descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<VersionRef>,
    pub delivery: DeliveryDescriptor,
}

impl VersionContent for EventContent {
    const KIND: ObjectKind = ObjectKind::Event;

    fn same_content(&self, other: &Self) -> bool {
        self.schema_version == other.schema_version && self.delivery == other.delivery
    }

    fn to_payload(&self) -> VersionPayload {
        VersionPayload::Event(self.clone())
    }

    fn from_payload(payload: VersionPayload) -> Option<Self> {
        match payload {
            VersionPayload::Event(content) => Some(content),
            _ => None,
        }
    }

    fn dependencies(&self) -> Vec<(ObjectKind, &VersionRef)> {
        self.schema_version
            .iter()
            .map(|r| (ObjectKind::Schema, r))
            .chain(self.delivery.enum_refs().map(|r| (ObjectKind::Enum, r)))
            .collect()
    }

    fn rewrite_refs(
        &self,
        f: &mut dyn FnMut(ObjectKind, &VersionRef) -> Option<VersionRef>,
    ) -> Option<Self> {
        let mut rewritten = self.clone();
        let mut changed = false;
        let refs = rewritten
            .schema_version
            .iter_mut()
            .map(|r| (ObjectKind::Schema, r))
            .chain(rewritten.delivery.enum_refs_mut());
        for (kind, r) in refs {
            if let Some(replacement) = f(kind, r) {
                changed |= replacement != *r;
                *r = replacement;
            }
        }
        changed.then_some(rewritten)
    }
}

// --- Application / Event API ---

macro_rules! event_membership {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct $name {
            /// Event versions produced
            #[serde(default)]
            pub produced: BTreeSet<VersionRef>,
            /// Event versions consumed
            #[serde(default)]
            pub consumed: BTreeSet<VersionRef>,
        }

        impl VersionContent for $name {
            const KIND: ObjectKind = $kind;

            fn same_content(&self, other: &Self) -> bool {
                self.produced == other.produced && self.consumed == other.consumed
            }

            fn to_payload(&self) -> VersionPayload {
                VersionPayload::$variant(self.clone())
            }

            fn from_payload(payload: VersionPayload) -> Option<Self> {
                match payload {
                    VersionPayload::$variant(content) => Some(content),
                    _ => None,
                }
            }

            fn dependencies(&self) -> Vec<(ObjectKind, &VersionRef)> {
                self.produced
                    .iter()
                    .chain(self.consumed.iter())
                    .map(|r| (ObjectKind::Event, r))
                    .collect()
            }

            fn rewrite_refs(
                &self,
                f: &mut dyn FnMut(ObjectKind, &VersionRef) -> Option<VersionRef>,
            ) -> Option<Self> {
                let mut changed = false;
                let mut apply = |r: &VersionRef| match f(ObjectKind::Event, r) {
                    Some(replacement) => {
                        changed |= replacement != *r;
                        replacement
                    }
                    None => r.clone(),
                };
                let produced = self.produced.iter().map(&mut apply).collect();
                let consumed = self.consumed.iter().map(&mut apply).collect();
                changed.then_some(Self { produced, consumed })
            }
        }
    };
}

event_membership!(
    /// Events an application produces and consumes
    ApplicationContent,
    ObjectKind::Application,
    Application
);

event_membership!(
    /// Events an event API exposes, seen from its consumers
    EventApiContent,
    ObjectKind::EventApi,
    EventApi
);
