//! Delivery descriptors
//!
//! An event's topic pattern as an ordered list of literal and variable
//! levels. Variable levels may be bound to an enum version.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{ObjectKind, VersionRef};

/// Topic level separator
pub const LEVEL_SEPARATOR: char = '/';

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\{([^{}]+)\}$").unwrap())
}

/// Kind of destination an event is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    #[default]
    Topic,
}

/// Whether a topic level is fixed or bound at publish time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    Literal,
    Variable,
}

/// One level of a topic address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressLevel {
    pub name: String,
    pub kind: LevelKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_version: Option<VersionRef>,
}

impl AddressLevel {
    pub fn literal(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: LevelKind::Literal, enum_version: None }
    }

    pub fn variable(name: impl Into<String>, enum_version: Option<VersionRef>) -> Self {
        Self { name: name.into(), kind: LevelKind::Variable, enum_version }
    }
}

/// Structured form of a topic pattern.
///
/// Equality is positional: same address type, same level count, and each
/// level pair equal by name, kind and bound enum version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryDescriptor {
    pub address_type: AddressType,
    pub levels: Vec<AddressLevel>,
}

impl DeliveryDescriptor {
    /// Tokenize a topic pattern such as `order/{region}/created`.
    ///
    /// `enum_for` is asked for the enum version bound to each variable name.
    /// Empty levels (leading, trailing or doubled separators) are skipped.
    pub fn from_topic<F>(pattern: &str, mut enum_for: F) -> Self
    where
        F: FnMut(&str) -> Option<VersionRef>,
    {
        let levels = pattern
            .split(LEVEL_SEPARATOR)
            .filter(|level| !level.is_empty())
            .map(|level| match variable_pattern().captures(level) {
                Some(caps) => {
                    let name = &caps[1];
                    AddressLevel::variable(name, enum_for(name))
                }
                None => AddressLevel::literal(level),
            })
            .collect();

        Self { address_type: AddressType::Topic, levels }
    }

    /// Render back to a topic pattern
    pub fn topic(&self) -> String {
        self.levels
            .iter()
            .map(|level| match level.kind {
                LevelKind::Literal => level.name.clone(),
                LevelKind::Variable => format!("{{{}}}", level.name),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Enum version references bound to variable levels
    pub fn enum_refs(&self) -> impl Iterator<Item = &VersionRef> {
        self.levels.iter().filter_map(|level| level.enum_version.as_ref())
    }

    pub(crate) fn enum_refs_mut(&mut self) -> impl Iterator<Item = (ObjectKind, &mut VersionRef)> {
        self.levels
            .iter_mut()
            .filter_map(|level| level.enum_version.as_mut())
            .map(|r| (ObjectKind::Enum, r))
    }
}
