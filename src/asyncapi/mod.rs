//! AsyncAPI Document Loading
//!
//! Parses JSON or YAML AsyncAPI 2.x documents into a `serde_json::Value`,
//! resolves local `$ref` pointers, and extracts channels with their
//! parameters and messages.

pub mod channel;

pub use channel::{Channel, Message, Operation, Parameter};

use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{ImportError, Result};

/// Supported major version of the AsyncAPI format
pub const SUPPORTED_MAJOR: &str = "2";

/// Nesting limit for `$ref` chains and inlined schemas
const MAX_REF_DEPTH: usize = 64;

/// A parsed AsyncAPI document
#[derive(Debug, Clone)]
pub struct SpecDocument {
    root: Value,
    version: String,
}

impl SpecDocument {
    /// Parse document text, JSON first and YAML otherwise
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(ImportError::MalformedSpec("document is empty".into()));
        }

        let root = match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(_) => {
                let yaml: serde_yaml::Value = serde_yaml::from_str(text)
                    .map_err(|e| ImportError::MalformedSpec(format!("failed to parse document: {}", e)))?;
                yaml_to_json(&yaml)?
            }
        };

        Self::from_value(root)
    }

    /// Read and parse a document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Wrap an already-parsed document
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(ImportError::MalformedSpec("document root must be an object".into()));
        }

        let version = root
            .get("asyncapi")
            .and_then(Value::as_str)
            .ok_or_else(|| ImportError::MalformedSpec("missing 'asyncapi' version field".into()))?
            .to_string();

        if version.split('.').next() != Some(SUPPORTED_MAJOR) {
            return Err(ImportError::MalformedSpec(format!(
                "unsupported asyncapi version {}",
                version
            )));
        }

        Ok(Self { root, version })
    }

    /// The `asyncapi` version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `info.title`, if present and non-blank
    pub fn title(&self) -> Option<&str> {
        self.root
            .pointer("/info/title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Raw document
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Every channel, ordered by address
    pub fn channels(&self) -> Result<Vec<Channel>> {
        let Some(channels) = self.root.get("channels") else {
            return Ok(Vec::new());
        };
        let channels = channels
            .as_object()
            .ok_or_else(|| ImportError::MalformedSpec("'channels' must be an object".into()))?;

        channels
            .iter()
            .map(|(address, item)| Channel::extract(self, address, item))
            .collect()
    }

    /// Follow `$ref` pointers until a non-reference value is reached
    pub fn resolve<'a>(&'a self, value: &'a Value) -> Result<&'a Value> {
        let mut current = value;
        for _ in 0..MAX_REF_DEPTH {
            match ref_target(current) {
                Some(reference) => current = self.lookup(reference)?,
                None => return Ok(current),
            }
        }
        Err(ImportError::MalformedSpec("$ref chain too deep".into()))
    }

    /// Resolve a local `#/...` reference
    pub fn lookup(&self, reference: &str) -> Result<&Value> {
        let pointer = reference.strip_prefix('#').ok_or_else(|| {
            ImportError::MalformedSpec(format!("unsupported non-local reference: {}", reference))
        })?;
        self.root
            .pointer(pointer)
            .ok_or_else(|| ImportError::MalformedSpec(format!("unresolvable reference: {}", reference)))
    }

    /// Copy of `value` with every nested local `$ref` replaced by its target.
    ///
    /// A reference back into a schema already being inlined is left in place.
    pub fn inline(&self, value: &Value) -> Result<Value> {
        let mut stack = HashSet::new();
        self.inline_at(value, &mut stack, 0)
    }

    fn inline_at<'a>(
        &'a self,
        value: &'a Value,
        stack: &mut HashSet<&'a str>,
        depth: usize,
    ) -> Result<Value> {
        if depth > MAX_REF_DEPTH {
            return Err(ImportError::MalformedSpec("schema nesting too deep".into()));
        }

        if let Some(reference) = ref_target(value) {
            if stack.contains(reference) {
                return Ok(value.clone());
            }
            let target = self.lookup(reference)?;
            stack.insert(reference);
            let inlined = self.inline_at(target, stack, depth + 1);
            stack.remove(reference);
            return inlined;
        }

        match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, child) in map {
                    out.insert(key.clone(), self.inline_at(child, stack, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.inline_at(item, stack, depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }
}

/// The `$ref` string of a reference object
pub(crate) fn ref_target(value: &Value) -> Option<&str> {
    value.get("$ref").and_then(Value::as_str)
}

/// Last path segment of a reference, e.g. `OrderCreated` for
/// `#/components/messages/OrderCreated`
pub(crate) fn last_ref_segment(reference: &str) -> Option<&str> {
    reference
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != "#")
}

/// Convert a YAML value to JSON; non-string keys become their YAML text
pub fn yaml_to_json(value: &serde_yaml::Value) -> Result<Value> {
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| ImportError::MalformedSpec(format!("invalid number in yaml: {}", f)))
            } else {
                Err(ImportError::MalformedSpec("unknown numeric type in yaml".into()))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)?.trim().to_string(),
                };
                obj.insert(key, yaml_to_json(v)?);
            }
            Ok(Value::Object(obj))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}
