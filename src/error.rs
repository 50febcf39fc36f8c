//! Error types for the importer

use std::fmt;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::model::ObjectKind;

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Importer errors
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Malformed specification: {0}")]
    MalformedSpec(String),

    #[error("Invalid import set: {}", ViolationList(.0))]
    InvalidImportSet(Vec<Violation>),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Catalog error: {0}")]
    Catalog(CatalogError),

    #[error("Invalid semantic version '{value}': {source}")]
    SemVer {
        value: String,
        #[source]
        source: semver::Error,
    },

    #[error("{kind} '{name}' depends on unresolved {dependency}")]
    UnresolvedDependency {
        kind: ObjectKind,
        name: String,
        dependency: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl ImportError {
    /// Whether this error aborts the whole run rather than a single object.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImportError::MalformedSpec(_)
                | ImportError::InvalidImportSet(_)
                | ImportError::CatalogUnavailable(_)
                | ImportError::Io(_)
                | ImportError::Config(_)
                | ImportError::WorkerPool(_)
        )
    }
}

impl From<CatalogError> for ImportError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unavailable(msg) => ImportError::CatalogUnavailable(msg),
            other => ImportError::Catalog(other),
        }
    }
}

/// An object that breaks the one-version-per-object rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ObjectKind,
    pub name: String,
    pub versions: usize,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' has {} versions (expected exactly 1)",
            self.kind, self.name, self.versions
        )
    }
}

struct ViolationList<'a>(&'a [Violation]);

impl fmt::Display for ViolationList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}
