//! Configuration management for the importer
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (asyncapi-import.toml)
//! - Environment variables (ASYNCAPI_IMPORT__*)
//!
//! ## Example config file (asyncapi-import.toml):
//! ```toml
//! [import]
//! domain = "orders"
//! version_strategy = "minor"
//! import_application = true
//! cascade_update = true
//! cascade_versioning = "inherit"
//! workers = 8
//!
//! [catalog]
//! path = "./catalog.json"
//! object_page_size = 10
//! version_page_size = 20
//!
//! [mapper]
//! include_publish_operations = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::version::{CascadeVersioning, VersionStrategy};

/// Main configuration for the importer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// Import behaviour
    #[serde(default)]
    pub import: ImportSection,

    /// Catalog store settings
    #[serde(default)]
    pub catalog: CatalogSection,

    /// Mapping settings
    #[serde(default)]
    pub mapper: MapperSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSection {
    /// Default target domain name
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub version_strategy: VersionStrategy,

    #[serde(default)]
    pub import_application: bool,

    #[serde(default)]
    pub import_event_api: bool,

    #[serde(default)]
    pub cascade_update: bool,

    #[serde(default)]
    pub cascade_versioning: CascadeVersioning,

    /// Worker pool size
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Path to the local catalog store
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,

    #[serde(default = "default_object_page_size")]
    pub object_page_size: usize,

    #[serde(default = "default_version_page_size")]
    pub version_page_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapperSection {
    /// Also map channels that only carry a publish operation
    #[serde(default)]
    pub include_publish_operations: bool,
}

// Default value functions
fn default_workers() -> usize {
    8
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.json")
}

fn default_object_page_size() -> usize {
    10
}

fn default_version_page_size() -> usize {
    20
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            domain: None,
            version_strategy: VersionStrategy::default(),
            import_application: false,
            import_event_api: false,
            cascade_update: false,
            cascade_versioning: CascadeVersioning::default(),
            workers: default_workers(),
        }
    }
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            object_page_size: default_object_page_size(),
            version_page_size: default_version_page_size(),
        }
    }
}

impl ImporterConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "asyncapi-import.toml",
            ".asyncapi-import.toml",
            "config/asyncapi-import.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "asyncapi", "asyncapi-import") {
            let xdg_config = config_dir.config_dir().join("asyncapi-import.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // ASYNCAPI_IMPORT__IMPORT__WORKERS=4
        builder = builder.add_source(
            Environment::with_prefix("ASYNCAPI_IMPORT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Catalog store path (resolves relative paths)
    pub fn catalog_path(&self) -> PathBuf {
        if self.catalog.path.is_absolute() {
            self.catalog.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.catalog.path)
        }
    }
}
