//! AsyncAPI Importer
//!
//! Reconciles an AsyncAPI document against a versioned event catalog of
//! applications, events, schemas, enumerations and event APIs.
//!
//! ## Pipeline
//!
//! ```text
//! spec document ──> asyncapi::SpecDocument
//!                       │
//!                       ▼
//!                 mapper::DomainMapper ──> model::CanonicalModel
//!                                              │
//!            ┌─────────────────────────────────┘
//!            ▼
//!   reconcile::ImportOperator
//!     ├── match + import   enums, schemas
//!     ├── resolve refs     events -> schema/enum version ids
//!     ├── match + import   events
//!     ├── match + import   application / event API (optional)
//!     └── cascade          events, applications, event APIs (optional)
//!            │
//!            ▼
//!   report::ImportSummary
//! ```
//!
//! The catalog is reached through the [`catalog::CatalogService`] trait;
//! [`catalog::memory::MemoryCatalog`] is a file-backed implementation.

pub mod asyncapi;
pub mod catalog;
pub mod config;
pub mod digest;
pub mod error;
pub mod mapper;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod version;

pub use catalog::{CatalogError, CatalogService};
pub use config::ImporterConfig;
pub use error::{ImportError, Result};
pub use mapper::DomainMapper;
pub use model::{CanonicalModel, ObjectKind};
pub use pipeline::{ImportOptions, ImportPipeline};
pub use report::ImportSummary;
pub use version::{CascadeVersioning, VersionStrategy};
