//! omrs: open metadata repository services with a conformance workbench
//!
//! A metadata repository stores typed, versioned instances (entities,
//! relationships and classifications) described by type definitions. This
//! crate provides the instance and type model, a SQLite-backed repository,
//! and a workbench that checks any repository against the expected
//! lifecycle behaviour.
//!
//! # Core Concepts
//!
//! - **TypeDefs**: versioned entity, relationship and classification types
//! - **Instances**: entities and relationships with a header carrying
//!   status, version and provenance
//! - **Workbench**: per-type test cases whose results are partitioned into
//!   passed, failed and skipped
//!
//! # Example
//!
//! ```
//! use omrs::{OpenRepository, RepositoryOptions, SqliteRepository, TypeCatalog};
//!
//! let repository = SqliteRepository::open_in_memory(RepositoryOptions::default()).unwrap();
//! TypeCatalog::builtin().unwrap().load_into(&repository).unwrap();
//! ```

pub mod config;
pub mod conformance;
pub mod model;
pub mod storage;
pub mod types;

pub use config::{ConfigError, ConformanceConfig};
pub use conformance::{ConformanceWorkbench, WorkbenchConfig, WorkbenchResults};
pub use model::{
    Classification, EntityDetail, EntityProxy, EntitySummary, EnumValue, InstanceHeader,
    InstanceProperties, InstanceStatus, PrimitiveValue, PropertyValue, Relationship, TypeDef,
    TypeDefCategory,
};
pub use storage::{
    Capability, MetadataCollection, OpenRepository, RepositoryError, RepositoryOptions,
    RepositoryResult, SqliteRepository,
};
pub use types::{CatalogError, TypeCatalog, TypeRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
