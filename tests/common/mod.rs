//! Common test utilities for workbench integration tests
//!
//! Repositories preloaded with the built-in type catalog, and a
//! fault-injecting wrapper for checking that failures stay isolated.

pub mod faulty;

pub use faulty::{Fault, FaultyRepository};

use omrs::{OpenRepository, RepositoryOptions, SqliteRepository, TypeCatalog};
use std::path::Path;

/// In-memory repository with the built-in catalog loaded
pub fn catalog_repository(options: RepositoryOptions) -> SqliteRepository {
    let repository = SqliteRepository::open_in_memory(options).expect("open in-memory repository");
    TypeCatalog::builtin()
        .expect("parse built-in catalog")
        .load_into(&repository)
        .expect("load built-in catalog");
    repository
}

/// File-backed repository with the built-in catalog loaded
pub fn catalog_repository_at(path: &Path, options: RepositoryOptions) -> SqliteRepository {
    let repository = SqliteRepository::open(path, options).expect("open repository file");
    TypeCatalog::builtin()
        .expect("parse built-in catalog")
        .load_into(&repository)
        .expect("load built-in catalog");
    repository
}
