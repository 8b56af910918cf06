//! Metadata repositories
//!
//! Repositories implement the `MetadataCollection` trait. The shipped
//! implementation is `SqliteRepository`, which stores instances as flat
//! namespaced documents (see [`document`]) holding property values in their
//! stored form (see [`value`]).

pub mod document;
mod sqlite;
mod traits;
pub mod value;

pub use sqlite::{RepositoryOptions, SqliteRepository};
pub use traits::{
    Capability, MetadataCollection, OpenRepository, RepositoryError, RepositoryResult,
};
