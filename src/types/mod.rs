//! Type registry and type catalogs

mod catalog;
mod registry;

pub use catalog::{CatalogError, CatalogLoadReport, TypeCatalog};
pub use registry::TypeRegistry;
