//! Type catalogs: sets of type definitions loaded into a repository

use crate::model::{AttributeTypeDef, TypeDef};
use crate::storage::{MetadataCollection, RepositoryError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CATALOG: &str = include_str!("default_catalog.yaml");

/// Errors that can occur while loading a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Repository rejected catalog: {0}")]
    Repository(#[from] RepositoryError),
}

/// Counts of definitions a load added versus found already present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogLoadReport {
    pub added: usize,
    pub already_present: usize,
}

/// An ordered set of type definitions
///
/// Attribute types come before types, and a type comes after every type
/// it references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeCatalog {
    #[serde(default)]
    pub attribute_type_defs: Vec<AttributeTypeDef>,
    #[serde(default)]
    pub type_defs: Vec<TypeDef>,
}

impl TypeCatalog {
    /// The catalog shipped with the crate
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(DEFAULT_CATALOG)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Add every definition the repository does not already hold
    pub fn load_into(
        &self,
        repository: &dyn MetadataCollection,
    ) -> Result<CatalogLoadReport, CatalogError> {
        let mut report = CatalogLoadReport::default();

        for def in &self.attribute_type_defs {
            match repository.get_attribute_typedef_by_name(&def.name)? {
                Some(existing) if existing == *def => report.already_present += 1,
                _ => {
                    repository.add_attribute_typedef(def)?;
                    report.added += 1;
                }
            }
        }

        for def in &self.type_defs {
            if repository.verify_typedef(def)? {
                debug!(type_name = %def.name, "type already registered");
                report.already_present += 1;
            } else {
                repository.add_typedef(def)?;
                report.added += 1;
            }
        }

        info!(
            added = report.added,
            already_present = report.already_present,
            "type catalog loaded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TypeDefCategory, TypeDefKind};

    #[test]
    fn builtin_catalog_parses() {
        let catalog = TypeCatalog::builtin().unwrap();
        assert!(catalog.attribute_type_defs.iter().any(|a| a.name == "string"));

        let category_of = |name: &str| {
            catalog
                .type_defs
                .iter()
                .find(|d| d.name == name)
                .map(|d| d.category())
        };
        assert_eq!(category_of("GlossaryTerm"), Some(TypeDefCategory::EntityDef));
        assert_eq!(category_of("TermAnchor"), Some(TypeDefCategory::RelationshipDef));
        assert_eq!(category_of("Confidentiality"), Some(TypeDefCategory::ClassificationDef));
    }

    #[test]
    fn builtin_catalog_definitions_are_valid() {
        let catalog = TypeCatalog::builtin().unwrap();
        for def in &catalog.type_defs {
            assert!(def.validate().is_ok(), "{} is invalid", def.name);
        }
    }

    #[test]
    fn builtin_relationships_reference_earlier_entities() {
        let catalog = TypeCatalog::builtin().unwrap();
        for (index, def) in catalog.type_defs.iter().enumerate() {
            if let TypeDefKind::RelationshipDef { end1, end2 } = &def.kind {
                for end in [end1, end2] {
                    let position = catalog
                        .type_defs
                        .iter()
                        .position(|d| d.name == end.entity_type)
                        .unwrap();
                    assert!(position < index, "{} precedes its end type", def.name);
                }
            }
        }
    }

    #[test]
    fn catalog_from_missing_file_is_io_error() {
        let result = TypeCatalog::from_path("/definitely/not/here.yaml");
        assert!(matches!(result, Err(CatalogError::Io(_))));
    }
}
