//! Test cases the workbench can run
//!
//! Repository-wide cases run once. Type cases run once per TypeDef the
//! repository reports, in name order within each group.

mod classification;
mod entity;
mod relationship;
mod types;

use super::context::{CaseResult, TestCaseContext};
use crate::model::{TypeDef, TypeDefCategory};

/// A test case selected for a run
#[derive(Debug, Clone)]
pub enum PlannedCase {
    RepositoryIdentity,
    TypePartition,
    TypeDefLookup(TypeDef),
    ExternalId(TypeDef),
    EntityLifecycle(TypeDef),
    RelationshipLifecycle(TypeDef),
    ClassificationLifecycle(TypeDef),
}

impl PlannedCase {
    /// Stable identifier, unique within a run
    pub fn id(&self) -> String {
        match self {
            Self::RepositoryIdentity => "repository-identity".to_string(),
            Self::TypePartition => "repository-type-partition".to_string(),
            Self::TypeDefLookup(def) => format!("repository-typedef-lookup-{}", def.name),
            Self::ExternalId(def) => format!("repository-external-id-{}", def.name),
            Self::EntityLifecycle(def) => format!("repository-entity-lifecycle-{}", def.name),
            Self::RelationshipLifecycle(def) => {
                format!("repository-relationship-lifecycle-{}", def.name)
            }
            Self::ClassificationLifecycle(def) => {
                format!("repository-classification-lifecycle-{}", def.name)
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::RepositoryIdentity => "Repository metadata collection identity".to_string(),
            Self::TypePartition => "Repository type category partition".to_string(),
            Self::TypeDefLookup(def) => format!("TypeDef lookup for {}", def.name),
            Self::ExternalId(def) => format!("External standard mappings for {}", def.name),
            Self::EntityLifecycle(def) => format!("Entity lifecycle for {}", def.name),
            Self::RelationshipLifecycle(def) => format!("Relationship lifecycle for {}", def.name),
            Self::ClassificationLifecycle(def) => {
                format!("Classification lifecycle for {}", def.name)
            }
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::RepositoryIdentity | Self::TypePartition => None,
            Self::TypeDefLookup(def)
            | Self::ExternalId(def)
            | Self::EntityLifecycle(def)
            | Self::RelationshipLifecycle(def)
            | Self::ClassificationLifecycle(def) => Some(&def.name),
        }
    }

    pub fn run(&self, ctx: &mut TestCaseContext<'_>) -> CaseResult {
        match self {
            Self::RepositoryIdentity => types::repository_identity(ctx),
            Self::TypePartition => types::type_partition(ctx),
            Self::TypeDefLookup(def) => types::typedef_lookup(ctx, def),
            Self::ExternalId(def) => types::external_id(ctx, def),
            Self::EntityLifecycle(def) => entity::entity_lifecycle(ctx, def),
            Self::RelationshipLifecycle(def) => relationship::relationship_lifecycle(ctx, def),
            Self::ClassificationLifecycle(def) => {
                classification::classification_lifecycle(ctx, def)
            }
        }
    }
}

/// Every case to run against a repository holding `types`
pub fn plan(types: &[TypeDef]) -> Vec<PlannedCase> {
    let mut sorted: Vec<&TypeDef> = types.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut cases = vec![PlannedCase::RepositoryIdentity, PlannedCase::TypePartition];
    for def in &sorted {
        cases.push(PlannedCase::TypeDefLookup((*def).clone()));
        if def.has_external_mappings() {
            cases.push(PlannedCase::ExternalId((*def).clone()));
        }
    }
    for category in TypeDefCategory::ALL {
        for def in sorted.iter().filter(|d| d.category() == category) {
            let def = (*def).clone();
            cases.push(match category {
                TypeDefCategory::EntityDef => PlannedCase::EntityLifecycle(def),
                TypeDefCategory::RelationshipDef => PlannedCase::RelationshipLifecycle(def),
                TypeDefCategory::ClassificationDef => PlannedCase::ClassificationLifecycle(def),
            });
        }
    }
    cases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeCatalog;

    #[test]
    fn plan_covers_every_type() {
        let catalog = TypeCatalog::builtin().unwrap();
        let cases = plan(&catalog.type_defs);
        let ids: Vec<String> = cases.iter().map(PlannedCase::id).collect();

        assert_eq!(ids[0], "repository-identity");
        assert_eq!(ids[1], "repository-type-partition");
        assert!(ids.contains(&"repository-entity-lifecycle-GlossaryTerm".to_string()));
        assert!(ids.contains(&"repository-relationship-lifecycle-TermAnchor".to_string()));
        assert!(ids.contains(&"repository-classification-lifecycle-Memento".to_string()));
        assert!(ids.contains(&"repository-external-id-DataSet".to_string()));
        assert!(!ids.contains(&"repository-external-id-Glossary".to_string()));

        let lookups = ids
            .iter()
            .filter(|id| id.starts_with("repository-typedef-lookup-"))
            .count();
        assert_eq!(lookups, catalog.type_defs.len());

        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
