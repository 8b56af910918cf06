//! The metadata collection contract a conformant repository implements

use crate::model::{
    AttributeTypeDef, EntityDetail, EntitySummary, InstanceProperties, InstanceStatus,
    Relationship, TypeDef, TypeDefCategory, TypeDefGallery, TypeDefPatch,
};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not known: {0}")]
    EntityNotKnown(String),

    #[error("Relationship not known: {0}")]
    RelationshipNotKnown(String),

    #[error("TypeDef not known: {0}")]
    TypeDefNotKnown(String),

    #[error("Status {status} not supported by type {type_name}")]
    StatusNotSupported { status: InstanceStatus, type_name: String },

    #[error("Function not supported: {0}")]
    FunctionNotSupported(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Property error: {0}")]
    PropertyError(String),

    #[error("Classification error: {0}")]
    ClassificationError(String),

    #[error("TypeDef conflict: {0}")]
    TypeDefConflict(String),

    #[error("Entity {0} is not deleted")]
    EntityNotDeleted(String),

    #[error("Relationship {0} is not deleted")]
    RelationshipNotDeleted(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Repository lock poisoned")]
    LockPoisoned,
}

impl RepositoryError {
    /// Entity, relationship or type not found
    pub fn is_not_known(&self) -> bool {
        matches!(
            self,
            Self::EntityNotKnown(_) | Self::RelationshipNotKnown(_) | Self::TypeDefNotKnown(_)
        )
    }

    /// Function or status not supported
    pub fn is_not_supported(&self) -> bool {
        matches!(
            self,
            Self::StatusNotSupported { .. } | Self::FunctionNotSupported(_)
        )
    }
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Outcome of an optional repository capability
#[derive(Debug, Clone, PartialEq)]
pub enum Capability<T> {
    /// The repository supports the operation and performed it
    Supported(T),
    /// The repository does not offer the operation
    NotSupported,
}

impl<T> Capability<T> {
    pub fn supported(self) -> Option<T> {
        match self {
            Self::Supported(value) => Some(value),
            Self::NotSupported => None,
        }
    }
}

/// Trait for metadata repositories
///
/// Implementations must be thread-safe (Send + Sync) so a single repository
/// can be shared by reference across test cases.
pub trait MetadataCollection: Send + Sync {
    /// Identifier of the collection this repository owns; stable across calls
    fn metadata_collection_id(&self) -> &str;

    // === Type Operations ===

    /// Every TypeDef and AttributeTypeDef the repository knows
    fn get_all_types(&self) -> RepositoryResult<TypeDefGallery>;

    /// TypeDefs and AttributeTypeDefs with exactly this name
    fn find_types_by_name(&self, name: &str) -> RepositoryResult<TypeDefGallery>;

    fn find_types_by_category(&self, category: TypeDefCategory) -> RepositoryResult<Vec<TypeDef>>;

    /// TypeDefs with a mapping (on the type or an attribute) matching all given criteria
    ///
    /// At least one criterion must be given.
    fn find_types_by_external_id(
        &self,
        standard_name: Option<&str>,
        organization: Option<&str>,
        type_name: Option<&str>,
    ) -> RepositoryResult<Vec<TypeDef>>;

    fn get_typedef_by_guid(&self, guid: &str) -> RepositoryResult<Option<TypeDef>>;

    fn get_typedef_by_name(&self, name: &str) -> RepositoryResult<Option<TypeDef>>;

    fn get_attribute_typedef_by_name(
        &self,
        name: &str,
    ) -> RepositoryResult<Option<AttributeTypeDef>>;

    fn add_attribute_typedef(&self, def: &AttributeTypeDef) -> RepositoryResult<()>;

    fn add_typedef(&self, def: &TypeDef) -> RepositoryResult<()>;

    /// Returns true if an identical definition is registered, false if neither
    /// its name nor its GUID is known; a differing definition is a conflict
    fn verify_typedef(&self, def: &TypeDef) -> RepositoryResult<bool>;

    fn patch_typedef(&self, patch: &TypeDefPatch) -> RepositoryResult<TypeDef>;

    // === Entity Operations ===

    /// The entity if it exists and is not soft-deleted
    fn is_entity_known(&self, user_id: &str, guid: &str) -> RepositoryResult<Option<EntityDetail>>;

    fn get_entity_summary(&self, user_id: &str, guid: &str) -> RepositoryResult<EntitySummary>;

    fn get_entity_detail(&self, user_id: &str, guid: &str) -> RepositoryResult<EntityDetail>;

    /// Active relationships with the entity at either end
    fn get_relationships_for_entity(
        &self,
        user_id: &str,
        entity_guid: &str,
    ) -> RepositoryResult<Vec<Relationship>>;

    /// Entities whose properties include every match property
    fn find_entities_by_property(
        &self,
        user_id: &str,
        type_guid: Option<&str>,
        match_properties: &InstanceProperties,
    ) -> RepositoryResult<Vec<EntityDetail>>;

    fn add_entity(
        &self,
        user_id: &str,
        type_guid: &str,
        properties: InstanceProperties,
        initial_status: Option<InstanceStatus>,
    ) -> RepositoryResult<EntityDetail>;

    fn update_entity_status(
        &self,
        user_id: &str,
        guid: &str,
        new_status: InstanceStatus,
    ) -> RepositoryResult<EntityDetail>;

    fn update_entity_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail>;

    /// Revert the last update, producing a new version
    fn undo_entity_update(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>>;

    /// Soft delete
    fn delete_entity(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>>;

    fn restore_entity(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>>;

    /// Permanently remove the entity and its relationships
    fn purge_entity(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<()>;

    fn classify_entity(
        &self,
        user_id: &str,
        entity_guid: &str,
        classification_name: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail>;

    fn declassify_entity(
        &self,
        user_id: &str,
        entity_guid: &str,
        classification_name: &str,
    ) -> RepositoryResult<EntityDetail>;

    // === Relationship Operations ===

    /// The relationship if it exists and is not soft-deleted
    fn is_relationship_known(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Option<Relationship>>;

    fn get_relationship(&self, user_id: &str, guid: &str) -> RepositoryResult<Relationship>;

    fn add_relationship(
        &self,
        user_id: &str,
        type_guid: &str,
        properties: InstanceProperties,
        end1_guid: &str,
        end2_guid: &str,
        initial_status: Option<InstanceStatus>,
    ) -> RepositoryResult<Relationship>;

    fn update_relationship_status(
        &self,
        user_id: &str,
        guid: &str,
        new_status: InstanceStatus,
    ) -> RepositoryResult<Relationship>;

    fn update_relationship_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship>;

    fn delete_relationship(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<Relationship>>;

    fn restore_relationship(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<Relationship>>;

    fn purge_relationship(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<()>;
}

/// Extension trait for opening repositories from paths
pub trait OpenRepository: MetadataCollection + Sized {
    type Options;

    /// Open or create a repository at the given path
    fn open(path: impl AsRef<Path>, options: Self::Options) -> RepositoryResult<Self>;

    /// Create an in-memory repository (useful for testing)
    fn open_in_memory(options: Self::Options) -> RepositoryResult<Self>;
}
