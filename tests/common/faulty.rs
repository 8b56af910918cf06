//! Repository wrapper that misbehaves for one type
//!
//! Every call is delegated to the wrapped repository. The configured fault
//! only applies to instances of the target type, so the workbench can be
//! checked for isolating one type's failure from the rest of the run.

use omrs::model::{AttributeTypeDef, TypeDefGallery, TypeDefPatch};
use omrs::model::InstanceHeader;
use omrs::{
    Capability, EntityDetail, EntitySummary, InstanceProperties, InstanceStatus,
    MetadataCollection, Relationship, RepositoryError, RepositoryResult, TypeDef,
    TypeDefCategory,
};

#[derive(Debug, Clone)]
pub enum Fault {
    /// Status updates report the version they started from
    SkipVersionBump,
    /// Creating an entity panics
    PanicOnCreate,
    /// Status updates fail with an unexpected error
    RejectStatusUpdates,
    /// Purging an entity panics
    PanicOnPurge,
    /// Relationship listings include one the repository never created
    PhantomRelationship,
}

pub struct FaultyRepository<R> {
    inner: R,
    type_name: String,
    fault: Fault,
}

impl<R: MetadataCollection> FaultyRepository<R> {
    pub fn new(inner: R, type_name: impl Into<String>, fault: Fault) -> Self {
        Self {
            inner,
            type_name: type_name.into(),
            fault,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn targets_guid(&self, type_guid: &str) -> bool {
        matches!(
            self.inner.get_typedef_by_guid(type_guid),
            Ok(Some(def)) if def.name == self.type_name
        )
    }

    /// A relationship from the entity to itself, typed as the entity's own type
    fn phantom_relationship(&self, user_id: &str, guid: &str) -> RepositoryResult<Relationship> {
        let entity = self.inner.get_entity_detail(user_id, guid)?;
        let def = self
            .inner
            .get_typedef_by_guid(&entity.header.type_ref.guid)?
            .ok_or_else(|| RepositoryError::TypeDefNotKnown(entity.header.type_ref.name.clone()))?;
        let header = InstanceHeader::new(
            &def,
            InstanceStatus::Active,
            self.inner.metadata_collection_id(),
            user_id,
        );
        Ok(Relationship {
            header,
            end1: entity.proxy(std::iter::empty()),
            end2: entity.proxy(std::iter::empty()),
            properties: InstanceProperties::new(),
        })
    }

    fn targets_entity(&self, user_id: &str, guid: &str) -> bool {
        matches!(
            self.inner.is_entity_known(user_id, guid),
            Ok(Some(entity)) if entity.header.type_ref.name == self.type_name
        )
    }
}

impl<R: MetadataCollection> MetadataCollection for FaultyRepository<R> {
    fn metadata_collection_id(&self) -> &str {
        self.inner.metadata_collection_id()
    }

    fn get_all_types(&self) -> RepositoryResult<TypeDefGallery> {
        self.inner.get_all_types()
    }

    fn find_types_by_name(&self, name: &str) -> RepositoryResult<TypeDefGallery> {
        self.inner.find_types_by_name(name)
    }

    fn find_types_by_category(&self, category: TypeDefCategory) -> RepositoryResult<Vec<TypeDef>> {
        self.inner.find_types_by_category(category)
    }

    fn find_types_by_external_id(
        &self,
        standard_name: Option<&str>,
        organization: Option<&str>,
        type_name: Option<&str>,
    ) -> RepositoryResult<Vec<TypeDef>> {
        self.inner
            .find_types_by_external_id(standard_name, organization, type_name)
    }

    fn get_typedef_by_guid(&self, guid: &str) -> RepositoryResult<Option<TypeDef>> {
        self.inner.get_typedef_by_guid(guid)
    }

    fn get_typedef_by_name(&self, name: &str) -> RepositoryResult<Option<TypeDef>> {
        self.inner.get_typedef_by_name(name)
    }

    fn get_attribute_typedef_by_name(
        &self,
        name: &str,
    ) -> RepositoryResult<Option<AttributeTypeDef>> {
        self.inner.get_attribute_typedef_by_name(name)
    }

    fn add_attribute_typedef(&self, def: &AttributeTypeDef) -> RepositoryResult<()> {
        self.inner.add_attribute_typedef(def)
    }

    fn add_typedef(&self, def: &TypeDef) -> RepositoryResult<()> {
        self.inner.add_typedef(def)
    }

    fn verify_typedef(&self, def: &TypeDef) -> RepositoryResult<bool> {
        self.inner.verify_typedef(def)
    }

    fn patch_typedef(&self, patch: &TypeDefPatch) -> RepositoryResult<TypeDef> {
        self.inner.patch_typedef(patch)
    }

    fn is_entity_known(&self, user_id: &str, guid: &str) -> RepositoryResult<Option<EntityDetail>> {
        self.inner.is_entity_known(user_id, guid)
    }

    fn get_entity_summary(&self, user_id: &str, guid: &str) -> RepositoryResult<EntitySummary> {
        self.inner.get_entity_summary(user_id, guid)
    }

    fn get_entity_detail(&self, user_id: &str, guid: &str) -> RepositoryResult<EntityDetail> {
        self.inner.get_entity_detail(user_id, guid)
    }

    fn get_relationships_for_entity(
        &self,
        user_id: &str,
        entity_guid: &str,
    ) -> RepositoryResult<Vec<Relationship>> {
        let mut relationships = self.inner.get_relationships_for_entity(user_id, entity_guid)?;
        if matches!(self.fault, Fault::PhantomRelationship)
            && self.targets_entity(user_id, entity_guid)
        {
            relationships.push(self.phantom_relationship(user_id, entity_guid)?);
        }
        Ok(relationships)
    }

    fn find_entities_by_property(
        &self,
        user_id: &str,
        type_guid: Option<&str>,
        match_properties: &InstanceProperties,
    ) -> RepositoryResult<Vec<EntityDetail>> {
        self.inner
            .find_entities_by_property(user_id, type_guid, match_properties)
    }

    fn add_entity(
        &self,
        user_id: &str,
        type_guid: &str,
        properties: InstanceProperties,
        initial_status: Option<InstanceStatus>,
    ) -> RepositoryResult<EntityDetail> {
        if matches!(self.fault, Fault::PanicOnCreate) && self.targets_guid(type_guid) {
            panic!("connector crashed creating a {}", self.type_name);
        }
        self.inner
            .add_entity(user_id, type_guid, properties, initial_status)
    }

    fn update_entity_status(
        &self,
        user_id: &str,
        guid: &str,
        new_status: InstanceStatus,
    ) -> RepositoryResult<EntityDetail> {
        if !self.targets_entity(user_id, guid) {
            return self.inner.update_entity_status(user_id, guid, new_status);
        }
        match self.fault {
            Fault::SkipVersionBump => {
                let mut updated = self.inner.update_entity_status(user_id, guid, new_status)?;
                updated.header.version -= 1;
                Ok(updated)
            }
            Fault::RejectStatusUpdates => Err(RepositoryError::InvalidParameter(
                "status updates are switched off".into(),
            )),
            _ => self.inner.update_entity_status(user_id, guid, new_status),
        }
    }

    fn update_entity_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail> {
        self.inner.update_entity_properties(user_id, guid, properties)
    }

    fn undo_entity_update(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>> {
        self.inner.undo_entity_update(user_id, guid)
    }

    fn delete_entity(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>> {
        self.inner.delete_entity(user_id, type_guid, type_name, guid)
    }

    fn restore_entity(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>> {
        self.inner.restore_entity(user_id, guid)
    }

    fn purge_entity(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<()> {
        if matches!(self.fault, Fault::PanicOnPurge) && type_name == self.type_name {
            panic!("connector crashed purging a {}", self.type_name);
        }
        self.inner.purge_entity(user_id, type_guid, type_name, guid)
    }

    fn classify_entity(
        &self,
        user_id: &str,
        entity_guid: &str,
        classification_name: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail> {
        self.inner
            .classify_entity(user_id, entity_guid, classification_name, properties)
    }

    fn declassify_entity(
        &self,
        user_id: &str,
        entity_guid: &str,
        classification_name: &str,
    ) -> RepositoryResult<EntityDetail> {
        self.inner
            .declassify_entity(user_id, entity_guid, classification_name)
    }

    fn is_relationship_known(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Option<Relationship>> {
        self.inner.is_relationship_known(user_id, guid)
    }

    fn get_relationship(&self, user_id: &str, guid: &str) -> RepositoryResult<Relationship> {
        self.inner.get_relationship(user_id, guid)
    }

    fn add_relationship(
        &self,
        user_id: &str,
        type_guid: &str,
        properties: InstanceProperties,
        end1_guid: &str,
        end2_guid: &str,
        initial_status: Option<InstanceStatus>,
    ) -> RepositoryResult<Relationship> {
        self.inner.add_relationship(
            user_id,
            type_guid,
            properties,
            end1_guid,
            end2_guid,
            initial_status,
        )
    }

    fn update_relationship_status(
        &self,
        user_id: &str,
        guid: &str,
        new_status: InstanceStatus,
    ) -> RepositoryResult<Relationship> {
        self.inner.update_relationship_status(user_id, guid, new_status)
    }

    fn update_relationship_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship> {
        self.inner
            .update_relationship_properties(user_id, guid, properties)
    }

    fn delete_relationship(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<Relationship>> {
        self.inner
            .delete_relationship(user_id, type_guid, type_name, guid)
    }

    fn restore_relationship(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<Relationship>> {
        self.inner.restore_relationship(user_id, guid)
    }

    fn purge_relationship(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<()> {
        self.inner
            .purge_relationship(user_id, type_guid, type_name, guid)
    }
}
