//! Relationship lifecycle between entities of the declared end types

use crate::conformance::context::{CaseFailure, CaseResult, TestCaseContext};
use crate::conformance::generator::CreationProfile;
use crate::conformance::results::{DISABLED, ENABLED};
use crate::model::{EntityDetail, InstanceStatus, TypeDef, TypeDefKind};
use crate::storage::{Capability, RepositoryError};

/// Create an entity of the named type for use at a relationship end
pub(super) fn create_end_entity(
    ctx: &mut TestCaseContext<'_>,
    entity_type: &str,
    tag: &str,
) -> CaseResult<EntityDetail> {
    let repository = ctx.repository;
    let entity_def = repository
        .get_typedef_by_name(entity_type)?
        .ok_or_else(|| RepositoryError::TypeDefNotKnown(entity_type.to_string()))?;
    let properties = ctx
        .generator
        .properties(repository, &entity_def, CreationProfile::Full, tag)?;
    let entity = repository.add_entity(ctx.user_id, &entity_def.guid, properties, None)?;
    ctx.track_entity(&entity);
    Ok(entity)
}

pub fn relationship_lifecycle(ctx: &mut TestCaseContext<'_>, def: &TypeDef) -> CaseResult {
    let TypeDefKind::RelationshipDef { end1, end2 } = &def.kind else {
        return Err(CaseFailure::Repository(RepositoryError::InvalidParameter(
            format!("{} is not a RelationshipDef", def.name),
        )));
    };
    let user_id = ctx.user_id;
    let repository = ctx.repository;

    let entity1 = create_end_entity(ctx, &end1.entity_type, &format!("{}.end1", def.name))?;
    let entity2 = create_end_entity(ctx, &end2.entity_type, &format!("{}.end2", def.name))?;

    let full = ctx
        .generator
        .properties(repository, def, CreationProfile::Full, "lifecycle")?;
    let relationship = repository.add_relationship(
        user_id,
        &def.guid,
        full.clone(),
        entity1.guid(),
        entity2.guid(),
        None,
    )?;
    ctx.track_relationship(&relationship);
    let guid = relationship.header.guid.clone();

    ctx.verify(
        relationship.end1.guid() == entity1.guid(),
        "01",
        format!("end 1 of {} is the first entity supplied", def.name),
    )?;
    ctx.verify(
        relationship.end2.guid() == entity2.guid(),
        "02",
        format!("end 2 of {} is the second entity supplied", def.name),
    )?;
    ctx.verify(
        relationship.header.version > 0,
        "03",
        "new relationship has a positive version",
    )?;
    ctx.verify(
        relationship.header.type_ref.guid == def.guid
            && relationship.header.status == def.initial_status,
        "04",
        format!("new relationship is a {} in its initial status", def.name),
    )?;
    ctx.verify(
        relationship.header.provenance.created_by == user_id
            && relationship.header.metadata_collection_id == repository.metadata_collection_id(),
        "05",
        "new relationship records its creator and metadata collection",
    )?;
    ctx.verify(
        relationship.properties == full,
        "06",
        "new relationship carries the requested properties",
    )?;

    let known = repository.is_relationship_known(user_id, &guid)?;
    ctx.verify(
        known.as_ref() == Some(&relationship),
        "07",
        "the new relationship is known and unchanged",
    )?;
    let retrieved = repository.get_relationship(user_id, &guid)?;
    ctx.verify(
        retrieved == relationship,
        "08",
        "the retrieved relationship matches the created one",
    )?;
    let attached = repository.get_relationships_for_entity(user_id, entity1.guid())?;
    ctx.verify(
        attached.iter().any(|r| r.guid() == guid)
            && attached.iter().all(|r| r.touches(entity1.guid())),
        "09",
        "the relationship is listed for its first end, among only relationships at that end",
    )?;

    let mut version = relationship.header.version;
    for status in def
        .valid_statuses
        .iter()
        .copied()
        .filter(|s| *s != InstanceStatus::Deleted)
    {
        let updated = repository.update_relationship_status(user_id, &guid, status)?;
        ctx.verify(
            updated.header.status == status && updated.header.version == version + 1,
            "10",
            format!("a status update to {} increments the version by one", status),
        )?;
        version = updated.header.version;
    }

    if !def.supports_status(InstanceStatus::Deleted) {
        match repository.update_relationship_status(user_id, &guid, InstanceStatus::Deleted) {
            Err(RepositoryError::StatusNotSupported { .. }) => ctx.verify(
                true,
                "11",
                "a status update to DELETED is rejected as not supported",
            )?,
            Err(e) => return Err(e.into()),
            Ok(_) => ctx.verify(
                false,
                "11",
                "a status update to DELETED is rejected as not supported",
            )?,
        }
    }

    let minimal = ctx
        .generator
        .properties(repository, def, CreationProfile::Minimal, "lifecycle")?;
    let updated = repository.update_relationship_properties(user_id, &guid, minimal.clone())?;
    ctx.verify(
        updated.header.version == version + 1 && updated.properties == minimal,
        "12",
        "a property update stores exactly the minimal properties at a new version",
    )?;
    version = updated.header.version;

    match repository.delete_relationship(user_id, &def.guid, &def.name, &guid)? {
        Capability::Supported(deleted) => {
            ctx.discover(format!("{} soft delete support", def.name), ENABLED);
            ctx.verify(
                deleted.header.status == InstanceStatus::Deleted
                    && deleted.header.version == version + 1,
                "13",
                "soft delete marks the relationship DELETED at a new version",
            )?;
            version = deleted.header.version;
            ctx.verify_not_known(
                repository.get_relationship(user_id, &guid),
                "14",
                "a soft-deleted relationship is not known",
            )?;

            match repository.restore_relationship(user_id, &guid)? {
                Capability::Supported(restored) => {
                    ctx.discover(format!("{} restore support", def.name), ENABLED);
                    ctx.verify(
                        restored.header.version == version + 1
                            && restored.header.status != InstanceStatus::Deleted,
                        "15",
                        "restore revives the relationship at a new version",
                    )?;
                    let retrieved = repository.get_relationship(user_id, &guid)?;
                    ctx.verify(
                        retrieved == restored,
                        "16",
                        "a restored relationship can be retrieved again",
                    )?;
                }
                Capability::NotSupported => {
                    ctx.discover(format!("{} restore support", def.name), DISABLED);
                }
            }
        }
        Capability::NotSupported => {
            ctx.discover(format!("{} soft delete support", def.name), DISABLED);
            ctx.discover(format!("{} restore support", def.name), DISABLED);
        }
    }

    repository.purge_relationship(user_id, &def.guid, &def.name, &guid)?;
    ctx.untrack(&guid);
    ctx.verify_not_known(
        repository.get_relationship(user_id, &guid),
        "17",
        "a purged relationship is not known",
    )?;
    let remaining = repository.get_relationships_for_entity(user_id, entity2.guid())?;
    ctx.verify(
        remaining.iter().all(|r| r.guid() != guid),
        "18",
        "a purged relationship is no longer listed for its ends",
    )?;
    Ok(())
}
