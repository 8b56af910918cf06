//! Entity lifecycle: create, status changes, property update, undo,
//! soft delete, restore and purge

use crate::conformance::context::{CaseResult, TestCaseContext};
use crate::conformance::generator::CreationProfile;
use crate::conformance::results::{DISABLED, ENABLED};
use crate::model::{InstanceStatus, TypeDef};
use crate::storage::{Capability, RepositoryError};

pub fn entity_lifecycle(ctx: &mut TestCaseContext<'_>, def: &TypeDef) -> CaseResult {
    let user_id = ctx.user_id;
    let repository = ctx.repository;

    let full = ctx
        .generator
        .properties(repository, def, CreationProfile::Full, "lifecycle")?;
    let entity = repository.add_entity(user_id, &def.guid, full.clone(), None)?;
    ctx.track_entity(&entity);
    let guid = entity.header.guid.clone();

    ctx.verify(
        entity.header.type_ref.guid == def.guid && entity.header.type_ref.name == def.name,
        "01",
        format!("new entity is of type {}", def.name),
    )?;
    ctx.verify(entity.header.version == 1, "02", "new entity is at version 1")?;
    ctx.verify(
        entity.header.status == def.initial_status,
        "03",
        format!("new entity has the initial status {}", def.initial_status),
    )?;
    ctx.verify(
        entity.header.provenance.created_by == user_id,
        "04",
        "new entity records its creator",
    )?;
    ctx.verify(
        entity.header.metadata_collection_id == repository.metadata_collection_id(),
        "05",
        "new entity belongs to the repository's metadata collection",
    )?;
    ctx.verify(
        entity.properties == full,
        "06",
        "new entity carries the requested properties",
    )?;

    let retrieved = repository.get_entity_detail(user_id, &guid)?;
    ctx.verify(retrieved == entity, "07", "retrieved entity matches the created one")?;
    let summary = repository.get_entity_summary(user_id, &guid)?;
    ctx.verify(
        summary.header == entity.header,
        "08",
        "entity summary matches the created header",
    )?;
    let relationships = repository.get_relationships_for_entity(user_id, &guid)?;
    ctx.verify(
        relationships.is_empty(),
        "09",
        "a new entity has no relationships",
    )?;

    let mut version = entity.header.version;
    for status in def
        .valid_statuses
        .iter()
        .copied()
        .filter(|s| *s != InstanceStatus::Deleted)
    {
        let updated = repository.update_entity_status(user_id, &guid, status)?;
        ctx.verify(
            updated.header.status == status,
            "10",
            format!("entity status is updated to {}", status),
        )?;
        ctx.verify(
            updated.header.version == version + 1,
            "11",
            format!("a status update to {} increments the version by one", status),
        )?;
        ctx.verify(
            updated.header.provenance.updated_by.as_deref() == Some(user_id),
            "12",
            "a status update records the updater",
        )?;
        version = updated.header.version;
    }

    if !def.supports_status(InstanceStatus::Deleted) {
        match repository.update_entity_status(user_id, &guid, InstanceStatus::Deleted) {
            Err(RepositoryError::StatusNotSupported { .. }) => ctx.verify(
                true,
                "13",
                "a status update to DELETED is rejected as not supported",
            )?,
            Err(e) => return Err(e.into()),
            Ok(_) => ctx.verify(
                false,
                "13",
                "a status update to DELETED is rejected as not supported",
            )?,
        }
        let current = repository.get_entity_detail(user_id, &guid)?;
        ctx.verify(
            current.header.version == version,
            "14",
            "a rejected status update leaves the version unchanged",
        )?;
    }

    let minimal = ctx
        .generator
        .properties(repository, def, CreationProfile::Minimal, "lifecycle")?;
    let updated = repository.update_entity_properties(user_id, &guid, minimal.clone())?;
    ctx.verify(
        updated.header.version == version + 1,
        "15",
        "a property update increments the version by one",
    )?;
    ctx.verify(
        updated.properties == minimal,
        "16",
        "updated entity carries exactly the minimal properties",
    )?;
    version = updated.header.version;

    match repository.undo_entity_update(user_id, &guid)? {
        Capability::Supported(undone) => {
            ctx.discover(format!("{} undo support", def.name), ENABLED);
            ctx.verify(
                undone.header.version == version + 1,
                "17",
                "undo records a new version",
            )?;
            ctx.verify(
                undone.properties == full,
                "18",
                "undo restores the properties from before the update",
            )?;
            version = undone.header.version;
        }
        Capability::NotSupported => {
            ctx.discover(format!("{} undo support", def.name), DISABLED);
        }
    }

    let status_before_delete = repository.get_entity_detail(user_id, &guid)?.header.status;
    match repository.delete_entity(user_id, &def.guid, &def.name, &guid)? {
        Capability::Supported(deleted) => {
            ctx.discover(format!("{} soft delete support", def.name), ENABLED);
            ctx.verify(
                deleted.header.status == InstanceStatus::Deleted
                    && deleted.header.version == version + 1,
                "19",
                "soft delete marks the entity DELETED at a new version",
            )?;
            version = deleted.header.version;
            ctx.verify_not_known(
                repository.get_entity_detail(user_id, &guid),
                "20",
                "a soft-deleted entity is not known",
            )?;

            match repository.restore_entity(user_id, &guid)? {
                Capability::Supported(restored) => {
                    ctx.discover(format!("{} restore support", def.name), ENABLED);
                    ctx.verify(
                        restored.header.version == version + 1,
                        "21",
                        "restore increments the version by one",
                    )?;
                    ctx.verify(
                        restored.header.status == status_before_delete,
                        "22",
                        "restore returns the entity to its status before deletion",
                    )?;
                    let retrieved = repository.get_entity_detail(user_id, &guid)?;
                    ctx.verify(
                        retrieved == restored,
                        "23",
                        "a restored entity can be retrieved again",
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

    repository.purge_entity(user_id, &def.guid, &def.name, &guid)?;
    ctx.untrack(&guid);
    ctx.verify_not_known(
        repository.get_entity_detail(user_id, &guid),
        "24",
        "a purged entity is not known",
    )?;
    let known = repository.is_entity_known(user_id, &guid)?;
    ctx.verify(known.is_none(), "25", "a purged entity is not known at all")?;
    Ok(())
}
