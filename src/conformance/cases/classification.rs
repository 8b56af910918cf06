//! Classification attach and detach on an entity the classification accepts

use super::relationship::create_end_entity;
use crate::conformance::context::{CaseFailure, CaseResult, TestCaseContext};
use crate::conformance::generator::CreationProfile;
use crate::model::{TypeDef, TypeDefCategory, TypeDefKind};
use crate::storage::RepositoryError;

pub fn classification_lifecycle(ctx: &mut TestCaseContext<'_>, def: &TypeDef) -> CaseResult {
    let TypeDefKind::ClassificationDef { valid_entity_defs } = &def.kind else {
        return Err(CaseFailure::Repository(RepositoryError::InvalidParameter(
            format!("{} is not a ClassificationDef", def.name),
        )));
    };
    let user_id = ctx.user_id;
    let repository = ctx.repository;

    // Any entity type will do when the classification is unrestricted
    let entity_type = match valid_entity_defs.first() {
        Some(name) => name.clone(),
        None => repository
            .find_types_by_category(TypeDefCategory::EntityDef)?
            .into_iter()
            .next()
            .map(|d| d.name)
            .ok_or_else(|| RepositoryError::TypeDefNotKnown("any EntityDef".to_string()))?,
    };
    let entity = create_end_entity(ctx, &entity_type, &format!("{}.classified", def.name))?;
    let guid = entity.header.guid.clone();

    let properties = ctx
        .generator
        .properties(repository, def, CreationProfile::Full, "lifecycle")?;
    let classified = repository.classify_entity(user_id, &guid, &def.name, properties.clone())?;

    let classification = classified.classification(&def.name);
    ctx.verify(
        classification.is_some(),
        "01",
        format!("the entity is classified as {}", def.name),
    )?;
    if let Some(classification) = classification {
        ctx.verify(
            classification.type_ref.guid == def.guid,
            "02",
            format!("the classification refers to the {} type", def.name),
        )?;
        ctx.verify(
            classification.properties == properties,
            "03",
            "the classification carries the requested properties",
        )?;
        ctx.verify(
            classification.status == def.initial_status,
            "04",
            "the classification starts in its type's initial status",
        )?;
    }
    ctx.verify(
        classified.header.version == entity.header.version + 1,
        "05",
        "classifying an entity increments its version by one",
    )?;

    let retrieved = repository.get_entity_detail(user_id, &guid)?;
    ctx.verify(
        retrieved.classification(&def.name) == classified.classification(&def.name),
        "06",
        "the classification is stored with the entity",
    )?;

    let declassified = repository.declassify_entity(user_id, &guid, &def.name)?;
    ctx.verify(
        declassified.classification(&def.name).is_none(),
        "07",
        format!("the {} classification is removed", def.name),
    )?;
    ctx.verify(
        declassified.header.version == classified.header.version + 1,
        "08",
        "declassifying an entity increments its version by one",
    )?;
    Ok(())
}
