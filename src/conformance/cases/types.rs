//! Repository identity and type definition cases

use crate::conformance::context::{CaseResult, TestCaseContext};
use crate::model::{TypeDef, TypeDefCategory};

pub fn repository_identity(ctx: &mut TestCaseContext<'_>) -> CaseResult {
    let first = ctx.repository.metadata_collection_id().to_string();
    ctx.verify(
        !first.trim().is_empty(),
        "01",
        "the repository reports a metadata collection id",
    )?;
    let second = ctx.repository.metadata_collection_id().to_string();
    ctx.verify(
        first == second,
        "02",
        "the metadata collection id is stable across calls",
    )?;
    ctx.discover("metadata collection id", first);
    Ok(())
}

pub fn type_partition(ctx: &mut TestCaseContext<'_>) -> CaseResult {
    let gallery = ctx.repository.get_all_types()?;
    let total = gallery.type_defs.len();

    let mut partitioned = 0;
    for category in TypeDefCategory::ALL {
        let found = ctx.repository.find_types_by_category(category)?;
        ctx.verify(
            found.iter().all(|d| d.category() == category),
            "01",
            format!("every type found as a {} is a {}", category, category),
        )?;
        let label = match category {
            TypeDefCategory::EntityDef => "number of supported entity types",
            TypeDefCategory::RelationshipDef => "number of supported relationship types",
            TypeDefCategory::ClassificationDef => "number of supported classification types",
        };
        ctx.discover(label, found.len());
        partitioned += found.len();
    }

    ctx.verify(
        partitioned == total,
        "02",
        format!(
            "entity, relationship and classification types ({}) add up to all types ({})",
            partitioned, total
        ),
    )?;
    ctx.discover("number of supported TypeDefs", total);
    ctx.discover(
        "number of supported AttributeTypeDefs",
        gallery.attribute_type_defs.len(),
    );
    Ok(())
}

pub fn typedef_lookup(ctx: &mut TestCaseContext<'_>, def: &TypeDef) -> CaseResult {
    let by_name = ctx.repository.get_typedef_by_name(&def.name)?;
    ctx.verify(
        by_name.as_ref() == Some(def),
        "01",
        format!("{} is returned unchanged by name", def.name),
    )?;

    let by_guid = ctx.repository.get_typedef_by_guid(&def.guid)?;
    ctx.verify(
        by_guid == by_name,
        "02",
        format!("{} lookups by guid and by name agree", def.name),
    )?;

    let verified = ctx.repository.verify_typedef(def)?;
    ctx.verify(verified, "03", format!("{} verifies against itself", def.name))?;

    let gallery = ctx.repository.find_types_by_name(&def.name)?;
    ctx.verify(
        gallery.type_defs.len() == 1 && gallery.type_defs[0].guid == def.guid,
        "04",
        format!("a search for {} finds exactly that type", def.name),
    )?;
    ctx.verify(
        gallery.attribute_type_defs.is_empty(),
        "05",
        format!("a search for {} finds no attribute types", def.name),
    )?;

    ctx.verify(
        def.validate().is_ok(),
        "06",
        format!("{} satisfies the structural invariants of a TypeDef", def.name),
    )?;

    let same_category = ctx.repository.find_types_by_category(def.category())?;
    ctx.verify(
        same_category.iter().any(|d| d.guid == def.guid),
        "07",
        format!("{} is listed among the {} types", def.name, def.category()),
    )?;

    if let Some(super_name) = &def.super_type {
        let super_def = ctx.repository.get_typedef_by_name(super_name)?;
        ctx.verify(
            super_def.map(|s| s.category()) == Some(def.category()),
            "08",
            format!("supertype {} of {} is a known {}", super_name, def.name, def.category()),
        )?;
    }

    for attribute in &def.attributes {
        let attribute_type = ctx
            .repository
            .get_attribute_typedef_by_name(&attribute.attribute_type)?;
        ctx.verify(
            attribute_type.is_some(),
            "09",
            format!(
                "attribute {}.{} has a known type {}",
                def.name, attribute.name, attribute.attribute_type
            ),
        )?;
    }
    Ok(())
}

/// Every populated axis of every mapping must lead back to the type
pub fn external_id(ctx: &mut TestCaseContext<'_>, def: &TypeDef) -> CaseResult {
    let mappings: Vec<_> = def.all_external_mappings().cloned().collect();
    for mapping in &mappings {
        let standard = mapping.standard_name.as_deref();
        let organization = mapping.standard_organization.as_deref();
        let type_name = mapping.standard_type_name.as_deref();

        let found = ctx
            .repository
            .find_types_by_external_id(standard, organization, type_name)?;
        ctx.verify(
            found.iter().any(|d| d.guid == def.guid),
            "01",
            format!("{} is found by its full external mapping", def.name),
        )?;

        let axes = [
            ("02", "standard name", standard.map(|s| (Some(s), None, None))),
            ("03", "organization", organization.map(|o| (None, Some(o), None))),
            ("04", "standard type name", type_name.map(|t| (None, None, Some(t)))),
        ];
        for (number, axis, criteria) in axes {
            let Some((s, o, t)) = criteria else {
                continue;
            };
            let found = ctx.repository.find_types_by_external_id(s, o, t)?;
            ctx.verify(
                found.iter().any(|d| d.guid == def.guid),
                number,
                format!("{} is found by external {} alone", def.name, axis),
            )?;
        }
    }
    ctx.discover(format!("{} external mappings", def.name), mappings.len());
    Ok(())
}
