//! Mapping between instances and schemaless documents
//!
//! A document is a flat JSON object addressed by a GUID-derived key:
//! `e_<guid>` for entities and `r_<guid>` for relationships. Header fields
//! are stored under fixed names, and every property is stored under a
//! namespaced field `<kind>.<container>.<property>`, for example
//! `entity.entity.qualifiedName` or `entity.classification.Confidentiality.level`.
//! Classification names are kept as a list in `entity.classifications`.

use super::traits::{RepositoryError, RepositoryResult};
use super::value::{from_stored_form, to_stored_form};
use crate::model::{
    Classification, EntityDetail, EntityProxy, InstanceHeader, InstanceProperties,
    InstanceProvenance, InstanceStatus, Relationship, TypeRef,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// A stored document
pub type Document = Map<String, Value>;

pub const ENTITY_KEY_PREFIX: &str = "e_";
pub const RELATIONSHIP_KEY_PREFIX: &str = "r_";

const KEY: &str = "_id";
const CLASSIFICATIONS: &str = "entity.classifications";

/// Kind of instance a document holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Entity,
    Relationship,
}

impl InstanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Relationship => "relationship",
        }
    }

    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::Entity => ENTITY_KEY_PREFIX,
            Self::Relationship => RELATIONSHIP_KEY_PREFIX,
        }
    }
}

pub fn entity_key(guid: &str) -> String {
    format!("{}{}", InstanceKind::Entity.key_prefix(), guid)
}

pub fn relationship_key(guid: &str) -> String {
    format!("{}{}", InstanceKind::Relationship.key_prefix(), guid)
}

/// Split a document key into its kind and GUID
pub fn parse_key(key: &str) -> Option<(InstanceKind, &str)> {
    [InstanceKind::Entity, InstanceKind::Relationship]
        .into_iter()
        .find_map(|kind| key.strip_prefix(kind.key_prefix()).map(|guid| (kind, guid)))
}

/// Namespaced field name for a property
pub fn property_field(kind: InstanceKind, container: &str, property: &str) -> String {
    format!("{}.{}.{}", kind.as_str(), container, property)
}

/// Container name for the properties of one classification
pub fn classification_container(classification_name: &str) -> String {
    format!("classification.{}", classification_name)
}

// === Entities ===

pub fn entity_to_document(entity: &EntityDetail) -> Document {
    let mut doc = Document::new();
    doc.insert(KEY.into(), json!(entity_key(&entity.header.guid)));
    write_header(&mut doc, "", &entity.header);
    write_properties(&mut doc, "", InstanceKind::Entity, "entity", &entity.properties);

    let names: Vec<&str> = entity.classifications.iter().map(|c| c.name.as_str()).collect();
    doc.insert(CLASSIFICATIONS.into(), json!(names));
    for classification in &entity.classifications {
        let container = classification_container(&classification.name);
        let prefix = format!("{}.", container);
        write_type_ref(&mut doc, &prefix, &classification.type_ref);
        doc.insert(format!("{}status", prefix), json!(classification.status.as_str()));
        doc.insert(format!("{}version", prefix), json!(classification.version));
        write_provenance(&mut doc, &prefix, &classification.provenance);
        write_properties(
            &mut doc,
            "",
            InstanceKind::Entity,
            &container,
            &classification.properties,
        );
    }
    doc
}

pub fn entity_from_document(doc: &Document) -> RepositoryResult<EntityDetail> {
    let header = read_header(doc, "")?;
    check_key(doc, InstanceKind::Entity, &header.guid)?;
    let properties = read_properties(doc, "", InstanceKind::Entity, "entity")?;

    let names = doc
        .get(CLASSIFICATIONS)
        .and_then(Value::as_array)
        .ok_or_else(|| missing(CLASSIFICATIONS))?;
    let mut classifications = Vec::with_capacity(names.len());
    for name in names {
        let name = name
            .as_str()
            .ok_or_else(|| RepositoryError::MalformedDocument("classification name".into()))?;
        let container = classification_container(name);
        let prefix = format!("{}.", container);
        classifications.push(Classification {
            name: name.to_string(),
            type_ref: read_type_ref(doc, &prefix)?,
            status: read_status(doc, &format!("{}status", prefix))?,
            version: read_u64(doc, &format!("{}version", prefix))?,
            provenance: read_provenance(doc, &prefix)?,
            properties: read_properties(doc, "", InstanceKind::Entity, &container)?,
        });
    }

    Ok(EntityDetail {
        header,
        classifications,
        properties,
    })
}

// === Relationships ===

pub fn relationship_to_document(relationship: &Relationship) -> Document {
    let mut doc = Document::new();
    doc.insert(KEY.into(), json!(relationship_key(&relationship.header.guid)));
    write_header(&mut doc, "", &relationship.header);
    write_properties(
        &mut doc,
        "",
        InstanceKind::Relationship,
        "relationship",
        &relationship.properties,
    );
    for (prefix, end) in [("end1.", &relationship.end1), ("end2.", &relationship.end2)] {
        write_header(&mut doc, prefix, &end.header);
        write_properties(&mut doc, prefix, InstanceKind::Entity, "entity", &end.unique_properties);
    }
    doc
}

pub fn relationship_from_document(doc: &Document) -> RepositoryResult<Relationship> {
    let read_end = |prefix: &str| -> RepositoryResult<EntityProxy> {
        Ok(EntityProxy {
            header: read_header(doc, prefix)?,
            unique_properties: read_properties(doc, prefix, InstanceKind::Entity, "entity")?,
        })
    };
    let header = read_header(doc, "")?;
    check_key(doc, InstanceKind::Relationship, &header.guid)?;
    Ok(Relationship {
        header,
        end1: read_end("end1.")?,
        end2: read_end("end2.")?,
        properties: read_properties(doc, "", InstanceKind::Relationship, "relationship")?,
    })
}

// === Field helpers ===

/// The document key must name the kind and GUID of the instance it holds
fn check_key(doc: &Document, kind: InstanceKind, guid: &str) -> RepositoryResult<()> {
    let key = read_str(doc, KEY)?;
    match parse_key(key) {
        Some((found, found_guid)) if found == kind && found_guid == guid => Ok(()),
        _ => Err(RepositoryError::MalformedDocument(format!(
            "key {} does not hold {} {}",
            key,
            kind.as_str(),
            guid
        ))),
    }
}

fn write_type_ref(doc: &mut Document, prefix: &str, type_ref: &TypeRef) {
    doc.insert(format!("{}type.guid", prefix), json!(type_ref.guid));
    doc.insert(format!("{}type.name", prefix), json!(type_ref.name));
    doc.insert(format!("{}type.category", prefix), json!(type_ref.category.as_str()));
}

fn read_type_ref(doc: &Document, prefix: &str) -> RepositoryResult<TypeRef> {
    Ok(TypeRef {
        guid: read_str(doc, &format!("{}type.guid", prefix))?.to_string(),
        name: read_str(doc, &format!("{}type.name", prefix))?.to_string(),
        category: read_str(doc, &format!("{}type.category", prefix))?
            .parse()
            .map_err(RepositoryError::MalformedDocument)?,
    })
}

fn write_provenance(doc: &mut Document, prefix: &str, provenance: &InstanceProvenance) {
    doc.insert(format!("{}createdBy", prefix), json!(provenance.created_by));
    doc.insert(
        format!("{}createTime", prefix),
        json!(provenance.create_time.to_rfc3339()),
    );
    if let Some(updated_by) = &provenance.updated_by {
        doc.insert(format!("{}updatedBy", prefix), json!(updated_by));
    }
    if let Some(update_time) = &provenance.update_time {
        doc.insert(format!("{}updateTime", prefix), json!(update_time.to_rfc3339()));
    }
    doc.insert(
        format!("{}provenanceType", prefix),
        json!(provenance.provenance_type.as_str()),
    );
}

fn read_provenance(doc: &Document, prefix: &str) -> RepositoryResult<InstanceProvenance> {
    Ok(InstanceProvenance {
        created_by: read_str(doc, &format!("{}createdBy", prefix))?.to_string(),
        create_time: read_time(doc, &format!("{}createTime", prefix))?,
        updated_by: read_opt_str(doc, &format!("{}updatedBy", prefix)).map(str::to_string),
        update_time: match read_opt_str(doc, &format!("{}updateTime", prefix)) {
            Some(s) => Some(parse_time(s)?),
            None => None,
        },
        provenance_type: read_str(doc, &format!("{}provenanceType", prefix))?
            .parse()
            .map_err(RepositoryError::MalformedDocument)?,
    })
}

fn write_header(doc: &mut Document, prefix: &str, header: &InstanceHeader) {
    doc.insert(format!("{}guid", prefix), json!(header.guid));
    write_type_ref(doc, prefix, &header.type_ref);
    doc.insert(format!("{}status", prefix), json!(header.status.as_str()));
    if let Some(status) = header.status_on_delete {
        doc.insert(format!("{}statusOnDelete", prefix), json!(status.as_str()));
    }
    doc.insert(format!("{}version", prefix), json!(header.version));
    doc.insert(
        format!("{}metadataCollectionId", prefix),
        json!(header.metadata_collection_id),
    );
    write_provenance(doc, prefix, &header.provenance);
}

fn read_header(doc: &Document, prefix: &str) -> RepositoryResult<InstanceHeader> {
    Ok(InstanceHeader {
        guid: read_str(doc, &format!("{}guid", prefix))?.to_string(),
        type_ref: read_type_ref(doc, prefix)?,
        status: read_status(doc, &format!("{}status", prefix))?,
        status_on_delete: match read_opt_str(doc, &format!("{}statusOnDelete", prefix)) {
            Some(s) => Some(s.parse().map_err(RepositoryError::MalformedDocument)?),
            None => None,
        },
        version: read_u64(doc, &format!("{}version", prefix))?,
        metadata_collection_id: read_str(doc, &format!("{}metadataCollectionId", prefix))?
            .to_string(),
        provenance: read_provenance(doc, prefix)?,
    })
}

fn write_properties(
    doc: &mut Document,
    prefix: &str,
    kind: InstanceKind,
    container: &str,
    properties: &InstanceProperties,
) {
    for (name, value) in properties {
        if let Some(stored) = to_stored_form(value) {
            doc.insert(
                format!("{}{}", prefix, property_field(kind, container, name)),
                stored,
            );
        }
    }
}

fn read_properties(
    doc: &Document,
    prefix: &str,
    kind: InstanceKind,
    container: &str,
) -> RepositoryResult<InstanceProperties> {
    let field_prefix = format!("{}{}", prefix, property_field(kind, container, ""));
    let mut properties = InstanceProperties::new();
    for (field, stored) in doc {
        if let Some(name) = field.strip_prefix(&field_prefix) {
            if let Some(value) = from_stored_form(Some(stored))? {
                properties.insert(name.to_string(), value);
            }
        }
    }
    Ok(properties)
}

fn missing(field: &str) -> RepositoryError {
    RepositoryError::MalformedDocument(format!("missing field {}", field))
}

fn read_str<'a>(doc: &'a Document, field: &str) -> RepositoryResult<&'a str> {
    doc.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(field))
}

fn read_opt_str<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

fn read_u64(doc: &Document, field: &str) -> RepositoryResult<u64> {
    doc.get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| missing(field))
}

fn read_status(doc: &Document, field: &str) -> RepositoryResult<InstanceStatus> {
    read_str(doc, field)?
        .parse()
        .map_err(RepositoryError::MalformedDocument)
}

fn read_time(doc: &Document, field: &str) -> RepositoryResult<DateTime<Utc>> {
    parse_time(read_str(doc, field)?)
}

fn parse_time(s: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::DateParse(e.to_string()))
}
