//! Entities, their proxies and classifications

use super::instance::{InstanceHeader, InstanceProvenance, InstanceStatus, TypeRef};
use super::property::InstanceProperties;
use super::typedef::TypeDef;
use serde::{Deserialize, Serialize};

/// A classification attached to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Name of the ClassificationDef
    pub name: String,
    pub type_ref: TypeRef,
    pub status: InstanceStatus,
    pub version: u64,
    pub provenance: InstanceProvenance,
    #[serde(default)]
    pub properties: InstanceProperties,
}

impl Classification {
    pub fn new(type_def: &TypeDef, properties: InstanceProperties, user_id: &str) -> Self {
        Self {
            name: type_def.name.clone(),
            type_ref: TypeRef::from(type_def),
            status: type_def.initial_status,
            version: 1,
            provenance: InstanceProvenance::created_now(user_id),
            properties,
        }
    }
}

/// Header plus classifications, without properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub header: InstanceHeader,
    #[serde(default)]
    pub classifications: Vec<Classification>,
}

/// An entity with its full property set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDetail {
    pub header: InstanceHeader,
    #[serde(default)]
    pub classifications: Vec<Classification>,
    #[serde(default)]
    pub properties: InstanceProperties,
}

impl EntityDetail {
    pub fn guid(&self) -> &str {
        &self.header.guid
    }

    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            header: self.header.clone(),
            classifications: self.classifications.clone(),
        }
    }

    pub fn classification(&self, name: &str) -> Option<&Classification> {
        self.classifications.iter().find(|c| c.name == name)
    }

    /// Build a proxy carrying only the named identifying properties
    pub fn proxy<'a>(&self, unique_names: impl IntoIterator<Item = &'a str>) -> EntityProxy {
        let unique_properties = unique_names
            .into_iter()
            .filter_map(|name| {
                self.properties
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();
        EntityProxy {
            header: self.header.clone(),
            unique_properties,
        }
    }
}

/// Stand-in for an entity at a relationship end
///
/// Carries the header and the entity's unique properties only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProxy {
    pub header: InstanceHeader,
    #[serde(default)]
    pub unique_properties: InstanceProperties,
}

impl EntityProxy {
    pub fn guid(&self) -> &str {
        &self.header.guid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyValue, TypeDefAttribute, TypeDefKind};

    fn detail() -> EntityDetail {
        let def = TypeDef::new("g", "Asset", TypeDefKind::EntityDef, "admin")
            .with_attribute(TypeDefAttribute::new("qualifiedName", "string").unique());
        let mut properties = InstanceProperties::new();
        properties.insert("qualifiedName".into(), PropertyValue::string("asset-1"));
        properties.insert("description".into(), PropertyValue::string("first"));
        EntityDetail {
            header: InstanceHeader::new(&def, InstanceStatus::Active, "mc-1", "alice"),
            classifications: Vec::new(),
            properties,
        }
    }

    #[test]
    fn proxy_keeps_only_unique_properties() {
        let entity = detail();
        let proxy = entity.proxy(["qualifiedName"]);
        assert_eq!(proxy.guid(), entity.guid());
        assert_eq!(proxy.unique_properties.len(), 1);
        assert!(proxy.unique_properties.contains_key("qualifiedName"));
        assert!(!proxy.unique_properties.contains_key("description"));
    }

    #[test]
    fn summary_drops_properties() {
        let entity = detail();
        let summary = entity.summary();
        assert_eq!(summary.header, entity.header);
        assert!(summary.classifications.is_empty());
    }
}
