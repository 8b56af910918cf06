//! Relationships between two entities

use super::entity::EntityProxy;
use super::instance::InstanceHeader;
use super::property::InstanceProperties;
use serde::{Deserialize, Serialize};

/// A typed link between two entities
///
/// `end1` and `end2` follow the order of the RelationshipDef ends and are
/// not interchangeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub header: InstanceHeader,
    pub end1: EntityProxy,
    pub end2: EntityProxy,
    #[serde(default)]
    pub properties: InstanceProperties,
}

impl Relationship {
    pub fn guid(&self) -> &str {
        &self.header.guid
    }

    /// True when the entity is at either end
    pub fn touches(&self, entity_guid: &str) -> bool {
        self.end1.guid() == entity_guid || self.end2.guid() == entity_guid
    }
}
