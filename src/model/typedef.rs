//! Type definitions for entities, relationships and classifications

use super::instance::InstanceStatus;
use super::property::PrimitiveKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default creation time for definitions loaded without one
fn default_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}

fn default_version() -> u64 {
    1
}

fn default_version_name() -> String {
    "1.0".to_string()
}

fn default_valid_statuses() -> Vec<InstanceStatus> {
    vec![InstanceStatus::Active]
}

fn default_initial_status() -> InstanceStatus {
    InstanceStatus::Active
}

/// Category of a TypeDef
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDefCategory {
    EntityDef,
    RelationshipDef,
    ClassificationDef,
}

impl TypeDefCategory {
    pub const ALL: [TypeDefCategory; 3] = [
        TypeDefCategory::EntityDef,
        TypeDefCategory::RelationshipDef,
        TypeDefCategory::ClassificationDef,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityDef => "EntityDef",
            Self::RelationshipDef => "RelationshipDef",
            Self::ClassificationDef => "ClassificationDef",
        }
    }
}

impl std::str::FromStr for TypeDefCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EntityDef" => Ok(Self::EntityDef),
            "RelationshipDef" => Ok(Self::RelationshipDef),
            "ClassificationDef" => Ok(Self::ClassificationDef),
            _ => Err(format!("unknown typedef category: {}", s)),
        }
    }
}

impl std::fmt::Display for TypeDefCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-reference from a type or attribute to an industry standard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalStandardMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_type_name: Option<String>,
}

impl ExternalStandardMapping {
    /// True when every criterion that is given matches this mapping
    pub fn matches(
        &self,
        standard_name: Option<&str>,
        organization: Option<&str>,
        type_name: Option<&str>,
    ) -> bool {
        fn field_matches(field: &Option<String>, wanted: Option<&str>) -> bool {
            match wanted {
                Some(w) => field.as_deref() == Some(w),
                None => true,
            }
        }
        field_matches(&self.standard_name, standard_name)
            && field_matches(&self.standard_organization, organization)
            && field_matches(&self.standard_type_name, type_name)
    }
}

/// How many values an attribute holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeCardinality {
    #[default]
    AtMostOne,
    ExactlyOne,
    AtLeastOne,
    AnyNumber,
}

impl AttributeCardinality {
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::ExactlyOne | Self::AtLeastOne)
    }
}

/// An attribute declared by a TypeDef
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefAttribute {
    pub name: String,
    /// Name of the AttributeTypeDef describing the values
    pub attribute_type: String,
    #[serde(default)]
    pub cardinality: AttributeCardinality,
    /// Unique attributes identify an entity and are copied onto its proxies
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_standard_mappings: Vec<ExternalStandardMapping>,
}

impl TypeDefAttribute {
    pub fn new(name: impl Into<String>, attribute_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: attribute_type.into(),
            cardinality: AttributeCardinality::AtMostOne,
            unique: false,
            description: None,
            external_standard_mappings: Vec::new(),
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.cardinality = AttributeCardinality::ExactlyOne;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Multiplicity of a relationship end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCardinality {
    AtMostOne,
    #[default]
    AnyNumber,
}

/// One end of a RelationshipDef
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEndDef {
    /// Name of the EntityDef at this end
    pub entity_type: String,
    pub attribute_name: String,
    #[serde(default)]
    pub cardinality: EndCardinality,
}

/// Category-specific part of a TypeDef
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum TypeDefKind {
    EntityDef,
    RelationshipDef {
        end1: RelationshipEndDef,
        end2: RelationshipEndDef,
    },
    ClassificationDef {
        /// EntityDefs the classification may be attached to; empty means any
        #[serde(default)]
        valid_entity_defs: Vec<String>,
    },
}

/// A versioned, named type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub guid: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default = "default_version_name")]
    pub version_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the supertype, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_type: Option<String>,
    #[serde(flatten)]
    pub kind: TypeDefKind,
    #[serde(default = "default_initial_status")]
    pub initial_status: InstanceStatus,
    #[serde(default = "default_valid_statuses")]
    pub valid_statuses: Vec<InstanceStatus>,
    #[serde(default)]
    pub attributes: Vec<TypeDefAttribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_standard_mappings: Vec<ExternalStandardMapping>,
    pub created_by: String,
    #[serde(default = "default_timestamp")]
    pub create_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl TypeDef {
    /// Create a version 1 definition with ACTIVE as its only status
    pub fn new(
        guid: impl Into<String>,
        name: impl Into<String>,
        kind: TypeDefKind,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            version: 1,
            version_name: default_version_name(),
            description: None,
            super_type: None,
            kind,
            initial_status: InstanceStatus::Active,
            valid_statuses: default_valid_statuses(),
            attributes: Vec::new(),
            external_standard_mappings: Vec::new(),
            created_by: created_by.into(),
            create_time: Utc::now(),
            updated_by: None,
            update_time: None,
        }
    }

    pub fn with_attribute(mut self, attribute: TypeDefAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_super_type(mut self, super_type: impl Into<String>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    pub fn with_statuses(mut self, initial: InstanceStatus, valid: Vec<InstanceStatus>) -> Self {
        self.initial_status = initial;
        self.valid_statuses = valid;
        self
    }

    pub fn category(&self) -> TypeDefCategory {
        match self.kind {
            TypeDefKind::EntityDef => TypeDefCategory::EntityDef,
            TypeDefKind::RelationshipDef { .. } => TypeDefCategory::RelationshipDef,
            TypeDefKind::ClassificationDef { .. } => TypeDefCategory::ClassificationDef,
        }
    }

    pub fn supports_status(&self, status: InstanceStatus) -> bool {
        self.valid_statuses.contains(&status)
    }

    /// True when the type or any of its own attributes carries a mapping
    pub fn has_external_mappings(&self) -> bool {
        !self.external_standard_mappings.is_empty()
            || self
                .attributes
                .iter()
                .any(|a| !a.external_standard_mappings.is_empty())
    }

    /// Mappings on the type followed by mappings on its attributes
    pub fn all_external_mappings(&self) -> impl Iterator<Item = &ExternalStandardMapping> {
        self.external_standard_mappings.iter().chain(
            self.attributes
                .iter()
                .flat_map(|a| a.external_standard_mappings.iter()),
        )
    }

    /// Check the structural invariants every definition must satisfy
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.guid.trim().is_empty() {
            return Err("typedef name and guid must be non-empty".into());
        }
        if self.version == 0 {
            return Err(format!("typedef {} has version 0", self.name));
        }
        if !self.valid_statuses.contains(&self.initial_status) {
            return Err(format!(
                "typedef {} initial status {} is not a valid status",
                self.name, self.initial_status
            ));
        }
        if self.created_by.trim().is_empty() {
            return Err(format!("typedef {} has no creator", self.name));
        }
        let has_updater = self.updated_by.is_some() && self.update_time.is_some();
        if self.version > 1 && !has_updater {
            return Err(format!(
                "typedef {} at version {} has no updater",
                self.name, self.version
            ));
        }
        if self.version == 1 && (self.updated_by.is_some() || self.update_time.is_some()) {
            return Err(format!("typedef {} at version 1 records an update", self.name));
        }
        Ok(())
    }
}

/// Category-specific part of an AttributeTypeDef
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum AttributeTypeDefKind {
    Primitive { primitive: PrimitiveKind },
    Enum {
        elements: Vec<EnumElementDef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_ordinal: Option<i32>,
    },
    Array { element: PrimitiveKind },
    Map { element: PrimitiveKind },
}

/// One symbol of an enum AttributeTypeDef
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumElementDef {
    pub ordinal: i32,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Definition of the values an attribute may hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeTypeDef {
    pub guid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: AttributeTypeDefKind,
}

impl AttributeTypeDef {
    pub fn primitive(guid: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self {
            guid: guid.into(),
            name: kind.as_str().to_string(),
            description: None,
            kind: AttributeTypeDefKind::Primitive { primitive: kind },
        }
    }
}

/// The result of a type query: type definitions and attribute type definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDefGallery {
    #[serde(default)]
    pub type_defs: Vec<TypeDef>,
    #[serde(default)]
    pub attribute_type_defs: Vec<AttributeTypeDef>,
}

/// A change applied to an existing TypeDef
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefPatch {
    pub type_name: String,
    pub applied_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version_name: Option<String>,
    #[serde(default)]
    pub new_attributes: Vec<TypeDefAttribute>,
}

impl TypeDefPatch {
    /// Apply the patch, producing the next version of the definition
    pub fn apply_to(&self, def: &TypeDef) -> Result<TypeDef, String> {
        if def.name != self.type_name {
            return Err(format!(
                "patch for {} applied to {}",
                self.type_name, def.name
            ));
        }
        for attribute in &self.new_attributes {
            if def.attributes.iter().any(|a| a.name == attribute.name) {
                return Err(format!(
                    "attribute {} already defined on {}",
                    attribute.name, def.name
                ));
            }
            if attribute.cardinality.is_mandatory() {
                return Err(format!(
                    "patch cannot add mandatory attribute {} to {}",
                    attribute.name, def.name
                ));
            }
        }

        let mut next = def.clone();
        next.version += 1;
        next.version_name = self
            .new_version_name
            .clone()
            .unwrap_or_else(|| format!("{}.0", next.version));
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        next.attributes.extend(self.new_attributes.iter().cloned());
        next.updated_by = Some(self.applied_by.clone());
        next.update_time = Some(Utc::now());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_def() -> TypeDef {
        TypeDef::new("guid-1", "Asset", TypeDefKind::EntityDef, "admin")
            .with_attribute(TypeDefAttribute::new("qualifiedName", "string").mandatory().unique())
    }

    #[test]
    fn initial_status_must_be_valid() {
        let def = entity_def().with_statuses(InstanceStatus::Draft, vec![InstanceStatus::Active]);
        assert!(def.validate().is_err());
        assert!(entity_def().validate().is_ok());
    }

    #[test]
    fn patch_bumps_version_and_stamps_updater() {
        let def = entity_def();
        let patch = TypeDefPatch {
            type_name: "Asset".into(),
            applied_by: "steward".into(),
            description: Some("Anything of value".into()),
            new_version_name: None,
            new_attributes: vec![TypeDefAttribute::new("owner", "string")],
        };
        let next = patch.apply_to(&def).unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.version_name, "2.0");
        assert_eq!(next.updated_by.as_deref(), Some("steward"));
        assert_eq!(next.attributes.len(), 2);
        assert!(next.validate().is_ok());
    }

    #[test]
    fn patch_rejects_mandatory_attribute() {
        let patch = TypeDefPatch {
            type_name: "Asset".into(),
            applied_by: "steward".into(),
            description: None,
            new_version_name: None,
            new_attributes: vec![TypeDefAttribute::new("owner", "string").mandatory()],
        };
        assert!(patch.apply_to(&entity_def()).is_err());
    }

    #[test]
    fn mapping_matches_given_criteria_only() {
        let mapping = ExternalStandardMapping {
            standard_name: Some("SKOS".into()),
            standard_organization: Some("W3C".into()),
            standard_type_name: None,
        };
        assert!(mapping.matches(Some("SKOS"), None, None));
        assert!(mapping.matches(None, Some("W3C"), None));
        assert!(mapping.matches(Some("SKOS"), Some("W3C"), None));
        assert!(!mapping.matches(None, None, Some("Concept")));
    }

    #[test]
    fn relationship_def_serializes_with_category_tag() {
        let def = TypeDef::new(
            "guid-2",
            "TermAnchor",
            TypeDefKind::RelationshipDef {
                end1: RelationshipEndDef {
                    entity_type: "Glossary".into(),
                    attribute_name: "anchor".into(),
                    cardinality: EndCardinality::AtMostOne,
                },
                end2: RelationshipEndDef {
                    entity_type: "GlossaryTerm".into(),
                    attribute_name: "terms".into(),
                    cardinality: EndCardinality::AnyNumber,
                },
            },
            "admin",
        );
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["category"], "RelationshipDef");
        assert_eq!(json["end1"]["entity_type"], "Glossary");

        let back: TypeDef = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }
}
