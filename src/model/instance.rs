//! Instance header shared by entities, proxies and relationships

use super::typedef::{TypeDef, TypeDefCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Unknown,
    Draft,
    Prepared,
    Proposed,
    Approved,
    Rejected,
    Active,
    Deprecated,
    Other,
    Deleted,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Draft => "DRAFT",
            Self::Prepared => "PREPARED",
            Self::Proposed => "PROPOSED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Active => "ACTIVE",
            Self::Deprecated => "DEPRECATED",
            Self::Other => "OTHER",
            Self::Deleted => "DELETED",
        }
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "DRAFT" => Ok(Self::Draft),
            "PREPARED" => Ok(Self::Prepared),
            "PROPOSED" => Ok(Self::Proposed),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "ACTIVE" => Ok(Self::Active),
            "DEPRECATED" => Ok(Self::Deprecated),
            "OTHER" => Ok(Self::Other),
            "DELETED" => Ok(Self::Deleted),
            _ => Err(format!("unknown instance status: {}", s)),
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an instance originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceProvenanceType {
    #[default]
    LocalCohort,
    ExportArchive,
    ContentPack,
    DeregisteredRepository,
    Configuration,
    ExternalSource,
}

impl InstanceProvenanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalCohort => "LOCAL_COHORT",
            Self::ExportArchive => "EXPORT_ARCHIVE",
            Self::ContentPack => "CONTENT_PACK",
            Self::DeregisteredRepository => "DEREGISTERED_REPOSITORY",
            Self::Configuration => "CONFIGURATION",
            Self::ExternalSource => "EXTERNAL_SOURCE",
        }
    }
}

impl std::str::FromStr for InstanceProvenanceType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCAL_COHORT" => Ok(Self::LocalCohort),
            "EXPORT_ARCHIVE" => Ok(Self::ExportArchive),
            "CONTENT_PACK" => Ok(Self::ContentPack),
            "DEREGISTERED_REPOSITORY" => Ok(Self::DeregisteredRepository),
            "CONFIGURATION" => Ok(Self::Configuration),
            "EXTERNAL_SOURCE" => Ok(Self::ExternalSource),
            _ => Err(format!("unknown provenance type: {}", s)),
        }
    }
}

/// Reference from an instance to the TypeDef it conforms to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub guid: String,
    pub name: String,
    pub category: TypeDefCategory,
}

impl From<&TypeDef> for TypeRef {
    fn from(def: &TypeDef) -> Self {
        Self {
            guid: def.guid.clone(),
            name: def.name.clone(),
            category: def.category(),
        }
    }
}

/// Who created and last changed an instance, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceProvenance {
    pub created_by: String,
    pub create_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provenance_type: InstanceProvenanceType,
}

impl InstanceProvenance {
    pub fn created_now(user_id: impl Into<String>) -> Self {
        Self {
            created_by: user_id.into(),
            create_time: Utc::now(),
            updated_by: None,
            update_time: None,
            provenance_type: InstanceProvenanceType::LocalCohort,
        }
    }

    pub fn touch(&mut self, user_id: &str) {
        self.updated_by = Some(user_id.to_string());
        self.update_time = Some(Utc::now());
    }
}

/// Header common to every instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceHeader {
    pub guid: String,
    pub type_ref: TypeRef,
    pub status: InstanceStatus,
    /// Status to return to when a soft-deleted instance is restored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_on_delete: Option<InstanceStatus>,
    pub version: u64,
    pub metadata_collection_id: String,
    pub provenance: InstanceProvenance,
}

impl InstanceHeader {
    /// Header for a freshly created instance at version 1
    pub fn new(
        type_def: &TypeDef,
        status: InstanceStatus,
        metadata_collection_id: impl Into<String>,
        user_id: &str,
    ) -> Self {
        Self {
            guid: uuid::Uuid::new_v4().to_string(),
            type_ref: TypeRef::from(type_def),
            status,
            status_on_delete: None,
            version: 1,
            metadata_collection_id: metadata_collection_id.into(),
            provenance: InstanceProvenance::created_now(user_id),
        }
    }

    /// Record a mutation: bump the version and stamp the updater
    pub fn bump(&mut self, user_id: &str) {
        self.version += 1;
        self.provenance.touch(user_id);
    }

    pub fn is_deleted(&self) -> bool {
        self.status == InstanceStatus::Deleted
    }
}
