//! Core metadata model: property values, instances and type definitions

mod entity;
mod instance;
mod property;
mod relationship;
mod typedef;


pub use entity::{Classification, EntityDetail, EntityProxy, EntitySummary};
pub use instance::{
    InstanceHeader, InstanceProvenance, InstanceProvenanceType, InstanceStatus, TypeRef,
};
pub use property::{
    EnumValue, InstanceProperties, PrimitiveKind, PrimitiveValue, PropertyValue,
    ENUM_ORDINAL_DEFAULT,
};
pub use relationship::Relationship;
pub use typedef::{
    AttributeCardinality, AttributeTypeDef, AttributeTypeDefKind, EndCardinality, EnumElementDef,
    ExternalStandardMapping, RelationshipEndDef, TypeDef, TypeDefAttribute, TypeDefCategory,
    TypeDefGallery, TypeDefKind, TypeDefPatch,
};
