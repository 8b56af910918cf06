//! TypeRegistry: in-memory index of the type definitions a repository supports

use crate::model::{
    AttributeTypeDef, AttributeTypeDefKind, InstanceProperties, PrimitiveKind, PrimitiveValue,
    PropertyValue, TypeDef, TypeDefAttribute, TypeDefCategory, TypeDefGallery, TypeDefKind,
};
use crate::storage::{RepositoryError, RepositoryResult};
use dashmap::DashMap;
use std::collections::HashSet;

/// Registry of TypeDefs and AttributeTypeDefs
///
/// Names are unique within the registry and GUIDs are unique across it.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    /// TypeDefs keyed by name
    types: DashMap<String, TypeDef>,
    /// TypeDef GUID to name
    guids: DashMap<String, String>,
    /// AttributeTypeDefs keyed by name
    attribute_types: DashMap<String, AttributeTypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attribute type; re-registering an identical definition is a no-op
    pub fn register_attribute_type(&self, def: AttributeTypeDef) -> RepositoryResult<()> {
        if let Some(existing) = self.attribute_types.get(&def.name) {
            if *existing == def {
                return Ok(());
            }
            return Err(RepositoryError::TypeDefConflict(format!(
                "attribute type {} already registered with a different definition",
                def.name
            )));
        }
        self.attribute_types.insert(def.name.clone(), def);
        Ok(())
    }

    /// Register a type after checking it against the types already known
    pub fn register_type(&self, def: TypeDef) -> RepositoryResult<()> {
        def.validate().map_err(RepositoryError::InvalidParameter)?;

        if self.verify(&def)? {
            return Ok(());
        }
        self.check_references(&def)?;

        self.guids.insert(def.guid.clone(), def.name.clone());
        self.types.insert(def.name.clone(), def);
        Ok(())
    }

    /// Replace a registered type with a newer version of itself
    pub fn replace_type(&self, def: TypeDef) -> RepositoryResult<()> {
        def.validate().map_err(RepositoryError::InvalidParameter)?;
        let current = self
            .get_by_name(&def.name)
            .ok_or_else(|| RepositoryError::TypeDefNotKnown(def.name.clone()))?;
        if current.guid != def.guid || def.version <= current.version {
            return Err(RepositoryError::TypeDefConflict(format!(
                "{} version {} cannot replace version {}",
                def.name, def.version, current.version
            )));
        }
        self.check_references(&def)?;
        self.types.insert(def.name.clone(), def);
        Ok(())
    }

    /// Supertype, relationship ends, classification targets and attribute
    /// types must all be registered
    fn check_references(&self, def: &TypeDef) -> RepositoryResult<()> {
        if let Some(super_name) = &def.super_type {
            let super_def = self
                .get_by_name(super_name)
                .ok_or_else(|| RepositoryError::TypeDefNotKnown(super_name.clone()))?;
            if super_def.category() != def.category() {
                return Err(RepositoryError::InvalidParameter(format!(
                    "{} cannot inherit from {} of category {}",
                    def.name,
                    super_name,
                    super_def.category()
                )));
            }
        }

        match &def.kind {
            TypeDefKind::EntityDef => {}
            TypeDefKind::RelationshipDef { end1, end2 } => {
                for end in [end1, end2] {
                    self.require_entity_def(&end.entity_type)?;
                }
            }
            TypeDefKind::ClassificationDef { valid_entity_defs } => {
                for name in valid_entity_defs {
                    self.require_entity_def(name)?;
                }
            }
        }

        for attribute in &def.attributes {
            if !self.attribute_types.contains_key(&attribute.attribute_type) {
                return Err(RepositoryError::TypeDefNotKnown(format!(
                    "attribute type {} of {}.{}",
                    attribute.attribute_type, def.name, attribute.name
                )));
            }
        }
        Ok(())
    }

    fn require_entity_def(&self, name: &str) -> RepositoryResult<()> {
        match self.get_by_name(name) {
            Some(d) if d.category() == TypeDefCategory::EntityDef => Ok(()),
            Some(_) => Err(RepositoryError::InvalidParameter(format!(
                "{} is not an EntityDef",
                name
            ))),
            None => Err(RepositoryError::TypeDefNotKnown(name.to_string())),
        }
    }

    /// Compare a candidate with the registered definition
    ///
    /// True if identical, false if neither name nor GUID is registered.
    pub fn verify(&self, def: &TypeDef) -> RepositoryResult<bool> {
        let by_name = self.get_by_name(&def.name);
        let by_guid = self.get_by_guid(&def.guid);
        match (by_name, by_guid) {
            (None, None) => Ok(false),
            (Some(existing), _) if existing == *def => Ok(true),
            (Some(existing), _) => Err(RepositoryError::TypeDefConflict(format!(
                "{} (guid {}) differs from the registered definition (guid {}, version {})",
                def.name, def.guid, existing.guid, existing.version
            ))),
            (None, Some(existing)) => Err(RepositoryError::TypeDefConflict(format!(
                "guid {} is already used by {}",
                def.guid, existing.name
            ))),
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<TypeDef> {
        self.types.get(name).map(|r| r.clone())
    }

    pub fn get_by_guid(&self, guid: &str) -> Option<TypeDef> {
        let name = self.guids.get(guid).map(|r| r.clone())?;
        self.get_by_name(&name)
    }

    pub fn get_attribute_type(&self, name: &str) -> Option<AttributeTypeDef> {
        self.attribute_types.get(name).map(|r| r.clone())
    }

    /// All definitions, sorted by name
    pub fn all(&self) -> TypeDefGallery {
        let mut type_defs: Vec<TypeDef> = self.types.iter().map(|r| r.value().clone()).collect();
        type_defs.sort_by(|a, b| a.name.cmp(&b.name));
        let mut attribute_type_defs: Vec<AttributeTypeDef> =
            self.attribute_types.iter().map(|r| r.value().clone()).collect();
        attribute_type_defs.sort_by(|a, b| a.name.cmp(&b.name));
        TypeDefGallery {
            type_defs,
            attribute_type_defs,
        }
    }

    pub fn find_by_name(&self, name: &str) -> TypeDefGallery {
        TypeDefGallery {
            type_defs: self.get_by_name(name).into_iter().collect(),
            attribute_type_defs: self.get_attribute_type(name).into_iter().collect(),
        }
    }

    pub fn find_by_category(&self, category: TypeDefCategory) -> Vec<TypeDef> {
        self.all()
            .type_defs
            .into_iter()
            .filter(|d| d.category() == category)
            .collect()
    }

    /// Types with a mapping matching all given criteria
    ///
    /// A mapping is found through every field it populates, so a mapping
    /// carrying both a standard name and an organization is returned for a
    /// search on either.
    pub fn find_by_external_id(
        &self,
        standard_name: Option<&str>,
        organization: Option<&str>,
        type_name: Option<&str>,
    ) -> RepositoryResult<Vec<TypeDef>> {
        if standard_name.is_none() && organization.is_none() && type_name.is_none() {
            return Err(RepositoryError::InvalidParameter(
                "external id search needs a standard name, organization or type name".into(),
            ));
        }
        Ok(self
            .all()
            .type_defs
            .into_iter()
            .filter(|d| {
                d.all_external_mappings()
                    .any(|m| m.matches(standard_name, organization, type_name))
            })
            .collect())
    }

    /// The type followed by its supertypes, nearest first
    pub fn lineage(&self, name: &str) -> Vec<TypeDef> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(name.to_string());
        while let Some(current) = next {
            if !seen.insert(current.clone()) {
                break;
            }
            match self.get_by_name(&current) {
                Some(def) => {
                    next = def.super_type.clone();
                    chain.push(def);
                }
                None => break,
            }
        }
        chain
    }

    /// True if `name` is `ancestor` or inherits from it
    pub fn is_type_of(&self, name: &str, ancestor: &str) -> bool {
        self.lineage(name).iter().any(|d| d.name == ancestor)
    }

    /// Attributes declared by the type and its supertypes, supertypes first
    pub fn all_attributes(&self, name: &str) -> Vec<TypeDefAttribute> {
        let mut attributes = Vec::new();
        for def in self.lineage(name).into_iter().rev() {
            attributes.extend(def.attributes);
        }
        attributes
    }

    /// Names of the attributes that identify instances of the type
    pub fn unique_attribute_names(&self, name: &str) -> Vec<String> {
        self.all_attributes(name)
            .into_iter()
            .filter(|a| a.unique)
            .map(|a| a.name)
            .collect()
    }

    /// True if a classification may be attached to an entity of this type
    pub fn classification_allowed(&self, classification: &TypeDef, entity_type: &str) -> bool {
        match &classification.kind {
            TypeDefKind::ClassificationDef { valid_entity_defs } => {
                valid_entity_defs.is_empty()
                    || valid_entity_defs
                        .iter()
                        .any(|valid| self.is_type_of(entity_type, valid))
            }
            _ => false,
        }
    }

    /// Check properties against the attributes of a type
    ///
    /// Rejects undeclared properties and values of the wrong shape. When
    /// `require_mandatory` is set, every mandatory attribute must be present.
    pub fn validate_properties(
        &self,
        type_name: &str,
        properties: &InstanceProperties,
        require_mandatory: bool,
    ) -> RepositoryResult<()> {
        let attributes = self.all_attributes(type_name);

        for (name, value) in properties {
            let attribute = attributes.iter().find(|a| &a.name == name).ok_or_else(|| {
                RepositoryError::PropertyError(format!(
                    "{} is not an attribute of {}",
                    name, type_name
                ))
            })?;
            let attribute_type = self
                .get_attribute_type(&attribute.attribute_type)
                .ok_or_else(|| RepositoryError::TypeDefNotKnown(attribute.attribute_type.clone()))?;
            if !value_fits(&attribute_type.kind, value) {
                return Err(RepositoryError::PropertyError(format!(
                    "{}.{} expects {} but got a {} value",
                    type_name,
                    name,
                    attribute_type.name,
                    value.category_name()
                )));
            }
        }

        if require_mandatory {
            if let Some(missing) = attributes
                .iter()
                .find(|a| a.cardinality.is_mandatory() && !properties.contains_key(&a.name))
            {
                return Err(RepositoryError::PropertyError(format!(
                    "mandatory attribute {}.{} is missing",
                    type_name, missing.name
                )));
            }
        }
        Ok(())
    }
}

/// Non-finite floats never fit: they compare unequal to themselves on read back
fn primitive_fits(kind: PrimitiveKind, value: &PropertyValue) -> bool {
    match value {
        PropertyValue::Primitive(PrimitiveValue::Float(n)) => {
            kind == PrimitiveKind::Float && n.is_finite()
        }
        PropertyValue::Primitive(PrimitiveValue::Double(n)) => {
            kind == PrimitiveKind::Double && n.is_finite()
        }
        PropertyValue::Primitive(p) => p.kind() == kind,
        _ => false,
    }
}

fn value_fits(kind: &AttributeTypeDefKind, value: &PropertyValue) -> bool {
    match (kind, value) {
        (AttributeTypeDefKind::Primitive { primitive }, v) => primitive_fits(*primitive, v),
        (AttributeTypeDefKind::Enum { elements, .. }, PropertyValue::Enum(e)) => {
            elements.iter().any(|el| {
                el.value == e.symbolic_name
                    && e.ordinal.map_or(true, |ordinal| ordinal == el.ordinal)
            })
        }
        (AttributeTypeDefKind::Array { element }, PropertyValue::Array(values)) => {
            values.iter().all(|v| primitive_fits(*element, v))
        }
        (AttributeTypeDefKind::Map { element }, PropertyValue::Map(values)) => {
            values.values().all(|v| primitive_fits(*element, v))
        }
        _ => false,
    }
}
