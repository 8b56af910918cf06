//! Synthesized property values for test instances

use crate::model::{
    AttributeTypeDefKind, EnumValue, InstanceProperties, PrimitiveKind, PrimitiveValue,
    PropertyValue, TypeDef, TypeDefAttribute,
};
use crate::storage::{MetadataCollection, RepositoryError, RepositoryResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Which attributes a generated property set populates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationProfile {
    /// Every attribute, inherited ones included
    #[default]
    Full,
    /// Mandatory attributes only; may be empty
    Minimal,
}

/// Builds property sets that satisfy a type's attribute definitions
///
/// String values carry a run-scoped prefix so instances created by
/// different runs against the same repository can be told apart.
#[derive(Debug, Clone)]
pub struct PropertyGenerator {
    prefix: String,
}

impl PropertyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Properties for an instance of `def`
    ///
    /// `instance_tag` keeps string values distinct between instances of the
    /// same type created within one case.
    pub fn properties(
        &self,
        repository: &dyn MetadataCollection,
        def: &TypeDef,
        profile: CreationProfile,
        instance_tag: &str,
    ) -> RepositoryResult<InstanceProperties> {
        let mut properties = InstanceProperties::new();
        for (position, attribute) in inherited_attributes(repository, def)?.iter().enumerate() {
            if profile == CreationProfile::Minimal && !attribute.cardinality.is_mandatory() {
                continue;
            }
            let attribute_type = repository
                .get_attribute_typedef_by_name(&attribute.attribute_type)?
                .ok_or_else(|| RepositoryError::TypeDefNotKnown(attribute.attribute_type.clone()))?;
            let seed = position as i32 + 1;
            let value = self.value_for(&attribute_type.kind, def, attribute, instance_tag, seed);
            if let Some(value) = value {
                properties.insert(attribute.name.clone(), value);
            }
        }
        Ok(properties)
    }

    fn value_for(
        &self,
        kind: &AttributeTypeDefKind,
        def: &TypeDef,
        attribute: &TypeDefAttribute,
        instance_tag: &str,
        seed: i32,
    ) -> Option<PropertyValue> {
        let text = format!("{}.{}.{}.{}", self.prefix, def.name, attribute.name, instance_tag);
        match kind {
            AttributeTypeDefKind::Primitive { primitive } => {
                Some(PropertyValue::Primitive(primitive_value(*primitive, &text, seed)))
            }
            AttributeTypeDefKind::Enum {
                elements,
                default_ordinal,
            } => {
                let element = default_ordinal
                    .and_then(|ordinal| elements.iter().find(|e| e.ordinal == ordinal))
                    .or_else(|| elements.first())?;
                Some(PropertyValue::Enum(EnumValue::new(
                    element.value.clone(),
                    element.ordinal,
                )))
            }
            AttributeTypeDefKind::Array { element } => {
                let first = primitive_value(*element, &format!("{}.0", text), seed);
                let second = primitive_value(*element, &format!("{}.1", text), seed + 1);
                Some(PropertyValue::Array(vec![
                    PropertyValue::Primitive(first),
                    PropertyValue::Primitive(second),
                ]))
            }
            AttributeTypeDefKind::Map { element } => {
                let mut values = BTreeMap::new();
                values.insert(
                    format!("{}Key", attribute.name),
                    PropertyValue::Primitive(primitive_value(*element, &text, seed)),
                );
                Some(PropertyValue::Map(values))
            }
        }
    }
}

fn primitive_value(kind: PrimitiveKind, text: &str, seed: i32) -> PrimitiveValue {
    match kind {
        PrimitiveKind::Boolean => PrimitiveValue::Boolean(seed % 2 == 1),
        PrimitiveKind::Byte => PrimitiveValue::Byte((seed % 100) as i8),
        PrimitiveKind::Char => PrimitiveValue::Char(char::from(b'a' + (seed % 26) as u8)),
        PrimitiveKind::Short => PrimitiveValue::Short(seed as i16),
        PrimitiveKind::Int => PrimitiveValue::Int(seed),
        PrimitiveKind::Long => PrimitiveValue::Long(i64::from(seed) * 1_000_000_007),
        PrimitiveKind::Float => PrimitiveValue::Float(seed as f32 + 0.5),
        PrimitiveKind::Double => PrimitiveValue::Double(f64::from(seed) + 0.25),
        PrimitiveKind::BigInteger => {
            PrimitiveValue::BigInteger(format!("{}000000000000000000000", seed))
        }
        PrimitiveKind::BigDecimal => {
            PrimitiveValue::BigDecimal(format!("{}.000000000000000000001", seed))
        }
        PrimitiveKind::String => PrimitiveValue::String(text.to_string()),
        PrimitiveKind::Date => {
            PrimitiveValue::Date(1_700_000_000_000 + i64::from(seed) * 86_400_000)
        }
    }
}

/// Attributes of `def` and its supertypes, supertypes first
pub fn inherited_attributes(
    repository: &dyn MetadataCollection,
    def: &TypeDef,
) -> RepositoryResult<Vec<TypeDefAttribute>> {
    let mut chain = vec![def.clone()];
    let mut seen: HashSet<String> = HashSet::from([def.name.clone()]);
    let mut next = def.super_type.clone();
    while let Some(name) = next {
        if !seen.insert(name.clone()) {
            break;
        }
        let super_def = repository
            .get_typedef_by_name(&name)?
            .ok_or_else(|| RepositoryError::TypeDefNotKnown(name.clone()))?;
        next = super_def.super_type.clone();
        chain.push(super_def);
    }
    Ok(chain
        .into_iter()
        .rev()
        .flat_map(|d| d.attributes)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{OpenRepository, RepositoryOptions, SqliteRepository};
    use crate::types::TypeCatalog;

    fn repository() -> SqliteRepository {
        let repository = SqliteRepository::open_in_memory(RepositoryOptions::default()).unwrap();
        TypeCatalog::builtin().unwrap().load_into(&repository).unwrap();
        repository
    }

    #[test]
    fn full_profile_covers_inherited_attributes() {
        let repository = repository();
        let def = repository.get_typedef_by_name("DataSet").unwrap().unwrap();
        let generator = PropertyGenerator::new("run-1");
        let props = generator
            .properties(&repository, &def, CreationProfile::Full, "a")
            .unwrap();

        assert_eq!(
            props.get("qualifiedName").and_then(PropertyValue::as_str),
            Some("run-1.DataSet.qualifiedName.a")
        );
        assert!(props.contains_key("recordCount"));
        assert!(props.contains_key("additionalProperties"));
        assert!(repository.add_entity("u", &def.guid, props, None).is_ok());
    }

    #[test]
    fn minimal_profile_has_only_mandatory_attributes() {
        let repository = repository();
        let generator = PropertyGenerator::new("run-1");

        let glossary = repository.get_typedef_by_name("Glossary").unwrap().unwrap();
        let props = generator
            .properties(&repository, &glossary, CreationProfile::Minimal, "a")
            .unwrap();
        let names: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["displayName", "qualifiedName"]);

        let memento = repository.get_typedef_by_name("Memento").unwrap().unwrap();
        let props = generator
            .properties(&repository, &memento, CreationProfile::Minimal, "a")
            .unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn enum_attributes_use_the_default_element() {
        let repository = repository();
        let def = repository
            .get_typedef_by_name("SemanticAssignment")
            .unwrap()
            .unwrap();
        let props = PropertyGenerator::new("p")
            .properties(&repository, &def, CreationProfile::Full, "a")
            .unwrap();
        match props.get("status") {
            Some(PropertyValue::Enum(e)) => assert_eq!(e.ordinal, Some(1)),
            other => panic!("expected enum, got {:?}", other),
        }
    }
}
