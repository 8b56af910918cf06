//! Stored form of property values inside documents
//!
//! Each value becomes a self-describing JSON fragment:
//!
//! - primitive: `{"category": "primitive", "type": "int", "value": 5}`
//! - enum: `{"category": "enum", "symbolicName": "High", "ordinal": 1}`
//! - array/map/struct: `{"category": "array", "values": [...]}`
//!
//! Non-finite floats keep their value as the text `NaN`, `Infinity` or
//! `-Infinity`, since JSON numbers cannot carry them.
//!
//! An empty Array, Map or Struct has no stored form at all: the field is
//! left out of the document and reads back as `None`. Members whose stored
//! form is absent are dropped from their parent collection.

use super::traits::{RepositoryError, RepositoryResult};
use crate::model::{EnumValue, InstanceProperties, PrimitiveKind, PrimitiveValue, PropertyValue};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const CATEGORY: &str = "category";
const TYPE: &str = "type";
const VALUE: &str = "value";
const VALUES: &str = "values";

/// Convert a value to its stored fragment; `None` means "leave the field out"
pub fn to_stored_form(value: &PropertyValue) -> Option<Value> {
    match value {
        PropertyValue::Primitive(p) => Some(json!({
            CATEGORY: "primitive",
            TYPE: p.kind().as_str(),
            VALUE: native_form(p),
        })),
        PropertyValue::Enum(e) => {
            let mut fragment = Map::new();
            fragment.insert(CATEGORY.into(), json!("enum"));
            fragment.insert("symbolicName".into(), json!(e.symbolic_name));
            if let Some(ordinal) = e.ordinal {
                fragment.insert("ordinal".into(), json!(ordinal));
            }
            if let Some(description) = &e.description {
                fragment.insert("description".into(), json!(description));
            }
            Some(Value::Object(fragment))
        }
        PropertyValue::Array(values) => {
            let stored: Vec<Value> = values.iter().filter_map(to_stored_form).collect();
            if stored.is_empty() {
                return None;
            }
            Some(json!({ CATEGORY: "array", VALUES: stored }))
        }
        PropertyValue::Map(values) => named_to_stored("map", values),
        PropertyValue::Struct(values) => named_to_stored("struct", values),
    }
}

fn named_to_stored(category: &str, values: &BTreeMap<String, PropertyValue>) -> Option<Value> {
    let stored: Map<String, Value> = values
        .iter()
        .filter_map(|(k, v)| to_stored_form(v).map(|s| (k.clone(), s)))
        .collect();
    if stored.is_empty() {
        return None;
    }
    Some(json!({ CATEGORY: category, VALUES: stored }))
}

/// Properties as they read back after storage, with empty collections gone
pub fn stored_properties(properties: InstanceProperties) -> InstanceProperties {
    properties
        .into_iter()
        .filter_map(|(name, value)| stored_shape(value).map(|v| (name, v)))
        .collect()
}

fn stored_shape(value: PropertyValue) -> Option<PropertyValue> {
    match value {
        PropertyValue::Array(values) => {
            let kept: Vec<PropertyValue> = values.into_iter().filter_map(stored_shape).collect();
            (!kept.is_empty()).then_some(PropertyValue::Array(kept))
        }
        PropertyValue::Map(values) => {
            let kept = stored_properties(values);
            (!kept.is_empty()).then_some(PropertyValue::Map(kept))
        }
        PropertyValue::Struct(values) => {
            let kept = stored_properties(values);
            (!kept.is_empty()).then_some(PropertyValue::Struct(kept))
        }
        other => Some(other),
    }
}

/// Read a value back from its stored fragment; an absent field yields `None`
pub fn from_stored_form(fragment: Option<&Value>) -> RepositoryResult<Option<PropertyValue>> {
    let fragment = match fragment {
        None | Some(Value::Null) => return Ok(None),
        Some(f) => f,
    };
    let object = fragment
        .as_object()
        .ok_or_else(|| malformed("property fragment is not an object", fragment))?;
    let category = object
        .get(CATEGORY)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("property fragment has no category", fragment))?;

    let value = match category {
        "primitive" => {
            let kind: PrimitiveKind = object
                .get(TYPE)
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("primitive fragment has no type", fragment))?
                .parse()
                .map_err(RepositoryError::MalformedDocument)?;
            let native = object
                .get(VALUE)
                .ok_or_else(|| malformed("primitive fragment has no value", fragment))?;
            PropertyValue::Primitive(primitive_from_native(kind, native)?)
        }
        "enum" => {
            let symbolic_name = object
                .get("symbolicName")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("enum fragment has no symbolic name", fragment))?;
            let ordinal = match object.get("ordinal") {
                Some(v) => Some(as_i32(v).ok_or_else(|| malformed("enum ordinal", fragment))?),
                None => None,
            };
            PropertyValue::Enum(EnumValue {
                symbolic_name: symbolic_name.to_string(),
                ordinal,
                description: object
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        }
        "array" => {
            let stored = object
                .get(VALUES)
                .and_then(Value::as_array)
                .ok_or_else(|| malformed("array fragment has no values", fragment))?;
            let mut values = Vec::with_capacity(stored.len());
            for member in stored {
                if let Some(v) = from_stored_form(Some(member))? {
                    values.push(v);
                }
            }
            if values.is_empty() {
                return Ok(None);
            }
            PropertyValue::Array(values)
        }
        "map" | "struct" => {
            let stored = object
                .get(VALUES)
                .and_then(Value::as_object)
                .ok_or_else(|| malformed("collection fragment has no values", fragment))?;
            let mut values = BTreeMap::new();
            for (name, member) in stored {
                if let Some(v) = from_stored_form(Some(member))? {
                    values.insert(name.clone(), v);
                }
            }
            if values.is_empty() {
                return Ok(None);
            }
            if category == "map" {
                PropertyValue::Map(values)
            } else {
                PropertyValue::Struct(values)
            }
        }
        other => {
            return Err(RepositoryError::MalformedDocument(format!(
                "unknown property category {}",
                other
            )))
        }
    };
    Ok(Some(value))
}

fn primitive_from_native(kind: PrimitiveKind, native: &Value) -> RepositoryResult<PrimitiveValue> {
    let bad = || malformed(&format!("not a valid {} value", kind), native);
    let value = match kind {
        PrimitiveKind::Boolean => PrimitiveValue::Boolean(native.as_bool().ok_or_else(bad)?),
        PrimitiveKind::Byte => PrimitiveValue::Byte(
            native.as_i64().and_then(|n| i8::try_from(n).ok()).ok_or_else(bad)?,
        ),
        PrimitiveKind::Char => {
            let s = native.as_str().ok_or_else(bad)?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => PrimitiveValue::Char(c),
                _ => return Err(bad()),
            }
        }
        PrimitiveKind::Short => PrimitiveValue::Short(
            native.as_i64().and_then(|n| i16::try_from(n).ok()).ok_or_else(bad)?,
        ),
        PrimitiveKind::Int => PrimitiveValue::Int(as_i32(native).ok_or_else(bad)?),
        PrimitiveKind::Long => PrimitiveValue::Long(native.as_i64().ok_or_else(bad)?),
        PrimitiveKind::Float => {
            PrimitiveValue::Float(float_from_native(native).ok_or_else(bad)? as f32)
        }
        PrimitiveKind::Double => {
            PrimitiveValue::Double(float_from_native(native).ok_or_else(bad)?)
        }
        PrimitiveKind::BigInteger => {
            PrimitiveValue::BigInteger(native.as_str().ok_or_else(bad)?.to_string())
        }
        PrimitiveKind::BigDecimal => {
            PrimitiveValue::BigDecimal(native.as_str().ok_or_else(bad)?.to_string())
        }
        PrimitiveKind::String => {
            PrimitiveValue::String(native.as_str().ok_or_else(bad)?.to_string())
        }
        PrimitiveKind::Date => PrimitiveValue::Date(native.as_i64().ok_or_else(bad)?),
    };
    Ok(value)
}

fn native_form(primitive: &PrimitiveValue) -> Value {
    match primitive {
        PrimitiveValue::Float(n) if !n.is_finite() => json!(non_finite_name(f64::from(*n))),
        PrimitiveValue::Double(n) if !n.is_finite() => json!(non_finite_name(*n)),
        other => other.to_native(),
    }
}

fn non_finite_name(n: f64) -> &'static str {
    if n.is_nan() {
        "NaN"
    } else if n > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn float_from_native(native: &Value) -> Option<f64> {
    if let Some(n) = native.as_f64() {
        return Some(n);
    }
    match native.as_str()? {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn as_i32(value: &Value) -> Option<i32> {
    value.as_i64().and_then(|n| i32::try_from(n).ok())
}

fn malformed(reason: &str, fragment: &Value) -> RepositoryError {
    RepositoryError::MalformedDocument(format!("{}: {}", reason, fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &PropertyValue) -> Option<PropertyValue> {
        from_stored_form(to_stored_form(value).as_ref()).unwrap()
    }

    #[test]
    fn primitives_round_trip() {
        let values = [
            PrimitiveValue::Boolean(true),
            PrimitiveValue::Byte(-7),
            PrimitiveValue::Char('ß'),
            PrimitiveValue::Short(1234),
            PrimitiveValue::Int(-42),
            PrimitiveValue::Long(9_007_199_254_740_993),
            PrimitiveValue::Float(1.5),
            PrimitiveValue::Double(2.718281828),
            PrimitiveValue::BigInteger("123456789012345678901234567890".into()),
            PrimitiveValue::BigDecimal("3.14159265358979323846".into()),
            PrimitiveValue::String("orders".into()),
            PrimitiveValue::Date(1_700_000_000_000),
        ];
        for primitive in values {
            let value = PropertyValue::Primitive(primitive);
            assert_eq!(round_trip(&value), Some(value.clone()));
        }
    }

    #[test]
    fn non_finite_floats_keep_their_value() {
        let stored = to_stored_form(&PropertyValue::Primitive(PrimitiveValue::Double(f64::NAN)));
        assert_eq!(stored.as_ref().unwrap()["value"], json!("NaN"));
        match round_trip(&PropertyValue::Primitive(PrimitiveValue::Double(f64::NAN))) {
            Some(PropertyValue::Primitive(PrimitiveValue::Double(n))) => assert!(n.is_nan()),
            other => panic!("expected a NaN double, got {:?}", other),
        }

        for value in [
            PropertyValue::Primitive(PrimitiveValue::Double(f64::NEG_INFINITY)),
            PropertyValue::Primitive(PrimitiveValue::Float(f32::INFINITY)),
        ] {
            assert_eq!(round_trip(&value), Some(value.clone()));
        }
    }

    #[test]
    fn enum_round_trips_with_and_without_ordinal() {
        let with = PropertyValue::Enum(EnumValue::new("Validated", 3).with_description("checked"));
        assert_eq!(round_trip(&with), Some(with.clone()));

        let without = PropertyValue::Enum(EnumValue {
            symbolic_name: "Other".into(),
            ordinal: None,
            description: None,
        });
        let stored = to_stored_form(&without).unwrap();
        assert!(stored.get("ordinal").is_none());
        assert_eq!(round_trip(&without), Some(without.clone()));
    }

    #[test]
    fn nested_collections_round_trip() {
        let mut inner = BTreeMap::new();
        inner.insert("x".to_string(), PropertyValue::int(1));
        inner.insert("y".to_string(), PropertyValue::string("two"));
        let mut outer = BTreeMap::new();
        outer.insert("point".to_string(), PropertyValue::Struct(inner));
        outer.insert(
            "tags".to_string(),
            PropertyValue::Array(vec![PropertyValue::string("a"), PropertyValue::string("b")]),
        );
        let value = PropertyValue::Map(outer);
        assert_eq!(round_trip(&value), Some(value.clone()));
    }

    #[test]
    fn stored_properties_match_what_reads_back() {
        let mut props = InstanceProperties::new();
        props.insert("name".into(), PropertyValue::string("orders"));
        props.insert("tags".into(), PropertyValue::Array(Vec::new()));
        props.insert(
            "nested".into(),
            PropertyValue::Array(vec![
                PropertyValue::Map(BTreeMap::new()),
                PropertyValue::string("kept"),
            ]),
        );

        let stored = stored_properties(props.clone());
        let read_back: InstanceProperties = props
            .iter()
            .filter_map(|(name, value)| round_trip(value).map(|v| (name.clone(), v)))
            .collect();
        assert_eq!(stored, read_back);
        assert!(!stored.contains_key("tags"));
        assert_eq!(
            stored["nested"],
            PropertyValue::Array(vec![PropertyValue::string("kept")])
        );
    }

    #[test]
    fn empty_collections_are_absent() {
        for empty in [
            PropertyValue::Array(vec![]),
            PropertyValue::Map(BTreeMap::new()),
            PropertyValue::Struct(BTreeMap::new()),
        ] {
            assert_eq!(to_stored_form(&empty), None);
            assert_eq!(round_trip(&empty), None);
        }
        assert_eq!(from_stored_form(None).unwrap(), None);
        assert_eq!(from_stored_form(Some(&Value::Null)).unwrap(), None);
    }

    #[test]
    fn empty_members_are_dropped() {
        let mut members = BTreeMap::new();
        members.insert("kept".to_string(), PropertyValue::int(1));
        members.insert("empty".to_string(), PropertyValue::Array(vec![]));
        let stored = to_stored_form(&PropertyValue::Struct(members)).unwrap();
        assert!(stored["values"].get("empty").is_none());
        assert!(stored["values"].get("kept").is_some());
    }

    #[test]
    fn malformed_fragments_are_errors() {
        let no_category = json!({"value": 1});
        assert!(from_stored_form(Some(&no_category)).is_err());

        let wrong_type = json!({"category": "primitive", "type": "int", "value": "seven"});
        assert!(matches!(
            from_stored_form(Some(&wrong_type)),
            Err(RepositoryError::MalformedDocument(_))
        ));

        let overflow = json!({"category": "primitive", "type": "byte", "value": 300});
        assert!(from_stored_form(Some(&overflow)).is_err());
    }
}
