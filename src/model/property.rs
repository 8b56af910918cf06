//! Typed property values carried by instances

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Ordinal an enum value compares as when no ordinal was set
pub const ENUM_ORDINAL_DEFAULT: i32 = 99;

/// Primitive kinds an attribute or value can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    String,
    Date,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::BigInteger => "big_integer",
            Self::BigDecimal => "big_decimal",
            Self::String => "string",
            Self::Date => "date",
        }
    }
}

impl std::str::FromStr for PrimitiveKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(Self::Boolean),
            "byte" => Ok(Self::Byte),
            "char" => Ok(Self::Char),
            "short" => Ok(Self::Short),
            "int" => Ok(Self::Int),
            "long" => Ok(Self::Long),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "big_integer" => Ok(Self::BigInteger),
            "big_decimal" => Ok(Self::BigDecimal),
            "string" => Ok(Self::String),
            "date" => Ok(Self::Date),
            _ => Err(format!("unknown primitive kind: {}", s)),
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single primitive value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PrimitiveValue {
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Decimal digits, kept as text to avoid precision loss
    BigInteger(String),
    BigDecimal(String),
    String(String),
    /// Milliseconds since the Unix epoch
    Date(i64),
}

impl PrimitiveValue {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Boolean(_) => PrimitiveKind::Boolean,
            Self::Byte(_) => PrimitiveKind::Byte,
            Self::Char(_) => PrimitiveKind::Char,
            Self::Short(_) => PrimitiveKind::Short,
            Self::Int(_) => PrimitiveKind::Int,
            Self::Long(_) => PrimitiveKind::Long,
            Self::Float(_) => PrimitiveKind::Float,
            Self::Double(_) => PrimitiveKind::Double,
            Self::BigInteger(_) => PrimitiveKind::BigInteger,
            Self::BigDecimal(_) => PrimitiveKind::BigDecimal,
            Self::String(_) => PrimitiveKind::String,
            Self::Date(_) => PrimitiveKind::Date,
        }
    }

    /// The value as plain JSON, without any kind information
    pub fn to_native(&self) -> Value {
        match self {
            Self::Boolean(b) => json!(b),
            Self::Byte(n) => json!(n),
            Self::Char(c) => json!(c.to_string()),
            Self::Short(n) => json!(n),
            Self::Int(n) => json!(n),
            Self::Long(n) => json!(n),
            Self::Float(n) => json!(f64::from(*n)),
            Self::Double(n) => json!(n),
            Self::BigInteger(s) | Self::BigDecimal(s) | Self::String(s) => json!(s),
            Self::Date(ms) => json!(ms),
        }
    }
}

/// An enumerated value
///
/// Equality treats a missing ordinal as [`ENUM_ORDINAL_DEFAULT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumValue {
    pub symbolic_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EnumValue {
    pub fn new(symbolic_name: impl Into<String>, ordinal: i32) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            ordinal: Some(ordinal),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn effective_ordinal(&self) -> i32 {
        self.ordinal.unwrap_or(ENUM_ORDINAL_DEFAULT)
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.symbolic_name == other.symbolic_name
            && self.effective_ordinal() == other.effective_ordinal()
            && self.description == other.description
    }
}

/// Typed property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Primitive(PrimitiveValue),
    Enum(EnumValue),
    Array(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
    Struct(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self::Primitive(PrimitiveValue::String(s.into()))
    }

    pub fn int(n: i32) -> Self {
        Self::Primitive(PrimitiveValue::Int(n))
    }

    /// Name of the value's category as used in stored documents
    pub fn category_name(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Enum(_) => "enum",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Struct(_) => "struct",
        }
    }

    /// True for an Array, Map or Struct with no members
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Self::Array(values) => values.is_empty(),
            Self::Map(values) | Self::Struct(values) => values.is_empty(),
            Self::Primitive(_) | Self::Enum(_) => false,
        }
    }

    /// Project the value onto plain JSON for comparisons and searches
    ///
    /// Enums project to their ordinal, with an unset ordinal projecting to
    /// [`ENUM_ORDINAL_DEFAULT`].
    pub fn to_comparable_value(&self) -> Value {
        match self {
            Self::Primitive(p) => p.to_native(),
            Self::Enum(e) => json!(e.effective_ordinal()),
            Self::Array(values) => {
                Value::Array(values.iter().map(|v| v.to_comparable_value()).collect())
            }
            Self::Map(values) | Self::Struct(values) => Value::Object(
                values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_comparable_value()))
                    .collect(),
            ),
        }
    }

    /// The string payload of a String primitive
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Primitive(PrimitiveValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<PrimitiveValue> for PropertyValue {
    fn from(value: PrimitiveValue) -> Self {
        Self::Primitive(value)
    }
}

impl From<EnumValue> for PropertyValue {
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}

/// Named property values of an instance, ordered by name
pub type InstanceProperties = BTreeMap<String, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_enum_ordinal_compares_as_sentinel() {
        let unset = PropertyValue::Enum(EnumValue {
            symbolic_name: "Proposed".into(),
            ordinal: None,
            description: None,
        });
        assert_eq!(unset.to_comparable_value(), json!(99));
        assert_eq!(unset.to_comparable_value(), json!(ENUM_ORDINAL_DEFAULT));
    }

    #[test]
    fn enum_equality_defaults_the_ordinal() {
        let unset = EnumValue {
            symbolic_name: "Other".into(),
            ordinal: None,
            description: None,
        };
        let sentinel = EnumValue::new("Other", 99);
        let explicit = EnumValue::new("Other", 1);
        assert_eq!(unset, sentinel);
        assert_ne!(unset, explicit);
    }

    #[test]
    fn comparable_value_of_collections() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), PropertyValue::int(1));
        map.insert("b".to_string(), PropertyValue::Enum(EnumValue::new("X", 3)));
        let value = PropertyValue::Array(vec![
            PropertyValue::string("s"),
            PropertyValue::Map(map),
        ]);
        assert_eq!(value.to_comparable_value(), json!(["s", {"a": 1, "b": 3}]));
    }

    #[test]
    fn empty_collections_are_detected() {
        assert!(PropertyValue::Array(vec![]).is_empty_collection());
        assert!(PropertyValue::Map(BTreeMap::new()).is_empty_collection());
        assert!(PropertyValue::Struct(BTreeMap::new()).is_empty_collection());
        assert!(!PropertyValue::string("").is_empty_collection());
    }

    #[test]
    fn primitive_kind_parses_its_own_name() {
        for kind in [
            PrimitiveKind::Boolean,
            PrimitiveKind::BigDecimal,
            PrimitiveKind::Date,
            PrimitiveKind::Char,
        ] {
            assert_eq!(kind.as_str().parse::<PrimitiveKind>(), Ok(kind));
        }
        assert!("decimal128".parse::<PrimitiveKind>().is_err());
    }
}
