#![forbid(unsafe_code)]

//! Attribute statement values.

use serde::Serialize;

/// Values of a single `<saml:Attribute>`, shaped by how many
/// `<saml:AttributeValue>` children it had.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// No values.
    Absent,
    Single(String),
    /// Two or more values, in document order.
    List(Vec<String>),
}

impl AttributeValue {
    pub fn from_values(mut values: Vec<String>) -> Self {
        match values.len() {
            0 => AttributeValue::Absent,
            1 => AttributeValue::Single(values.remove(0)),
            _ => AttributeValue::List(values),
        }
    }

    /// All values as a slice-like vector, regardless of shape.
    pub fn values(&self) -> Vec<&str> {
        match self {
            AttributeValue::Absent => Vec::new(),
            AttributeValue::Single(v) => vec![v.as_str()],
            AttributeValue::List(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, AttributeValue::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamlAttribute {
    pub name: String,
    pub value: AttributeValue,
}

impl SamlAttribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_follows_count() {
        assert_eq!(AttributeValue::from_values(vec![]), AttributeValue::Absent);
        assert_eq!(
            AttributeValue::from_values(vec!["a".into()]),
            AttributeValue::Single("a".into())
        );
        assert_eq!(
            AttributeValue::from_values(vec!["a".into(), "b".into()]),
            AttributeValue::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_values_view() {
        assert!(AttributeValue::Absent.values().is_empty());
        assert_eq!(AttributeValue::Single("x".into()).values(), vec!["x"]);
        let list = AttributeValue::List(vec!["x".into(), "y".into()]);
        assert_eq!(list.values(), vec!["x", "y"]);
        assert!(!list.is_absent());
    }
}
