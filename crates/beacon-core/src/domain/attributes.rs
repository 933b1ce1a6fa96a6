//! Attribute maps and the attribute-encoding capability
//!
//! Every attribute leaving the core is a flat `string -> string` pair.
//! Callers either build an [`Attributes`] map directly, or implement
//! [`AttributeEncodable`] for their own types. Loosely-typed JSON input goes
//! through [`Attributes::try_from_json`], which accepts scalars only and
//! rejects nested shapes instead of guessing at a string form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;

/// A scalar value that has a canonical string form
pub trait AttributeValue {
    /// Render the value as an attribute string
    fn to_attribute(&self) -> String;
}

macro_rules! display_attribute_value {
    ($($t:ty),*) => {
        $(
            impl AttributeValue for $t {
                fn to_attribute(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_attribute_value!(String, str, bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl<T: AttributeValue + ?Sized> AttributeValue for &T {
    fn to_attribute(&self) -> String {
        (**self).to_attribute()
    }
}

/// A value that knows how to write itself into an attribute map
///
/// This is the explicit replacement for reflective object-to-map
/// conversion: a type opts in by listing its own attributes.
pub trait AttributeEncodable {
    /// Write this value's attributes into `out`
    fn encode_attributes(&self, out: &mut Attributes);

    /// Convenience: collect the attributes into a fresh map
    fn to_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        self.encode_attributes(&mut attributes);
        attributes
    }
}

/// Ordered flat string map attached to telemetry records
///
/// Keys iterate in lexicographic order so that serialized payloads are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an attribute, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl AttributeValue) {
        self.0.insert(key.into(), value.to_attribute());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl AttributeValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates attributes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copies every attribute from `other` into `self`; `other` wins on conflicts
    pub fn merge(&mut self, other: &Attributes) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Returns a new map with `base` overlaid by `self`
    pub fn layered_over(&self, base: &Attributes) -> Attributes {
        let mut merged = base.clone();
        merged.merge(self);
        merged
    }

    /// Encodes any [`AttributeEncodable`] value under this map
    pub fn extend_from(&mut self, value: &impl AttributeEncodable) {
        value.encode_attributes(self);
    }

    /// Builds attributes from a flat JSON object
    ///
    /// Strings are kept verbatim, numbers and booleans use their JSON text,
    /// and `null` values are skipped. Nested objects and arrays are rejected.
    pub fn try_from_json(value: &Value) -> Result<Self, DomainError> {
        let object = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::new()),
            other => return Err(DomainError::NotAnObject(json_kind(other).to_string())),
        };

        let mut attributes = Self::new();
        for (key, value) in object {
            match value {
                Value::Null => {}
                Value::String(s) => attributes.insert(key.clone(), s.as_str()),
                Value::Bool(b) => attributes.insert(key.clone(), *b),
                Value::Number(n) => attributes.insert(key.clone(), n.to_string()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(DomainError::UnsupportedAttribute {
                        key: key.clone(),
                        reason: format!("{} values cannot be flattened", json_kind(value)),
                    })
                }
            }
        }
        Ok(attributes)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl<K: Into<String>, V: AttributeValue> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (k, v) in iter {
            attributes.insert(k, v);
        }
        attributes
    }
}

impl From<BTreeMap<String, String>> for Attributes {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<std::collections::HashMap<String, String>> for Attributes {
    fn from(map: std::collections::HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Device {
        model: &'static str,
        battery: u8,
        charging: bool,
    }

    impl AttributeEncodable for Device {
        fn encode_attributes(&self, out: &mut Attributes) {
            out.insert("device.model", self.model);
            out.insert("device.battery", self.battery);
            out.insert("device.charging", self.charging);
        }
    }

    #[test]
    fn test_scalars_flatten_to_strings() {
        let attrs = Attributes::new()
            .with("count", 3_u32)
            .with("ratio", 0.5_f64)
            .with("ok", true)
            .with("name", "checkout");

        assert_eq!(attrs.get("count"), Some("3"));
        assert_eq!(attrs.get("ratio"), Some("0.5"));
        assert_eq!(attrs.get("ok"), Some("true"));
        assert_eq!(attrs.get("name"), Some("checkout"));
    }

    #[test]
    fn test_encodable_type() {
        let device = Device {
            model: "Pixel",
            battery: 80,
            charging: false,
        };
        let attrs = device.to_attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("device.battery"), Some("80"));
    }

    #[test]
    fn test_try_from_json_accepts_flat_object() {
        let attrs = Attributes::try_from_json(&json!({
            "screen": "home",
            "items": 4,
            "premium": false,
            "ignored": null
        }))
        .unwrap();

        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("items"), Some("4"));
        assert!(!attrs.contains_key("ignored"));
    }

    #[test]
    fn test_try_from_json_rejects_nested_shapes() {
        let err = Attributes::try_from_json(&json!({"cart": {"items": 2}})).unwrap_err();
        assert!(matches!(err, DomainError::UnsupportedAttribute { ref key, .. } if key == "cart"));

        let err = Attributes::try_from_json(&json!({"tags": ["a"]})).unwrap_err();
        assert!(matches!(err, DomainError::UnsupportedAttribute { .. }));

        let err = Attributes::try_from_json(&json!([1, 2])).unwrap_err();
        assert_eq!(err, DomainError::NotAnObject("array".to_string()));
    }

    #[test]
    fn test_merge_and_layering() {
        let base = Attributes::new().with("env", "prod").with("app", "shop");
        let call = Attributes::new().with("env", "staging");

        let merged = call.layered_over(&base);
        assert_eq!(merged.get("env"), Some("staging"));
        assert_eq!(merged.get("app"), Some("shop"));
    }

    #[test]
    fn test_serializes_in_key_order() {
        let attrs: Attributes = vec![("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(serde_json::to_string(&attrs).unwrap(), r#"{"a":"1","b":"2"}"#);
    }
}
