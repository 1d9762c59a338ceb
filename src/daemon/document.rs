//! In-memory representation of `dockerd.json`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered key/value view of the daemon configuration.
///
/// Key order is preserved across parse and serialize, and values are kept
/// as raw JSON so that fields this tool knows nothing about survive a
/// rewrite unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument(Map<String, Value>);

impl ConfigDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse a document. The top-level value must be a JSON object.
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(format!(
                "expected a JSON object at the top level, found {}",
                json_type_name(&other)
            )),
            Err(e) => Err(format!("invalid JSON: {}", e)),
        }
    }

    /// Serialize as pretty-printed JSON (2-space indent) with a trailing newline.
    pub fn to_pretty_bytes(&self) -> Vec<u8> {
        // Serializing a map of JSON values cannot fail.
        let mut out = serde_json::to_vec_pretty(&self.0).unwrap_or_default();
        out.push(b'\n');
        out
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Insert or overwrite a top-level key, keeping its position if present.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for ConfigDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Human-readable JSON type name for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_preserves_order_and_values() {
        let raw = br#"{"pidfile":"/x","log-opts":{"max-size":"10m"},"debug":false,"registry-mirrors":[]}"#;
        let doc = ConfigDocument::parse(raw).unwrap();

        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["pidfile", "log-opts", "debug", "registry-mirrors"]);
        assert_eq!(doc.get("log-opts"), Some(&json!({"max-size": "10m"})));
        assert_eq!(doc.get("debug"), Some(&json!(false)));
    }

    #[test]
    fn test_rewrite_is_lossless() {
        let raw = "{\n  \"data-root\": \"/volume1/@docker\",\n  \"mtu\": 1450,\n  \"label\": \"ünïcode\"\n}\n";
        let doc = ConfigDocument::parse(raw.as_bytes()).unwrap();
        let out = doc.to_pretty_bytes();

        assert_eq!(String::from_utf8(out.clone()).unwrap(), raw);
        assert_eq!(ConfigDocument::parse(&out).unwrap(), doc);
    }

    #[test]
    fn test_numbers_keep_their_literal_form() {
        let raw = "{\n  \"big\": 123456789012345678901234567890,\n  \"exp\": 1e3,\n  \"frac\": -0.10\n}\n";
        let doc = ConfigDocument::parse(raw.as_bytes()).unwrap();
        let out = String::from_utf8(doc.to_pretty_bytes()).unwrap();

        assert_eq!(out, raw);
        assert!(out.contains("123456789012345678901234567890"));
        assert!(!out.contains("e+29"));
    }

    #[test]
    fn test_rejects_non_object() {
        let err = ConfigDocument::parse(b"[1, 2]").unwrap_err();
        assert!(err.contains("an array"));

        let err = ConfigDocument::parse(b"{\"a\":").unwrap_err();
        assert!(err.starts_with("invalid JSON"));
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut doc = ConfigDocument::parse(br#"{"a":1,"b":2,"c":3}"#).unwrap();
        doc.insert("b", json!(20));
        doc.insert("d", json!(4));

        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
        assert_eq!(doc.get("b"), Some(&json!(20)));
    }
}
