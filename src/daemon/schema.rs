//! Editable/protected partition of `dockerd.json` and per-field validation.
//!
//! # Design Decisions
//! - Editable fields live in one registry; every rule is looked up by key
//! - Keys outside the registry are never written through this surface
//! - A field may live inside a container object (`proxies`) rather than at
//!   the top level; the container key itself is protected

use serde::Serialize;
use serde_json::{Map, Value};

use crate::daemon::document::{json_type_name, ConfigDocument};
use crate::daemon::error::{EngineError, EngineResult};

/// Container object holding the proxy settings.
pub const PROXIES_KEY: &str = "proxies";

/// Daemon keys that are displayed but never edited.
pub const READONLY_KEYS: &[&str] = &[
    "log-driver",
    "log-opts",
    "storage-driver",
    "pidfile",
    "data-root",
    "exec-root",
];

/// Validation rule attached to an editable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A list of absolute URLs. The empty list is valid.
    UrlList,
    /// A free-form string. Empty, whitespace-only or `null` unsets the field.
    OptionalString,
}

/// Where a field is stored in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    TopLevel,
    Member(&'static str),
}

/// Declaration of one editable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub example: &'static str,
    pub kind: FieldKind,
    #[serde(skip)]
    pub location: FieldLocation,
}

/// Classification of a top-level or edit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass<'a> {
    Editable(&'a FieldSpec),
    /// Known key that is not writable through this surface.
    Protected,
    /// Unknown key. Preserved verbatim, same semantics as `Protected`.
    Passthrough,
}

impl FieldClass<'_> {
    pub fn is_editable(&self) -> bool {
        matches!(self, FieldClass::Editable(_))
    }
}

/// Registry of editable fields.
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    fields: Vec<FieldSpec>,
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self::dockerd()
    }
}

impl ConfigSchema {
    /// The field set exposed for Container Manager's `dockerd.json`.
    pub fn dockerd() -> Self {
        Self {
            fields: vec![
                FieldSpec {
                    key: "registry-mirrors",
                    label: "Registry mirrors",
                    description: "Registry mirror URLs used when pulling images, tried in order",
                    example: r#"["https://docker.mirrors.ustc.edu.cn", "https://hub-mirror.c.163.com"]"#,
                    kind: FieldKind::UrlList,
                    location: FieldLocation::TopLevel,
                },
                FieldSpec {
                    key: "http-proxy",
                    label: "HTTP proxy",
                    description: "Proxy used by the daemon for HTTP requests",
                    example: "http://192.168.1.1:7890",
                    kind: FieldKind::OptionalString,
                    location: FieldLocation::Member(PROXIES_KEY),
                },
                FieldSpec {
                    key: "https-proxy",
                    label: "HTTPS proxy",
                    description: "Proxy used by the daemon for HTTPS requests",
                    example: "http://192.168.1.1:7890",
                    kind: FieldKind::OptionalString,
                    location: FieldLocation::Member(PROXIES_KEY),
                },
                FieldSpec {
                    key: "no-proxy",
                    label: "Proxy bypass",
                    description: "Comma-separated hosts and patterns that skip the proxy",
                    example: "localhost,127.0.0.1,*.local",
                    kind: FieldKind::OptionalString,
                    location: FieldLocation::Member(PROXIES_KEY),
                },
            ],
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Classify a key. Unknown keys fall through to `Passthrough`.
    pub fn classify(&self, key: &str) -> FieldClass<'_> {
        if let Some(field) = self.field(key) {
            return FieldClass::Editable(field);
        }
        if READONLY_KEYS.contains(&key) || self.is_container(key) {
            FieldClass::Protected
        } else {
            FieldClass::Passthrough
        }
    }

    /// Whether `key` is an object that holds editable members.
    pub fn is_container(&self, key: &str) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.location, FieldLocation::Member(parent) if parent == key))
    }

    /// Validate a proposed value for `key`.
    ///
    /// Keys that are not editable are rejected here; callers filter them
    /// out before validating.
    pub fn validate(&self, key: &str, value: &Value) -> EngineResult<()> {
        let field = self
            .field(key)
            .ok_or_else(|| EngineError::invalid(key, "field is not editable"))?;

        match field.kind {
            FieldKind::UrlList => validate_url_list(key, value),
            FieldKind::OptionalString => match value {
                Value::Null | Value::String(_) => Ok(()),
                other => Err(EngineError::invalid(
                    key,
                    format!("expected a string or null, found {}", json_type_name(other)),
                )),
            },
        }
    }

    /// Read a field at its location.
    pub fn extract<'d>(&self, document: &'d ConfigDocument, field: &FieldSpec) -> Option<&'d Value> {
        match field.location {
            FieldLocation::TopLevel => document.get(field.key),
            FieldLocation::Member(parent) => document
                .get(parent)
                .and_then(Value::as_object)
                .and_then(|obj| obj.get(field.key)),
        }
    }

    /// Write an already validated value into the document.
    ///
    /// Top-level keys are never removed. An unset `OptionalString` member is
    /// removed from its container; the container itself stays. Fails if the
    /// container key holds something other than an object.
    pub fn apply(&self, document: &mut ConfigDocument, field: &FieldSpec, value: &Value) -> EngineResult<()> {
        let normalized = normalize(field.kind, value);

        match field.location {
            FieldLocation::TopLevel => {
                let stored = normalized.unwrap_or_else(|| match field.kind {
                    FieldKind::UrlList => Value::Array(Vec::new()),
                    FieldKind::OptionalString => Value::String(String::new()),
                });
                document.insert(field.key, stored);
            }
            FieldLocation::Member(parent) => match (document.get_mut(parent), normalized) {
                (Some(Value::Object(obj)), Some(v)) => {
                    obj.insert(field.key.to_string(), v);
                }
                (Some(Value::Object(obj)), None) => {
                    obj.shift_remove(field.key);
                }
                (None, Some(v)) => {
                    let mut obj = Map::new();
                    obj.insert(field.key.to_string(), v);
                    document.insert(parent, Value::Object(obj));
                }
                (None, None) => {}
                (Some(other), _) => {
                    return Err(EngineError::invalid(
                        field.key,
                        format!("`{}` holds {}, not an object", parent, json_type_name(other)),
                    ));
                }
            },
        }
        Ok(())
    }
}

fn validate_url_list(key: &str, value: &Value) -> EngineResult<()> {
    let items = value.as_array().ok_or_else(|| {
        EngineError::invalid(
            key,
            format!("expected a list of URLs, found {}", json_type_name(value)),
        )
    })?;

    for (i, item) in items.iter().enumerate() {
        let raw = item.as_str().ok_or_else(|| {
            EngineError::invalid(
                key,
                format!("entry {} must be a string, found {}", i, json_type_name(item)),
            )
        })?;
        let url = url::Url::parse(raw.trim())
            .map_err(|e| EngineError::invalid(key, format!("entry {} ({:?}): {}", i, raw, e)))?;
        if !url.has_host() {
            return Err(EngineError::invalid(
                key,
                format!("entry {} ({:?}) has no host", i, raw),
            ));
        }
    }
    Ok(())
}

/// Canonical stored form; `None` means the field is unset.
fn normalize(kind: FieldKind, value: &Value) -> Option<Value> {
    match (kind, value) {
        (FieldKind::UrlList, Value::Array(items)) => Some(Value::Array(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Value::String(s.trim().to_string()),
                    other => other.clone(),
                })
                .collect(),
        )),
        (FieldKind::OptionalString, Value::String(s)) if !s.trim().is_empty() => {
            Some(Value::String(s.trim().to_string()))
        }
        (FieldKind::OptionalString, _) => None,
        (_, other) => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> ConfigDocument {
        match value {
            Value::Object(map) => ConfigDocument::from(map),
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn test_classify() {
        let schema = ConfigSchema::dockerd();
        assert!(schema.classify("registry-mirrors").is_editable());
        assert!(schema.classify("no-proxy").is_editable());
        assert_eq!(schema.classify("log-driver"), FieldClass::Protected);
        assert_eq!(schema.classify("proxies"), FieldClass::Protected);
        assert_eq!(schema.classify("experimental"), FieldClass::Passthrough);
    }

    #[test]
    fn test_container_lookup_with_runtime_key() {
        let schema = ConfigSchema::dockerd();
        let owned = String::from("proxies");
        assert!(schema.is_container(&owned));
        assert!(schema.classify(&owned) == FieldClass::Protected);
        assert!(!schema.is_container(&String::from("registry-mirrors")));
    }

    #[test]
    fn test_mirror_validation() {
        let schema = ConfigSchema::dockerd();
        let key = "registry-mirrors";

        assert!(schema.validate(key, &json!([])).is_ok());
        assert!(schema
            .validate(key, &json!(["https://mirror.example.com", "http://10.0.0.2:5000"]))
            .is_ok());

        let err = schema.validate(key, &json!("not-a-list")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFieldValue { .. }));
        assert!(err.to_string().contains("found a string"));

        assert!(schema.validate(key, &json!(["mirror.example.com"])).is_err());
        assert!(schema.validate(key, &json!(["https://ok.example.com", 42])).is_err());
        assert!(schema.validate(key, &json!(["mailto:ops@example.com"])).is_err());
    }

    #[test]
    fn test_proxy_validation() {
        let schema = ConfigSchema::dockerd();

        assert!(schema.validate("http-proxy", &json!("http://192.168.1.1:7890")).is_ok());
        assert!(schema.validate("https-proxy", &json!("")).is_ok());
        assert!(schema.validate("no-proxy", &json!(null)).is_ok());
        assert!(schema.validate("no-proxy", &json!("localhost,*.local")).is_ok());
        assert!(schema.validate("http-proxy", &json!(8080)).is_err());
        assert!(schema.validate("http-proxy", &json!(["a"])).is_err());
    }

    #[test]
    fn test_validate_rejects_non_editable() {
        let schema = ConfigSchema::dockerd();
        assert!(schema.validate("pidfile", &json!("/tmp/x")).is_err());
    }

    #[test]
    fn test_apply_proxy_into_container() {
        let schema = ConfigSchema::dockerd();
        let mut d = doc(json!({"proxies": {"custom": "keep"}, "pidfile": "/x"}));

        let field = schema.field("http-proxy").unwrap();
        schema.apply(&mut d, field, &json!("  http://proxy:3128 ")).unwrap();

        assert_eq!(
            d.get("proxies"),
            Some(&json!({"custom": "keep", "http-proxy": "http://proxy:3128"}))
        );
        assert_eq!(schema.extract(&d, field), Some(&json!("http://proxy:3128")));
    }

    #[test]
    fn test_clearing_proxy_keeps_container() {
        let schema = ConfigSchema::dockerd();
        let mut d = doc(json!({"proxies": {"http-proxy": "http://p:1", "no-proxy": "localhost"}}));

        schema.apply(&mut d, schema.field("http-proxy").unwrap(), &json!("")).unwrap();
        schema.apply(&mut d, schema.field("no-proxy").unwrap(), &json!(null)).unwrap();

        assert_eq!(d.get("proxies"), Some(&json!({})));
    }

    #[test]
    fn test_clearing_absent_proxy_creates_nothing() {
        let schema = ConfigSchema::dockerd();
        let mut d = doc(json!({"pidfile": "/x"}));

        schema.apply(&mut d, schema.field("https-proxy").unwrap(), &json!("   ")).unwrap();

        assert!(!d.contains_key("proxies"));
    }

    #[test]
    fn test_apply_mirrors_trims_entries() {
        let schema = ConfigSchema::dockerd();
        let mut d = doc(json!({"registry-mirrors": ["https://old.example.com"]}));
        let field = schema.field("registry-mirrors").unwrap();

        schema.apply(&mut d, field, &json!([" https://new.example.com "])).unwrap();
        assert_eq!(d.get("registry-mirrors"), Some(&json!(["https://new.example.com"])));

        schema.apply(&mut d, field, &json!([])).unwrap();
        assert_eq!(d.get("registry-mirrors"), Some(&json!([])));
    }

    #[test]
    fn test_apply_refuses_non_object_container() {
        let schema = ConfigSchema::dockerd();
        let mut d = doc(json!({"proxies": "http://legacy:8080"}));

        let err = schema
            .apply(&mut d, schema.field("http-proxy").unwrap(), &json!("http://p:1"))
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidFieldValue { .. }));
        assert_eq!(d.get("proxies"), Some(&json!("http://legacy:8080")));
    }
}
