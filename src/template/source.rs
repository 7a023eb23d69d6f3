//! Remote template service interface and its payload format
//!
//! A single template payload is one entry object:
//!
//! ```text
//! {"key": "order", "ui_template": {...} | "...", "data_template": ..., "color_variables": {...}}
//! ```
//!
//! A list page wraps entries with the sync token:
//!
//! ```text
//! {"templates": [entry, ...], "token": "42", "has_more": false}
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use super::cache::{compare_tokens, StoredTemplate, TemplateKind};

/// Failures talking to the template service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("template `{0}` not found")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("retry limit reached for `{0}`")]
    RetryExhausted(String),
}

/// Template service the coordinator fetches from
#[async_trait]
pub trait RemoteTemplateSource: Send + Sync {
    /// Fetch one template entry as JSON
    async fn load_template(&self, kind: TemplateKind, key: &str) -> Result<String, FetchError>;

    /// Fetch one page of templates changed since `token` as JSON
    async fn load_template_list(
        &self,
        kind: TemplateKind,
        token: Option<&str>,
    ) -> Result<String, FetchError>;
}

/// One page of a template list sync
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplateListPage {
    pub templates: Vec<StoredTemplate>,
    pub token: Option<String>,
    pub has_more: bool,
}

impl TemplateListPage {
    pub fn from_json(source: &str) -> Result<Self, FetchError> {
        let value: Value =
            serde_json::from_str(source).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let templates = match value.get("templates") {
            Some(Value::Array(entries)) => entries
                .iter()
                .map(parse_template_entry)
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(FetchError::Malformed(
                    "`templates` must be an array".to_string(),
                ))
            }
        };
        let token = value.get("token").and_then(token_string);
        let has_more = value
            .get("has_more")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Self {
            templates,
            token,
            has_more,
        })
    }
}

/// Parse a single template entry payload
pub fn parse_template_json(source: &str) -> Result<StoredTemplate, FetchError> {
    let value: Value =
        serde_json::from_str(source).map_err(|e| FetchError::Malformed(e.to_string()))?;
    parse_template_entry(&value)
}

/// Decode one entry. `ui_template` and `data_template` may be embedded
/// objects or pre-serialized strings.
pub fn parse_template_entry(value: &Value) -> Result<StoredTemplate, FetchError> {
    let key = value
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Malformed("template entry without `key`".to_string()))?;
    let ui_template = value
        .get("ui_template")
        .and_then(embedded_json)
        .ok_or_else(|| FetchError::Malformed(format!("template `{key}` without `ui_template`")))?;
    let data_template = value
        .get("data_template")
        .and_then(embedded_json)
        .unwrap_or_default();
    let color_variables = match value.get("color_variables") {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(name, v)| v.as_str().map(|s| (name.clone(), s.to_string())))
            .collect(),
        Some(Value::String(s)) => match serde_json::from_str::<HashMap<String, String>>(s) {
            Ok(map) => map,
            Err(e) => return Err(FetchError::Malformed(format!("color variables of `{key}`: {e}"))),
        },
        _ => HashMap::new(),
    };

    Ok(StoredTemplate {
        key: key.to_string(),
        ui_template,
        data_template,
        color_variables,
    })
}

fn embedded_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => serde_json::to_string(other).ok(),
    }
}

fn token_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// In-process template service backed by a map
///
/// Serves every entry on a single list page. Useful for tests and for the
/// CLI, which reads templates from disk.
#[derive(Debug, Default)]
pub struct MemoryTemplateSource {
    entries: Mutex<HashMap<(TemplateKind, String), StoredTemplate>>,
    token: Mutex<Option<String>>,
}

impl MemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: TemplateKind, template: StoredTemplate) {
        self.entries.lock().insert((kind, template.key.clone()), template);
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock() = Some(token.into());
    }
}

#[async_trait]
impl RemoteTemplateSource for MemoryTemplateSource {
    async fn load_template(&self, kind: TemplateKind, key: &str) -> Result<String, FetchError> {
        let entries = self.entries.lock();
        let template = entries
            .get(&(kind, key.to_string()))
            .ok_or_else(|| FetchError::NotFound(key.to_string()))?;
        Ok(entry_json(template).to_string())
    }

    async fn load_template_list(
        &self,
        kind: TemplateKind,
        token: Option<&str>,
    ) -> Result<String, FetchError> {
        let current = self.token.lock().clone();
        let up_to_date = matches!(
            (token, current.as_deref()),
            (Some(since), Some(now)) if compare_tokens(since, now).is_ge()
        );
        let templates: Vec<Value> = if up_to_date {
            Vec::new()
        } else {
            self.entries
                .lock()
                .iter()
                .filter(|((k, _), _)| *k == kind)
                .map(|(_, t)| entry_json(t))
                .collect()
        };
        Ok(serde_json::json!({
            "templates": templates,
            "token": current,
            "has_more": false,
        })
        .to_string())
    }
}

fn entry_json(template: &StoredTemplate) -> Value {
    serde_json::json!({
        "key": template.key,
        "ui_template": template.ui_template,
        "data_template": template.data_template,
        "color_variables": template.color_variables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_with_embedded_objects() {
        let entry = parse_template_json(
            r##"{"key":"k","ui_template":{"version":1},"data_template":{"a":"{b}"},
                "color_variables":{"bg":"#fff,#000"}}"##,
        )
        .unwrap();
        assert_eq!(entry.key, "k");
        assert_eq!(entry.ui_template, r#"{"version":1}"#);
        assert_eq!(entry.data_template, r#"{"a":"{b}"}"#);
        assert_eq!(entry.color_variables["bg"], "#fff,#000");
    }

    #[test]
    fn test_entry_with_string_fields() {
        let entry = parse_template_json(
            r##"{"key":"k","ui_template":"{\"version\":2}","color_variables":"{\"fg\":\"#111\"}"}"##,
        )
        .unwrap();
        assert_eq!(entry.ui_template, r#"{"version":2}"#);
        assert_eq!(entry.data_template, "");
        assert_eq!(entry.color_variables["fg"], "#111");
    }

    #[test]
    fn test_entry_requires_key_and_ui_template() {
        assert!(matches!(
            parse_template_json(r#"{"ui_template":"{}"}"#),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_template_json(r#"{"key":"k"}"#),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_list_page() {
        let page = TemplateListPage::from_json(
            r#"{"templates":[{"key":"a","ui_template":"{}"}],"token":17,"has_more":true}"#,
        )
        .unwrap();
        assert_eq!(page.templates.len(), 1);
        assert_eq!(page.token.as_deref(), Some("17"));
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryTemplateSource::new();
        source.insert(TemplateKind::Message, StoredTemplate::new("a", "{}"));
        source.set_token("3");

        let entry = source.load_template(TemplateKind::Message, "a").await.unwrap();
        assert_eq!(parse_template_json(&entry).unwrap().key, "a");
        assert_eq!(
            source.load_template(TemplateKind::Notification, "a").await,
            Err(FetchError::NotFound("a".to_string()))
        );

        let page = source
            .load_template_list(TemplateKind::Message, Some("3"))
            .await
            .unwrap();
        assert!(TemplateListPage::from_json(&page).unwrap().templates.is_empty());
        let page = source
            .load_template_list(TemplateKind::Message, Some("2"))
            .await
            .unwrap();
        assert_eq!(TemplateListPage::from_json(&page).unwrap().templates.len(), 1);
    }
}
