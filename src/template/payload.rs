//! Template-key payload carried by a message

use std::collections::HashMap;

use serde_json::Value;

/// Which template a message wants, and the variables to bind into it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplatePayload {
    pub key: String,
    pub variables: HashMap<String, String>,
}

impl TemplatePayload {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Read `{"key": ..., "variables": {...}}`.
    ///
    /// Returns `None` without a string `key`. Variable values of any JSON type
    /// are stringified; `null` becomes the empty string.
    pub fn from_value(value: &Value) -> Option<Self> {
        let key = value.get("key")?.as_str()?.to_string();
        let variables = value
            .get("variables")
            .and_then(Value::as_object)
            .map(|object| {
                object
                    .iter()
                    .map(|(name, v)| (name.clone(), stringify(v)))
                    .collect()
            })
            .unwrap_or_default();
        Some(Self { key, variables })
    }

    pub fn from_json(source: &str) -> Option<Self> {
        serde_json::from_str::<Value>(source)
            .ok()
            .and_then(|value| Self::from_value(&value))
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
