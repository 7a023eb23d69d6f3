//! Cache of downloaded template sources
//!
//! The cache stores the raw strings a template was delivered as, not the
//! parsed tree: binding depends on per-message variables, so every render
//! re-binds and re-parses from the stored source.

use std::cmp::Ordering;
use std::collections::HashMap;

/// Namespace a template key lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Message,
    Notification,
}

impl TemplateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Message => "message",
            TemplateKind::Notification => "notification",
        }
    }
}

/// A template as delivered by the template service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTemplate {
    pub key: String,
    /// Layout JSON with `{placeholder}`s
    pub ui_template: String,
    /// Data JSON with `{placeholder}`s
    pub data_template: String,
    /// Raw `"#light,#dark"` pairs by variable name
    pub color_variables: HashMap<String, String>,
}

impl StoredTemplate {
    pub fn new(key: impl Into<String>, ui_template: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ui_template: ui_template.into(),
            data_template: String::new(),
            color_variables: HashMap::new(),
        }
    }

    pub fn with_data_template(mut self, data_template: impl Into<String>) -> Self {
        self.data_template = data_template.into();
        self
    }

    pub fn with_color_variable(mut self, name: impl Into<String>, pair: impl Into<String>) -> Self {
        self.color_variables.insert(name.into(), pair.into());
        self
    }
}

/// Template sources keyed by `(kind, key)`, plus the last sync token per kind
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: HashMap<(TemplateKind, String), StoredTemplate>,
    tokens: HashMap<TemplateKind, String>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a template; a hit means no network access is needed
    pub fn get(&self, kind: TemplateKind, key: &str) -> Option<&StoredTemplate> {
        self.templates.get(&(kind, key.to_string()))
    }

    pub fn contains(&self, kind: TemplateKind, key: &str) -> bool {
        self.templates.contains_key(&(kind, key.to_string()))
    }

    /// Store a template, replacing any previous source for the same key
    pub fn insert(&mut self, kind: TemplateKind, template: StoredTemplate) -> Option<StoredTemplate> {
        self.templates.insert((kind, template.key.clone()), template)
    }

    pub fn remove(&mut self, kind: TemplateKind, key: &str) -> Option<StoredTemplate> {
        self.templates.remove(&(kind, key.to_string()))
    }

    /// All keys stored for a kind
    pub fn keys(&self, kind: TemplateKind) -> impl Iterator<Item = &str> {
        self.templates
            .keys()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, key)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Token of the last completed list sync
    pub fn token(&self, kind: TemplateKind) -> Option<&str> {
        self.tokens.get(&kind).map(|s| s.as_str())
    }

    pub fn set_token(&mut self, kind: TemplateKind, token: impl Into<String>) {
        self.tokens.insert(kind, token.into());
    }

    /// Drop every template and the token of one kind
    pub fn clear(&mut self, kind: TemplateKind) {
        self.templates.retain(|(k, _), _| *k != kind);
        self.tokens.remove(&kind);
    }

    /// Whether `server_token` describes a newer template list than the cache has
    pub fn needs_sync(&self, kind: TemplateKind, server_token: &str) -> bool {
        match self.token(kind) {
            None => true,
            Some(cached) => compare_tokens(server_token, cached) == Ordering::Greater,
        }
    }
}

/// Order sync tokens numerically when both are integers, lexically otherwise
pub fn compare_tokens(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i128>(), b.trim().parse::<i128>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let mut cache = TemplateCache::new();
        cache.insert(TemplateKind::Message, StoredTemplate::new("a", "{}"));
        assert!(cache.contains(TemplateKind::Message, "a"));
        assert!(!cache.contains(TemplateKind::Notification, "a"));
    }

    #[test]
    fn test_insert_replaces() {
        let mut cache = TemplateCache::new();
        cache.insert(TemplateKind::Message, StoredTemplate::new("a", "1"));
        let old = cache.insert(TemplateKind::Message, StoredTemplate::new("a", "2"));
        assert_eq!(old.map(|t| t.ui_template), Some("1".to_string()));
        assert_eq!(cache.get(TemplateKind::Message, "a").unwrap().ui_template, "2");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_only_one_kind() {
        let mut cache = TemplateCache::new();
        cache.insert(TemplateKind::Message, StoredTemplate::new("a", "{}"));
        cache.insert(TemplateKind::Notification, StoredTemplate::new("b", "{}"));
        cache.set_token(TemplateKind::Message, "5");
        cache.clear(TemplateKind::Message);
        assert_eq!(cache.keys(TemplateKind::Message).count(), 0);
        assert_eq!(cache.keys(TemplateKind::Notification).collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(cache.token(TemplateKind::Message), None);
    }

    #[test]
    fn test_token_comparison() {
        assert_eq!(compare_tokens("10", "9"), Ordering::Greater);
        assert_eq!(compare_tokens("b", "a"), Ordering::Greater);
        assert_eq!(compare_tokens("7", "7"), Ordering::Equal);

        let mut cache = TemplateCache::new();
        assert!(cache.needs_sync(TemplateKind::Message, "1"));
        cache.set_token(TemplateKind::Message, "10");
        assert!(!cache.needs_sync(TemplateKind::Message, "9"));
        assert!(!cache.needs_sync(TemplateKind::Message, "10"));
        assert!(cache.needs_sync(TemplateKind::Message, "11"));
    }
}
