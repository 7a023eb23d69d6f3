//! Variable binding for raw template strings
//!
//! Binding is textual and happens before JSON parsing: every `{identifier}`
//! placeholder whose identifier is known is replaced by its value, escaped
//! for a JSON string context. Unknown placeholders are left untouched.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// `{identifier}` where the identifier excludes braces, quotes and newlines
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{([^{}"\n]+)\}"#).expect("placeholder pattern is valid"));

/// Errors from variable binding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A color variable whose light component is empty
    #[error("malformed color variable `{key}`: {value:?}")]
    MalformedColorPair { key: String, value: String },
}

/// Bound template strings, ready for parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindResult {
    pub ui_template: String,
    pub data_template: String,
}

/// Substitute placeholders in both template strings.
///
/// `variables` and `color_variables` are merged into one lookup; a color
/// variable wins when both define the same key.
pub fn bind(
    ui_template: &str,
    data_template: &str,
    variables: &HashMap<String, String>,
    color_variables: &HashMap<String, String>,
) -> BindResult {
    let mut lookup: HashMap<&str, &str> = variables
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    for (key, value) in color_variables {
        lookup.insert(key.as_str(), value.as_str());
    }

    BindResult {
        ui_template: substitute(ui_template, &lookup),
        data_template: substitute(data_template, &lookup),
    }
}

/// Replace every known placeholder in `source`.
///
/// Matches are collected in one pass and applied from last to first, so the
/// byte ranges of earlier matches stay valid while the string is edited.
fn substitute(source: &str, lookup: &HashMap<&str, &str>) -> String {
    let matches: Vec<(std::ops::Range<usize>, &str)> = PLACEHOLDER
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str();
            lookup
                .get(name)
                .map(|value| (whole.range(), *value))
        })
        .collect();

    let mut result = source.to_string();
    for (range, value) in matches.into_iter().rev() {
        result.replace_range(range, &escape_json_string(value));
    }
    result
}

fn escape_json_string(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Which half of a `"#light,#dark"` pair each appearance uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Both appearances use the light color
    Light,
    /// Both appearances use the dark color
    Dark,
    /// Light appearance uses the light color, dark uses the dark color
    #[default]
    Default,
}

/// Current system appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Appearance {
    #[default]
    Light,
    Dark,
}

/// Color variables resolved for each appearance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColorVariables {
    pub for_light: HashMap<String, String>,
    pub for_dark: HashMap<String, String>,
}

impl ColorVariables {
    pub fn for_appearance(&self, appearance: Appearance) -> &HashMap<String, String> {
        match appearance {
            Appearance::Light => &self.for_light,
            Appearance::Dark => &self.for_dark,
        }
    }
}

impl ThemeMode {
    /// Pair indices used for the (light, dark) output maps
    fn indices(self) -> (usize, usize) {
        match self {
            ThemeMode::Light => (0, 0),
            ThemeMode::Dark => (1, 1),
            ThemeMode::Default => (0, 1),
        }
    }
}

/// Split a color pair and pick the component for each appearance.
///
/// A single-entry pair collapses both indices to that entry. An empty first
/// component is malformed.
pub fn select_color_pair(key: &str, value: &str, mode: ThemeMode) -> Result<(String, String), BindError> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let first = parts.first().copied().unwrap_or_default();
    if first.is_empty() {
        return Err(BindError::MalformedColorPair {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    let pick = |index: usize| -> String {
        parts
            .get(index)
            .filter(|p| !p.is_empty())
            .copied()
            .unwrap_or(first)
            .to_string()
    };
    let (light, dark) = mode.indices();
    Ok((pick(light), pick(dark)))
}

/// Resolve raw `"#light,#dark"` color variables into per-appearance maps.
///
/// Fails for the whole set if any pair is malformed.
pub fn resolve_color_variables(
    raw: &HashMap<String, String>,
    mode: ThemeMode,
) -> Result<ColorVariables, BindError> {
    let mut resolved = ColorVariables::default();
    for (key, value) in raw {
        let (light, dark) = select_color_pair(key, value, mode)?;
        resolved.for_light.insert(key.clone(), light);
        resolved.for_dark.insert(key.clone(), dark);
    }
    Ok(resolved)
}
