//! Theme palette for fallback bodies and default text colors
//!
//! Colors are stored as `"#light,#dark"` pairs (or a single color used for
//! both appearances) and resolved through the same pair selection as template
//! color variables, so a theme's `mode` behaves exactly like the binder's.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::template::binder::{select_color_pair, Appearance, ThemeMode};

/// Errors that can occur when loading or parsing a theme
#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("Failed to read theme file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse theme TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Strings shown by the error body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FallbackText {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
}

/// A theme mapping color tokens to light/dark pairs
#[derive(Debug, Clone)]
pub struct Theme {
    /// Optional name for the theme
    pub name: Option<String>,
    /// How color pairs map onto appearances
    pub mode: ThemeMode,
    /// Color mappings: token name -> `"#light,#dark"` or a single color
    pub colors: HashMap<String, String>,
    /// Error body text
    pub fallback: FallbackText,
}

/// TOML structure for deserializing themes
#[derive(Deserialize)]
struct TomlTheme {
    metadata: Option<TomlMetadata>,
    #[serde(default)]
    mode: ThemeMode,
    #[serde(default)]
    colors: HashMap<String, String>,
    fallback: Option<FallbackText>,
}

#[derive(Deserialize)]
struct TomlMetadata {
    name: Option<String>,
}

/// Default palette - neutral grays
const DEFAULT_THEME: &str = r##"
mode = "default"

[metadata]
name = "default"

[colors]
error-background = "#eeeeee,#2c2c2c"
error-title = "#212121,#e0e0e0"
error-subtitle = "#757575,#9e9e9e"
downloading-background = "#eeeeee,#2c2c2c"
text-default = "#212121,#e0e0e0"

[fallback]
title = "(Unknown message type)"
subtitle = "Can't display this message."
"##;

/// Last-resort color for tokens no palette defines
const FALLBACK_COLOR: &str = "#000000";

impl Theme {
    /// Load a theme from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ThemeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a theme from a TOML string
    ///
    /// Tokens and fallback text the string omits are taken from the default theme.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ThemeError> {
        let parsed: TomlTheme = toml::from_str(content)?;
        let fallback = match parsed.fallback {
            Some(text) => text,
            None => default_fallback()?,
        };

        Ok(Theme {
            name: parsed.metadata.and_then(|m| m.name),
            mode: parsed.mode,
            colors: parsed.colors,
            fallback,
        })
    }

    /// Raw pair for a token, if this theme defines it
    pub fn resolve(&self, token: &str) -> Option<&str> {
        self.colors.get(token).map(|s| s.as_str())
    }

    /// Concrete color for a token under the given appearance
    ///
    /// Fallback order:
    /// 1. This theme's pair for the token
    /// 2. The default theme's pair for the token
    /// 3. Black
    ///
    /// A malformed pair is skipped like a missing one.
    pub fn color(&self, token: &str, appearance: Appearance) -> String {
        let pick = |pair: &str| {
            select_color_pair(token, pair, self.mode)
                .ok()
                .map(|(light, dark)| match appearance {
                    Appearance::Light => light,
                    Appearance::Dark => dark,
                })
        };

        if let Some(color) = self.resolve(token).and_then(pick) {
            return color;
        }
        if let Ok(default) = toml::from_str::<TomlTheme>(DEFAULT_THEME) {
            if let Some(color) = default.colors.get(token).and_then(|p| pick(p)) {
                return color;
            }
        }
        FALLBACK_COLOR.to_string()
    }
}

fn default_fallback() -> Result<FallbackText, ThemeError> {
    let parsed: TomlTheme = toml::from_str(DEFAULT_THEME)?;
    Ok(parsed.fallback.unwrap_or(FallbackText {
        title: String::new(),
        subtitle: None,
    }))
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_str(DEFAULT_THEME).expect("Default theme should be valid TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_theme() {
        let theme = Theme::default();
        assert_eq!(theme.mode, ThemeMode::Default);
        assert!(theme.colors.contains_key("error-background"));
        assert_eq!(theme.fallback.title, "(Unknown message type)");
    }

    #[test]
    fn test_color_by_appearance() {
        let theme = Theme::default();
        assert_eq!(theme.color("error-title", Appearance::Light), "#212121");
        assert_eq!(theme.color("error-title", Appearance::Dark), "#e0e0e0");
    }

    #[test]
    fn test_mode_forces_one_side() {
        let theme = Theme::from_str(
            r##"
mode = "dark"
[colors]
error-title = "#111111,#999999"
"##,
        )
        .expect("Should parse");
        assert_eq!(theme.color("error-title", Appearance::Light), "#999999");
    }

    #[test]
    fn test_missing_token_falls_back_to_default_palette() {
        let theme = Theme::from_str("[colors]\n").expect("Should parse");
        assert_eq!(theme.color("error-subtitle", Appearance::Light), "#757575");
        assert_eq!(theme.color("nonexistent", Appearance::Light), "#000000");
        assert_eq!(theme.fallback, Theme::default().fallback);
    }

    #[test]
    fn test_parse_toml_with_metadata_and_fallback() {
        let toml_str = r##"
[metadata]
name = "Brand"

[colors]
text-default = "#000000"

[fallback]
title = "Oops"
"##;
        let theme = Theme::from_str(toml_str).expect("Should parse");
        assert_eq!(theme.name, Some("Brand".to_string()));
        assert_eq!(theme.fallback.title, "Oops");
        assert_eq!(theme.fallback.subtitle, None);
        assert_eq!(theme.color("text-default", Appearance::Dark), "#000000");
    }

    #[test]
    fn test_invalid_toml_error() {
        let invalid = "this is not valid toml {{{{";
        assert!(Theme::from_str(invalid).is_err());
    }
}
