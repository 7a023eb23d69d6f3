//! Message Template - a JSON message-template layout engine
//!
//! This library parses server-defined message templates, binds placeholder
//! variables, lays the item tree out with a Cassowary constraint solver and
//! draws the result as an SVG preview.
//!
//! # Example
//!
//! ```rust
//! use message_template::render;
//!
//! let svg = render(r#"{"version":1,"body":{"items":[{"type":"text","text":"Hello"}]}}"#).unwrap();
//! assert!(svg.contains("Hello"));
//! ```

pub mod delegate;
pub mod error;
pub mod executor;
pub mod images;
pub mod layout;
pub mod parser;
pub mod renderer;
pub mod template;
pub mod theme;

pub use delegate::TemplateDelegate;
pub use error::ParseError;
pub use layout::{LayoutConfig, LayoutError, LayoutTree, Renderer, TemplateIdentity};
pub use parser::{parse, parse_str, Template};
pub use renderer::{render_svg, render_svg_with_theme, SvgConfig};
pub use template::{Appearance, BindError};
pub use theme::{Theme, ThemeError};

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during the render pipeline
#[derive(Debug, Error)]
pub enum RenderError {
    /// The bound template is not a valid document
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A color variable could not be resolved
    #[error("bind error: {0}")]
    Bind(#[from] BindError),

    /// The template parsed but could not be laid out
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),
}

/// Configuration for the complete render pipeline
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Layout configuration
    pub layout: LayoutConfig,
    /// SVG output configuration
    pub svg: SvgConfig,
    /// Palette for default colors and fallback bodies
    pub theme: Theme,
    /// Which side of every color pair to use
    pub appearance: Appearance,
    /// Debug mode: outline frames and log the layout tree
    pub debug: bool,
}

impl RenderConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the layout configuration
    pub fn with_layout(mut self, config: LayoutConfig) -> Self {
        self.layout = config;
        self
    }

    /// Set the SVG configuration
    pub fn with_svg(mut self, config: SvgConfig) -> Self {
        self.svg = config;
        self
    }

    /// Set the theme
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Pick the light or dark side of every color pair
    pub fn with_appearance(mut self, appearance: Appearance) -> Self {
        self.appearance = appearance;
        self
    }

    /// Enable or disable debug mode
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Variables substituted into a template before parsing
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub variables: HashMap<String, String>,
    /// Raw `"#light,#dark"` pairs, resolved against the theme mode
    pub color_variables: HashMap<String, String>,
}

/// Render template JSON to SVG with default configuration
pub fn render(source: &str) -> Result<String, RenderError> {
    render_with_config(source, &RenderConfig::default())
}

/// Render template JSON to SVG with custom configuration
///
/// # Example
///
/// ```rust
/// use message_template::{render_with_config, LayoutConfig, RenderConfig, SvgConfig};
///
/// let config = RenderConfig::new()
///     .with_layout(LayoutConfig::default().with_max_width(200.0))
///     .with_svg(SvgConfig::default().with_xml_declaration(false));
///
/// let svg = render_with_config(r#"{"version":1,"body":{"items":[]}}"#, &config).unwrap();
/// assert!(svg.starts_with("<svg"));
/// ```
pub fn render_with_config(source: &str, config: &RenderConfig) -> Result<String, RenderError> {
    let tree = layout_source(source, config)?;
    Ok(draw(&tree, config))
}

/// Bind `bindings` into `ui_template`, then render it
pub fn render_bound(
    ui_template: &str,
    bindings: &Bindings,
    config: &RenderConfig,
) -> Result<String, RenderError> {
    let bound = bind_source(ui_template, bindings, config)?;
    render_with_config(&bound, config)
}

/// Render template JSON, drawing the theme's error body if it cannot be laid out
pub fn render_with_fallback(source: &str, config: &RenderConfig) -> Result<String, RenderError> {
    match layout_source(source, config) {
        Ok(tree) => Ok(draw(&tree, config)),
        Err(e) => {
            warn!(error = %e, "template failed, rendering error body");
            let body = template::themed_error_body(&config.theme, config.appearance);
            let mut renderer = Renderer::new(config.layout.clone());
            let tree = renderer.render_body(TemplateIdentity::default(), &body)?;
            Ok(draw(tree, config))
        }
    }
}

/// Substitute variables into a template string
pub fn bind_source(
    ui_template: &str,
    bindings: &Bindings,
    config: &RenderConfig,
) -> Result<String, RenderError> {
    let colors = template::resolve_color_variables(&bindings.color_variables, config.theme.mode)?;
    let bound = template::bind(
        ui_template,
        "",
        &bindings.variables,
        colors.for_appearance(config.appearance),
    );
    Ok(bound.ui_template)
}

/// Parse and lay out template JSON
pub fn layout_source(source: &str, config: &RenderConfig) -> Result<LayoutTree, RenderError> {
    let template = parse_str(source)?;
    let tree = layout::compute(&template, &config.layout)?;
    if config.debug {
        for node in tree.nodes() {
            debug!(
                path = %node.path,
                hidden = node.hidden,
                x = node.frame.x,
                y = node.frame.y,
                w = node.frame.width,
                h = node.frame.height,
                "layout"
            );
        }
    }
    Ok(tree)
}

fn draw(tree: &LayoutTree, config: &RenderConfig) -> String {
    let svg = config.svg.clone().with_debug_frames(config.svg.debug_frames || config.debug);
    render_svg_with_theme(tree, &svg, &config.theme, config.appearance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_simple_text() {
        let svg = render(r#"{"version":1,"body":{"items":[{"type":"text","text":"Hello"}]}}"#).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
        assert!(svg.contains("Hello"));
    }

    #[test]
    fn test_render_malformed_json_is_parse_error() {
        let err = render("{not json").unwrap_err();
        assert!(matches!(err, RenderError::Parse(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_render_unsupported_version() {
        let err = render(r#"{"version":7,"body":{"items":[]}}"#).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Parse(ParseError::UnsupportedVersion(7)) | RenderError::Layout(LayoutError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_render_with_fallback_draws_error_title() {
        let config = RenderConfig::default();
        let svg = render_with_fallback("{", &config).unwrap();
        assert!(svg.contains(&Theme::default().fallback.title));
    }

    #[test]
    fn test_render_bound_substitutes_text_and_color() {
        let mut bindings = Bindings::default();
        bindings.variables.insert("name".to_string(), "Ada".to_string());
        bindings
            .color_variables
            .insert("tint".to_string(), "#111111,#eeeeee".to_string());
        let source = r#"{"version":1,"body":{"items":[{"type":"text","text":"Hi {name}","textStyle":{"color":"{tint}"}}]}}"#;

        let dark = RenderConfig::new().with_appearance(Appearance::Dark);
        let svg = render_bound(source, &bindings, &dark).unwrap();
        assert!(svg.contains("Hi Ada"));
        assert!(svg.contains(r##"fill="#eeeeee""##));
    }

    #[test]
    fn test_debug_outlines_frames() {
        let config = RenderConfig::new().with_debug(true);
        let svg = render_with_config(r#"{"version":1,"body":{"items":[{"type":"text","text":"x"}]}}"#, &config).unwrap();
        assert!(svg.contains("mt-debug"));
    }
}
