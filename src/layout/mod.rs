//! Layout engine for computing item positions and sizes
//!
//! This module takes a parsed template and computes the spatial layout,
//! producing a [`LayoutTree`] of positioned items. Sizes and positions come
//! from a Cassowary constraint system built by a single top-down walk.

pub mod carousel;
mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod solver;
pub mod text;
pub mod types;

pub use carousel::{CarouselCache, CarouselKey, CarouselState};
pub use config::LayoutConfig;
pub use engine::Renderer;
pub use error::LayoutError;
pub use solver::{ConstraintSolver, Priority, SolverError};
pub use text::{ApproximateTextMeasurer, Font, TextMeasurer, TextMetrics};
pub use types::*;

use crate::parser::ast::Template;

/// Lay out a template once, without keeping the layout live
pub fn compute(template: &Template, config: &LayoutConfig) -> Result<LayoutTree, LayoutError> {
    let mut renderer = Renderer::new(config.clone());
    renderer
        .render(TemplateIdentity::default(), template)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    #[test]
    fn test_compute_hello() {
        let template = parse_str(
            r#"{"version":1,"body":{"items":[{"type":"text","text":"Hello","width":{"type":"flex","value":1},"height":{"type":"flex","value":1}}]}}"#,
        )
        .unwrap();
        let tree = compute(&template, &LayoutConfig::default()).unwrap();
        let text = &tree.root.children[0];
        assert_eq!(text.frame.x, 0.0);
        assert_eq!(text.frame.y, 0.0);
        assert!((text.frame.width - 42.0).abs() < 0.01);
        assert!((text.frame.height - 16.8).abs() < 0.01);
    }

    #[test]
    fn test_compute_rejects_unsupported_version() {
        let template = Template {
            version: 3,
            body: None,
        };
        assert!(matches!(
            compute(&template, &LayoutConfig::default()),
            Err(LayoutError::UnsupportedVersion(3))
        ));
    }
}
