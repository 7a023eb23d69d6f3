//! SVG preview renderer for layout trees
//!
//! Draws a [`crate::layout::LayoutTree`] the way a host view hierarchy would:
//! boxes as framed rectangles, text as one `<text>` per wrapped line, images
//! as linked or embedded bitmaps, and carousels clipped to their viewport.

pub mod config;
pub mod svg;

pub use config::SvgConfig;
pub use svg::{render_svg, render_svg_with_theme};
