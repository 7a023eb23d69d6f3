//! Configuration for the layout engine

/// Configuration options for layout computation
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Width the root body is laid out into
    pub max_width: f64,

    /// Font size for text without an explicit `textStyle.size`
    pub default_font_size: f64,

    /// Points per image pixel divisor (pixel size / scale = point size)
    pub display_scale: f64,

    /// Widest a single carousel page may be
    pub carousel_child_max_width: f64,

    /// Height of the downloading body
    pub downloading_height: f64,

    /// Average glyph advance as a fraction of the font size
    pub char_width_ratio: f64,

    /// Line height as a multiple of the font size
    pub line_height_ratio: f64,

    /// Upper bound on solve/measure rounds for wrapped text
    pub text_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_width: 280.0,
            default_font_size: 14.0,
            display_scale: 2.0,
            carousel_child_max_width: 240.0,
            downloading_height: 120.0,
            char_width_ratio: 0.6,
            line_height_ratio: 1.2,
            text_passes: 4,
        }
    }
}

impl LayoutConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root layout width
    pub fn with_max_width(mut self, width: f64) -> Self {
        self.max_width = width;
        self
    }

    /// Set the default font size
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.default_font_size = size;
        self
    }

    /// Set the image display scale
    pub fn with_display_scale(mut self, scale: f64) -> Self {
        self.display_scale = scale.max(f64::EPSILON);
        self
    }

    /// Set the maximum carousel page width
    pub fn with_carousel_child_max_width(mut self, width: f64) -> Self {
        self.carousel_child_max_width = width;
        self
    }

    /// Set the downloading body height
    pub fn with_downloading_height(mut self, height: f64) -> Self {
        self.downloading_height = height;
        self
    }

    /// Set glyph and line metrics for the approximate text measurer
    pub fn with_text_metrics(mut self, char_width_ratio: f64, line_height_ratio: f64) -> Self {
        self.char_width_ratio = char_width_ratio;
        self.line_height_ratio = line_height_ratio;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LayoutConfig::default();
        assert_eq!(config.max_width, 280.0);
        assert_eq!(config.default_font_size, 14.0);
        assert_eq!(config.display_scale, 2.0);
        assert_eq!(config.char_width_ratio, 0.6);
        assert_eq!(config.text_passes, 4);
    }

    #[test]
    fn test_builder_pattern() {
        let config = LayoutConfig::new()
            .with_max_width(320.0)
            .with_font_size(16.0)
            .with_display_scale(0.0)
            .with_carousel_child_max_width(200.0)
            .with_downloading_height(90.0)
            .with_text_metrics(0.5, 1.5);

        assert_eq!(config.max_width, 320.0);
        assert_eq!(config.default_font_size, 16.0);
        assert_eq!(config.carousel_child_max_width, 200.0);
        assert_eq!(config.downloading_height, 90.0);
        assert!(config.display_scale > 0.0);
        assert_eq!(config.line_height_ratio, 1.5);
    }
}
