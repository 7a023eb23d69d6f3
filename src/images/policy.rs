//! How an image slot is sized before and after its bitmap arrives

use crate::parser::ast::{ContentMode, MetaData, SizeSpec};

/// Which sizing strategy an image slot uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePolicy {
    /// One dimension follows the other through the bitmap's aspect ratio
    Ratio,
    /// A low-priority placeholder of at least 1x1
    MinSize,
}

/// Sizing mode of one axis as the decision table sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Fixed,
    Fill,
    Wrap,
}

impl From<&SizeSpec> for Dimension {
    fn from(spec: &SizeSpec) -> Self {
        if spec.is_fixed() {
            Dimension::Fixed
        } else if spec.is_fill() {
            Dimension::Fill
        } else {
            Dimension::Wrap
        }
    }
}

/// Pick the sizing strategy from the width/height modes and content mode
///
/// | width | height | aspectFit/Fill | scalesToFill |
/// |-------|--------|----------------|--------------|
/// | fixed | fixed  | min-size       | min-size     |
/// | fixed | flex   | ratio          | min-size     |
/// | fill  | fixed  | min-size       | min-size     |
/// | fill  | flex   | ratio          | ratio        |
/// | wrap  | fixed  | ratio          | ratio        |
/// | wrap  | flex   | min-size       | min-size     |
pub fn image_policy(width: &SizeSpec, height: &SizeSpec, mode: ContentMode) -> ImagePolicy {
    use Dimension::*;

    match (Dimension::from(width), Dimension::from(height)) {
        (Fixed, Fixed) | (Fill, Fixed) | (Wrap, Fill | Wrap) => ImagePolicy::MinSize,
        (Fixed, Fill | Wrap) if mode.preserves_aspect() => ImagePolicy::Ratio,
        (Fixed, Fill | Wrap) => ImagePolicy::MinSize,
        (Fill, Fill | Wrap) | (Wrap, Fixed) => ImagePolicy::Ratio,
    }
}

/// Concrete constraint set for an image slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintPolicy {
    /// height = width * ratio
    Ratio(f64),
    MinSize,
}

/// Resolve the constraint set from the table and the size hint
///
/// A ratio policy without a usable hint falls back to the placeholder until
/// the real bitmap supplies one.
pub fn resolve_image(
    width: &SizeSpec,
    height: &SizeSpec,
    mode: ContentMode,
    meta: Option<&MetaData>,
) -> ConstraintPolicy {
    match image_policy(width, height, mode) {
        ImagePolicy::Ratio => meta
            .and_then(MetaData::ratio)
            .map(ConstraintPolicy::Ratio)
            .unwrap_or(ConstraintPolicy::MinSize),
        ImagePolicy::MinSize => ConstraintPolicy::MinSize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::FlexMode;

    const F: SizeSpec = SizeSpec::Fixed(100.0);
    const L0: SizeSpec = SizeSpec::Flex(FlexMode::FillParent);
    const L1: SizeSpec = SizeSpec::Flex(FlexMode::WrapContent);

    fn meta() -> MetaData {
        MetaData {
            pixel_width: 200,
            pixel_height: 100,
        }
    }

    #[test]
    fn test_fixed_width_flex_height_uses_ratio() {
        let policy = resolve_image(&F, &L0, ContentMode::AspectFit, Some(&meta()));
        assert_eq!(policy, ConstraintPolicy::Ratio(0.5));
    }

    #[test]
    fn test_fixed_fixed_ignores_ratio() {
        let policy = resolve_image(&F, &F, ContentMode::AspectFit, Some(&meta()));
        assert_eq!(policy, ConstraintPolicy::MinSize);
    }

    #[test]
    fn test_full_table() {
        use ContentMode::*;
        use ImagePolicy::*;

        let cases = [
            (F, F, MinSize, MinSize),
            (F, L0, Ratio, MinSize),
            (F, L1, Ratio, MinSize),
            (L0, F, MinSize, MinSize),
            (L0, L0, Ratio, Ratio),
            (L0, L1, Ratio, Ratio),
            (L1, F, Ratio, Ratio),
            (L1, L0, MinSize, MinSize),
            (L1, L1, MinSize, MinSize),
        ];
        for (width, height, aspect, scales) in cases {
            assert_eq!(image_policy(&width, &height, AspectFill), aspect, "{width:?} x {height:?}");
            assert_eq!(image_policy(&width, &height, AspectFit), aspect, "{width:?} x {height:?}");
            assert_eq!(image_policy(&width, &height, ScalesToFill), scales, "{width:?} x {height:?}");
        }
    }

    #[test]
    fn test_ratio_without_metadata_is_placeholder() {
        assert_eq!(
            resolve_image(&F, &L1, ContentMode::AspectFill, None),
            ConstraintPolicy::MinSize
        );
    }
}
