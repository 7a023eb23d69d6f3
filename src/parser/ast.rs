//! Typed template tree
//!
//! The tree is immutable once produced by the parser: every default has
//! already been injected, so consumers never see a half-configured node.
//! Item variants share their common attributes through the embedded [`View`].

use serde::Serialize;

/// Template versions the layout engine knows how to render
pub const SUPPORTED_VERSIONS: [i64; 2] = [1, 2];

/// Root template document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub version: i64,
    pub body: Option<Body>,
}

impl Template {
    /// Whether the renderer accepts this template's version
    pub fn is_supported(&self) -> bool {
        SUPPORTED_VERSIONS.contains(&self.version)
    }

    /// Reject templates the renderer cannot draw
    pub fn ensure_supported(self) -> Result<Self, crate::error::ParseError> {
        if self.is_supported() {
            Ok(self)
        } else {
            Err(crate::error::ParseError::UnsupportedVersion(self.version))
        }
    }
}

/// Ordered list of top-level items, rendered top to bottom
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Body {
    pub items: Vec<Item>,
}

impl Body {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }
}

/// One node of the template tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Item {
    #[serde(rename = "box")]
    Box(BoxItem),
    #[serde(rename = "text")]
    Text(TextItem),
    #[serde(rename = "image")]
    Image(ImageItem),
    #[serde(rename = "textButton")]
    TextButton(TextItem),
    #[serde(rename = "imageButton")]
    ImageButton(ImageItem),
    #[serde(rename = "carouselView")]
    Carousel(CarouselItem),
}

impl Item {
    /// Shared attributes of the item
    pub fn view(&self) -> &View {
        match self {
            Item::Box(b) => &b.view,
            Item::Text(t) | Item::TextButton(t) => &t.view,
            Item::Image(i) | Item::ImageButton(i) => &i.view,
            Item::Carousel(c) => &c.view,
        }
    }

    /// Text payload for text-like items
    pub fn as_text(&self) -> Option<&TextItem> {
        match self {
            Item::Text(t) | Item::TextButton(t) => Some(t),
            _ => None,
        }
    }

    /// Image payload for image-like items
    pub fn as_image(&self) -> Option<&ImageItem> {
        match self {
            Item::Image(i) | Item::ImageButton(i) => Some(i),
            _ => None,
        }
    }
}

/// Attributes every item carries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub action: Option<Action>,
    pub view_style: ViewStyle,
    pub width: SizeSpec,
    pub height: SizeSpec,
}

impl Default for View {
    fn default() -> Self {
        Self {
            action: None,
            view_style: ViewStyle::default(),
            width: SizeSpec::Flex(FlexMode::FillParent),
            height: SizeSpec::Flex(FlexMode::WrapContent),
        }
    }
}

/// Tap action attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub data: String,
    pub alter_data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Web,
    Custom,
    Uikit,
}

/// Visual container attributes
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStyle {
    pub background_color: Option<String>,
    pub background_image_url: Option<String>,
    pub border_width: Option<f64>,
    pub border_color: Option<String>,
    pub radius: Option<f64>,
    pub margin: Insets,
    pub padding: Insets,
}

impl ViewStyle {
    /// Corner radius after clamping against the item's fixed dimensions.
    ///
    /// A radius never exceeds half of a fixed width or a fixed height; flexible
    /// dimensions do not constrain it.
    pub fn effective_radius(&self, width: &SizeSpec, height: &SizeSpec) -> f64 {
        let mut radius = self.radius.unwrap_or(0.0).max(0.0);
        if let Some(w) = width.fixed_value() {
            radius = radius.min(w / 2.0);
        }
        if let Some(h) = height.fixed_value() {
            radius = radius.min(h / 2.0);
        }
        radius.max(0.0)
    }
}

/// Edge insets, used for both margin and padding
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Insets {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Insets {
    pub fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    pub fn uniform(value: f64) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Sizing mode of one axis
///
/// For flexible sizes the wire `value` is a mode tag, never a dimension, so it
/// is carried here as [`FlexMode`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SizeSpec {
    Fixed(f64),
    Flex(FlexMode),
}

impl SizeSpec {
    pub fn fixed_value(&self) -> Option<f64> {
        match self {
            SizeSpec::Fixed(v) => Some(*v),
            SizeSpec::Flex(_) => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, SizeSpec::Fixed(_))
    }

    pub fn is_fill(&self) -> bool {
        matches!(self, SizeSpec::Flex(FlexMode::FillParent))
    }

    pub fn is_wrap(&self) -> bool {
        matches!(self, SizeSpec::Flex(FlexMode::WrapContent))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FlexMode {
    FillParent,
    WrapContent,
}

/// Main axis of a box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Row,
    Column,
}

/// Two-axis alignment of a box's children or a text's glyphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Align {
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

/// Position along an axis, independent of orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisAlign {
    Start,
    Center,
    End,
}

impl From<HorizontalAlign> for AxisAlign {
    fn from(align: HorizontalAlign) -> Self {
        match align {
            HorizontalAlign::Left => AxisAlign::Start,
            HorizontalAlign::Center => AxisAlign::Center,
            HorizontalAlign::Right => AxisAlign::End,
        }
    }
}

impl From<VerticalAlign> for AxisAlign {
    fn from(align: VerticalAlign) -> Self {
        match align {
            VerticalAlign::Top => AxisAlign::Start,
            VerticalAlign::Center => AxisAlign::Center,
            VerticalAlign::Bottom => AxisAlign::End,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxItem {
    pub view: View,
    pub layout: Layout,
    pub items: Vec<Item>,
    pub align: Align,
}

/// Payload shared by `text` and `textButton`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub view: View,
    pub text: String,
    /// `0` means unlimited
    pub max_text_lines: u32,
    pub text_style: TextStyle,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TextStyle {
    pub size: Option<f64>,
    pub color: Option<String>,
    pub weight: FontWeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Payload shared by `image` and `imageButton`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub view: View,
    pub image_url: String,
    pub image_style: ImageStyle,
    pub meta_data: Option<MetaData>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStyle {
    pub content_mode: ContentMode,
    pub tint_color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentMode {
    #[default]
    AspectFill,
    AspectFit,
    ScalesToFill,
}

impl ContentMode {
    /// Whether drawing in this mode keeps the bitmap's aspect ratio
    pub fn preserves_aspect(&self) -> bool {
        !matches!(self, ContentMode::ScalesToFill)
    }
}

/// Intrinsic pixel size hint, available before the bitmap loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl MetaData {
    /// height / width, or `None` for degenerate sizes
    pub fn ratio(&self) -> Option<f64> {
        if self.pixel_width == 0 || self.pixel_height == 0 {
            None
        } else {
            Some(f64::from(self.pixel_height) / f64::from(self.pixel_width))
        }
    }
}

/// Horizontal list of independent templates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarouselItem {
    pub view: View,
    pub items: Vec<Template>,
    pub spacing: f64,
}
