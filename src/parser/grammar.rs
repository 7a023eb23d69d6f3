//! JSON grammar for message templates
//!
//! Decoding happens in two steps. Wire structs mirror the JSON exactly, with
//! every field optional and every numeric leaf decoded leniently. The
//! `*_with_defaults` functions then inject defaults once and produce the
//! immutable tree from [`super::ast`].

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ParseError;

use super::ast::*;
use super::lenient;

/// Parse a template document from raw bytes
pub fn parse(bytes: &[u8]) -> Result<Template, ParseError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| ParseError::from_json(&e))?;
    parse_value(&value)
}

/// Parse a template document from a string
pub fn parse_str(source: &str) -> Result<Template, ParseError> {
    parse(source.as_bytes())
}

/// Parse an already-decoded JSON value
pub fn parse_value(value: &Value) -> Result<Template, ParseError> {
    decode_template(value, "template")
}

// ============================================================================
// Wire structs
// ============================================================================

#[derive(Deserialize)]
struct WireTemplate {
    #[serde(default, deserialize_with = "lenient::int")]
    version: i64,
    #[serde(default)]
    body: Option<WireBody>,
}

#[derive(Deserialize)]
struct WireBody {
    #[serde(default)]
    items: Option<Vec<Value>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireView {
    #[serde(default)]
    action: Option<WireAction>,
    #[serde(default)]
    view_style: Option<WireViewStyle>,
    #[serde(default)]
    width: Option<WireSize>,
    #[serde(default)]
    height: Option<WireSize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAction {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    alter_data: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireViewStyle {
    #[serde(default)]
    background_color: Option<String>,
    #[serde(default)]
    background_image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    border_width: Option<i64>,
    #[serde(default)]
    border_color: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    radius: Option<i64>,
    #[serde(default)]
    margin: Option<WireInsets>,
    #[serde(default)]
    padding: Option<WireInsets>,
}

#[derive(Deserialize)]
struct WireInsets {
    #[serde(default, deserialize_with = "lenient::int")]
    top: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    bottom: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    left: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    right: i64,
}

#[derive(Deserialize)]
struct WireSize {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    value: i64,
}

#[derive(Deserialize, Default)]
struct WireAlign {
    #[serde(default)]
    horizontal: Option<String>,
    #[serde(default)]
    vertical: Option<String>,
}

#[derive(Deserialize)]
struct WireBox {
    #[serde(default)]
    layout: Option<String>,
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default)]
    align: Option<WireAlign>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireText {
    text: String,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    max_text_lines: Option<i64>,
    #[serde(default)]
    text_style: Option<WireTextStyle>,
    #[serde(default)]
    align: Option<WireAlign>,
}

#[derive(Deserialize)]
struct WireTextStyle {
    #[serde(default, deserialize_with = "lenient::opt_int")]
    size: Option<i64>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    weight: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireImage {
    image_url: String,
    #[serde(default)]
    image_style: Option<WireImageStyle>,
    #[serde(default)]
    meta_data: Option<WireMetaData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireImageStyle {
    #[serde(default)]
    content_mode: Option<String>,
    #[serde(default)]
    tint_color: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetaData {
    #[serde(default, deserialize_with = "lenient::int")]
    pixel_width: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pixel_height: i64,
}

#[derive(Deserialize)]
struct WireCarousel {
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    spacing: Option<i64>,
}

// ============================================================================
// Defaults
// ============================================================================

/// Default text-line limit for `textButton`
const TEXT_BUTTON_MAX_LINES: u32 = 1;
/// Default corner radius for `textButton`
const TEXT_BUTTON_RADIUS: f64 = 6.0;
/// Default carousel spacing between child templates
const CAROUSEL_SPACING: f64 = 10.0;

fn text_button_padding() -> Insets {
    Insets::new(10.0, 10.0, 20.0, 20.0)
}

// ============================================================================
// Decoding
// ============================================================================

fn decode_template(value: &Value, path: &str) -> Result<Template, ParseError> {
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    let wire: WireTemplate = serde_json::from_value(value.clone())
        .map_err(|e| invalid(path, &e))?;

    let body = match wire.body {
        Some(body) => {
            let items = body.items.unwrap_or_default();
            let body_path = format!("{path}.body");
            Some(Body::new(decode_items(&items, &body_path)?))
        }
        None => None,
    };

    Ok(Template {
        version: wire.version,
        body,
    })
}

fn decode_items(values: &[Value], parent_path: &str) -> Result<Vec<Item>, ParseError> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| decode_item(value, &format!("{parent_path}.items[{index}]")))
        .collect()
}

/// Decode one item: read the `type` tag, then dispatch to the variant decoder
fn decode_item(value: &Value, path: &str) -> Result<Item, ParseError> {
    let object = value.as_object().ok_or_else(|| ParseError::InvalidItem {
        path: path.to_string(),
        message: "item must be a JSON object".to_string(),
    })?;

    let tag = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::MissingField {
            field: "type".to_string(),
            path: path.to_string(),
        })?;

    let wire_view: WireView = decode_part(value, path)?;

    match tag {
        "box" => {
            let view = view_with_defaults(wire_view, ViewDefaults::plain());
            let wire: WireBox = decode_part(value, path)?;
            let items = decode_items(&wire.items.unwrap_or_default(), path)?;
            Ok(Item::Box(BoxItem {
                view,
                layout: layout_from(wire.layout.as_deref()),
                items,
                align: align_from(wire.align),
            }))
        }
        "text" => {
            require(object, "text", path)?;
            let view = view_with_defaults(wire_view, ViewDefaults::plain());
            let wire: WireText = decode_part(value, path)?;
            Ok(Item::Text(text_with_defaults(view, wire, 0)))
        }
        "textButton" => {
            require(object, "text", path)?;
            let view = view_with_defaults(wire_view, ViewDefaults::text_button());
            let wire: WireText = decode_part(value, path)?;
            Ok(Item::TextButton(text_with_defaults(
                view,
                wire,
                TEXT_BUTTON_MAX_LINES,
            )))
        }
        "image" => {
            require(object, "imageUrl", path)?;
            let view = view_with_defaults(wire_view, ViewDefaults::plain());
            let wire: WireImage = decode_part(value, path)?;
            Ok(Item::Image(image_with_defaults(view, wire)))
        }
        "imageButton" => {
            require(object, "imageUrl", path)?;
            let view = view_with_defaults(wire_view, ViewDefaults::plain());
            let wire: WireImage = decode_part(value, path)?;
            Ok(Item::ImageButton(image_with_defaults(view, wire)))
        }
        "carouselView" => {
            let view = view_with_defaults(wire_view, ViewDefaults::plain());
            let wire: WireCarousel = decode_part(value, path)?;
            let items = wire
                .items
                .unwrap_or_default()
                .iter()
                .enumerate()
                .map(|(index, child)| decode_template(child, &format!("{path}.items[{index}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Item::Carousel(CarouselItem {
                view,
                items,
                spacing: wire
                    .spacing
                    .map(|s| s as f64)
                    .unwrap_or(CAROUSEL_SPACING),
            }))
        }
        other => Err(ParseError::UnknownItemType {
            tag: other.to_string(),
            path: path.to_string(),
        }),
    }
}

fn decode_part<T: for<'de> Deserialize<'de>>(value: &Value, path: &str) -> Result<T, ParseError> {
    serde_json::from_value(value.clone()).map_err(|e| invalid(path, &e))
}

fn require(object: &Map<String, Value>, field: &str, path: &str) -> Result<(), ParseError> {
    match object.get(field) {
        Some(v) if !v.is_null() => Ok(()),
        _ => Err(ParseError::MissingField {
            field: field.to_string(),
            path: path.to_string(),
        }),
    }
}

fn invalid(path: &str, err: &serde_json::Error) -> ParseError {
    ParseError::InvalidItem {
        path: path.to_string(),
        message: err.to_string(),
    }
}

/// Defaults injected only where the document left a value unset
struct ViewDefaults {
    radius: Option<f64>,
    padding: Option<Insets>,
}

impl ViewDefaults {
    fn plain() -> Self {
        Self {
            radius: None,
            padding: None,
        }
    }

    fn text_button() -> Self {
        Self {
            radius: Some(TEXT_BUTTON_RADIUS),
            padding: Some(text_button_padding()),
        }
    }
}

fn view_with_defaults(wire: WireView, defaults: ViewDefaults) -> View {
    let style = wire.view_style.unwrap_or_default();
    let view_style = ViewStyle {
        background_color: style.background_color,
        background_image_url: style.background_image_url,
        border_width: style.border_width.map(|w| w as f64),
        border_color: style.border_color,
        radius: style.radius.map(|r| r as f64).or(defaults.radius),
        margin: style.margin.map(insets_from).unwrap_or_default(),
        padding: style
            .padding
            .map(insets_from)
            .or(defaults.padding)
            .unwrap_or_default(),
    };

    let base = View::default();
    View {
        action: wire.action.map(action_from),
        view_style,
        width: wire.width.map(|w| size_from(w, base.width)).unwrap_or(base.width),
        height: wire
            .height
            .map(|h| size_from(h, base.height))
            .unwrap_or(base.height),
    }
}

fn text_with_defaults(view: View, wire: WireText, default_lines: u32) -> TextItem {
    let style = wire.text_style;
    TextItem {
        view,
        text: wire.text,
        max_text_lines: wire
            .max_text_lines
            .map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
            .unwrap_or(default_lines),
        text_style: match style {
            Some(s) => TextStyle {
                size: s.size.map(|v| v as f64),
                color: s.color,
                weight: match s.weight.as_deref() {
                    Some("bold") => FontWeight::Bold,
                    _ => FontWeight::Normal,
                },
            },
            None => TextStyle::default(),
        },
        align: align_from(wire.align),
    }
}

fn image_with_defaults(view: View, wire: WireImage) -> ImageItem {
    let image_style = match wire.image_style {
        Some(s) => ImageStyle {
            content_mode: match s.content_mode.as_deref() {
                Some("aspectFit") => ContentMode::AspectFit,
                Some("scalesToFill") => ContentMode::ScalesToFill,
                _ => ContentMode::AspectFill,
            },
            tint_color: s.tint_color,
        },
        None => ImageStyle::default(),
    };

    let meta_data = wire.meta_data.and_then(|m| {
        let width = u32::try_from(m.pixel_width).ok()?;
        let height = u32::try_from(m.pixel_height).ok()?;
        (width > 0 && height > 0).then_some(MetaData {
            pixel_width: width,
            pixel_height: height,
        })
    });

    ImageItem {
        view,
        image_url: wire.image_url,
        image_style,
        meta_data,
    }
}

fn insets_from(wire: WireInsets) -> Insets {
    Insets::new(
        wire.top as f64,
        wire.bottom as f64,
        wire.left as f64,
        wire.right as f64,
    )
}

fn size_from(wire: WireSize, fallback: SizeSpec) -> SizeSpec {
    match wire.kind.as_deref() {
        Some("fixed") => SizeSpec::Fixed(wire.value.max(0) as f64),
        Some("flex") if wire.value == 0 => SizeSpec::Flex(FlexMode::FillParent),
        Some("flex") => SizeSpec::Flex(FlexMode::WrapContent),
        _ => fallback,
    }
}

fn action_from(wire: WireAction) -> Action {
    Action {
        kind: match wire.kind.as_deref() {
            Some("web") => ActionKind::Web,
            Some("uikit") => ActionKind::Uikit,
            _ => ActionKind::Custom,
        },
        data: wire.data.unwrap_or_default(),
        alter_data: wire.alter_data,
    }
}

fn layout_from(raw: Option<&str>) -> Layout {
    match raw {
        Some("row") => Layout::Row,
        _ => Layout::Column,
    }
}

fn align_from(wire: Option<WireAlign>) -> Align {
    let wire = wire.unwrap_or_default();
    Align {
        horizontal: match wire.horizontal.as_deref() {
            Some("center") => HorizontalAlign::Center,
            Some("right") => HorizontalAlign::Right,
            _ => HorizontalAlign::Left,
        },
        vertical: match wire.vertical.as_deref() {
            Some("center") => VerticalAlign::Center,
            Some("bottom") => VerticalAlign::Bottom,
            _ => VerticalAlign::Top,
        },
    }
}
