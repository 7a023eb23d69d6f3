//! Deterministic fallback bodies
//!
//! Both bodies are ordinary template trees and go through the same layout
//! engine as any downloaded template.

use crate::parser::ast::*;
use crate::template::binder::Appearance;
use crate::theme::Theme;

/// Image URL the engine treats as the built-in loading spinner
pub const SPINNER_IMAGE_URL: &str = "internal://loading-spinner";

const SPINNER_SIZE: f64 = 36.0;
const CONTAINER_RADIUS: f64 = 16.0;
const FONT_SIZE: f64 = 14.0;

/// Two-line error body: the title and an optional subtitle
pub fn error_body(title: &str, subtitle: Option<&str>, theme: &Theme, appearance: Appearance) -> Body {
    let mut lines = vec![text_line(title, theme.color("error-title", appearance), FontWeight::Bold)];
    if let Some(subtitle) = subtitle {
        lines.push(text_line(
            subtitle,
            theme.color("error-subtitle", appearance),
            FontWeight::Normal,
        ));
    }

    Body::new(vec![Item::Box(BoxItem {
        view: View {
            view_style: ViewStyle {
                background_color: Some(theme.color("error-background", appearance)),
                radius: Some(CONTAINER_RADIUS),
                padding: Insets::new(12.0, 12.0, 12.0, 12.0),
                ..Default::default()
            },
            ..Default::default()
        },
        layout: Layout::Column,
        items: lines,
        align: Align::default(),
    })])
}

/// Error body using the theme's fallback strings
pub fn themed_error_body(theme: &Theme, appearance: Appearance) -> Body {
    error_body(
        &theme.fallback.title,
        theme.fallback.subtitle.as_deref(),
        theme,
        appearance,
    )
}

/// Spinner centered in a box of the given height
pub fn downloading_body(height: f64, theme: &Theme, appearance: Appearance) -> Body {
    let spinner = Item::Image(ImageItem {
        view: View {
            width: SizeSpec::Fixed(SPINNER_SIZE),
            height: SizeSpec::Fixed(SPINNER_SIZE),
            ..Default::default()
        },
        image_url: SPINNER_IMAGE_URL.to_string(),
        image_style: ImageStyle {
            content_mode: ContentMode::AspectFit,
            tint_color: None,
        },
        meta_data: None,
    });

    Body::new(vec![Item::Box(BoxItem {
        view: View {
            height: SizeSpec::Fixed(height.max(SPINNER_SIZE)),
            view_style: ViewStyle {
                background_color: Some(theme.color("downloading-background", appearance)),
                radius: Some(CONTAINER_RADIUS),
                ..Default::default()
            },
            ..Default::default()
        },
        layout: Layout::Column,
        items: vec![spinner],
        align: Align {
            horizontal: HorizontalAlign::Center,
            vertical: VerticalAlign::Center,
        },
    })])
}

fn text_line(text: &str, color: String, weight: FontWeight) -> Item {
    Item::Text(TextItem {
        view: View::default(),
        text: text.to_string(),
        max_text_lines: 0,
        text_style: TextStyle {
            size: Some(FONT_SIZE),
            color: Some(color),
            weight,
        },
        align: Align::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body = error_body("Title", Some("Sub"), &Theme::default(), Appearance::Light);
        let Item::Box(container) = &body.items[0] else {
            panic!("expected box");
        };
        assert_eq!(container.items.len(), 2);
        assert_eq!(container.items[0].as_text().unwrap().text, "Title");
        assert_eq!(
            container.view.view_style.background_color.as_deref(),
            Some("#eeeeee")
        );
    }

    #[test]
    fn test_error_body_without_subtitle() {
        let body = error_body("Only", None, &Theme::default(), Appearance::Dark);
        let Item::Box(container) = &body.items[0] else {
            panic!("expected box");
        };
        assert_eq!(container.items.len(), 1);
        assert_eq!(
            container.items[0].as_text().unwrap().text_style.color.as_deref(),
            Some("#e0e0e0")
        );
    }

    #[test]
    fn test_downloading_body_height() {
        let body = downloading_body(200.0, &Theme::default(), Appearance::Light);
        let view = body.items[0].view();
        assert_eq!(view.height, SizeSpec::Fixed(200.0));
        let Item::Box(container) = &body.items[0] else {
            panic!("expected box");
        };
        let spinner = container.items[0].as_image().unwrap();
        assert_eq!(spinner.image_url, SPINNER_IMAGE_URL);
    }
}
