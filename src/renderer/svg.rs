//! SVG generation from layout trees

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::layout::{
    CarouselContent, ImageContent, LayoutNode, LayoutTree, NodeKind, Rect, TextContent,
};
use crate::parser::ast::{ContentMode, FontWeight, HorizontalAlign};
use crate::template::binder::Appearance;
use crate::template::fallback::SPINNER_IMAGE_URL;
use crate::theme::Theme;

use super::SvgConfig;

/// Build SVG elements incrementally
pub struct SvgBuilder {
    config: SvgConfig,
    defs: Vec<String>,
    styles: Vec<String>,
    elements: Vec<String>,
    depth: usize,
    clip_count: usize,
    tint_filters: HashMap<String, String>,
}

impl SvgBuilder {
    /// Create a new SVG builder
    pub fn new(config: SvgConfig) -> Self {
        Self {
            config,
            defs: vec![],
            styles: vec![],
            elements: vec![],
            depth: 1,
            clip_count: 0,
            tint_filters: HashMap::new(),
        }
    }

    /// Add CSS custom properties for every theme token
    pub fn add_palette(&mut self, theme: &Theme, appearance: Appearance) {
        let mut tokens: Vec<&String> = theme.colors.keys().collect();
        tokens.sort();
        let nl = self.newline().to_string();
        let mut css = format!(":root {{{nl}");
        for token in tokens {
            css.push_str(&format!("  --{}: {};{}", token, theme.color(token, appearance), nl));
        }
        css.push_str(&format!("}}{nl}"));
        let prefix = self.prefix();
        css.push_str(&format!(
            ".{prefix}text {{ font-family: -apple-system, sans-serif; }}"
        ));
        self.styles.push(css);
    }

    fn prefix(&self) -> String {
        self.config.class_prefix.clone()
    }

    fn indent_str(&self) -> String {
        match self.config.indent {
            Some(spaces) => " ".repeat(spaces * self.depth),
            None => String::new(),
        }
    }

    fn newline(&self) -> &str {
        if self.config.indent.is_some() {
            "\n"
        } else {
            ""
        }
    }

    fn class_list(&self, kind: &str, classes: &[String]) -> String {
        let prefix = self.prefix();
        std::iter::once(format!("{}{}", prefix, kind))
            .chain(classes.iter().map(|c| format!("{}{}", prefix, c)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Add a rectangle element, `radius` already clamped
    pub fn add_rect(
        &mut self,
        id: Option<&str>,
        rect: &Rect,
        radius: f64,
        classes: &[String],
        styles: &str,
    ) {
        let id_attr = id.map(|i| format!(r#" id="{}""#, escape_xml(i))).unwrap_or_default();
        let radius_attr = if radius > 0.0 {
            format!(r#" rx="{}""#, radius)
        } else {
            String::new()
        };
        self.elements.push(format!(
            r#"{}<rect{} class="{}" x="{}" y="{}" width="{}" height="{}"{}{}/>"#,
            self.indent_str(),
            id_attr,
            self.class_list("rect", classes),
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            radius_attr,
            styles
        ));
    }

    /// Add one line of text
    pub fn add_text_line(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        anchor: &str,
        classes: &[String],
        styles: &str,
    ) {
        self.elements.push(format!(
            r#"{}<text class="{}" x="{}" y="{}" text-anchor="{}" dominant-baseline="middle"{}>{}</text>"#,
            self.indent_str(),
            self.class_list("text", classes),
            x,
            y,
            anchor,
            styles,
            escape_xml(text)
        ));
    }

    /// Add an image element pointing at `href`
    pub fn add_image(
        &mut self,
        id: Option<&str>,
        rect: &Rect,
        href: &str,
        aspect: &str,
        classes: &[String],
        styles: &str,
    ) {
        let id_attr = id.map(|i| format!(r#" id="{}""#, escape_xml(i))).unwrap_or_default();
        self.elements.push(format!(
            r#"{}<image{} class="{}" x="{}" y="{}" width="{}" height="{}" href="{}" preserveAspectRatio="{}"{}/>"#,
            self.indent_str(),
            id_attr,
            self.class_list("image", classes),
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            escape_xml(href),
            aspect,
            styles
        ));
    }

    /// Add the built-in loading spinner centered in `rect`
    pub fn add_spinner(&mut self, rect: &Rect, color: &str) {
        let center = rect.center();
        let r = (rect.width.min(rect.height) / 2.0 - 2.0).max(1.0);
        let circumference = 2.0 * std::f64::consts::PI * r;
        self.elements.push(format!(
            r#"{}<circle class="{}" cx="{}" cy="{}" r="{}" fill="none" stroke="{}" stroke-width="2" stroke-dasharray="{} {}"/>"#,
            self.indent_str(),
            self.class_list("spinner", &[]),
            center.x,
            center.y,
            r,
            escape_xml(color),
            circumference * 0.75,
            circumference * 0.25
        ));
    }

    /// Register a clip rectangle and return its id
    pub fn add_clip_rect(&mut self, rect: &Rect, radius: f64) -> String {
        self.clip_count += 1;
        let id = format!("{}clip-{}", self.prefix(), self.clip_count);
        self.defs.push(format!(
            r#"<clipPath id="{}"><rect x="{}" y="{}" width="{}" height="{}" rx="{}"/></clipPath>"#,
            id, rect.x, rect.y, rect.width, rect.height, radius
        ));
        id
    }

    /// Filter id that paints an image's opaque pixels with `color`
    pub fn tint_filter(&mut self, color: &str) -> String {
        if let Some(id) = self.tint_filters.get(color) {
            return id.clone();
        }
        let id = format!("{}tint-{}", self.prefix(), self.tint_filters.len() + 1);
        self.defs.push(format!(
            r#"<filter id="{}"><feFlood flood-color="{}"/><feComposite in2="SourceAlpha" operator="in"/></filter>"#,
            id,
            escape_xml(color)
        ));
        self.tint_filters.insert(color.to_string(), id.clone());
        id
    }

    /// Open a group element with optional ID, classes and extra attributes
    pub fn start_group(&mut self, id: Option<&str>, classes: &[String], attrs: &str) {
        let id_attr = id.map(|i| format!(r#" id="{}""#, escape_xml(i))).unwrap_or_default();
        let class_attr = if classes.is_empty() {
            String::new()
        } else {
            let prefix = self.prefix();
            let list = classes
                .iter()
                .map(|c| format!("{}{}", prefix, c))
                .collect::<Vec<_>>()
                .join(" ");
            format!(r#" class="{}""#, list)
        };

        self.elements.push(format!(
            "{}<g{}{}{}>",
            self.indent_str(),
            id_attr,
            class_attr,
            attrs
        ));
        self.depth += 1;
    }

    /// Close a group element
    pub fn end_group(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.elements.push(format!("{}</g>", self.indent_str()));
    }

    /// Build the final SVG string
    pub fn build(self, width: f64, height: f64) -> String {
        let padding = self.config.padding;
        let origin = if padding == 0.0 { 0.0 } else { -padding };
        let (w, h) = (width + 2.0 * padding, height + 2.0 * padding);
        let nl = self.newline();
        let pad = self.config.indent.map(|n| " ".repeat(n)).unwrap_or_default();

        let mut lines = Vec::new();
        if self.config.xml_declaration {
            lines.push(r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string());
        }
        lines.push(format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="{origin} {origin} {w} {h}">"#
        ));
        for (tag, entries) in [("style", &self.styles), ("defs", &self.defs)] {
            if entries.is_empty() {
                continue;
            }
            lines.push(format!("{pad}<{tag}>"));
            lines.extend(entries.iter().map(|entry| format!("{pad}{pad}{entry}")));
            lines.push(format!("{pad}</{tag}>"));
        }
        lines.extend(self.elements.iter().cloned());
        lines.push("</svg>".to_string());

        lines.join(nl)
    }
}

/// Colors the drawing falls back to when an item sets none
struct Palette {
    text: String,
    placeholder: String,
}

/// Render a layout tree to an SVG string with the default theme
pub fn render_svg(tree: &LayoutTree, config: &SvgConfig) -> String {
    render_svg_with_theme(tree, config, &Theme::default(), Appearance::Light)
}

/// Render a layout tree to an SVG string, resolving default colors from `theme`
pub fn render_svg_with_theme(
    tree: &LayoutTree,
    config: &SvgConfig,
    theme: &Theme,
    appearance: Appearance,
) -> String {
    let mut builder = SvgBuilder::new(config.clone());
    builder.add_palette(theme, appearance);

    let palette = Palette {
        text: theme.color("text-default", appearance),
        placeholder: theme.color("downloading-background", appearance),
    };

    render_node(&tree.root, &mut builder, &palette);

    builder.build(tree.width, tree.height)
}

fn render_node(node: &LayoutNode, builder: &mut SvgBuilder, palette: &Palette) {
    if builder.config.debug_frames {
        let class = if node.hidden { "debug-hidden" } else { "debug" };
        builder.add_rect(
            None,
            &node.frame,
            0.0,
            &[class.to_string()],
            r##" fill="none" stroke="#ff00ff" stroke-width="0.5""##,
        );
    }
    if node.hidden {
        return;
    }

    let mut classes = vec![kind_class(&node.kind).to_string()];
    if node.action.is_some() {
        classes.push("action".to_string());
    }
    builder.start_group(Some(&node.path), &classes, "");

    render_background(node, builder);

    match &node.kind {
        NodeKind::Root | NodeKind::Box { .. } => {}
        NodeKind::Text(text) => render_text(node, text, builder, palette),
        NodeKind::Image(image) => render_image(node, image, builder, palette),
        NodeKind::Carousel(carousel) => render_carousel(node, carousel, builder, palette),
    }

    for child in &node.children {
        render_node(child, builder, palette);
    }

    builder.end_group();
}

fn kind_class(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Root => "root",
        NodeKind::Box { .. } => "box",
        NodeKind::Text(_) => "text-item",
        NodeKind::Image(_) => "image-item",
        NodeKind::Carousel(_) => "carousel",
    }
}

fn render_background(node: &LayoutNode, builder: &mut SvgBuilder) {
    let style = &node.style;
    if style.background_color.is_none() && style.border_width <= 0.0 && style.background_image_url.is_none() {
        return;
    }

    if let Some(url) = &style.background_image_url {
        let clip = builder.add_clip_rect(&node.frame, style.radius);
        builder.add_image(
            None,
            &node.frame,
            url,
            "xMidYMid slice",
            &["background".to_string()],
            &format!(r#" clip-path="url(#{})""#, clip),
        );
    }

    let fill = match (&style.background_color, &style.background_image_url) {
        (Some(color), _) => format!(r#" fill="{}""#, escape_xml(color)),
        _ => r#" fill="none""#.to_string(),
    };
    let stroke = match (&style.border_color, style.border_width > 0.0) {
        (Some(color), true) => format!(
            r#" stroke="{}" stroke-width="{}""#,
            escape_xml(color),
            style.border_width
        ),
        _ => String::new(),
    };
    if style.background_color.is_some() || !stroke.is_empty() {
        builder.add_rect(
            None,
            &node.frame,
            style.radius,
            &["frame".to_string()],
            &format!("{}{}", fill, stroke),
        );
    }
}

fn render_text(node: &LayoutNode, text: &TextContent, builder: &mut SvgBuilder, palette: &Palette) {
    if text.lines.is_empty() {
        return;
    }
    let content = &node.content;
    let line_height = content.height / text.lines.len() as f64;
    let (x, anchor) = match text.align {
        HorizontalAlign::Left => (content.x, "start"),
        HorizontalAlign::Center => (content.center().x, "middle"),
        HorizontalAlign::Right => (content.right(), "end"),
    };
    let color = text.color.as_deref().unwrap_or(&palette.text);
    let mut styles = format!(
        r#" fill="{}" font-size="{}""#,
        escape_xml(color),
        text.font_size
    );
    if text.weight == FontWeight::Bold {
        styles.push_str(r#" font-weight="bold""#);
    }
    let mut classes = Vec::new();
    if text.is_button {
        classes.push("button".to_string());
    }
    for (i, line) in text.lines.iter().enumerate() {
        let y = content.y + line_height * (i as f64 + 0.5);
        builder.add_text_line(line, x, y, anchor, &classes, &styles);
    }
}

fn render_image(
    node: &LayoutNode,
    image: &ImageContent,
    builder: &mut SvgBuilder,
    palette: &Palette,
) {
    let content = &node.content;
    if image.url == SPINNER_IMAGE_URL {
        let color = image.tint_color.as_deref().unwrap_or(&palette.text).to_string();
        builder.add_spinner(content, &color);
        return;
    }

    let href = match (&image.bitmap, builder.config.embed_images) {
        (Some(bitmap), true) => match bitmap.to_png() {
            Ok(png) => format!("data:image/png;base64,{}", STANDARD.encode(png)),
            Err(e) => {
                debug!(url = %image.url, error = %e, "falling back to linked image");
                image.url.clone()
            }
        },
        _ => image.url.clone(),
    };

    if image.bitmap.is_none() {
        builder.add_rect(
            None,
            content,
            node.style.radius,
            &["image-placeholder".to_string()],
            &format!(r#" fill="{}""#, escape_xml(&palette.placeholder)),
        );
    }

    let aspect = match image.content_mode {
        ContentMode::AspectFit => "xMidYMid meet",
        ContentMode::AspectFill => "xMidYMid slice",
        ContentMode::ScalesToFill => "none",
    };
    let clip = builder.add_clip_rect(content, node.style.radius);
    let mut styles = format!(r#" clip-path="url(#{})""#, clip);
    if let Some(tint) = &image.tint_color {
        let filter = builder.tint_filter(tint);
        styles.push_str(&format!(r#" filter="url(#{})""#, filter));
    }
    let mut classes = Vec::new();
    if image.is_button {
        classes.push("button".to_string());
    }
    builder.add_image(None, content, &href, aspect, &classes, &styles);
}

fn render_carousel(
    node: &LayoutNode,
    carousel: &CarouselContent,
    builder: &mut SvgBuilder,
    palette: &Palette,
) {
    let content = node.content;
    let clip = builder.add_clip_rect(&content, 0.0);
    builder.start_group(None, &[], &format!(r#" clip-path="url(#{})""#, clip));
    for page in &carousel.pages {
        let Some(tree) = &page.tree else {
            continue;
        };
        let dx = content.x + page.offset - carousel.scroll_offset;
        if dx + tree.width < content.x || dx > content.right() {
            continue;
        }
        builder.start_group(
            None,
            &["page".to_string()],
            &format!(r#" transform="translate({} {})""#, dx, content.y),
        );
        render_node(&tree.root, builder, palette);
        builder.end_group();
    }
    builder.end_group();
}

/// Escape special XML characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
