//! SVG preview output
//!
//! The style block lists every theme token and is skipped when comparing
//! whole documents.

use message_template::renderer::svg::escape_xml;
use message_template::{render, render_with_config, Appearance, RenderConfig, SvgConfig, Theme};

fn without_style(svg: &str) -> String {
    let mut out = Vec::new();
    let mut in_style = false;
    for line in svg.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("<style>") {
            in_style = true;
            continue;
        }
        if trimmed.starts_with("</style>") {
            in_style = false;
            continue;
        }
        if !in_style {
            out.push(line);
        }
    }
    out.join("\n")
}

#[test]
fn test_box_document() {
    let svg = render(
        r##"{"version":1,"body":{"items":[{"type":"box",
            "width":{"type":"fixed","value":40},"height":{"type":"fixed","value":20},
            "viewStyle":{"backgroundColor":"#ff0000","radius":4}}]}}"##,
    )
    .unwrap();

    insta::assert_snapshot!(without_style(&svg), @r##"
<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="280" height="20" viewBox="0 0 280 20">
  <g id="body" class="mt-root">
    <g id="body.items[0]" class="mt-box">
      <rect class="mt-rect mt-frame" x="0" y="0" width="40" height="20" rx="4" fill="#ff0000"/>
    </g>
  </g>
</svg>
"##);
}

#[test]
fn test_escape_xml() {
    insta::assert_snapshot!(escape_xml(r#"<b class="x">Tom & 'Jerry'</b>"#), @"&lt;b class=&quot;x&quot;&gt;Tom &amp; &apos;Jerry&apos;&lt;/b&gt;");
}

#[test]
fn test_wrapped_text_draws_one_element_per_line() {
    let svg = render(
        r#"{"version":1,"body":{"items":[{"type":"text",
            "text":"the quick brown fox jumps over the lazy dog and keeps on running far away"}]}}"#,
    )
    .unwrap();
    assert!(svg.matches("<text ").count() >= 2);
}

#[test]
fn test_dark_appearance_uses_dark_text_color() {
    let config = RenderConfig::new().with_appearance(Appearance::Dark);
    let svg = render_with_config(
        r#"{"version":1,"body":{"items":[{"type":"text","text":"night"}]}}"#,
        &config,
    )
    .unwrap();
    let dark = Theme::default().color("text-default", Appearance::Dark);
    assert!(svg.contains(&format!(r#"fill="{dark}""#)));
}

#[test]
fn test_hidden_items_are_not_drawn() {
    let svg = render(
        r#"{"version":1,"body":{"items":[{"type":"box","layout":"row","width":{"type":"flex","value":0},
            "items":[{"type":"box","width":{"type":"fixed","value":100}},
                     {"type":"text","text":"xxxxxxxxxxxxxxxxxxxxxxxxx","width":{"type":"flex","value":0}},
                     {"type":"text","text":"tail"}]}]}}"#,
    )
    .unwrap();
    assert!(!svg.contains(">tail<"));
}

#[test]
fn test_carousel_is_clipped_and_scrolled() {
    let svg = render_with_config(
        r#"{"version":1,"body":{"items":[{"type":"carouselView","items":[
            {"version":1,"body":{"items":[{"type":"text","text":"first page"}]}},
            {"version":1,"body":{"items":[{"type":"text","text":"second page"}]}}]}]}}"#,
        &RenderConfig::new().with_svg(SvgConfig::new().compact()),
    )
    .unwrap();
    assert!(svg.contains("<clipPath"));
    assert!(svg.contains("first page"));
    // the second page starts at 250, inside the 280 wide viewport
    assert!(svg.contains("second page"));
    assert!(svg.contains(r#"transform="translate(250 0)""#));
}
