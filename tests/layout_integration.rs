//! End-to-end layout tests: template JSON in, positioned tree out

use message_template::layout::{
    compute, LayoutConfig, LayoutNode, LayoutTree, NodeKind, Renderer, TemplateIdentity,
};
use message_template::parse_str;
use pretty_assertions::assert_eq;

fn layout(items: &str) -> LayoutTree {
    let source = format!(r#"{{"version":1,"body":{{"items":{items}}}}}"#);
    let template = parse_str(&source).expect("template should parse");
    compute(&template, &LayoutConfig::default()).expect("template should lay out")
}

fn node<'a>(tree: &'a LayoutTree, path: &str) -> &'a LayoutNode {
    tree.find_path(path)
        .unwrap_or_else(|| panic!("no node at {path}"))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.01
}

#[test]
fn test_hello_text_hugs_its_content() {
    let tree = layout(r#"[{"type":"text","text":"Hello","width":{"type":"flex","value":1}}]"#);
    let text = node(&tree, "body.items[0]");

    assert!(approx(text.frame.x, 0.0));
    assert!(approx(text.frame.y, 0.0));
    assert!(approx(text.frame.width, 42.0), "width {}", text.frame.width);
    assert!(approx(text.frame.height, 16.8), "height {}", text.frame.height);
    assert!(approx(tree.width, 280.0));
    assert!(approx(tree.height, 16.8));

    let NodeKind::Text(content) = &text.kind else {
        panic!("expected text");
    };
    assert_eq!(content.lines, vec!["Hello".to_string()]);
}

#[test]
fn test_corner_radius_is_clamped_to_fixed_sides() {
    let tree = layout(
        r#"[{"type":"box","width":{"type":"fixed","value":40},"height":{"type":"fixed","value":20},
             "viewStyle":{"radius":30}},
            {"type":"box","width":{"type":"fixed","value":40},"height":{"type":"fixed","value":20},
             "viewStyle":{"radius":4}}]"#,
    );
    assert_eq!(node(&tree, "body.items[0]").style.radius, 10.0);
    assert_eq!(node(&tree, "body.items[1]").style.radius, 4.0);
}

#[test]
fn test_row_centers_children_horizontally() {
    let tree = layout(
        r#"[{"type":"box","layout":"row","width":{"type":"fixed","value":200},
             "align":{"horizontal":"center"},
             "items":[{"type":"text","text":"ab","width":{"type":"flex","value":1}}]}]"#,
    );
    let text = node(&tree, "body.items[0].items[0]");
    // (200 - 2 * 8.4) / 2
    assert!(approx(text.frame.x, 91.6), "x {}", text.frame.x);
}

#[test]
fn test_column_aligns_children_to_bottom() {
    let tree = layout(
        r#"[{"type":"box","layout":"column","height":{"type":"fixed","value":100},
             "align":{"vertical":"bottom"},
             "items":[{"type":"text","text":"ab","width":{"type":"flex","value":1}}]}]"#,
    );
    let text = node(&tree, "body.items[0].items[0]");
    assert!(approx(text.frame.bottom(), 100.0), "bottom {}", text.frame.bottom());
}

#[test]
fn test_fill_children_share_width_equally() {
    let tree = layout(
        r#"[{"type":"box","layout":"row","width":{"type":"fixed","value":200},
             "items":[{"type":"box","width":{"type":"flex","value":0}},
                      {"type":"box","width":{"type":"flex","value":0}}]}]"#,
    );
    let first = node(&tree, "body.items[0].items[0]");
    let second = node(&tree, "body.items[0].items[1]");

    assert!(approx(first.frame.width, 100.0), "first {}", first.frame.width);
    assert!(approx(second.frame.width, 100.0), "second {}", second.frame.width);
    assert!(approx(second.frame.x, 100.0));
}

#[test]
fn test_overflowing_text_hides_siblings() {
    let tree = layout(
        r#"[{"type":"box","layout":"row","width":{"type":"flex","value":0},
             "items":[{"type":"box","width":{"type":"flex","value":0}},
                      {"type":"box","width":{"type":"fixed","value":100}},
                      {"type":"text","text":"xxxxxxxxxxxxxxxxxxxxxxxxx","width":{"type":"flex","value":0}},
                      {"type":"text","text":"tail"}]}]"#,
    );
    let hidden: Vec<bool> = node(&tree, "body.items[0]")
        .children
        .iter()
        .map(|child| child.hidden)
        .collect();
    assert_eq!(hidden, vec![true, false, false, true]);

    let visible = node(&tree, "body.items[0].items[2]");
    assert!(visible.frame.right() <= 280.0 + 0.01);
}

#[test]
fn test_margins_do_not_count_toward_frames() {
    let tree = layout(
        r#"[{"type":"box","width":{"type":"fixed","value":50},"height":{"type":"fixed","value":10},
             "viewStyle":{"margin":{"top":5,"left":7}}}]"#,
    );
    let item = node(&tree, "body.items[0]");
    assert!(approx(item.frame.x, 7.0));
    assert!(approx(item.frame.y, 5.0));
    assert!(approx(item.frame.width, 50.0));
    assert!(approx(tree.height, 15.0));
}

#[test]
fn test_render_same_template_is_stable() {
    let source = r#"{"version":1,"body":{"items":[
        {"type":"box","layout":"row","items":[{"type":"text","text":"left"},{"type":"text","text":"right"}]}]}}"#;
    let template = parse_str(source).unwrap();
    let mut renderer = Renderer::default();

    let first = renderer
        .render(TemplateIdentity::new("m", 1), &template)
        .unwrap()
        .clone();
    let second = renderer
        .render(TemplateIdentity::new("m", 1), &template)
        .unwrap()
        .clone();
    assert_eq!(first, second);
}

#[test]
fn test_carousel_reuses_pages_and_keeps_scroll_offset() {
    let source = r#"{"version":1,"body":{"items":[{"type":"carouselView","items":[
        {"version":1,"body":{"items":[{"type":"text","text":"page one"}]}},
        {"version":1,"body":{"items":[{"type":"text","text":"page two"}]}}]}]}}"#;
    let template = parse_str(source).unwrap();
    let identity = TemplateIdentity::new("m", 1);
    let mut renderer = Renderer::default();

    let tree = renderer.render(identity.clone(), &template).unwrap();
    let carousel_id = tree.find_path("body.items[0]").unwrap().id;
    let NodeKind::Carousel(content) = &tree.find(carousel_id).unwrap().kind else {
        panic!("expected carousel");
    };
    assert_eq!(content.pages.len(), 2);
    // default spacing of 10 between 240 wide pages
    assert!(approx(content.pages[1].offset, 250.0), "offset {}", content.pages[1].offset);
    assert_eq!(renderer.carousel_build_count(), 1);

    assert!(renderer.set_carousel_scroll_offset(carousel_id, 120.0));
    renderer.render(identity, &template).unwrap();

    assert_eq!(renderer.carousel_build_count(), 1);
    assert_eq!(renderer.carousel_scroll_offset(carousel_id), Some(120.0));

    renderer
        .render(TemplateIdentity::new("other", 1), &template)
        .unwrap();
    assert_eq!(renderer.carousel_build_count(), 2);
    assert_eq!(renderer.carousel_scroll_offset(carousel_id), Some(0.0));
}
