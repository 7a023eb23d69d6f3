//! Core types for the layout engine

use std::sync::Arc;

use serde::Serialize;

use crate::images::RasterImage;
use crate::parser::ast::{Action, ContentMode, FontWeight, HorizontalAlign, Insets, Layout};

/// Index of an item inside one rendered template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// A 2D point in the coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in root coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a zero-sized rectangle at the origin
    pub fn zero() -> Self {
        Self::default()
    }

    /// Right edge x-coordinate
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point of the rectangle
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Shrink by `insets` on every side
    pub fn inset(&self, insets: &Insets) -> Rect {
        Rect::new(
            self.x + insets.left,
            self.y + insets.top,
            (self.width - insets.horizontal()).max(0.0),
            (self.height - insets.vertical()).max(0.0),
        )
    }
}

/// Stable identity of one rendered message template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct TemplateIdentity {
    pub message_id: String,
    pub revision: u64,
}

impl TemplateIdentity {
    pub fn new(message_id: impl Into<String>, revision: u64) -> Self {
        Self {
            message_id: message_id.into(),
            revision,
        }
    }
}

/// Result of laying out one template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutTree {
    pub width: f64,
    pub height: f64,
    pub root: LayoutNode,
}

impl LayoutTree {
    /// Depth-first search by node id
    pub fn find(&self, id: NodeId) -> Option<&LayoutNode> {
        self.root.find(id)
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut LayoutNode> {
        self.root.find_mut(id)
    }

    /// First node at `path`, e.g. `body.items[0]`
    pub fn find_path(&self, path: &str) -> Option<&LayoutNode> {
        self.nodes().into_iter().find(|node| node.path == path)
    }

    /// Every node in depth-first order
    pub fn nodes(&self) -> Vec<&LayoutNode> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }
}

/// A positioned item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub id: NodeId,
    /// Dotted path of the item, e.g. `body.items[0].items[1]`
    pub path: String,
    pub kind: NodeKind,
    /// Outer frame, margins excluded
    pub frame: Rect,
    /// Frame inset by padding
    pub content: Rect,
    pub style: NodeStyle,
    pub action: Option<Action>,
    /// Suppressed by an overflow rule; not drawn
    pub hidden: bool,
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    pub fn find(&self, id: NodeId) -> Option<&LayoutNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut LayoutNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a LayoutNode>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// Visual attributes carried over from `viewStyle`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NodeStyle {
    pub background_color: Option<String>,
    pub background_image_url: Option<String>,
    pub border_width: f64,
    pub border_color: Option<String>,
    /// Radius after clamping to the fixed sides
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    /// The synthetic column holding the body items
    Root,
    Box { layout: Layout },
    Text(TextContent),
    Image(ImageContent),
    Carousel(CarouselContent),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    pub text: String,
    /// Lines as wrapped for the final width
    pub lines: Vec<String>,
    pub font_size: f64,
    pub weight: FontWeight,
    pub color: Option<String>,
    pub align: HorizontalAlign,
    pub max_lines: u32,
    pub is_button: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageContent {
    pub url: String,
    pub content_mode: ContentMode,
    pub tint_color: Option<String>,
    pub is_button: bool,
    /// Pixel size of the loaded bitmap
    pub loaded_size: Option<(u32, u32)>,
    #[serde(skip)]
    pub bitmap: Option<Arc<RasterImage>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarouselContent {
    pub spacing: f64,
    pub scroll_offset: f64,
    pub pages: Vec<CarouselPage>,
}

/// One independently laid out template inside a carousel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarouselPage {
    /// Horizontal offset inside the scroll content
    pub offset: f64,
    /// `None` when the page template could not be rendered
    pub tree: Option<LayoutTree>,
}

/// How an image slot is reached from the top-level renderer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageRoute {
    /// `(carousel node, page index)` hops from the top level down
    pub carousels: Vec<(NodeId, usize)>,
    pub node: NodeId,
}

impl ImageRoute {
    pub fn local(node: NodeId) -> Self {
        Self {
            carousels: Vec::new(),
            node,
        }
    }

    /// The same route seen from one carousel level up
    pub fn nested(mut self, carousel: NodeId, page: usize) -> Self {
        self.carousels.insert(0, (carousel, page));
        self
    }
}

/// An image the host should load for the current render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRequest {
    pub identity: TemplateIdentity,
    pub route: ImageRoute,
    pub url: String,
}
