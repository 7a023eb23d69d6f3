//! Output options for the SVG preview

/// How the preview document is written
#[derive(Debug, Clone)]
pub struct SvgConfig {
    /// Blank margin added on every side of the layout
    pub padding: f64,

    /// Emit `<?xml ...?>` before the root element
    pub xml_declaration: bool,

    /// Spaces per nesting level; `None` writes everything on one line
    pub indent: Option<usize>,

    /// Prepended to every CSS class, e.g. `mt-` gives `mt-box`
    pub class_prefix: String,

    /// Inline loaded bitmaps as base64 PNG data URLs instead of linking them
    pub embed_images: bool,

    /// Outline every frame, hidden ones included
    pub debug_frames: bool,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            padding: 0.0,
            xml_declaration: true,
            indent: Some(2),
            class_prefix: "mt-".to_string(),
            embed_images: true,
            debug_frames: false,
        }
    }
}

impl SvgConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding.max(0.0);
        self
    }

    pub fn with_xml_declaration(mut self, emit: bool) -> Self {
        self.xml_declaration = emit;
        self
    }

    pub fn with_indent(mut self, spaces: usize) -> Self {
        self.indent = Some(spaces);
        self
    }

    /// Single-line output, for embedding
    pub fn compact(mut self) -> Self {
        self.indent = None;
        self
    }

    /// Use `prefix` for CSS classes; an empty prefix leaves names bare
    pub fn with_class_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.class_prefix = prefix.into();
        self
    }

    pub fn with_embed_images(mut self, embed: bool) -> Self {
        self.embed_images = embed;
        self
    }

    pub fn with_debug_frames(mut self, debug: bool) -> Self {
        self.debug_frames = debug;
        self
    }
}
