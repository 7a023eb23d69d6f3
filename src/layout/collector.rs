//! Compiles a template body into layout constraints
//!
//! The walk is top-down with one linear pass per sibling list: every child is
//! placed relative to the previous one, between two side markers that carry
//! the box's alignment. Rules that depend on the whole sibling list (forced
//! single-line text, overflow hiding, loosened trailing pins) are decided from
//! size estimates before any child is compiled, so there is no backtracking.

use std::sync::Arc;

use crate::images::{resolve_image, ConstraintPolicy, ImageSizeCache, RasterImage};
use crate::parser::ast::*;

use super::carousel::{CarouselCache, CarouselKey};
use super::config::LayoutConfig;
use super::engine::Renderer;
use super::solver::{
    ConstraintHandle, ConstraintSolver, Frame, LayoutConstraint, LayoutProperty, LayoutVariable,
    Priority, SolverError,
};
use super::text::{Font, TextMeasurer};
use super::types::{NodeId, TemplateIdentity};

/// Slack allowed before an estimate counts as overflowing
const OVERFLOW_TOLERANCE: f64 = 0.5;

/// Extra width granted when wrapping text into a solved width, so rounding in
/// the solver never pushes the last word onto a new line
pub(super) const WRAP_TOLERANCE: f64 = 0.01;

// ============================================================================
// Records
// ============================================================================

/// Everything the engine keeps about one compiled item
pub(super) struct NodeRecord {
    pub id: NodeId,
    pub path: String,
    pub view: View,
    /// Suppressed by an overflow rule; has no constraints
    pub hidden: bool,
    pub children: Vec<NodeId>,
    /// `outer.right = content.right + padding.right`, kept to be loosened
    pub right_pin: Option<ConstraintHandle>,
    pub slot: Slot,
}

pub(super) enum Slot {
    Root,
    Box { layout: Layout },
    Text(TextSlot),
    Image(ImageSlot),
    Carousel(CarouselSlot),
}

pub(super) struct TextSlot {
    pub text: String,
    pub font: Font,
    pub color: Option<String>,
    pub align: HorizontalAlign,
    /// Effective limit, `0` for unlimited
    pub max_lines: u32,
    pub is_button: bool,
    pub height: Option<ConstraintHandle>,
    pub measured_height: f64,
    pub lines: Vec<String>,
}

pub(super) struct ImageSlot {
    pub url: String,
    pub style: ImageStyle,
    pub meta: Option<MetaData>,
    pub is_button: bool,
    pub handles: Vec<ConstraintHandle>,
    pub bitmap: Option<Arc<RasterImage>>,
    pub loaded_size: Option<(u32, u32)>,
}

pub(super) struct CarouselSlot {
    pub key: CarouselKey,
    pub spacing: f64,
    pub height: Option<ConstraintHandle>,
}

// ============================================================================
// Axes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    fn main(layout: Layout) -> Self {
        match layout {
            Layout::Row => Axis::Horizontal,
            Layout::Column => Axis::Vertical,
        }
    }

    fn cross(self) -> Self {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }

    fn start(self) -> LayoutProperty {
        match self {
            Axis::Horizontal => LayoutProperty::Left,
            Axis::Vertical => LayoutProperty::Top,
        }
    }

    fn size(self) -> LayoutProperty {
        match self {
            Axis::Horizontal => LayoutProperty::Width,
            Axis::Vertical => LayoutProperty::Height,
        }
    }

    fn end(self) -> LayoutProperty {
        match self {
            Axis::Horizontal => LayoutProperty::Right,
            Axis::Vertical => LayoutProperty::Bottom,
        }
    }

    fn center(self) -> LayoutProperty {
        match self {
            Axis::Horizontal => LayoutProperty::CenterX,
            Axis::Vertical => LayoutProperty::CenterY,
        }
    }

    /// `(leading, trailing)` insets along this axis
    fn insets(self, insets: &Insets) -> (f64, f64) {
        match self {
            Axis::Horizontal => (insets.left, insets.right),
            Axis::Vertical => (insets.top, insets.bottom),
        }
    }

    fn spec(self, view: &View) -> SizeSpec {
        match self {
            Axis::Horizontal => view.width,
            Axis::Vertical => view.height,
        }
    }

    fn alignment(self, align: Align) -> AxisAlign {
        match self {
            Axis::Horizontal => align.horizontal.into(),
            Axis::Vertical => align.vertical.into(),
        }
    }

    fn pick(self, (width, height): (f64, f64)) -> f64 {
        match self {
            Axis::Horizontal => width,
            Axis::Vertical => height,
        }
    }
}

fn var(frame: Frame, property: LayoutProperty) -> LayoutVariable {
    LayoutVariable::new(frame, property)
}

// ============================================================================
// Shared constraint builders
// ============================================================================

/// Content width an item lays its own content into
fn inner_width(view: &View, available: f64) -> f64 {
    let padding = view.view_style.padding.horizontal();
    match view.width {
        SizeSpec::Fixed(width) => (width - padding).max(0.0),
        SizeSpec::Flex(_) => (available - padding).max(0.0),
    }
}

pub(super) fn right_pin_constraint(id: NodeId, padding_right: f64, priority: Priority) -> LayoutConstraint {
    LayoutConstraint::Equal {
        left: var(Frame::Outer(id), LayoutProperty::Right),
        right: var(Frame::Content(id), LayoutProperty::Right),
        offset: padding_right,
        priority,
    }
}

pub(super) fn text_height_constraint(id: NodeId, view: &View, height: f64) -> LayoutConstraint {
    LayoutConstraint::Fixed {
        variable: var(Frame::Content(id), LayoutProperty::Height),
        value: height,
        priority: if view.height.is_wrap() {
            Priority::High
        } else {
            Priority::Low
        },
    }
}

pub(super) fn carousel_height_constraint(id: NodeId, height: f64) -> LayoutConstraint {
    LayoutConstraint::Fixed {
        variable: var(Frame::Content(id), LayoutProperty::Height),
        value: height,
        priority: Priority::High,
    }
}

/// Size hint for an image: the real bitmap size when one was seen, else the
/// template's metadata
pub(super) fn known_image_size(slot: &ImageSlot, sizes: &ImageSizeCache) -> Option<MetaData> {
    sizes
        .get(&slot.url)
        .map(|(pixel_width, pixel_height)| MetaData {
            pixel_width,
            pixel_height,
        })
        .or(slot.meta)
        .filter(|meta| meta.ratio().is_some())
}

/// Sizing constraints of an image slot, from its policy and size hint
pub(super) fn image_constraints(
    solver: &mut ConstraintSolver,
    id: NodeId,
    view: &View,
    slot: &ImageSlot,
    sizes: &ImageSizeCache,
    display_scale: f64,
) -> Result<Vec<ConstraintHandle>, SolverError> {
    let content = Frame::Content(id);
    let known = known_image_size(slot, sizes);
    let mut handles = Vec::new();

    match resolve_image(&view.width, &view.height, slot.style.content_mode, known.as_ref()) {
        ConstraintPolicy::Ratio(ratio) => {
            handles.push(solver.add_constraint(LayoutConstraint::Ratio {
                target: var(content, LayoutProperty::Height),
                source: var(content, LayoutProperty::Width),
                ratio,
                priority: Priority::High,
            })?);
        }
        ConstraintPolicy::MinSize => {
            for property in [LayoutProperty::Width, LayoutProperty::Height] {
                handles.push(solver.add_constraint(LayoutConstraint::GreaterOrEqual {
                    variable: var(content, property),
                    value: 1.0,
                    priority: Priority::Low,
                })?);
            }
        }
    }

    // Intrinsic size on wrap axes, in points
    if let Some(meta) = known {
        let intrinsic = [
            (view.width, LayoutProperty::Width, meta.pixel_width),
            (view.height, LayoutProperty::Height, meta.pixel_height),
        ];
        for (spec, property, pixels) in intrinsic {
            if spec.is_wrap() {
                handles.push(solver.add_constraint(LayoutConstraint::Fixed {
                    variable: var(content, property),
                    value: f64::from(pixels) / display_scale,
                    priority: Priority::Low,
                })?);
            }
        }
    }
    Ok(handles)
}

/// Total width and tallest page of a carousel's rendered pages
pub(super) fn carousel_extent(pages: &[Renderer], spacing: f64) -> (f64, f64) {
    let widths: f64 = pages
        .iter()
        .map(|page| page.tree().map_or(0.0, |tree| tree.width))
        .sum();
    let gaps = spacing * pages.len().saturating_sub(1) as f64;
    let height = pages
        .iter()
        .filter_map(|page| page.tree().map(|tree| tree.height))
        .fold(0.0, f64::max);
    (widths + gaps, height)
}

// ============================================================================
// Sibling planning
// ============================================================================

/// Decisions about a sibling list made before its children are compiled
#[derive(Debug, Clone, PartialEq)]
struct ChildPlan {
    hidden: Vec<bool>,
    /// Every text child is limited to one line
    single_line: bool,
    /// A text child overflowed; later siblings are hidden
    overflow: bool,
    /// First child whose trailing padding pin is loosened
    loose_from: Option<usize>,
}

/// Child of a box as the main-axis chain sees it
struct ChainLink {
    id: NodeId,
    margins: (f64, f64),
    fill: bool,
}

// ============================================================================
// ConstraintCollector
// ============================================================================

/// Walks a body and feeds its constraints to a fresh solver
pub(super) struct ConstraintCollector<'a> {
    solver: ConstraintSolver,
    records: Vec<NodeRecord>,
    config: &'a LayoutConfig,
    measurer: &'a Arc<dyn TextMeasurer>,
    sizes: &'a Arc<ImageSizeCache>,
    identity: &'a TemplateIdentity,
    carousels: &'a mut CarouselCache,
}

impl<'a> ConstraintCollector<'a> {
    pub fn new(
        config: &'a LayoutConfig,
        measurer: &'a Arc<dyn TextMeasurer>,
        sizes: &'a Arc<ImageSizeCache>,
        identity: &'a TemplateIdentity,
        carousels: &'a mut CarouselCache,
    ) -> Self {
        Self {
            solver: ConstraintSolver::new(),
            records: Vec::new(),
            config,
            measurer,
            sizes,
            identity,
            carousels,
        }
    }

    /// Compile `body` under a synthetic root column of the configured width
    pub fn collect(mut self, body: &Body) -> Result<(ConstraintSolver, Vec<NodeRecord>), SolverError> {
        let root = NodeId(0);
        let view = View {
            width: SizeSpec::Fixed(self.config.max_width),
            height: SizeSpec::Flex(FlexMode::WrapContent),
            ..View::default()
        };
        self.records.push(NodeRecord {
            id: root,
            path: "body".to_string(),
            view: view.clone(),
            hidden: false,
            children: Vec::new(),
            right_pin: None,
            slot: Slot::Root,
        });

        self.fixed(var(Frame::Outer(root), LayoutProperty::Left), 0.0, Priority::Required)?;
        self.fixed(var(Frame::Outer(root), LayoutProperty::Top), 0.0, Priority::Required)?;
        self.frame_constraints(root, &view)?;
        self.collect_children(
            root,
            Layout::Column,
            Align::default(),
            &body.items,
            self.config.max_width,
            None,
            "body",
        )?;

        tracing::trace!(nodes = self.records.len(), "collected layout constraints");
        Ok((self.solver, self.records))
    }

    // ------------------------------------------------------------------------
    // Primitive helpers
    // ------------------------------------------------------------------------

    fn add(&mut self, constraint: LayoutConstraint) -> Result<ConstraintHandle, SolverError> {
        self.solver.add_constraint(constraint)
    }

    fn fixed(&mut self, variable: LayoutVariable, value: f64, priority: Priority) -> Result<ConstraintHandle, SolverError> {
        self.add(LayoutConstraint::Fixed {
            variable,
            value,
            priority,
        })
    }

    fn equal(
        &mut self,
        left: LayoutVariable,
        right: LayoutVariable,
        offset: f64,
        priority: Priority,
    ) -> Result<ConstraintHandle, SolverError> {
        self.add(LayoutConstraint::Equal {
            left,
            right,
            offset,
            priority,
        })
    }

    fn font(&self, text: &TextItem) -> Font {
        Font {
            size: text.text_style.size.unwrap_or(self.config.default_font_size),
            weight: text.text_style.weight,
        }
    }

    fn natural_width(&self, text: &TextItem) -> f64 {
        self.measurer.natural_width(&text.text, self.font(text))
    }

    fn max_lines(text: &TextItem, single_line: bool) -> u32 {
        if single_line {
            1
        } else {
            text.max_text_lines
        }
    }

    // ------------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------------

    /// Padding insets, non-negative sizes, fixed sizes and content hugging
    fn frame_constraints(&mut self, id: NodeId, view: &View) -> Result<(), SolverError> {
        let padding = view.view_style.padding;
        let outer = Frame::Outer(id);
        let content = Frame::Content(id);

        self.equal(var(content, LayoutProperty::Left), var(outer, LayoutProperty::Left), padding.left, Priority::Required)?;
        self.equal(var(content, LayoutProperty::Top), var(outer, LayoutProperty::Top), padding.top, Priority::Required)?;
        self.equal(
            var(outer, LayoutProperty::Bottom),
            var(content, LayoutProperty::Bottom),
            padding.bottom,
            Priority::Required,
        )?;
        let pin = self.add(right_pin_constraint(id, padding.right, Priority::Required))?;
        self.records[id.0].right_pin = Some(pin);

        for axis in [Axis::Horizontal, Axis::Vertical] {
            for frame in [outer, content] {
                self.add(LayoutConstraint::GreaterOrEqual {
                    variable: var(frame, axis.size()),
                    value: 0.0,
                    priority: Priority::Required,
                })?;
            }
            let (lead, trail) = axis.insets(&padding);
            match axis.spec(view) {
                SizeSpec::Fixed(value) => {
                    self.fixed(var(content, axis.size()), (value - lead - trail).max(0.0), Priority::Required)?;
                }
                SizeSpec::Flex(_) => {
                    self.fixed(var(content, axis.size()), 0.0, Priority::Fitting)?;
                }
            }
        }
        Ok(())
    }

    fn collect_item(
        &mut self,
        item: &Item,
        path: String,
        hidden: bool,
        available: f64,
        single_line: bool,
    ) -> Result<NodeId, SolverError> {
        let id = NodeId(self.records.len());
        let view = item.view().clone();
        let slot = match item {
            Item::Box(b) => Slot::Box { layout: b.layout },
            Item::Text(t) | Item::TextButton(t) => Slot::Text(TextSlot {
                text: t.text.clone(),
                font: self.font(t),
                color: t.text_style.color.clone(),
                align: t.align.horizontal,
                max_lines: Self::max_lines(t, single_line),
                is_button: matches!(item, Item::TextButton(_)),
                height: None,
                measured_height: 0.0,
                lines: Vec::new(),
            }),
            Item::Image(i) | Item::ImageButton(i) => Slot::Image(ImageSlot {
                url: i.image_url.clone(),
                style: i.image_style.clone(),
                meta: i.meta_data,
                is_button: matches!(item, Item::ImageButton(_)),
                handles: Vec::new(),
                bitmap: None,
                loaded_size: None,
            }),
            Item::Carousel(c) => Slot::Carousel(CarouselSlot {
                key: CarouselKey::new(self.identity.clone(), path.clone()),
                spacing: c.spacing,
                height: None,
            }),
        };
        self.records.push(NodeRecord {
            id,
            path: path.clone(),
            view: view.clone(),
            hidden,
            children: Vec::new(),
            right_pin: None,
            slot,
        });

        if hidden {
            if let Item::Box(b) = item {
                for (index, child) in b.items.iter().enumerate() {
                    let child_id = self.collect_item(child, format!("{path}.items[{index}]"), true, 0.0, false)?;
                    self.records[id.0].children.push(child_id);
                }
            }
            return Ok(id);
        }

        self.frame_constraints(id, &view)?;
        let inner = inner_width(&view, available);
        match item {
            Item::Box(b) => {
                let inner_height = view
                    .height
                    .fixed_value()
                    .map(|height| (height - view.view_style.padding.vertical()).max(0.0));
                self.collect_children(id, b.layout, b.align, &b.items, inner, inner_height, &path)?;
            }
            Item::Text(t) | Item::TextButton(t) => self.text_constraints(id, t, inner)?,
            Item::Image(_) | Item::ImageButton(_) => {
                let record = &self.records[id.0];
                if let Slot::Image(slot) = &record.slot {
                    let handles = image_constraints(
                        &mut self.solver,
                        id,
                        &record.view,
                        slot,
                        self.sizes,
                        self.config.display_scale,
                    )?;
                    if let Slot::Image(slot) = &mut self.records[id.0].slot {
                        slot.handles = handles;
                    }
                }
            }
            Item::Carousel(c) => self.carousel_constraints(id, c, inner)?,
        }
        Ok(id)
    }

    /// Natural width at low priority and the measured height
    fn text_constraints(&mut self, id: NodeId, text: &TextItem, inner: f64) -> Result<(), SolverError> {
        let Slot::Text(slot) = &self.records[id.0].slot else {
            return Ok(());
        };
        let (font, max_lines) = (slot.font, slot.max_lines);
        let natural = self.measurer.natural_width(&text.text, font);

        if !text.view.width.is_fixed() {
            self.fixed(var(Frame::Content(id), LayoutProperty::Width), natural, Priority::Low)?;
        }
        let width = if text.view.width.is_fixed() {
            inner
        } else {
            natural.min(inner)
        };
        let metrics = self.measurer.measure(&text.text, font, width + WRAP_TOLERANCE, max_lines);
        let height = if text.view.height.is_fixed() {
            None
        } else {
            Some(self.add(text_height_constraint(id, &text.view, metrics.height))?)
        };

        if let Slot::Text(slot) = &mut self.records[id.0].slot {
            slot.height = height;
            slot.measured_height = metrics.height;
            slot.lines = metrics.lines;
        }
        Ok(())
    }

    /// Lay out every page as its own template, then size the carousel from them
    fn carousel_constraints(&mut self, id: NodeId, carousel: &CarouselItem, inner: f64) -> Result<(), SolverError> {
        let Slot::Carousel(slot) = &self.records[id.0].slot else {
            return Ok(());
        };
        let key = slot.key.clone();
        let page_width = self.config.carousel_child_max_width.min(inner).max(0.0);
        let page_config = self.config.clone().with_max_width(page_width);
        let measurer = Arc::clone(self.measurer);
        let sizes = Arc::clone(self.sizes);

        let state = self.carousels.checkout(key.clone(), carousel.items.len(), |_| {
            Renderer::new(page_config.clone())
                .with_measurer(Arc::clone(&measurer))
                .with_size_cache(Arc::clone(&sizes))
        });
        for (index, (page, template)) in state.pages.iter_mut().zip(&carousel.items).enumerate() {
            page.set_max_width(page_width);
            if let Err(err) = page.render(key.page_identity(index), template) {
                tracing::debug!(path = %key.path, index, error = %err, "carousel page not rendered");
            }
        }
        let (total_width, height) = carousel_extent(&state.pages, carousel.spacing);

        if carousel.view.width.is_wrap() {
            self.fixed(var(Frame::Content(id), LayoutProperty::Width), total_width, Priority::Low)?;
        }
        let handle = if carousel.view.height.is_fixed() {
            None
        } else {
            Some(self.add(carousel_height_constraint(id, height))?)
        };
        if let Slot::Carousel(slot) = &mut self.records[id.0].slot {
            slot.height = handle;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Boxes
    // ------------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn collect_children(
        &mut self,
        parent: NodeId,
        layout: Layout,
        align: Align,
        items: &[Item],
        inner_width: f64,
        inner_height: Option<f64>,
        path: &str,
    ) -> Result<(), SolverError> {
        let plan = self.plan_children(layout, items, inner_width, inner_height);
        let main = Axis::main(layout);
        let cross = main.cross();
        let mut chain = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let view = item.view();
            let margin = view.view_style.margin;
            let available = (inner_width - margin.horizontal()).max(0.0);
            let hidden = plan.hidden[index];

            let id = self.collect_item(item, format!("{path}.items[{index}]"), hidden, available, plan.single_line)?;
            self.records[parent.0].children.push(id);
            if hidden {
                continue;
            }

            if plan.loose_from.is_some_and(|from| index >= from) {
                self.loosen_right_pin(id, view.view_style.padding.right)?;
            }
            self.cross_constraints(parent, id, view, cross, cross.alignment(align))?;
            chain.push(ChainLink {
                id,
                margins: main.insets(&margin),
                fill: main.spec(view).is_fill(),
            });
        }

        self.main_constraints(parent, main, main.alignment(align), &chain, plan.overflow)
    }

    fn loosen_right_pin(&mut self, id: NodeId, padding_right: f64) -> Result<(), SolverError> {
        if let Some(pin) = self.records[id.0].right_pin.take() {
            self.solver.remove_constraint(pin)?;
        }
        let pin = self.add(right_pin_constraint(id, padding_right, Priority::Low))?;
        self.records[id.0].right_pin = Some(pin);
        Ok(())
    }

    /// Chain the children along the main axis between the two side markers
    fn main_constraints(
        &mut self,
        parent: NodeId,
        axis: Axis,
        align: AxisAlign,
        chain: &[ChainLink],
        overflow: bool,
    ) -> Result<(), SolverError> {
        let content = Frame::Content(parent);
        let leading = Frame::LeadingSide(parent);
        let trailing = Frame::TrailingSide(parent);

        self.equal(var(leading, axis.start()), var(content, axis.start()), 0.0, Priority::Required)?;
        self.equal(var(trailing, axis.end()), var(content, axis.end()), 0.0, Priority::Required)?;
        for side in [leading, trailing] {
            self.add(LayoutConstraint::GreaterOrEqual {
                variable: var(side, axis.size()),
                value: 0.0,
                priority: Priority::Required,
            })?;
        }

        let mut previous = (var(leading, axis.end()), 0.0);
        for link in chain {
            let outer = Frame::Outer(link.id);
            self.equal(var(outer, axis.start()), previous.0, previous.1 + link.margins.0, Priority::Required)?;
            previous = (var(outer, axis.end()), link.margins.1);
        }
        self.equal(var(trailing, axis.start()), previous.0, previous.1, Priority::Required)?;

        let any_fill = chain.iter().any(|link| link.fill);
        if overflow || any_fill {
            self.fixed(var(leading, axis.size()), 0.0, Priority::Required)?;
            self.fixed(var(trailing, axis.size()), 0.0, Priority::Required)?;
        } else {
            match align {
                AxisAlign::Start => {
                    self.fixed(var(leading, axis.size()), 0.0, Priority::Required)?;
                }
                AxisAlign::Center => {
                    self.equal(var(leading, axis.size()), var(trailing, axis.size()), 0.0, Priority::Required)?;
                }
                AxisAlign::End => {
                    self.fixed(var(trailing, axis.size()), 0.0, Priority::Required)?;
                }
            }
        }

        let fills: Vec<NodeId> = chain.iter().filter(|link| link.fill).map(|link| link.id).collect();
        if let Some((first, rest)) = fills.split_first() {
            let priority = if fills.len() == chain.len() {
                Priority::Required
            } else {
                Priority::Fitting
            };
            for other in rest {
                self.equal(
                    var(Frame::Outer(*other), axis.size()),
                    var(Frame::Outer(*first), axis.size()),
                    0.0,
                    priority,
                )?;
            }
        }
        Ok(())
    }

    /// Place one child across the main axis
    fn cross_constraints(
        &mut self,
        parent: NodeId,
        child: NodeId,
        view: &View,
        axis: Axis,
        align: AxisAlign,
    ) -> Result<(), SolverError> {
        let (lead, trail) = axis.insets(&view.view_style.margin);
        let outer = Frame::Outer(child);
        let content = Frame::Content(parent);
        let spec = axis.spec(view);

        if spec.is_fill() {
            self.equal(var(outer, axis.start()), var(content, axis.start()), lead, Priority::Required)?;
            self.equal(var(outer, axis.end()), var(content, axis.end()), -trail, Priority::Required)?;
            return Ok(());
        }

        match align {
            AxisAlign::Start => {
                self.equal(var(outer, axis.start()), var(content, axis.start()), lead, Priority::Required)?;
            }
            AxisAlign::Center => {
                self.equal(
                    var(outer, axis.center()),
                    var(content, axis.center()),
                    (lead - trail) / 2.0,
                    Priority::Required,
                )?;
            }
            AxisAlign::End => {
                self.equal(var(outer, axis.end()), var(content, axis.end()), -trail, Priority::Required)?;
            }
        }

        let bound = if spec.is_fixed() {
            Priority::High
        } else {
            Priority::Required
        };
        self.add(LayoutConstraint::AtLeast {
            left: var(outer, axis.start()),
            right: var(content, axis.start()),
            offset: lead,
            priority: bound,
        })?;
        self.add(LayoutConstraint::AtMost {
            left: var(outer, axis.end()),
            right: var(content, axis.end()),
            offset: -trail,
            priority: bound,
        })?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------------

    fn plan_children(&self, layout: Layout, items: &[Item], inner_width: f64, inner_height: Option<f64>) -> ChildPlan {
        let mut plan = ChildPlan {
            hidden: vec![false; items.len()],
            single_line: false,
            overflow: false,
            loose_from: None,
        };

        if layout == Layout::Row {
            let wrapped: Vec<&TextItem> = items
                .iter()
                .filter_map(Item::as_text)
                .filter(|text| text.view.width.is_wrap())
                .collect();
            let total: f64 = wrapped.iter().map(|text| self.natural_width(text)).sum();
            plan.single_line = !wrapped.is_empty() && total >= inner_width;
        }

        let axis = Axis::main(layout);
        let limit = match layout {
            Layout::Row => Some(inner_width),
            Layout::Column => inner_height,
        };
        if let Some(limit) = limit {
            let mut origin = 0.0;
            for (index, item) in items.iter().enumerate() {
                let view = item.view();
                let (lead, trail) = axis.insets(&view.view_style.margin);
                let available = (inner_width - view.view_style.margin.horizontal()).max(0.0);

                if let Some(text) = item.as_text().filter(|text| !axis.spec(&text.view).is_fixed()) {
                    let extent = axis.pick(self.text_extent(text, available, plan.single_line));
                    if origin + lead + extent > limit + OVERFLOW_TOLERANCE {
                        tracing::trace!(index, origin, extent, limit, "text overflows its box");
                        plan.overflow = true;
                        for (earlier, hidden) in plan.hidden[..index].iter_mut().enumerate() {
                            if axis.spec(items[earlier].view()).is_fill() {
                                *hidden = true;
                            }
                        }
                        for hidden in &mut plan.hidden[index + 1..] {
                            *hidden = true;
                        }
                        break;
                    }
                }
                origin += lead + trail + axis.pick(self.estimate(item, available, plan.single_line));
            }
        }

        if layout == Layout::Row && !plan.overflow && items.iter().all(|item| item.view().width.is_fixed()) {
            let mut origin = 0.0;
            for (index, item) in items.iter().enumerate() {
                let view = item.view();
                origin += view.view_style.margin.horizontal() + view.width.fixed_value().unwrap_or(0.0);
                if origin > inner_width + OVERFLOW_TOLERANCE {
                    plan.loose_from = Some(index);
                    break;
                }
            }
        }
        plan
    }

    /// Outer size of a text at its natural width, wrapped to `available`
    fn text_extent(&self, text: &TextItem, available: f64, single_line: bool) -> (f64, f64) {
        let font = self.font(text);
        let padding = text.view.view_style.padding;
        let natural = self.measurer.natural_width(&text.text, font);
        let inner = inner_width(&text.view, available);
        let width = if text.view.width.is_fixed() {
            inner
        } else {
            natural.min(inner)
        };
        let metrics = self.measurer.measure(
            &text.text,
            font,
            width + WRAP_TOLERANCE,
            Self::max_lines(text, single_line),
        );
        (natural + padding.horizontal(), metrics.height + padding.vertical())
    }

    /// Smallest plausible outer size of an item, margins excluded
    ///
    /// Fill axes count as zero since they only take what is left.
    fn estimate(&self, item: &Item, available: f64, single_line: bool) -> (f64, f64) {
        let view = item.view();
        let padding = view.view_style.padding;
        let inner = inner_width(view, available);

        let content = match item {
            Item::Text(t) | Item::TextButton(t) => {
                let (width, height) = self.text_extent(t, available, single_line);
                (
                    (width - padding.horizontal()).min(inner),
                    height - padding.vertical(),
                )
            }
            Item::Image(i) | Item::ImageButton(i) => {
                let known = self
                    .sizes
                    .get(&i.image_url)
                    .map(|(w, h)| (f64::from(w), f64::from(h)))
                    .or_else(|| {
                        i.meta_data
                            .map(|m| (f64::from(m.pixel_width), f64::from(m.pixel_height)))
                    });
                known.map_or((0.0, 0.0), |(w, h)| {
                    (w / self.config.display_scale, h / self.config.display_scale)
                })
            }
            Item::Box(b) => {
                let children = b.items.iter().map(|child| {
                    let margin = child.view().view_style.margin;
                    let (w, h) = self.estimate(child, (inner - margin.horizontal()).max(0.0), false);
                    (w + margin.horizontal(), h + margin.vertical())
                });
                match b.layout {
                    Layout::Row => children.fold((0.0, 0.0), |(w, h), (cw, ch)| (w + cw, f64::max(h, ch))),
                    Layout::Column => children.fold((0.0, 0.0), |(w, h), (cw, ch)| (f64::max(w, cw), h + ch)),
                }
            }
            Item::Carousel(_) => (0.0, 0.0),
        };

        let outer = |spec: SizeSpec, content: f64, padding: f64| match spec {
            SizeSpec::Fixed(value) => value,
            SizeSpec::Flex(FlexMode::FillParent) => 0.0,
            SizeSpec::Flex(FlexMode::WrapContent) => content + padding,
        };
        (
            outer(view.width, content.0, padding.horizontal()),
            outer(view.height, content.1, padding.vertical()),
        )
    }
}
