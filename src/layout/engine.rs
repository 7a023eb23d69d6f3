//! Layout computation engine
//!
//! A [`Renderer`] owns the layout of one message template at a time. It
//! compiles the body into constraints (see [`super::collector`]), solves them,
//! refines wrapped text heights in a few solve/measure rounds and produces a
//! [`LayoutTree`].
//!
//! The layout stays live after a render: when an image arrives,
//! [`Renderer::apply_loaded_image`] swaps that slot's placeholder constraints
//! for ones derived from the real bitmap and re-settles the tree in place.
//!
//! ## Key Functions
//!
//! - [`Renderer::render`]: lay out a parsed template
//! - [`Renderer::image_requests`]: images the host should fetch for the current layout
//! - [`Renderer::apply_loaded_image`]: apply a fetched bitmap, guarded against stale results

use std::sync::Arc;

use crate::delegate::TemplateDelegate;
use crate::images::{image_policy, ImageEvent, ImagePolicy, ImageSizeCache, RasterImage, MAX_RESIZE_DIMENSION};
use crate::parser::ast::{Body, SizeSpec, Template, View};

use super::carousel::{CarouselCache, CarouselKey};
use super::collector::{
    carousel_extent, carousel_height_constraint, image_constraints, text_height_constraint,
    ConstraintCollector, NodeRecord, Slot, WRAP_TOLERANCE,
};
use super::config::LayoutConfig;
use super::error::LayoutError;
use super::solver::{ConstraintSolver, Frame, LayoutProperty, Solution};
use super::text::{ApproximateTextMeasurer, TextMeasurer};
use super::types::*;

/// URL scheme of images drawn by the host itself
const INTERNAL_SCHEME: &str = "internal://";

/// A text height change below this does not trigger another solve
const HEIGHT_TOLERANCE: f64 = 0.5;

/// Live layout of the current template
struct RenderState {
    solver: ConstraintSolver,
    records: Vec<NodeRecord>,
    tree: LayoutTree,
}

/// Lays out message templates and keeps the result live for image updates
pub struct Renderer {
    config: LayoutConfig,
    measurer: Arc<dyn TextMeasurer>,
    sizes: Arc<ImageSizeCache>,
    identity: TemplateIdentity,
    delegate: Option<Arc<dyn TemplateDelegate>>,
    carousels: CarouselCache,
    state: Option<RenderState>,
}

impl Renderer {
    pub fn new(config: LayoutConfig) -> Self {
        let measurer = ApproximateTextMeasurer::new(config.char_width_ratio, config.line_height_ratio);
        Self {
            config,
            measurer: Arc::new(measurer),
            sizes: Arc::new(ImageSizeCache::new()),
            identity: TemplateIdentity::default(),
            delegate: None,
            carousels: CarouselCache::new(),
            state: None,
        }
    }

    /// Measure text with a host-provided font stack
    pub fn with_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    /// Share image sizes with other renderers
    pub fn with_size_cache(mut self, sizes: Arc<ImageSizeCache>) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn TemplateDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Change the root width; takes effect on the next render
    pub fn set_max_width(&mut self, width: f64) {
        self.config.max_width = width;
    }

    pub fn identity(&self) -> &TemplateIdentity {
        &self.identity
    }

    /// Layout of the last successful render
    pub fn tree(&self) -> Option<&LayoutTree> {
        self.state.as_ref().map(|state| &state.tree)
    }

    /// Number of carousel states built from scratch, nested pages excluded
    pub fn carousel_build_count(&self) -> usize {
        self.carousels.build_count()
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Lay out `template` for the message `identity`
    ///
    /// Fails only for templates without a body or with an unsupported
    /// version; conflicting constraints are resolved by priority.
    pub fn render(&mut self, identity: TemplateIdentity, template: &Template) -> Result<&LayoutTree, LayoutError> {
        if !template.is_supported() {
            self.state = None;
            return Err(LayoutError::UnsupportedVersion(template.version));
        }
        let Some(body) = template.body.as_ref() else {
            self.state = None;
            return Err(LayoutError::NoBody);
        };
        self.render_body(identity, body)
    }

    /// Lay out a body directly, e.g. an error or downloading body
    pub fn render_body(&mut self, identity: TemplateIdentity, body: &Body) -> Result<&LayoutTree, LayoutError> {
        let previous = self.state.take().filter(|_| self.identity == identity);
        self.identity = identity;

        self.carousels.begin_pass();
        let collected = ConstraintCollector::new(
            &self.config,
            &self.measurer,
            &self.sizes,
            &self.identity,
            &mut self.carousels,
        )
        .collect(body);
        self.carousels.end_pass();
        let (solver, mut records) = collected?;

        if let Some(previous) = previous {
            carry_over_bitmaps(&previous.records, &mut records);
        }

        let mut state = RenderState {
            solver,
            records,
            tree: LayoutTree {
                width: 0.0,
                height: 0.0,
                root: empty_root(),
            },
        };
        self.settle(&mut state)?;
        tracing::debug!(
            message_id = %self.identity.message_id,
            nodes = state.records.len(),
            width = state.tree.width,
            height = state.tree.height,
            "rendered template"
        );
        Ok(&self.state.insert(state).tree)
    }

    /// Solve, re-measure wrapped text against the solved widths until heights
    /// settle, then rebuild the output tree
    fn settle(&self, state: &mut RenderState) -> Result<(), LayoutError> {
        for pass in 0..self.config.text_passes {
            let solution = state.solver.solve();
            let mut changed = 0;
            for record in state.records.iter_mut().filter(|record| !record.hidden) {
                let NodeRecord { id, view, slot, .. } = record;
                let Slot::Text(text) = slot else {
                    continue;
                };
                let Some(handle) = text.height else {
                    continue;
                };
                let width = solution.get(Frame::Content(*id), LayoutProperty::Width);
                let metrics = self
                    .measurer
                    .measure(&text.text, text.font, width + WRAP_TOLERANCE, text.max_lines);
                if (metrics.height - text.measured_height).abs() > HEIGHT_TOLERANCE {
                    state.solver.remove_constraint(handle)?;
                    text.height = Some(state.solver.add_constraint(text_height_constraint(*id, view, metrics.height))?);
                    text.measured_height = metrics.height;
                    changed += 1;
                }
            }
            if changed == 0 {
                break;
            }
            tracing::trace!(pass, changed, "re-measured wrapped text");
        }

        let solution = state.solver.solve();
        for record in state.records.iter_mut().filter(|record| !record.hidden) {
            if let Slot::Text(text) = &mut record.slot {
                let width = solution.get(Frame::Content(record.id), LayoutProperty::Width);
                text.lines = self
                    .measurer
                    .wrap(&text.text, text.font, width + WRAP_TOLERANCE, text.max_lines);
            }
        }

        let root = self.build_node(&state.records, &solution, NodeId(0), Point::new(0.0, 0.0));
        state.tree = LayoutTree {
            width: root.frame.width,
            height: root.frame.height,
            root,
        };
        Ok(())
    }

    fn build_node(&self, records: &[NodeRecord], solution: &Solution, id: NodeId, origin: Point) -> LayoutNode {
        let record = &records[id.0];
        let (frame, content) = if record.hidden {
            let collapsed = Rect::new(origin.x, origin.y, 0.0, 0.0);
            (collapsed, collapsed)
        } else {
            (rect(solution, Frame::Outer(id)), rect(solution, Frame::Content(id)))
        };

        let view = &record.view;
        let style = NodeStyle {
            background_color: view.view_style.background_color.clone(),
            background_image_url: view.view_style.background_image_url.clone(),
            border_width: view.view_style.border_width.unwrap_or(0.0).max(0.0),
            border_color: view.view_style.border_color.clone(),
            radius: view.view_style.effective_radius(&view.width, &view.height),
        };

        let kind = match &record.slot {
            Slot::Root => NodeKind::Root,
            Slot::Box { layout } => NodeKind::Box { layout: *layout },
            Slot::Text(text) => NodeKind::Text(TextContent {
                text: text.text.clone(),
                lines: if record.hidden { Vec::new() } else { text.lines.clone() },
                font_size: text.font.size,
                weight: text.font.weight,
                color: text.color.clone(),
                align: text.align,
                max_lines: text.max_lines,
                is_button: text.is_button,
            }),
            Slot::Image(image) => NodeKind::Image(ImageContent {
                url: image.url.clone(),
                content_mode: image.style.content_mode,
                tint_color: image.style.tint_color.clone(),
                is_button: image.is_button,
                loaded_size: image.loaded_size,
                bitmap: image.bitmap.clone(),
            }),
            Slot::Carousel(carousel) => {
                let state = self.carousels.get(&carousel.key).filter(|_| !record.hidden);
                let mut offset = 0.0;
                let pages: Vec<CarouselPage> = state
                    .map(|state| {
                        state
                            .pages
                            .iter()
                            .map(|page| {
                                let tree = page.tree().cloned();
                                let entry = CarouselPage { offset, tree };
                                offset += page.tree().map_or(0.0, |tree| tree.width) + carousel.spacing;
                                entry
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                NodeKind::Carousel(CarouselContent {
                    spacing: carousel.spacing,
                    scroll_offset: state.map_or(0.0, |state| state.scroll_offset),
                    pages,
                })
            }
        };

        let child_origin = Point::new(content.x, content.y);
        let children = record
            .children
            .iter()
            .map(|child| self.build_node(records, solution, *child, child_origin))
            .collect();

        LayoutNode {
            id,
            path: record.path.clone(),
            kind,
            frame,
            content,
            style,
            action: view.action.clone(),
            hidden: record.hidden,
            children,
        }
    }

    // ========================================================================
    // Images
    // ========================================================================

    /// Images of the current layout that still need a bitmap
    ///
    /// Hidden slots and host-drawn `internal://` images are skipped. Images
    /// inside carousel pages are routed through their carousel.
    pub fn image_requests(&self) -> Vec<ImageRequest> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        let mut requests = Vec::new();
        for record in state.records.iter().filter(|record| !record.hidden) {
            match &record.slot {
                Slot::Image(image) if image.bitmap.is_none() && !image.url.starts_with(INTERNAL_SCHEME) => {
                    requests.push(ImageRequest {
                        identity: self.identity.clone(),
                        route: ImageRoute::local(record.id),
                        url: image.url.clone(),
                    });
                }
                Slot::Carousel(carousel) => {
                    let Some(carousel_state) = self.carousels.get(&carousel.key) else {
                        continue;
                    };
                    for (index, page) in carousel_state.pages.iter().enumerate() {
                        requests.extend(page.image_requests().into_iter().map(|request| ImageRequest {
                            identity: self.identity.clone(),
                            route: request.route.nested(record.id, index),
                            url: request.url,
                        }));
                    }
                }
                _ => {}
            }
        }
        requests
    }

    /// Apply a fetched bitmap to the slot at `route`
    ///
    /// Results for another template, or for a slot whose URL changed since the
    /// request, are ignored. Returns whether a re-layout notification was
    /// raised: only when the slot used the ratio policy or had no size
    /// metadata, since otherwise its size was already final.
    pub fn apply_loaded_image(
        &mut self,
        identity: &TemplateIdentity,
        route: &ImageRoute,
        url: &str,
        bitmap: Arc<RasterImage>,
    ) -> bool {
        if *identity != self.identity {
            tracing::debug!(
                url,
                expected = %self.identity.message_id,
                got = %identity.message_id,
                "ignoring image for another template"
            );
            return false;
        }
        let Some(notified) = self.apply_image(route, url, bitmap) else {
            return false;
        };
        if let Some(node) = notified {
            if let Some(delegate) = &self.delegate {
                delegate.did_finish_loading_image(node);
            }
        }
        notified.is_some()
    }

    /// Apply the outcome of an [`ImageLoader`](crate::images::ImageLoader) request
    pub fn handle_image_event(&mut self, event: ImageEvent) -> bool {
        match event.result {
            Ok(bitmap) => self.apply_loaded_image(&event.request.identity, &event.request.route, &event.request.url, bitmap),
            Err(err) => {
                tracing::debug!(url = %event.request.url, error = %err, "image slot keeps its placeholder");
                false
            }
        }
    }

    /// `None` when the result was ignored, else the node to report, if any
    fn apply_image(&mut self, route: &ImageRoute, url: &str, bitmap: Arc<RasterImage>) -> Option<Option<NodeId>> {
        let mut state = self.state.take()?;
        let result = match route.carousels.split_first() {
            Some((&(carousel, page), rest)) => {
                let inner = ImageRoute {
                    carousels: rest.to_vec(),
                    node: route.node,
                };
                self.apply_page_image(&mut state, carousel, page, &inner, url, bitmap)
            }
            None => self.apply_local_image(&mut state, route.node, url, bitmap),
        };
        self.state = Some(state);
        result.unwrap_or_else(|err| {
            tracing::warn!(url, error = %err, "failed to apply image");
            None
        })
    }

    fn apply_local_image(
        &self,
        state: &mut RenderState,
        node: NodeId,
        url: &str,
        bitmap: Arc<RasterImage>,
    ) -> Result<Option<Option<NodeId>>, LayoutError> {
        let Some(record) = state.records.get_mut(node.0).filter(|record| !record.hidden) else {
            return Ok(None);
        };
        let NodeRecord { view, slot, .. } = record;
        let Slot::Image(image) = slot else {
            return Ok(None);
        };
        if image.url != url {
            tracing::debug!(url, current = %image.url, "ignoring stale image result");
            return Ok(None);
        }

        for handle in image.handles.drain(..) {
            state.solver.remove_constraint(handle)?;
        }
        self.sizes.insert(url, bitmap.size());
        image.handles = image_constraints(
            &mut state.solver,
            node,
            view,
            image,
            &self.sizes,
            self.config.display_scale,
        )?;
        image.loaded_size = Some(bitmap.size());
        image.bitmap = Some(fit_bitmap(view, bitmap, self.config.display_scale));
        let notify = image_policy(&view.width, &view.height, image.style.content_mode) == ImagePolicy::Ratio
            || image.meta.is_none();

        self.settle(state)?;
        Ok(Some(notify.then_some(node)))
    }

    fn apply_page_image(
        &mut self,
        state: &mut RenderState,
        carousel: NodeId,
        page: usize,
        route: &ImageRoute,
        url: &str,
        bitmap: Arc<RasterImage>,
    ) -> Result<Option<Option<NodeId>>, LayoutError> {
        let Some(Slot::Carousel(slot)) = state
            .records
            .get(carousel.0)
            .filter(|record| !record.hidden)
            .map(|record| &record.slot)
        else {
            return Ok(None);
        };
        let key = slot.key.clone();
        let spacing = slot.spacing;

        let Some(carousel_state) = self.carousels.get_mut(&key) else {
            return Ok(None);
        };
        let Some(renderer) = carousel_state.pages.get_mut(page) else {
            return Ok(None);
        };
        let Some(page_notified) = renderer.apply_image(route, url, bitmap) else {
            return Ok(None);
        };
        let (_, height) = carousel_extent(&carousel_state.pages, spacing);

        if let Slot::Carousel(slot) = &mut state.records[carousel.0].slot {
            if let Some(handle) = slot.height.take() {
                state.solver.remove_constraint(handle)?;
                slot.height = Some(state.solver.add_constraint(carousel_height_constraint(carousel, height))?);
            }
        }
        self.settle(state)?;
        Ok(Some(page_notified.map(|_| carousel)))
    }

    // ========================================================================
    // Carousels
    // ========================================================================

    /// Scroll offset of the carousel at `node`
    pub fn carousel_scroll_offset(&self, node: NodeId) -> Option<f64> {
        let key = self.carousel_key(node)?;
        self.carousels.get(&key).map(|state| state.scroll_offset)
    }

    /// Remember the scroll offset of the carousel at `node`
    ///
    /// The offset survives re-renders of the same message.
    pub fn set_carousel_scroll_offset(&mut self, node: NodeId, offset: f64) -> bool {
        let Some(key) = self.carousel_key(node) else {
            return false;
        };
        let Some(carousel) = self.carousels.get_mut(&key) else {
            return false;
        };
        carousel.scroll_offset = offset.max(0.0);
        let offset = carousel.scroll_offset;
        if let Some(NodeKind::Carousel(content)) = self
            .state
            .as_mut()
            .and_then(|state| state.tree.find_mut(node))
            .map(|node| &mut node.kind)
        {
            content.scroll_offset = offset;
        }
        true
    }

    fn carousel_key(&self, node: NodeId) -> Option<CarouselKey> {
        match &self.state.as_ref()?.records.get(node.0)?.slot {
            Slot::Carousel(carousel) => Some(carousel.key.clone()),
            _ => None,
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn snap(value: f64) -> f64 {
    // `+ 0.0` turns -0 into 0
    (value * 1000.0).round() / 1000.0 + 0.0
}

fn rect(solution: &Solution, frame: Frame) -> Rect {
    Rect::new(
        snap(solution.get(frame, LayoutProperty::Left)),
        snap(solution.get(frame, LayoutProperty::Top)),
        snap(solution.get(frame, LayoutProperty::Width)),
        snap(solution.get(frame, LayoutProperty::Height)),
    )
}

fn empty_root() -> LayoutNode {
    LayoutNode {
        id: NodeId(0),
        path: "body".to_string(),
        kind: NodeKind::Root,
        frame: Rect::zero(),
        content: Rect::zero(),
        style: NodeStyle::default(),
        action: None,
        hidden: false,
        children: Vec::new(),
    }
}

/// Scale a bitmap for its slot
///
/// A fixed width with a flexible height draws the bitmap resized to the slot
/// width and anchored at the top. Slots wider than [`MAX_RESIZE_DIMENSION`]
/// pixels keep the bitmap unscaled.
fn fit_bitmap(view: &View, bitmap: Arc<RasterImage>, display_scale: f64) -> Arc<RasterImage> {
    let SizeSpec::Fixed(width) = view.width else {
        return bitmap;
    };
    if view.height.is_fixed() {
        return bitmap;
    }
    let content_width = (width - view.view_style.padding.horizontal()).max(0.0);
    let pixels = (content_width * display_scale).round();
    if pixels < 1.0 || pixels > f64::from(MAX_RESIZE_DIMENSION) || pixels as u32 == bitmap.width() {
        return bitmap;
    }
    Arc::new(bitmap.resize_top_aligned_to_fill(pixels as u32))
}

/// Keep bitmaps of a re-render of the same message where the slot still shows
/// the same URL
fn carry_over_bitmaps(previous: &[NodeRecord], records: &mut [NodeRecord]) {
    for record in records.iter_mut() {
        let Slot::Image(image) = &mut record.slot else {
            continue;
        };
        let old = previous.iter().find_map(|old| match &old.slot {
            Slot::Image(old_image) if old.path == record.path && old_image.url == image.url => Some(old_image),
            _ => None,
        });
        if let Some(old) = old {
            image.bitmap = old.bitmap.clone();
            image.loaded_size = old.loaded_size;
        }
    }
}
