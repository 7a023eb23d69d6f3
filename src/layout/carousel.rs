//! Carousel page renderers kept alive across renders
//!
//! Every carousel page is an independent template laid out by its own
//! [`Renderer`]. Re-rendering the same message reuses those renderers and the
//! scroll offset instead of rebuilding them; a different message (or a
//! different page count) gets fresh ones.

use std::collections::HashMap;

use super::engine::Renderer;
use super::types::TemplateIdentity;

/// Stable identity of one carousel: the owning template plus the item path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CarouselKey {
    pub identity: TemplateIdentity,
    pub path: String,
}

impl CarouselKey {
    pub fn new(identity: TemplateIdentity, path: impl Into<String>) -> Self {
        Self {
            identity,
            path: path.into(),
        }
    }

    /// Identity handed to the renderer of page `index`
    pub fn page_identity(&self, index: usize) -> TemplateIdentity {
        TemplateIdentity::new(
            format!("{}/{}[{}]", self.identity.message_id, self.path, index),
            self.identity.revision,
        )
    }
}

/// Reusable state of one carousel
pub struct CarouselState {
    pub pages: Vec<Renderer>,
    pub scroll_offset: f64,
}

/// Carousel states of the current render, plus the previous render's states
/// still waiting to be claimed
#[derive(Default)]
pub struct CarouselCache {
    previous: HashMap<CarouselKey, CarouselState>,
    current: HashMap<CarouselKey, CarouselState>,
    builds: usize,
}

impl CarouselCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a render pass; states from the last pass become claimable
    pub fn begin_pass(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    /// Finish a render pass, dropping states nobody claimed
    pub fn end_pass(&mut self) {
        if !self.previous.is_empty() {
            tracing::trace!(dropped = self.previous.len(), "dropping unused carousel states");
        }
        self.previous.clear();
    }

    /// State for `key`, reused when the page count still matches
    pub fn checkout<F>(&mut self, key: CarouselKey, page_count: usize, mut build_page: F) -> &mut CarouselState
    where
        F: FnMut(usize) -> Renderer,
    {
        let reused = self
            .previous
            .remove(&key)
            .filter(|state| state.pages.len() == page_count);
        let state = match reused {
            Some(state) => state,
            None => {
                self.builds += 1;
                CarouselState {
                    pages: (0..page_count).map(&mut build_page).collect(),
                    scroll_offset: 0.0,
                }
            }
        };
        self.current.entry(key).or_insert(state)
    }

    pub fn get(&self, key: &CarouselKey) -> Option<&CarouselState> {
        self.current.get(key)
    }

    pub fn get_mut(&mut self, key: &CarouselKey) -> Option<&mut CarouselState> {
        self.current.get_mut(key)
    }

    /// Number of carousel states built from scratch so far
    pub fn build_count(&self) -> usize {
        self.builds
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
