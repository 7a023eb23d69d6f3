//! Image resolution: slot sizing policy, bitmap decoding, caches and loading

pub mod loader;
pub mod policy;
pub mod raster;
pub mod store;

use thiserror::Error;

pub use loader::{
    FileImageSource, ImageEvent, ImageLoader, ImageSource, MemoryImageSource, PrefetchOutcome,
    PREFETCH_TIMEOUT,
};
pub use policy::{image_policy, resolve_image, ConstraintPolicy, ImagePolicy};
pub use raster::{RasterFrame, RasterImage, MAX_RESIZE_DIMENSION};
pub use store::{create_cache_file_name, ImageSizeCache, ImageStore, MemoryImageStore};

/// Why an image could not be shown
///
/// A failed image never fails its template; the slot keeps its placeholder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageLoadError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("image transport error: {0}")]
    Transport(String),

    #[error("image decode error: {0}")]
    Decode(String),

    #[error("image path leaves the image directory: {0}")]
    OutsideBase(String),

    #[error("retry limit reached for image {0}")]
    RetryExhausted(String),
}
