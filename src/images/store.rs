//! Bitmap and size caches

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};

use super::RasterImage;

/// Key/value storage for decoded bitmaps
pub trait ImageStore: Send + Sync {
    fn get(&self, file_name: &str, sub_path: Option<&str>) -> Option<Arc<RasterImage>>;

    fn save(&self, image: Arc<RasterImage>, file_name: &str, sub_path: Option<&str>);
}

/// Cache file name for an image URL.
///
/// The name is the SHA-256 hex digest of `cache_key` when given, else of the
/// URL. With `need_extension` the URL's file extension (query and fragment
/// stripped) is appended when it looks like one.
pub fn create_cache_file_name(url: &str, cache_key: Option<&str>, need_extension: bool) -> String {
    let digest = Sha256::digest(cache_key.unwrap_or(url).as_bytes());
    let mut name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    if need_extension {
        if let Some(ext) = url_extension(url) {
            name.push('.');
            name.push_str(&ext);
        }
    }
    name
}

fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= 5
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Process-local [`ImageStore`]
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: Mutex<HashMap<(Option<String>, String), Arc<RasterImage>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.lock().is_empty()
    }
}

impl ImageStore for MemoryImageStore {
    fn get(&self, file_name: &str, sub_path: Option<&str>) -> Option<Arc<RasterImage>> {
        self.images
            .lock()
            .get(&(sub_path.map(str::to_string), file_name.to_string()))
            .cloned()
    }

    fn save(&self, image: Arc<RasterImage>, file_name: &str, sub_path: Option<&str>) {
        self.images
            .lock()
            .insert((sub_path.map(str::to_string), file_name.to_string()), image);
    }
}

/// Pixel sizes of bitmaps seen so far, by URL
///
/// Lets a re-render size an image slot from its real aspect ratio before the
/// bitmap is fetched again.
#[derive(Debug, Default)]
pub struct ImageSizeCache {
    sizes: RwLock<HashMap<String, (u32, u32)>>,
}

impl ImageSizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<(u32, u32)> {
        self.sizes.read().get(url).copied()
    }

    /// Remember a size; degenerate sizes are ignored
    pub fn insert(&self, url: &str, size: (u32, u32)) {
        if size.0 > 0 && size.1 > 0 {
            self.sizes.write().insert(url.to_string(), size);
        }
    }

    pub fn len(&self) -> usize {
        self.sizes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.read().is_empty()
    }
}
