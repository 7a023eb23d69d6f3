//! Asynchronous image fetching

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::executor::{complete_on, CompletionExecutor};
use crate::layout::ImageRequest;
use crate::template::RetryTracker;

use super::store::{create_cache_file_name, ImageSizeCache, ImageStore};
use super::{ImageLoadError, RasterImage};

/// How long a bulk prefetch may take before it is declared failed
pub const PREFETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where image bytes come from
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadError>;
}

/// Serves bytes registered up front
#[derive(Debug, Default)]
pub struct MemoryImageSource {
    images: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.images.lock().insert(url.into(), bytes);
    }
}

#[async_trait]
impl ImageSource for MemoryImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
        self.images
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| ImageLoadError::NotFound(url.to_string()))
    }
}

/// Reads `file://` URLs and bare paths relative to a base directory
///
/// Absolute paths and `..` components are rejected, so a URL never reaches
/// a file outside `base`.
#[derive(Debug, Clone)]
pub struct FileImageSource {
    base: PathBuf,
}

impl FileImageSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
        if url.contains("://") && !url.starts_with("file://") {
            return Err(ImageLoadError::Transport(format!("unsupported scheme in {url}")));
        }
        let relative = Path::new(url.trim_start_matches("file://"));
        if !relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            return Err(ImageLoadError::OutsideBase(url.to_string()));
        }
        let path = self.base.join(relative);
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ImageLoadError::NotFound(url.to_string()),
            _ => ImageLoadError::Transport(e.to_string()),
        })
    }
}

/// Result of one image load, delivered on the completion executor
#[derive(Debug, Clone)]
pub struct ImageEvent {
    pub request: ImageRequest,
    pub result: Result<Arc<RasterImage>, ImageLoadError>,
}

/// Result of a bulk prefetch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrefetchOutcome {
    pub loaded: usize,
    pub failed: Vec<String>,
    /// The batch hit its deadline before every load finished
    pub timed_out: bool,
}

impl PrefetchOutcome {
    pub fn is_complete(&self) -> bool {
        !self.timed_out && self.failed.is_empty()
    }
}

/// Fetches, decodes and caches bitmaps
pub struct ImageLoader {
    source: Arc<dyn ImageSource>,
    store: Arc<dyn ImageStore>,
    sizes: Arc<ImageSizeCache>,
    retries: Arc<RetryTracker>,
    sub_path: Option<String>,
}

impl ImageLoader {
    pub fn new(
        source: Arc<dyn ImageSource>,
        store: Arc<dyn ImageStore>,
        sizes: Arc<ImageSizeCache>,
        retries: Arc<RetryTracker>,
    ) -> Self {
        Self {
            source,
            store,
            sizes,
            retries,
            sub_path: None,
        }
    }

    /// Store bitmaps under a namespace, e.g. one per template kind
    pub fn with_sub_path(mut self, sub_path: impl Into<String>) -> Self {
        self.sub_path = Some(sub_path.into());
        self
    }

    pub fn sizes(&self) -> &Arc<ImageSizeCache> {
        &self.sizes
    }

    /// Load one bitmap, from the store when possible
    pub async fn load(&self, url: &str, cache_key: Option<&str>) -> Result<Arc<RasterImage>, ImageLoadError> {
        let file_name = create_cache_file_name(url, cache_key, true);
        let sub_path = self.sub_path.as_deref();
        if let Some(image) = self.store.get(&file_name, sub_path) {
            self.sizes.insert(url, image.size());
            return Ok(image);
        }
        if !self.retries.is_retry_available(url) {
            return Err(ImageLoadError::RetryExhausted(url.to_string()));
        }

        let decoded = match self.source.fetch(url).await {
            Ok(bytes) => RasterImage::decode(&bytes),
            Err(e) => Err(e),
        };
        match decoded {
            Ok(image) => {
                let image = Arc::new(image);
                self.store.save(Arc::clone(&image), &file_name, sub_path);
                self.sizes.insert(url, image.size());
                tracing::debug!(url, size = ?image.size(), "image loaded");
                Ok(image)
            }
            Err(e) => {
                let attempt = self.retries.increase_retry_count(url);
                tracing::warn!(url, attempt, error = %e, "image load failed");
                Err(e)
            }
        }
    }

    /// Load in the background and hand the result to `deliver` on `executor`
    pub fn request<F>(
        self: &Arc<Self>,
        request: ImageRequest,
        runtime: &Handle,
        executor: Arc<dyn CompletionExecutor>,
        deliver: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(ImageEvent) + Send + 'static,
    {
        let this = Arc::clone(self);
        runtime.spawn(async move {
            let result = this.load(&request.url, None).await;
            complete_on(executor.as_ref(), move || deliver(ImageEvent { request, result }));
        })
    }

    /// Load a batch and report once, after all loads finish or `timeout`
    /// passes, whichever comes first
    pub fn prefetch<F>(
        self: &Arc<Self>,
        urls: Vec<String>,
        timeout: Duration,
        runtime: &Handle,
        executor: Arc<dyn CompletionExecutor>,
        done: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(PrefetchOutcome) + Send + 'static,
    {
        let this = Arc::clone(self);
        runtime.spawn(async move {
            let loads = urls.iter().map(|url| this.load(url, None));
            let outcome = match tokio::time::timeout(timeout, join_all(loads)).await {
                Ok(results) => {
                    let mut outcome = PrefetchOutcome::default();
                    for (url, result) in urls.iter().zip(results) {
                        match result {
                            Ok(_) => outcome.loaded += 1,
                            Err(_) => outcome.failed.push(url.clone()),
                        }
                    }
                    outcome
                }
                Err(_) => {
                    tracing::warn!(count = urls.len(), "image prefetch timed out");
                    PrefetchOutcome {
                        loaded: 0,
                        failed: urls.clone(),
                        timed_out: true,
                    }
                }
            };
            complete_on(executor.as_ref(), move || done(outcome));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::MemoryImageStore;

    fn loader(source: Arc<dyn ImageSource>) -> ImageLoader {
        ImageLoader::new(
            source,
            Arc::new(MemoryImageStore::new()),
            Arc::new(ImageSizeCache::new()),
            Arc::new(RetryTracker::with_limit(2)),
        )
    }

    #[tokio::test]
    async fn test_load_decodes_and_caches() {
        let source = Arc::new(MemoryImageSource::new());
        source.insert("a.png", RasterImage::blank(8, 4).to_png().unwrap());
        let loader = loader(source);

        let image = loader.load("a.png", None).await.unwrap();
        assert_eq!(image.size(), (8, 4));
        assert_eq!(loader.sizes().get("a.png"), Some((8, 4)));
    }

    #[tokio::test]
    async fn test_failures_spend_retries() {
        let loader = loader(Arc::new(MemoryImageSource::new()));
        assert!(matches!(loader.load("x", None).await, Err(ImageLoadError::NotFound(_))));
        assert!(matches!(loader.load("x", None).await, Err(ImageLoadError::NotFound(_))));
        assert!(matches!(loader.load("x", None).await, Err(ImageLoadError::RetryExhausted(_))));
    }

    #[tokio::test]
    async fn test_store_hit_skips_source() {
        let source = Arc::new(MemoryImageSource::new());
        source.insert("a.png", RasterImage::blank(2, 2).to_png().unwrap());
        let loader = loader(source.clone());
        loader.load("a.png", None).await.unwrap();

        source.images.lock().clear();
        assert!(loader.load("a.png", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_sub_path_namespaces_the_store() {
        let source = Arc::new(MemoryImageSource::new());
        source.insert("a.png", RasterImage::blank(2, 2).to_png().unwrap());
        let store = Arc::new(MemoryImageStore::new());
        let loader = ImageLoader::new(
            source,
            store.clone(),
            Arc::new(ImageSizeCache::new()),
            Arc::new(RetryTracker::new()),
        )
        .with_sub_path("message");
        loader.load("a.png", None).await.unwrap();

        let file_name = create_cache_file_name("a.png", None, true);
        assert!(store.get(&file_name, Some("message")).is_some());
        assert!(store.get(&file_name, None).is_none());
    }

    #[tokio::test]
    async fn test_file_source_stays_inside_base() {
        let base = std::env::temp_dir().join(format!("mt-file-source-{}", std::process::id()));
        std::fs::create_dir_all(base.join("icons")).unwrap();
        std::fs::write(base.join("icons/dot.png"), b"png").unwrap();
        let source = FileImageSource::new(&base);

        assert_eq!(source.fetch("icons/dot.png").await.unwrap(), b"png".to_vec());
        assert_eq!(source.fetch("file://./icons/dot.png").await.unwrap(), b"png".to_vec());
        assert!(matches!(source.fetch("icons/none.png").await, Err(ImageLoadError::NotFound(_))));
        for url in ["file:///etc/passwd", "/etc/passwd", "../secret.png", "icons/../../secret.png"] {
            assert!(
                matches!(source.fetch(url).await, Err(ImageLoadError::OutsideBase(_))),
                "{url}"
            );
        }
        assert!(matches!(
            source.fetch("https://cdn.test/a.png").await,
            Err(ImageLoadError::Transport(_))
        ));

        std::fs::remove_dir_all(&base).unwrap();
    }
}
