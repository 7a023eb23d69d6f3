//! Image slots: requests, late bitmaps and re-layout notifications

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use message_template::delegate::TemplateDelegate;
use message_template::executor::MainQueue;
use message_template::images::{
    ImageEvent, ImageLoader, ImageSizeCache, MemoryImageSource, MemoryImageStore, RasterImage,
    PREFETCH_TIMEOUT,
};
use message_template::layout::{
    ImageRoute, LayoutConfig, NodeId, NodeKind, Renderer, TemplateIdentity,
};
use message_template::parse_str;
use message_template::template::RetryTracker;
use message_template::Template;

const URL: &str = "https://cdn.test/banner.png";

#[derive(Default)]
struct RecordingDelegate {
    loaded: Mutex<Vec<NodeId>>,
    reloads: Mutex<usize>,
}

impl TemplateDelegate for RecordingDelegate {
    fn did_finish_loading_image(&self, node: NodeId) {
        self.loaded.lock().push(node);
    }

    fn need_reload_cell(&self) {
        *self.reloads.lock() += 1;
    }
}

fn template(items: &str) -> Template {
    parse_str(&format!(r#"{{"version":1,"body":{{"items":{items}}}}}"#)).unwrap()
}

fn banner(extra: &str) -> Template {
    template(&format!(
        r#"[{{"type":"image","imageUrl":"{URL}","width":{{"type":"fixed","value":100}}{extra}}}]"#
    ))
}

fn image_height(renderer: &Renderer) -> f64 {
    renderer.tree().unwrap().find_path("body.items[0]").unwrap().frame.height
}

#[test]
fn test_ratio_slot_grows_and_notifies_once_loaded() {
    let delegate = Arc::new(RecordingDelegate::default());
    let identity = TemplateIdentity::new("m-1", 3);
    let mut renderer = Renderer::default();
    renderer.set_delegate(delegate.clone());
    renderer.render(identity.clone(), &banner("")).unwrap();

    let requests = renderer.image_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].identity, identity);

    let notified = renderer.apply_loaded_image(
        &identity,
        &requests[0].route,
        URL,
        Arc::new(RasterImage::blank(200, 100)),
    );
    assert!(notified);
    assert_eq!(*delegate.loaded.lock(), vec![requests[0].route.node]);
    assert!((image_height(&renderer) - 50.0).abs() < 0.01);
    assert!(renderer.image_requests().is_empty());
}

#[test]
fn test_fixed_slot_with_metadata_does_not_notify() {
    let identity = TemplateIdentity::new("m-1", 1);
    let mut renderer = Renderer::default();
    renderer
        .render(
            identity.clone(),
            &banner(r#","height":{"type":"fixed","value":40},"metaData":{"pixelWidth":200,"pixelHeight":80}"#),
        )
        .unwrap();
    let route = renderer.image_requests()[0].route.clone();

    let notified =
        renderer.apply_loaded_image(&identity, &route, URL, Arc::new(RasterImage::blank(200, 80)));
    assert!(!notified);

    let node = renderer.tree().unwrap().find(route.node).unwrap();
    let NodeKind::Image(image) = &node.kind else {
        panic!("expected image");
    };
    assert_eq!(image.loaded_size, Some((200, 80)));
}

#[test]
fn test_fixed_slot_without_metadata_notifies() {
    let identity = TemplateIdentity::new("m-1", 1);
    let mut renderer = Renderer::default();
    renderer
        .render(identity.clone(), &banner(r#","height":{"type":"fixed","value":40}"#))
        .unwrap();
    let route = renderer.image_requests()[0].route.clone();

    assert!(renderer.apply_loaded_image(&identity, &route, URL, Arc::new(RasterImage::blank(10, 10))));
    assert!((image_height(&renderer) - 40.0).abs() < 0.01);
}

#[test]
fn test_stale_results_are_ignored() {
    let delegate = Arc::new(RecordingDelegate::default());
    let identity = TemplateIdentity::new("m-1", 1);
    let mut renderer = Renderer::default();
    renderer.set_delegate(delegate.clone());
    renderer.render(identity.clone(), &banner("")).unwrap();
    let route = renderer.image_requests()[0].route.clone();
    let before = renderer.tree().cloned();

    let bitmap = Arc::new(RasterImage::blank(200, 100));
    let other = TemplateIdentity::new("m-2", 1);
    assert!(!renderer.apply_loaded_image(&other, &route, URL, Arc::clone(&bitmap)));
    let newer = TemplateIdentity::new("m-1", 2);
    assert!(!renderer.apply_loaded_image(&newer, &route, URL, Arc::clone(&bitmap)));
    assert!(!renderer.apply_loaded_image(&identity, &route, "https://cdn.test/old.png", Arc::clone(&bitmap)));
    assert!(!renderer.apply_loaded_image(&identity, &ImageRoute::local(NodeId(99)), URL, bitmap));

    assert!(delegate.loaded.lock().is_empty());
    assert_eq!(renderer.tree().cloned(), before);
}

#[test]
fn test_size_cache_sizes_the_next_render_synchronously() {
    let sizes = Arc::new(ImageSizeCache::new());
    let identity = TemplateIdentity::new("m-1", 1);

    let mut first = Renderer::new(LayoutConfig::default()).with_size_cache(Arc::clone(&sizes));
    first.render(identity.clone(), &banner("")).unwrap();
    let route = first.image_requests()[0].route.clone();
    first.apply_loaded_image(&identity, &route, URL, Arc::new(RasterImage::blank(300, 150)));

    let mut second = Renderer::new(LayoutConfig::default()).with_size_cache(sizes);
    second.render(TemplateIdentity::new("m-9", 1), &banner("")).unwrap();
    assert!((image_height(&second) - 50.0).abs() < 0.01);
}

#[test]
fn test_carousel_page_images_route_through_the_carousel() {
    let source = format!(
        r#"{{"version":1,"body":{{"items":[{{"type":"carouselView","items":[
            {{"version":1,"body":{{"items":[{{"type":"text","text":"no image"}}]}}}},
            {{"version":1,"body":{{"items":[{{"type":"image","imageUrl":"{URL}","width":{{"type":"fixed","value":100}}}}]}}}}]}}]}}}}"#
    );
    let template = parse_str(&source).unwrap();
    let identity = TemplateIdentity::new("m-1", 1);
    let mut renderer = Renderer::default();
    renderer.render(identity.clone(), &template).unwrap();
    let carousel = renderer.tree().unwrap().find_path("body.items[0]").unwrap().id;
    let height_before = renderer.tree().unwrap().find(carousel).unwrap().frame.height;

    let requests = renderer.image_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].route.carousels, vec![(carousel, 1)]);

    let notified = renderer.apply_loaded_image(
        &identity,
        &requests[0].route,
        URL,
        Arc::new(RasterImage::blank(200, 100)),
    );
    assert!(notified);
    let height_after = renderer.tree().unwrap().find(carousel).unwrap().frame.height;
    assert!(height_after > height_before);
    assert!((height_after - 50.0).abs() < 0.01, "height {height_after}");
}

fn loader(source: MemoryImageSource) -> Arc<ImageLoader> {
    Arc::new(ImageLoader::new(
        Arc::new(source),
        Arc::new(MemoryImageStore::new()),
        Arc::new(ImageSizeCache::new()),
        Arc::new(RetryTracker::new()),
    ))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loader_delivers_on_main_queue() {
    let png = RasterImage::blank(200, 100).to_png().unwrap();
    let source = MemoryImageSource::new();
    source.insert(URL, png);
    let loader = loader(source);
    let queue = MainQueue::new();

    let identity = TemplateIdentity::new("m-1", 1);
    let mut renderer = Renderer::default().with_size_cache(Arc::clone(loader.sizes()));
    renderer.render(identity, &banner("")).unwrap();

    let events: Arc<Mutex<Vec<ImageEvent>>> = Arc::default();
    for request in renderer.image_requests() {
        let sink = Arc::clone(&events);
        loader.request(request, &tokio::runtime::Handle::current(), queue.clone(), move |event| {
            sink.lock().push(event);
        });
    }

    let delivered = tokio::time::timeout(Duration::from_secs(5), queue.run_next())
        .await
        .expect("completion should arrive");
    assert!(delivered);

    let pending: Vec<ImageEvent> = events.lock().drain(..).collect();
    assert_eq!(pending.len(), 1);
    for event in pending {
        assert!(renderer.handle_image_event(event));
    }
    assert!((image_height(&renderer) - 50.0).abs() < 0.01);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_prefetch_reports_once_with_failures() {
    let png = RasterImage::blank(4, 4).to_png().unwrap();
    let source = MemoryImageSource::new();
    source.insert("https://cdn.test/a.png", png);
    let loader = loader(source);
    let queue = MainQueue::new();

    let outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);
    loader.prefetch(
        vec![
            "https://cdn.test/a.png".to_string(),
            "https://cdn.test/missing.png".to_string(),
        ],
        PREFETCH_TIMEOUT,
        &tokio::runtime::Handle::current(),
        queue.clone(),
        move |result| {
            *sink.lock() = Some(result);
        },
    );

    tokio::time::timeout(Duration::from_secs(5), queue.run_next())
        .await
        .expect("prefetch should report");
    let outcome = outcome.lock().take().expect("reported");
    assert_eq!(outcome.loaded, 1);
    assert_eq!(outcome.failed, vec!["https://cdn.test/missing.png".to_string()]);
    assert!(!outcome.timed_out);
    assert!(!outcome.is_complete());
}
