//! Wiremock integration tests for the media pipeline.
//!
//! Drives `MediaPipeline::process()` against mock origins serving HTML
//! pages and images, checking the produced artifact, cache population,
//! and TTL selection.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use mediaserver_client::{FetchClient, FetchConfig, MediaPipeline, RenderConfig, ThumbnailRenderer};
use mediaserver_core::cache::normalize_key;
use mediaserver_core::{Artifact, ArtifactStore, Bounds, CacheDb, Error, TtlPolicy};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POSITIVE: Duration = Duration::from_secs(3600);
const NEGATIVE: Duration = Duration::from_secs(30);

fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn png(width: u32, height: u32) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(image_bytes(width, height, ImageFormat::Png), "image/png")
}

/// Strip the scheme the way inbound targets arrive.
fn target(server: &MockServer, p: &str) -> String {
    format!("{}{}", server.uri().trim_start_matches("http://"), p)
}

fn fetch_client(max_bytes: usize) -> FetchClient {
    FetchClient::new(FetchConfig {
        allow_private_networks: true,
        max_bytes,
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

fn pipeline_with(store: Arc<dyn ArtifactStore>) -> MediaPipeline {
    MediaPipeline::new(
        fetch_client(1024 * 1024),
        ThumbnailRenderer::new(RenderConfig::default()),
        store,
        TtlPolicy { positive: POSITIVE, negative: NEGATIVE },
    )
}

/// In-memory store that records the TTL of every write.
#[derive(Default)]
struct RecordingStore {
    entries: Mutex<HashMap<String, (Artifact, Duration)>>,
}

impl RecordingStore {
    fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<Artifact>, Error> {
        Ok(self.entries.lock().unwrap().get(key).map(|(a, _)| a.clone()))
    }

    async fn put(&self, key: &str, artifact: &Artifact, ttl: Duration) -> Result<bool, Error> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (artifact.clone(), ttl));
        Ok(true)
    }
}

/// Store whose every operation fails.
struct BrokenStore;

#[async_trait]
impl ArtifactStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Artifact>, Error> {
        Err(Error::CorruptEntry("unreadable".into()))
    }

    async fn put(&self, _key: &str, _artifact: &Artifact, _ttl: Duration) -> Result<bool, Error> {
        Err(Error::MigrationFailed("read-only".into()))
    }
}

#[tokio::test]
async fn html_page_with_og_image_produces_page_artifact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html(
            r#"<html><head><meta property="og:title" content="Example"><meta property="og:image" content="/img.png"></head><body></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .and(header("accept", "image/*"))
        .respond_with(png(600, 300))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::default());
    let pipeline = pipeline_with(store.clone());
    let target = target(&server, "/page");

    let artifact = pipeline.process(&target).await.unwrap();
    let Artifact::Page { site, thumbnail } = &artifact else {
        panic!("expected page artifact, got {artifact:?}");
    };
    assert_eq!(site.title, "Example");
    assert_eq!(site.canonical_url, format!("{}/page", server.uri()));
    assert_eq!(site.image_candidates, vec![format!("{}/img.png", server.uri())]);
    assert_eq!(thumbnail.mime, "image/jpeg");
    assert_eq!(thumbnail.bounds, Bounds { width: 256, height: 128 });

    assert_eq!(store.ttl(&normalize_key(&target)), Some(POSITIVE));
}

#[tokio::test]
async fn image_body_is_rendered_directly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.jpg"))
        .and(header("accept", "*/*"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(image_bytes(100, 400, ImageFormat::Jpeg), "image/jpeg"),
        )
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::default());
    let artifact = pipeline_with(store.clone()).process(&target(&server, "/photo.jpg")).await.unwrap();

    let Artifact::Image { thumbnail } = artifact else {
        panic!("expected image artifact");
    };
    assert_eq!(thumbnail.bounds, Bounds { width: 64, height: 256 });
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn text_plain_image_candidate_yields_no_thumbnail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<head><title>Plain</title><meta property="og:image" content="/not-an-image"></head>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/not-an-image"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::default());
    let target = target(&server, "/");
    let artifact = pipeline_with(store.clone()).process(&target).await.unwrap();

    let Artifact::Unavailable { site, reason } = artifact else {
        panic!("expected unavailable artifact");
    };
    assert_eq!(site.unwrap().title, "Plain");
    assert!(reason.starts_with("UNSUPPORTED_CONTENT"), "{reason}");
    assert_eq!(store.ttl(&normalize_key(&target)), Some(NEGATIVE));
}

#[tokio::test]
async fn page_without_images_is_cached_briefly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bare"))
        .respond_with(html("<html><head><title>Nothing to see</title></head><body><p>text</p></body></html>"))
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::default());
    let target = target(&server, "/bare");
    let artifact = pipeline_with(store.clone()).process(&target).await.unwrap();

    assert!(matches!(&artifact, Artifact::Unavailable { reason, .. } if reason == "no image candidates"));
    assert_eq!(artifact.site().map(|s| s.title.as_str()), Some("Nothing to see"));
    assert_eq!(store.ttl(&normalize_key(&target)), Some(NEGATIVE));
}

#[tokio::test]
async fn failing_candidate_falls_through_to_next() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(html(
            r#"<head><title>Two images</title><meta property="og:image" content="/missing.png">
               <meta property="og:image" content="/second.png"></head><body></body>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/second.png"))
        .respond_with(png(50, 50))
        .mount(&server)
        .await;

    let artifact = pipeline_with(Arc::new(RecordingStore::default()))
        .process(&target(&server, "/article"))
        .await
        .unwrap();

    let Artifact::Page { site, thumbnail } = artifact else {
        panic!("expected page artifact");
    };
    assert_eq!(site.image_candidates.len(), 2);
    assert_eq!(thumbnail.bounds, Bounds { width: 50, height: 50 });
}

#[tokio::test]
async fn cache_hit_skips_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/once.png"))
        .respond_with(png(10, 10))
        .expect(1)
        .mount(&server)
        .await;

    let db = CacheDb::open_in_memory().await.unwrap();
    let pipeline = pipeline_with(Arc::new(db));
    let target = target(&server, "/once.png");

    let first = pipeline.process(&target).await.unwrap();
    let second = pipeline.process(&format!("{target}/")).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn origin_error_is_returned_and_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::default());
    let result = pipeline_with(store.clone()).process(&target(&server, "/down")).await;

    assert!(matches!(result, Err(Error::HttpError(_))));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn undecodable_body_is_unsupported_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("just some text"))
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::default());
    let result = pipeline_with(store.clone()).process(&target(&server, "/notes.txt")).await;

    assert!(matches!(result, Err(Error::DecodeFailed(_))));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge.png"))
        .respond_with(png(300, 300))
        .mount(&server)
        .await;

    let pipeline = MediaPipeline::new(
        fetch_client(16),
        ThumbnailRenderer::default(),
        Arc::new(RecordingStore::default()),
        TtlPolicy::default(),
    );
    let result = pipeline.process(&target(&server, "/huge.png")).await;
    assert!(matches!(result, Err(Error::FetchTooLarge(_))));
}

#[tokio::test]
async fn broken_store_does_not_fail_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(png(20, 20))
        .mount(&server)
        .await;

    let artifact = pipeline_with(Arc::new(BrokenStore)).process(&target(&server, "/img.png")).await.unwrap();
    assert!(artifact.has_thumbnail());
}

#[tokio::test]
async fn relative_images_resolve_against_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/blog/post"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(html(r#"<title>Moved</title><body><img src="cover.png"></body>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog/cover.png"))
        .respond_with(png(30, 20))
        .mount(&server)
        .await;

    let artifact = pipeline_with(Arc::new(RecordingStore::default()))
        .process(&target(&server, "/old"))
        .await
        .unwrap();

    let Artifact::Page { site, .. } = artifact else {
        panic!("expected page artifact");
    };
    assert_eq!(site.image_candidates, vec![format!("{}/blog/cover.png", server.uri())]);
}

#[tokio::test]
async fn invalid_target_is_rejected() {
    let pipeline = pipeline_with(Arc::new(RecordingStore::default()));
    let result = pipeline.process("ftp://example.com/file").await;
    assert!(matches!(result, Err(Error::InvalidUrl(_))));
}

#[tokio::test]
async fn redirect_chain_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .expect(6)
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::default());
    let result = pipeline_with(store.clone()).process(&target(&server, "/loop")).await;
    assert!(matches!(&result, Err(Error::HttpError(m)) if m.contains("too many redirects")), "{result:?}");
    assert_eq!(store.len(), 0);
}
