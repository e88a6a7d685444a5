//! End-to-end popup lifecycle tests against an in-memory document.

use anyhow::{anyhow, Error};
use dom::{Document, NodeId, Selector};
use futures::future::BoxFuture;
use popup_handler::config::{Animation, PopupConfig, PopupOverrides};
use popup_handler::hooks::LifecyclePoint;
use popup_handler::loader::{ContentActivator, FetchCoalescer, FragmentFetcher, NoopActivator};
use popup_handler::scroll::SCROLL_LOCK_CLASS;
use popup_handler::state::{OverlayState, PopupEngine};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant, sleep};

struct StubFetcher {
    pages: HashMap<String, String>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    /// Fail this many fetches before starting to succeed.
    fail_first: usize,
}

impl StubFetcher {
    fn new(pages: &[(&str, &str)]) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Arc::new(Self {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.to_string()))
                .collect(),
            calls: Arc::clone(&calls),
            delay: None,
            fail_first: 0,
        });
        (fetcher, calls)
    }
}

impl FragmentFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<String, Error>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = call < self.fail_first;
        let page = self.pages.get(url).cloned();
        let delay = self.delay;
        let url = url.to_string();
        Box::pin(async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            if failing {
                return Err(anyhow!("transient failure fetching {url}"));
            }
            page.ok_or_else(|| anyhow!("no page at {url}"))
        })
    }
}

struct CountingActivator {
    activations: Arc<AtomicUsize>,
}

impl ContentActivator for CountingActivator {
    fn activate<'a>(
        &'a mut self,
        _doc: &'a mut Document,
        _root: NodeId,
    ) -> BoxFuture<'a, Result<(), Error>> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

fn host_document() -> Document {
    let _ = env_logger::builder().is_test(true).try_init();
    Document::from_html("<html><body><main>host page</main></body></html>").expect("host parse")
}

fn fast_config() -> PopupConfig {
    PopupConfig {
        open_animation: Animation::None,
        ..PopupConfig::default()
    }
}

fn engine(pages: &[(&str, &str)]) -> (PopupEngine, Arc<AtomicUsize>) {
    let (fetcher, calls) = StubFetcher::new(pages);
    let engine = PopupEngine::new(host_document(), fast_config(), fetcher, Box::new(NoopActivator))
        .expect("engine init");
    (engine, calls)
}

const PROMO_PAGE: &str = concat!(
    "<html><body><div id=\"sections\">",
    "<p>before</p>",
    "<div id=\"promo\">limited offer</div>",
    "<p>after</p>",
    "</div></body></html>",
);

#[tokio::test(start_paused = true)]
async fn fetch_and_activation_run_once_per_url() {
    let (fetcher, calls) = StubFetcher::new(&[("/promo", PROMO_PAGE)]);
    let activations = Arc::new(AtomicUsize::new(0));
    let activator = Box::new(CountingActivator {
        activations: Arc::clone(&activations),
    });
    let mut engine =
        PopupEngine::new(host_document(), fast_config(), fetcher, activator).expect("engine init");

    for _ in 0..3 {
        assert!(engine.open("/promo", Some("#promo")).await.expect("open"));
        assert!(engine.close().await);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(activations.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn locator_content_returns_to_original_position() {
    let (mut engine, _) = engine(&[("/promo", PROMO_PAGE)]);

    engine.open("/promo", Some("#promo")).await.expect("open");
    let promo = Selector::Id(String::from("promo"))
        .find_first(engine.document(), engine.content_region())
        .expect("promo in overlay");

    engine.close().await;
    let fragment = engine.cached_fragment("/promo").expect("cached fragment");
    let promo_after = Selector::Id(String::from("promo"))
        .find_first(engine.document(), fragment)
        .expect("promo restored");
    assert_eq!(promo, promo_after);
    assert_eq!(engine.document().child_index(promo_after), Some(1));
    assert_eq!(engine.document().child_count(fragment), 3);
}

#[tokio::test(start_paused = true)]
async fn second_open_replaces_the_first_session() {
    let (mut engine, _) = engine(&[
        ("/one", "<html><body><p>first</p></body></html>"),
        ("/two", "<html><body><p>second</p></body></html>"),
    ]);

    engine.open("/one", None).await.expect("open one");
    engine.open("/two", None).await.expect("open two");
    assert_eq!(engine.state(), OverlayState::ContentVisible);
    assert_eq!(engine.session().map(|s| s.url.as_str()), Some("/two"));
    assert_eq!(
        engine.document().attr(engine.overlay(), "data-popup-id"),
        Some("/two")
    );
    let text = engine.document().text_content(engine.content_region());
    assert!(text.contains("second"));
    assert!(!text.contains("first"));
}

#[tokio::test(start_paused = true)]
async fn failure_is_surfaced_and_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = Arc::new(StubFetcher {
        pages: HashMap::from([(
            String::from("/flaky"),
            String::from("<html><body><p>recovered</p></body></html>"),
        )]),
        calls: Arc::clone(&calls),
        delay: None,
        fail_first: 1,
    });
    let mut engine =
        PopupEngine::new(host_document(), fast_config(), fetcher, Box::new(NoopActivator))
            .expect("engine init");

    engine.open("/flaky", None).await.expect("first open");
    let text = engine.document().text_content(engine.content_region());
    assert!(text.contains("Error Loading Content"));
    assert!(text.contains("URL: /flaky"));
    assert!(!engine.is_cached("/flaky"));
    let snapshot = engine.document().to_json_string();
    assert!(snapshot.contains("wm-popup-error"));
    engine.close().await;

    engine.open("/flaky", None).await.expect("second open");
    let text = engine.document().text_content(engine.content_region());
    assert!(text.contains("recovered"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(engine.is_cached("/flaky"));
}

#[tokio::test(start_paused = true)]
async fn fade_animation_runs_through_open_and_close() {
    let (fetcher, _) = StubFetcher::new(&[("/page", "<html><body><p>faded</p></body></html>")]);
    // default config keeps the 300ms fade
    let mut engine = PopupEngine::new(
        host_document(),
        PopupConfig::default(),
        fetcher,
        Box::new(NoopActivator),
    )
    .expect("engine init");

    engine.open("/page", None).await.expect("open");
    let doc = engine.document();
    assert_eq!(doc.style(engine.container(), "opacity"), Some("1"));
    assert_eq!(
        doc.style(engine.container(), "transition"),
        Some("opacity 300ms")
    );

    let before_close = Instant::now();
    assert!(engine.close().await);
    // the close fade holds the overlay for the configured duration
    assert!(before_close.elapsed() >= Duration::from_millis(300));
    let doc = engine.document();
    assert_eq!(doc.style(engine.overlay(), "display"), Some("none"));
    assert_eq!(doc.style(engine.overlay(), "opacity"), None);
    assert_eq!(doc.style(engine.container(), "opacity"), None);
    assert_eq!(doc.style(engine.container(), "transition"), None);
}

#[tokio::test(start_paused = true)]
async fn scroll_offset_survives_a_full_cycle() {
    let (mut engine, _) = engine(&[("/page", "<html><body><p>content</p></body></html>")]);
    engine.viewport_mut().scroll_y = 420.0;
    engine.viewport_mut().scroll_behavior = String::from("smooth");

    engine.open("/page", None).await.expect("open");
    let body = engine.body();
    assert!(engine.document().has_class(body, SCROLL_LOCK_CLASS));
    assert_eq!(engine.document().style(body, "top"), Some("-420px"));
    assert_eq!(engine.document().style(body, "position"), Some("fixed"));
    assert_eq!(engine.viewport().scroll_behavior, "auto");

    engine.close().await;
    assert!(!engine.document().has_class(body, SCROLL_LOCK_CLASS));
    assert_eq!(engine.document().style(body, "top"), None);
    assert!((engine.viewport().scroll_y - 420.0).abs() < f64::EPSILON);
    assert_eq!(engine.viewport().scroll_behavior, "smooth");
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_of_one_url_share_a_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher: Arc<dyn FragmentFetcher> = Arc::new(StubFetcher {
        pages: HashMap::from([
            (String::from("/a"), String::from("<p>a</p>")),
            (String::from("/b"), String::from("<p>b</p>")),
        ]),
        calls: Arc::clone(&calls),
        delay: Some(Duration::from_millis(20)),
        fail_first: 0,
    });
    let coalescer = FetchCoalescer::default();

    let (first, second) = tokio::join!(
        coalescer.fetch(&fetcher, "/a"),
        coalescer.fetch(&fetcher, "/a"),
    );
    assert_eq!(first.expect("first").as_ref(), "<p>a</p>");
    assert_eq!(second.expect("second").as_ref(), "<p>a</p>");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    coalescer.fetch(&fetcher, "/b").await.expect("other url");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn coalesced_failure_is_not_sticky() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher: Arc<dyn FragmentFetcher> = Arc::new(StubFetcher {
        pages: HashMap::from([(String::from("/a"), String::from("<p>a</p>"))]),
        calls: Arc::clone(&calls),
        delay: None,
        fail_first: 1,
    });
    let coalescer = FetchCoalescer::default();

    assert!(coalescer.fetch(&fetcher, "/a").await.is_err());
    assert!(coalescer.fetch(&fetcher, "/a").await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_listeners_fire_in_order_and_survive_failures() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut overrides = PopupOverrides::default();
    for point in LifecyclePoint::ALL {
        let l = Arc::clone(&log);
        overrides.hooks.on(point, move |_| {
            l.lock().expect("log lock").push(point.hook_name());
            Ok(())
        });
    }
    overrides.hooks.on(LifecyclePoint::BeforeOpen, |_| Err(anyhow!("flaky hook")));
    let l = Arc::clone(&log);
    overrides
        .hooks
        .on_notification(LifecyclePoint::AfterOpen, move |note| {
            l.lock().expect("log lock").push(note.name);
            assert_eq!(note.url.as_deref(), Some("/page"));
            true
        });
    overrides.open_animation = Some(Animation::None);
    let config = PopupConfig::resolve(overrides);

    let (fetcher, _) = StubFetcher::new(&[("/page", "<html><body><p>x</p></body></html>")]);
    let mut engine = PopupEngine::new(host_document(), config, fetcher, Box::new(NoopActivator))
        .expect("engine init");
    engine.open("/page", None).await.expect("open");
    engine.close().await;

    assert_eq!(
        *log.lock().expect("log lock"),
        vec![
            "beforeInit",
            "afterInit",
            "beforeOpenPopup",
            "afterOpenPopup",
            "wmPopup:afterOpenPopup",
            "beforeClosePopup",
            "afterClosePopup",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn lone_video_block_is_unmuted_and_autoplayed() {
    let page = concat!(
        "<html><body><div id=\"sections\">",
        "<div class=\"sqs-block-video\" data-block-json='{\"settings\":{\"autoPlay\":true}}'>",
        "<video src=\"clip.mp4\"></video>",
        "</div></div></body></html>",
    );
    let (mut engine, _) = engine(&[("/video", page)]);

    engine.open("/video", None).await.expect("open");
    let video = engine
        .document()
        .find_by_tag(engine.content_region(), "video")
        .expect("video in overlay");
    assert_eq!(engine.document().attr(video, "muted"), Some("false"));
    assert_eq!(engine.document().attr(video, "data-playing"), Some("true"));
}

#[tokio::test(start_paused = true)]
async fn multi_block_content_is_not_autoplayed() {
    let page = concat!(
        "<html><body><div id=\"sections\">",
        "<div class=\"sqs-block-video\" data-block-json='{\"settings\":{\"autoPlay\":true}}'>",
        "<video src=\"clip.mp4\"></video>",
        "</div>",
        "<p>caption</p>",
        "</div></body></html>",
    );
    let (mut engine, _) = engine(&[("/video", page)]);

    engine.open("/video", None).await.expect("open");
    let video = engine
        .document()
        .find_by_tag(engine.content_region(), "video")
        .expect("video in overlay");
    assert_eq!(engine.document().attr(video, "muted"), None);
    assert_eq!(engine.document().attr(video, "data-playing"), None);
}
