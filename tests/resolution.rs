//! End-to-end interception flow against scripted collaborators.
//!
//! The transport, cookie store, and renderer are all fakes wired through the
//! public API, so these tests exercise the same orchestration a real pipeline
//! would: detection, cookie bookkeeping, renderer-driven resolution, replay.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, SERVER};
use http::{HeaderMap, Method};
use url::Url;

use clearance_rs::{
    ClearanceInterceptor, Cookie, CookieStore, EventSink, HttpRequest, HttpResponse,
    InterceptError, MemoryCookieStore, PageEvent, PageRenderer, RendererError, RendererFactory,
    RendererSettings, ResolveError, Transport, TransportError, CLEARANCE_COOKIE,
};

fn origin() -> Url {
    Url::parse("https://origin.example/").unwrap()
}

fn request() -> HttpRequest {
    HttpRequest::new(Method::GET, origin())
}

fn challenge_response(url: &Url) -> HttpResponse {
    let mut headers = HeaderMap::new();
    headers.insert(SERVER, HeaderValue::from_static("cloudflare"));
    HttpResponse {
        status: 503,
        headers,
        body: Bytes::from_static(b"<html>Checking your browser...</html>"),
        url: url.clone(),
    }
}

fn ok_response(url: &Url) -> HttpResponse {
    let mut headers = HeaderMap::new();
    headers.insert(SERVER, HeaderValue::from_static("cloudflare"));
    HttpResponse {
        status: 200,
        headers,
        body: Bytes::from_static(b"origin content"),
        url: url.clone(),
    }
}

/// Serves a fixed queue of responses.
struct StubTransport {
    responses: Mutex<Vec<HttpResponse>>,
    calls: AtomicUsize,
}

impl StubTransport {
    fn new(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| TransportError::Transport("no more stub responses".into()))
    }
}

/// Plays the origin: challenges every request until the store holds the
/// expected clearance value, then serves content.
struct GateTransport {
    cookies: Arc<MemoryCookieStore>,
    accept_value: &'static str,
    calls: AtomicUsize,
}

impl GateTransport {
    fn new(cookies: Arc<MemoryCookieStore>, accept_value: &'static str) -> Self {
        Self {
            cookies,
            accept_value,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for GateTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let cleared = self
            .cookies
            .get(&request.url)
            .iter()
            .any(|cookie| cookie.name == CLEARANCE_COOKIE && cookie.value == self.accept_value);
        if cleared {
            Ok(ok_response(&request.url))
        } else {
            Ok(challenge_response(&request.url))
        }
    }
}

/// Renderer that replays a canned event script on every load, optionally
/// writing a clearance cookie first, the way a real engine would as a side
/// effect of executing the challenge page.
struct ScriptedRenderer {
    sink: EventSink,
    script: Vec<PageEvent>,
    grant: Option<(Arc<MemoryCookieStore>, &'static str)>,
    live: Arc<AtomicUsize>,
}

impl PageRenderer for ScriptedRenderer {
    fn configure(&mut self, _settings: RendererSettings) -> Result<(), RendererError> {
        Ok(())
    }

    fn load(&mut self, url: &Url, _headers: &HashMap<String, String>) -> Result<(), RendererError> {
        if let Some((store, value)) = self.grant.take() {
            store.set(url, Cookie::new(CLEARANCE_COOKIE, value));
        }
        for event in self.script.drain(..) {
            self.sink.emit(event);
        }
        Ok(())
    }

    fn stop_loading(&mut self) {}

    fn destroy(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    fn is_outdated(&self) -> bool {
        false
    }
}

struct ScriptedFactory {
    script: Vec<PageEvent>,
    grant: Option<(Arc<MemoryCookieStore>, &'static str)>,
    created: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    fn new(script: Vec<PageEvent>, grant: Option<(Arc<MemoryCookieStore>, &'static str)>) -> Self {
        Self {
            script,
            grant,
            created: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

impl RendererFactory for ScriptedFactory {
    fn create(&self, events: EventSink) -> Result<Box<dyn PageRenderer>, RendererError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(ScriptedRenderer {
            sink: events,
            script: self.script.clone(),
            grant: self.grant.clone(),
            live: self.live.clone(),
        }))
    }
}

fn main_frame_503() -> PageEvent {
    PageEvent::MainFrameHttpError { status: 503 }
}

fn page_finished() -> PageEvent {
    PageEvent::PageFinished { url: origin() }
}

#[tokio::test]
async fn passes_through_non_challenge_responses() {
    let store = Arc::new(MemoryCookieStore::new());
    let transport = Arc::new(StubTransport::new(vec![ok_response(&origin())]));
    let factory = Arc::new(ScriptedFactory::new(Vec::new(), None));

    let interceptor = ClearanceInterceptor::new(transport.clone(), store, factory.clone());
    let response = interceptor.intercept(request()).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.calls(), 1);
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn solves_challenge_and_replays_original_request() {
    let store = Arc::new(MemoryCookieStore::new());
    store.set(&origin(), Cookie::new(CLEARANCE_COOKIE, "A"));

    let transport = Arc::new(GateTransport::new(store.clone(), "B"));
    let factory = Arc::new(ScriptedFactory::new(
        vec![main_frame_503(), page_finished()],
        Some((store.clone(), "B")),
    ));

    let interceptor =
        ClearanceInterceptor::new(transport.clone(), store.clone(), factory.clone());
    let response = interceptor.intercept(request()).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, Bytes::from_static(b"origin content"));
    assert_eq!(transport.calls(), 2);
    assert_eq!(
        store
            .get(&origin())
            .into_iter()
            .find(|cookie| cookie.name == CLEARANCE_COOKIE),
        Some(Cookie::new(CLEARANCE_COOKIE, "B"))
    );
    assert_eq!(factory.created(), 1);
    assert_eq!(factory.live(), 0, "renderer instance leaked");
}

#[tokio::test]
async fn fails_fast_when_challenge_never_confirmed() {
    let store = Arc::new(MemoryCookieStore::new());
    let transport = Arc::new(GateTransport::new(store.clone(), "B"));
    let factory = Arc::new(ScriptedFactory::new(vec![page_finished()], None));

    let interceptor = ClearanceInterceptor::builder(transport.clone(), store, factory)
        .with_resolve_timeout(Duration::from_secs(10))
        .build();

    let started = Instant::now();
    let err = interceptor.intercept(request()).await.unwrap_err();

    assert!(matches!(
        err,
        InterceptError::Resolution(ResolveError::ChallengeNotFound)
    ));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "negative detection should not wait for the timeout"
    );
    assert_eq!(transport.calls(), 1, "failed resolution must not replay");
}

#[tokio::test]
async fn times_out_when_renderer_stays_silent() {
    let store = Arc::new(MemoryCookieStore::new());
    let transport = Arc::new(GateTransport::new(store.clone(), "B"));
    let factory = Arc::new(ScriptedFactory::new(Vec::new(), None));

    let interceptor = ClearanceInterceptor::builder(transport, store, factory.clone())
        .with_resolve_timeout(Duration::from_millis(200))
        .build();

    let started = Instant::now();
    let err = interceptor.intercept(request()).await.unwrap_err();

    assert!(matches!(
        err,
        InterceptError::Resolution(ResolveError::ResolutionFailed { .. })
    ));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(factory.live(), 0, "renderer instance leaked after timeout");
}

#[tokio::test]
async fn serializes_concurrent_resolutions() {
    let store = Arc::new(MemoryCookieStore::new());
    let transport = Arc::new(GateTransport::new(store.clone(), "B"));
    let factory = Arc::new(ScriptedFactory::new(
        vec![main_frame_503(), page_finished()],
        Some((store.clone(), "B")),
    ));

    let interceptor = Arc::new(ClearanceInterceptor::new(
        transport,
        store,
        factory.clone(),
    ));

    let (first, second) = tokio::join!(
        interceptor.intercept(request()),
        interceptor.intercept(request())
    );

    assert_eq!(first.unwrap().status, 200);
    assert_eq!(second.unwrap().status, 200);
    assert!(factory.created() >= 1);
    assert_eq!(factory.max_live(), 1, "two renderer instances were live at once");
    assert_eq!(factory.live(), 0);
}
