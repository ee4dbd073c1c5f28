//! High level interception orchestration.
//!
//! Wires together the challenge heuristic, the cookie store, and the resolver
//! into a single `intercept` entry point a client pipeline calls around its
//! transport. The common case is a straight pass-through; on a detected
//! interstitial the interceptor clears stale bypass cookies, lets the
//! resolver drive the rendering collaborator, and replays the original
//! request once a fresh clearance cookie exists.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::Method;
use http::header::SERVER;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

use crate::challenges::core::transport::{Transport, TransportError};
use crate::challenges::core::types::{HttpRequest, HttpResponse};
use crate::challenges::detector::{self, CLEARANCE_COOKIE, COOKIE_NAMES};
use crate::challenges::resolver::{ChallengeResolver, RESOLVE_TIMEOUT, ResolveError};
use crate::external_deps::cookies::CookieStore;
use crate::external_deps::renderer::RendererFactory;
use crate::modules::events::{
    ChallengeDetectedEvent, ChallengeResolvedEvent, EventDispatcher, EventHandler, InterceptEvent,
    LoggingHandler, ResolutionFailedEvent,
};

/// Result alias used across the interception layer.
pub type InterceptResult<T> = Result<T, InterceptError>;

/// High-level error surfaced by the interceptor.
///
/// Everything internal is recovered into this type; nothing escapes as a raw
/// resolver or renderer fault.
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("http error: {0}")]
    Transport(#[from] TransportError),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("cloudflare bypass failed: {0}")]
    Resolution(#[from] ResolveError),
}

/// Callers with exception-style I/O error channels can classify every
/// interception failure as an I/O fault.
impl From<InterceptError> for std::io::Error {
    fn from(err: InterceptError) -> Self {
        std::io::Error::other(err)
    }
}

/// Interceptor configuration used by the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptorConfig {
    /// Bound on how long a single resolution may hold the calling request.
    pub resolve_timeout: Duration,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: RESOLVE_TIMEOUT,
        }
    }
}

/// Fluent builder for [`ClearanceInterceptor`].
pub struct InterceptorBuilder {
    transport: Arc<dyn Transport>,
    cookies: Arc<dyn CookieStore>,
    renderer: Arc<dyn RendererFactory>,
    config: InterceptorConfig,
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl InterceptorBuilder {
    pub fn new(
        transport: Arc<dyn Transport>,
        cookies: Arc<dyn CookieStore>,
        renderer: Arc<dyn RendererFactory>,
    ) -> Self {
        Self {
            transport,
            cookies,
            renderer,
            config: InterceptorConfig::default(),
            handlers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: InterceptorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolve_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.config.resolve_timeout = resolve_timeout;
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> ClearanceInterceptor {
        let mut events = EventDispatcher::new();
        events.register_handler(Arc::new(LoggingHandler));
        for handler in self.handlers {
            events.register_handler(handler);
        }

        let resolver = ChallengeResolver::new(self.renderer, self.cookies.clone())
            .with_timeout(self.config.resolve_timeout);

        ClearanceInterceptor {
            transport: self.transport,
            cookies: self.cookies,
            resolver,
            events,
            resolve_gate: Mutex::new(()),
        }
    }
}

/// Intercepts responses from a client pipeline and transparently resolves
/// Cloudflare interstitials before replaying the original request.
///
/// Construct one interceptor per pipeline and share it; the resolution gate
/// is per-instance, and two instances would race on the shared cookie store.
pub struct ClearanceInterceptor {
    transport: Arc<dyn Transport>,
    cookies: Arc<dyn CookieStore>,
    resolver: ChallengeResolver,
    events: EventDispatcher,
    /// Serializes every detect-and-resolve sequence. Concurrent renderer
    /// instances would contend on the cookie store and starve each other.
    resolve_gate: Mutex<()>,
}

impl ClearanceInterceptor {
    /// Construct an interceptor with default configuration.
    pub fn new(
        transport: Arc<dyn Transport>,
        cookies: Arc<dyn CookieStore>,
        renderer: Arc<dyn RendererFactory>,
    ) -> Self {
        Self::builder(transport, cookies, renderer).build()
    }

    /// Obtain a builder to customise the interceptor.
    pub fn builder(
        transport: Arc<dyn Transport>,
        cookies: Arc<dyn CookieStore>,
        renderer: Arc<dyn RendererFactory>,
    ) -> InterceptorBuilder {
        InterceptorBuilder::new(transport, cookies, renderer)
    }

    /// Perform an HTTP GET request through the interceptor.
    pub async fn get(&self, url: &str) -> InterceptResult<HttpResponse> {
        let url = Url::parse(url)?;
        self.intercept(HttpRequest::new(Method::GET, url)).await
    }

    /// Forward `request`, resolving a Cloudflare interstitial if one comes
    /// back, and return the final response.
    pub async fn intercept(&self, request: HttpRequest) -> InterceptResult<HttpResponse> {
        let response = self.transport.send(&request).await?;

        // Check if Cloudflare anti-bot is on
        if !detector::is_challenge(&response) {
            return Ok(response);
        }

        // Only one resolution runs at a time; later arrivals wait here and
        // then attempt their own resolution against the refreshed store.
        let _gate = self.resolve_gate.lock().await;

        let server = response.header(SERVER.as_str()).unwrap_or_default().to_string();
        self.events
            .dispatch(InterceptEvent::ChallengeDetected(ChallengeDetectedEvent {
                url: request.url.clone(),
                server,
                timestamp: Utc::now(),
            }));

        drop(response);

        // Force the renderer to re-derive the bypass cookies, then snapshot
        // whatever clearance value is still visible for the identity check.
        self.cookies.remove(&request.url, &COOKIE_NAMES);
        let old_cookie = self
            .cookies
            .get(&request.url)
            .into_iter()
            .find(|cookie| cookie.name == CLEARANCE_COOKIE);

        match self.resolver.resolve(&request, old_cookie).await {
            Ok(()) => {
                self.events
                    .dispatch(InterceptEvent::ChallengeResolved(ChallengeResolvedEvent {
                        url: request.url.clone(),
                        timestamp: Utc::now(),
                    }));
                Ok(self.transport.send(&request).await?)
            }
            Err(err) => {
                self.events
                    .dispatch(InterceptEvent::ResolutionFailed(ResolutionFailedEvent {
                        url: request.url.clone(),
                        error: err.to_string(),
                        timestamp: Utc::now(),
                    }));
                Err(InterceptError::Resolution(err))
            }
        }
    }
}
