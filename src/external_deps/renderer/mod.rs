//! Rendering collaborator.
//!
//! The resolver needs one narrow capability from the host: load a URL with
//! given headers and user-agent, execute whatever the page embeds, and report
//! main-frame lifecycle and error events. Real engines (a WebView, a CDP
//! session, an embedded browser) stay behind these traits so the resolution
//! state machine remains portable and testable with scripted fakes.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

/// Fallback user-agent applied when the intercepted request carries none.
/// Initialized at most once per process, off any caller's critical path.
static DEFAULT_USER_AGENT: Lazy<String> = Lazy::new(|| {
    format!(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/126.0.0.0 Safari/537.36 clearance-rs/{}",
        env!("CARGO_PKG_VERSION")
    )
});

/// Process-wide default user-agent string.
pub fn default_user_agent() -> &'static str {
    &DEFAULT_USER_AGENT
}

/// Lifecycle events a renderer reports while loading a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A navigation finished loading. Fired once per navigation, so redirects
    /// and challenge-script reloads produce several of these.
    PageFinished { url: Url },
    /// The main navigation frame received an HTTP error status.
    MainFrameHttpError { status: u16 },
    /// The main navigation frame failed with an engine error code.
    MainFrameError { code: i32 },
}

/// Sending half handed to the renderer at construction. Events are drained on
/// the driver task that owns the renderer instance.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PageEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<PageEvent>) -> Self {
        Self { tx }
    }

    /// Report an event. Delivery is best-effort: once the resolution attempt
    /// is over the receiving side is gone and reports are dropped.
    pub fn emit(&self, event: PageEvent) {
        let _ = self.tx.send(event);
    }
}

/// Settings applied before the first load.
#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub javascript_enabled: bool,
    pub user_agent: String,
}

/// Errors surfaced by renderer implementations.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("renderer construction failed: {0}")]
    Construction(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
}

/// One renderer instance.
///
/// Every call happens on the single driver task that owns the instance;
/// implementations may assume serialized access. Events go out through the
/// [`EventSink`] received at construction.
pub trait PageRenderer: Send {
    /// Apply settings before the first load.
    fn configure(&mut self, settings: RendererSettings) -> Result<(), RendererError>;

    /// Start loading `url` with the given headers. Returns once the
    /// navigation is started; completion arrives as [`PageEvent`]s.
    fn load(&mut self, url: &Url, headers: &HashMap<String, String>) -> Result<(), RendererError>;

    /// Abort any in-flight navigation.
    fn stop_loading(&mut self);

    /// Release the instance. No events may be emitted afterwards.
    fn destroy(&mut self);

    /// Whether the engine looks too old to run current challenge scripts.
    fn is_outdated(&self) -> bool;
}

/// Creates renderer instances on demand, one per resolution attempt.
pub trait RendererFactory: Send + Sync {
    fn create(&self, events: EventSink) -> Result<Box<dyn PageRenderer>, RendererError>;
}
