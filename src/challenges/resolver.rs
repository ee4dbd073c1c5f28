//! Challenge resolution.
//!
//! Bridges the event-driven rendering collaborator to an awaiting caller. A
//! dedicated driver task owns the renderer instance for the whole attempt:
//! construction, configuration, navigation, event handling, and teardown all
//! happen there, because renderer engines do not tolerate concurrent access.
//! The caller waits on the session's single-shot signal with a bounded
//! timeout and always queues a teardown afterwards, so a timed-out attempt
//! never leaks a renderer instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http::header::USER_AGENT;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::challenges::core::types::HttpRequest;
use crate::challenges::detector::CLEARANCE_COOKIE;
use crate::challenges::session::{ChallengeSession, SessionOutcome};
use crate::external_deps::cookies::{Cookie, CookieStore};
use crate::external_deps::renderer::{
    EventSink, PageEvent, PageRenderer, RendererError, RendererFactory, RendererSettings,
    default_user_agent,
};

/// Wait bound for one resolution attempt. Challenge scripts usually finish in
/// four or five seconds; slow networks and origin hiccups need headroom.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(12);

/// Failure states for one resolution attempt.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no cloudflare challenge found on the rendered page")]
    ChallengeNotFound,
    #[error(
        "failed to obtain a clearance cookie before the wait expired{}",
        outdated_hint(*.renderer_outdated)
    )]
    ResolutionFailed { renderer_outdated: bool },
    #[error("renderer error: {0}")]
    Renderer(#[from] RendererError),
}

fn outdated_hint(renderer_outdated: bool) -> &'static str {
    if renderer_outdated {
        "; the renderer engine looks too outdated to run the challenge script"
    } else {
        ""
    }
}

impl ResolveError {
    /// Diagnostic hint: the renderer judged its own engine too old to execute
    /// the challenge script.
    pub fn renderer_outdated(&self) -> bool {
        matches!(
            self,
            ResolveError::ResolutionFailed {
                renderer_outdated: true
            }
        )
    }
}

/// Commands queued onto the driver task. Teardown travels this way so it runs
/// on the renderer's own context even after the caller stopped waiting.
enum DriverCommand {
    Shutdown {
        reply: oneshot::Sender<TeardownReport>,
    },
}

struct TeardownReport {
    renderer_outdated: bool,
}

/// Drives the rendering collaborator through one bounded resolution attempt.
pub struct ChallengeResolver {
    factory: Arc<dyn RendererFactory>,
    cookies: Arc<dyn CookieStore>,
    resolve_timeout: Duration,
}

impl ChallengeResolver {
    pub fn new(factory: Arc<dyn RendererFactory>, cookies: Arc<dyn CookieStore>) -> Self {
        Self {
            factory,
            cookies,
            resolve_timeout: RESOLVE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self
    }

    /// Resolve a detected challenge for `request`.
    ///
    /// `old_cookie` is the clearance snapshot taken after the stale bypass
    /// cookies were removed; bypass means a cookie comparing unequal to it
    /// appears in the store. Success leaves the new credential in the cookie
    /// store; the caller is expected to replay the original request itself.
    pub async fn resolve(
        &self,
        request: &HttpRequest,
        old_cookie: Option<Cookie>,
    ) -> Result<(), ResolveError> {
        let (session, done) = ChallengeSession::new(request.url.clone(), old_cookie);
        let session = Arc::new(session);

        let settings = RendererSettings {
            javascript_enabled: true,
            user_agent: request
                .header(USER_AGENT.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| default_user_agent().to_string()),
        };
        // A renderer does not inherit transport headers; forward them verbatim.
        let headers = request.header_map();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        tokio::spawn(drive_renderer(
            self.factory.clone(),
            self.cookies.clone(),
            session.clone(),
            settings,
            headers,
            EventSink::new(event_tx),
            event_rx,
            cmd_rx,
        ));

        let outcome = timeout(self.resolve_timeout, done).await;

        // Teardown always runs on the renderer's context; a timed-out wait
        // queues it behind whatever events are still in flight.
        let (report_tx, report_rx) = oneshot::channel();
        let _ = cmd_tx.send(DriverCommand::Shutdown { reply: report_tx });
        let report = report_rx.await.unwrap_or(TeardownReport {
            renderer_outdated: false,
        });

        // A bypass recorded concurrently with the timeout still counts.
        if session.bypassed() {
            log::debug!("cloudflare challenge bypassed for {}", session.origin());
            return Ok(());
        }

        match outcome {
            Ok(Ok(SessionOutcome::RendererFailure(err))) => Err(ResolveError::Renderer(err)),
            Ok(Ok(SessionOutcome::NegativeDetection)) => Err(ResolveError::ChallengeNotFound),
            _ => Err(ResolveError::ResolutionFailed {
                renderer_outdated: report.renderer_outdated,
            }),
        }
    }
}

/// Owns the renderer for one attempt: navigate, apply events, tear down.
#[allow(clippy::too_many_arguments)]
async fn drive_renderer(
    factory: Arc<dyn RendererFactory>,
    cookies: Arc<dyn CookieStore>,
    session: Arc<ChallengeSession>,
    settings: RendererSettings,
    headers: HashMap<String, String>,
    sink: EventSink,
    mut events: mpsc::UnboundedReceiver<PageEvent>,
    mut commands: mpsc::UnboundedReceiver<DriverCommand>,
) {
    let mut renderer: Option<Box<dyn PageRenderer>> = match factory.create(sink) {
        Ok(mut renderer) => {
            let started = renderer
                .configure(settings)
                .and_then(|()| renderer.load(session.origin(), &headers));
            if let Err(err) = started {
                log::warn!("renderer failed to start for {}: {err}", session.origin());
                session.fail(err);
            }
            Some(renderer)
        }
        Err(err) => {
            log::warn!("renderer construction failed: {err}");
            session.fail(err);
            None
        }
    };

    let mut events_open = true;
    loop {
        // Events already queued are applied before a teardown command, so a
        // bypass that raced the timeout is still recorded.
        tokio::select! {
            biased;
            event = events.recv(), if events_open => match event {
                Some(event) => apply_event(cookies.as_ref(), &session, event),
                None => events_open = false,
            },
            command = commands.recv() => {
                let renderer_outdated = !session.bypassed()
                    && renderer.as_ref().is_some_and(|renderer| renderer.is_outdated());
                if let Some(renderer) = renderer.as_mut() {
                    renderer.stop_loading();
                    renderer.destroy();
                }
                if let Some(DriverCommand::Shutdown { reply }) = command {
                    let _ = reply.send(TeardownReport { renderer_outdated });
                }
                return;
            }
        }
    }
}

/// The resolution state machine, applied on the driver task as lifecycle
/// events arrive.
fn apply_event(cookies: &dyn CookieStore, session: &ChallengeSession, event: PageEvent) {
    match event {
        PageEvent::PageFinished { url } => {
            let clearance = cookies
                .get(session.origin())
                .into_iter()
                .find(|cookie| cookie.name == CLEARANCE_COOKIE);

            if clearance
                .as_ref()
                .is_some_and(|cookie| Some(cookie) != session.old_cookie())
            {
                session.complete_bypassed();
                return;
            }

            // The first load of the original URL settled without the
            // interstitial ever being confirmed: nothing to solve here.
            if url == *session.origin() && !session.challenge_found() {
                session.complete_not_found();
            }
        }
        PageEvent::MainFrameHttpError { status } => {
            if status == 503 {
                session.mark_challenge_found();
            } else {
                session.complete_not_found();
            }
        }
        PageEvent::MainFrameError { code } => {
            if code == 503 {
                session.mark_challenge_found();
            } else {
                session.complete_not_found();
            }
        }
    }
}
