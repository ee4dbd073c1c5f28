//! Per-attempt resolution state.
//!
//! A session lives for exactly one detected challenge: the interceptor
//! creates it after a positive detection and discards it when the attempt
//! completes or times out. All flags and the single-shot completion signal
//! sit behind one lock, so transitions observed on the renderer's context
//! happen-before the waiting caller's reads.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use url::Url;

use crate::external_deps::cookies::Cookie;
use crate::external_deps::renderer::RendererError;

/// Terminal outcome carried by the completion signal.
#[derive(Debug)]
pub(crate) enum SessionOutcome {
    /// A clearance cookie distinct from the pre-attempt snapshot appeared.
    Bypassed,
    /// The page settled without ever confirming an interstitial.
    NegativeDetection,
    /// The renderer itself failed before the page could settle.
    RendererFailure(RendererError),
}

#[derive(Debug)]
struct SessionState {
    challenge_found: bool,
    bypassed: bool,
    signal: Option<oneshot::Sender<SessionOutcome>>,
}

/// State for a single challenge resolution attempt.
pub struct ChallengeSession {
    origin: Url,
    old_cookie: Option<Cookie>,
    state: Mutex<SessionState>,
}

impl ChallengeSession {
    /// Create a session for `origin` with the pre-attempt clearance snapshot.
    /// The returned receiver fires at most once, on the first terminal
    /// transition.
    pub(crate) fn new(
        origin: Url,
        old_cookie: Option<Cookie>,
    ) -> (Self, oneshot::Receiver<SessionOutcome>) {
        let (tx, rx) = oneshot::channel();
        let session = Self {
            origin,
            old_cookie,
            state: Mutex::new(SessionState {
                challenge_found: false,
                bypassed: false,
                signal: Some(tx),
            }),
        };
        (session, rx)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Clearance cookie snapshot taken before the attempt started.
    pub fn old_cookie(&self) -> Option<&Cookie> {
        self.old_cookie.as_ref()
    }

    /// Whether a main-frame 503 confirmed the interstitial.
    pub fn challenge_found(&self) -> bool {
        self.lock().challenge_found
    }

    /// Whether a new clearance cookie was observed.
    pub fn bypassed(&self) -> bool {
        self.lock().bypassed
    }

    /// Record that the interstitial was confirmed on the main frame.
    pub(crate) fn mark_challenge_found(&self) {
        self.lock().challenge_found = true;
    }

    /// Record a successful bypass and wake the waiter.
    pub(crate) fn complete_bypassed(&self) {
        let mut state = self.lock();
        state.bypassed = true;
        if let Some(signal) = state.signal.take() {
            let _ = signal.send(SessionOutcome::Bypassed);
        }
    }

    /// Wake the waiter with a definitive "nothing to solve here".
    pub(crate) fn complete_not_found(&self) {
        if let Some(signal) = self.lock().signal.take() {
            let _ = signal.send(SessionOutcome::NegativeDetection);
        }
    }

    /// Wake the waiter after a renderer fault.
    pub(crate) fn fail(&self, error: RendererError) {
        if let Some(signal) = self.lock().signal.take() {
            let _ = signal.send(SessionOutcome::RendererFailure(error));
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session lock poisoned")
    }
}
