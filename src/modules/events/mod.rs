//! Event system around interception.
//!
//! Provides hooks for logging and custom reactions to challenge activity.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use url::Url;

/// Structured challenge detection event.
#[derive(Debug, Clone)]
pub struct ChallengeDetectedEvent {
    pub url: Url,
    pub server: String,
    pub timestamp: DateTime<Utc>,
}

/// Structured resolution success event.
#[derive(Debug, Clone)]
pub struct ChallengeResolvedEvent {
    pub url: Url,
    pub timestamp: DateTime<Utc>,
}

/// Structured resolution failure event.
#[derive(Debug, Clone)]
pub struct ResolutionFailedEvent {
    pub url: Url,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum InterceptEvent {
    ChallengeDetected(ChallengeDetectedEvent),
    ChallengeResolved(ChallengeResolvedEvent),
    ResolutionFailed(ResolutionFailedEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &InterceptEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: InterceptEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &InterceptEvent) {
        match event {
            InterceptEvent::ChallengeDetected(detected) => {
                log::info!(
                    "cloudflare challenge detected at {} (server {})",
                    detected.url,
                    detected.server
                );
            }
            InterceptEvent::ChallengeResolved(resolved) => {
                log::info!("cloudflare challenge resolved for {}", resolved.url);
            }
            InterceptEvent::ResolutionFailed(failed) => {
                log::warn!(
                    "challenge resolution failed for {} -> {}",
                    failed.url,
                    failed.error
                );
            }
        }
    }
}
