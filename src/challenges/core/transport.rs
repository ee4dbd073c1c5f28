//! Transport collaborator contract.
//!
//! The interceptor never owns a connection pool of its own; it sends the
//! original attempt and, after a successful resolution, exactly one replay
//! through whatever pipeline the host provides.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{HttpRequest, HttpResponse};

/// Errors surfaced by transport implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http transport error: {0}")]
    Transport(String),
}

/// Contract that abstracts the underlying HTTP pipeline.
///
/// Implementations should preserve cookies and other session state between
/// calls so the replay benefits from whatever the resolution wrote.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}
