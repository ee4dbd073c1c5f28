//! # clearance-rs
//!
//! Transparent Cloudflare interstitial handling for Rust HTTP client
//! pipelines.
//!
//! When an intercepted response comes back as a 503 from a Cloudflare front,
//! the interceptor delegates page rendering to an external collaborator (a
//! WebView, a CDP session, anything that can execute the challenge script),
//! waits for a fresh `cf_clearance` cookie to appear in the shared store, and
//! replays the original request with the new credential. Anything else passes
//! through untouched.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clearance_rs::{ClearanceInterceptor, MemoryCookieStore, ReqwestTransport};
//!
//! # fn renderer() -> Arc<dyn clearance_rs::RendererFactory> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cookies = Arc::new(MemoryCookieStore::new());
//!     let transport = Arc::new(ReqwestTransport::new(cookies.clone())?);
//!     let interceptor = ClearanceInterceptor::new(transport, cookies, renderer());
//!     let response = interceptor.get("https://example.com").await?;
//!     println!("status: {}", response.status);
//!     Ok(())
//! }
//! ```

mod interceptor;

pub mod challenges;
pub mod external_deps;
pub mod modules;

pub use crate::interceptor::{
    ClearanceInterceptor,
    InterceptError,
    InterceptResult,
    InterceptorBuilder,
    InterceptorConfig,
};

pub use crate::challenges::core::{
    HttpRequest,
    HttpResponse,
    ReqwestTransport,
    Transport,
    TransportError,
};

pub use crate::challenges::detector::{CLEARANCE_COOKIE, COOKIE_NAMES, SERVER_CHECK};

pub use crate::challenges::resolver::{ChallengeResolver, RESOLVE_TIMEOUT, ResolveError};

pub use crate::challenges::session::ChallengeSession;

pub use crate::external_deps::cookies::{
    Cookie,
    CookieStore,
    MemoryCookieStore,
    ReqwestCookieBridge,
};

pub use crate::external_deps::renderer::{
    EventSink,
    PageEvent,
    PageRenderer,
    RendererError,
    RendererFactory,
    RendererSettings,
    default_user_agent,
};

pub use crate::modules::events::{
    ChallengeDetectedEvent,
    ChallengeResolvedEvent,
    EventDispatcher,
    EventHandler,
    InterceptEvent,
    LoggingHandler,
    ResolutionFailedEvent,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
