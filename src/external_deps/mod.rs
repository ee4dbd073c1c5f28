//! Integrations with host-provided collaborators.
//!
//! This module groups the narrow interfaces the core needs from the outside
//! world: a cookie store with host-owned persistence and a page renderer
//! capable of executing challenge scripts.

pub mod cookies;
pub mod renderer;

pub use cookies::{Cookie, CookieStore, MemoryCookieStore, ReqwestCookieBridge};
pub use renderer::{
    EventSink, PageEvent, PageRenderer, RendererError, RendererFactory, RendererSettings,
    default_user_agent,
};
