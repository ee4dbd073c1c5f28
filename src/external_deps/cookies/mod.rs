//! Cookie store collaborator.
//!
//! Cookie persistence belongs to the host application; the core only needs to
//! read the clearance cookie, clear stale bypass cookies before a resolution
//! attempt, and give collaborators a write path for whatever the challenge
//! page sets. A thread-safe in-memory store is provided for hosts without
//! their own jar, together with an adapter that exposes the same store to
//! `reqwest` so transport and renderer observe one jar.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use url::Url;

/// Cookie identity as the bypass check sees it.
///
/// Equality is `(name, value)`: a re-issued clearance cookie compares unequal
/// to its stale predecessor even on the same domain. URL association lives in
/// the store's keying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Contract for the host-provided cookie store.
///
/// `remove` must be idempotent: removing names that are not present is a
/// no-op, not an error.
pub trait CookieStore: Send + Sync {
    /// Cookies currently associated with `url`'s host.
    fn get(&self, url: &Url) -> Vec<Cookie>;

    /// Insert or replace a cookie for `url`'s host.
    fn set(&self, url: &Url, cookie: Cookie);

    /// Remove the named cookies for `url`'s host.
    fn remove(&self, url: &Url, names: &[&str]);
}

/// Thread-safe in-memory store keyed by host.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    inner: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn host_key(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, url: &Url) -> Vec<Cookie> {
        self.inner
            .read()
            .ok()
            .and_then(|map| {
                map.get(&host_key(url)).map(|jar| {
                    jar.iter()
                        .map(|(name, value)| Cookie::new(name.clone(), value.clone()))
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    fn set(&self, url: &Url, cookie: Cookie) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(host_key(url))
                .or_default()
                .insert(cookie.name, cookie.value);
        }
    }

    fn remove(&self, url: &Url, names: &[&str]) {
        if let Ok(mut map) = self.inner.write()
            && let Some(jar) = map.get_mut(&host_key(url))
        {
            for name in names {
                jar.remove(*name);
            }
        }
    }
}

/// Adapter exposing a [`CookieStore`] to `reqwest`.
///
/// Wiring this into the transport client means the replay after a successful
/// resolution automatically carries the clearance cookie the renderer wrote.
pub struct ReqwestCookieBridge {
    store: Arc<dyn CookieStore>,
}

impl ReqwestCookieBridge {
    pub fn new(store: Arc<dyn CookieStore>) -> Self {
        Self { store }
    }
}

impl reqwest::cookie::CookieStore for ReqwestCookieBridge {
    fn set_cookies(
        &self,
        cookie_headers: &mut dyn Iterator<Item = &reqwest::header::HeaderValue>,
        url: &Url,
    ) {
        for header in cookie_headers {
            let Ok(raw) = header.to_str() else { continue };
            // Only the name=value pair matters here; attribute handling is the
            // host store's policy.
            let Some((name, rest)) = raw.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = rest.split(';').next().unwrap_or("").trim();
            self.store.set(url, Cookie::new(name, value));
        }
    }

    fn cookies(&self, url: &Url) -> Option<reqwest::header::HeaderValue> {
        let cookies = self.store.get(url);
        if cookies.is_empty() {
            return None;
        }
        let joined = cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ");
        reqwest::header::HeaderValue::from_str(&joined).ok()
    }
}
