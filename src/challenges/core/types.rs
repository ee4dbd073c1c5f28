//! Value types shared by the interceptor, resolver, and transport layers.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

/// Request as the pipeline hands it to the interceptor.
///
/// Never mutated during interception; the replay after a successful
/// resolution clones it verbatim.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Option<Vec<u8>>) -> Self {
        self.body = body;
        self
    }

    /// Value of header `name`, if present and readable as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Header mapping in plain string form for collaborators that do not
    /// speak `http` types. Last value wins on duplicate names.
    pub fn header_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (name, value) in self.headers.iter() {
            if let Ok(value) = value.to_str() {
                map.insert(name.as_str().to_string(), value.to_string());
            }
        }
        map
    }
}

/// Fully materialized response returned by the transport.
///
/// The body is owned bytes; dropping the response releases it, which the
/// interceptor does before starting a resolution attempt.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
}

impl HttpResponse {
    /// Value of header `name`, if present and readable as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}
