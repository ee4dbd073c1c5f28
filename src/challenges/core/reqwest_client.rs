//! Reqwest-based implementation of the [`Transport`] trait.
//!
//! Provides a thin adapter around `reqwest::Client` that converts between the
//! shared HTTP representations used by the interceptor and the concrete
//! transport.

use std::sync::Arc;

use async_trait::async_trait;
use http::{
    HeaderMap as HttpHeaderMap, HeaderName as HttpHeaderName, HeaderValue as HttpHeaderValue,
    Method as HttpMethod,
};
use reqwest::{Client, Method, header::HeaderMap};

use crate::external_deps::cookies::{CookieStore, ReqwestCookieBridge};

use super::transport::{Transport, TransportError};
use super::types::{HttpRequest, HttpResponse};

/// Reqwest-backed transport used for the original attempt and the replay.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a client wired to the shared cookie store, so the replay sends
    /// whatever clearance cookie the renderer produced.
    pub fn new(store: Arc<dyn CookieStore>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .cookie_provider(Arc::new(ReqwestCookieBridge::new(store)))
            .build()
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client. The client should already share a
    /// cookie jar with the renderer; otherwise the replay will not carry the
    /// clearance cookie and the origin will challenge it again.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let req_method = map_method(&request.method)?;
        let req_headers = convert_headers(&request.headers)?;

        let mut builder = self
            .client
            .request(req_method, request.url.as_str())
            .headers(req_headers);

        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        to_http_response(response).await
    }
}

fn map_method(method: &HttpMethod) -> Result<Method, TransportError> {
    Method::from_bytes(method.as_str().as_bytes())
        .map_err(|err| TransportError::Transport(err.to_string()))
}

fn convert_headers(headers: &HttpHeaderMap) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let name = reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes())
            .map_err(|err| TransportError::Transport(err.to_string()))?;
        let value = reqwest::header::HeaderValue::from_bytes(value.as_bytes())
            .map_err(|err| TransportError::Transport(err.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

async fn to_http_response(response: reqwest::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = convert_back_headers(response.headers())?;
    let url = response.url().clone();
    let body = response
        .bytes()
        .await
        .map_err(|err| TransportError::Transport(err.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
        url,
    })
}

fn convert_back_headers(map: &HeaderMap) -> Result<HttpHeaderMap, TransportError> {
    let mut headers = HttpHeaderMap::new();
    for (name, value) in map.iter() {
        let http_name = HttpHeaderName::from_bytes(name.as_str().as_bytes())
            .map_err(|err| TransportError::Transport(err.to_string()))?;
        let http_value = HttpHeaderValue::from_bytes(value.as_bytes())
            .map_err(|err| TransportError::Transport(err.to_string()))?;
        headers.insert(http_name, http_value);
    }
    Ok(headers)
}

type _AssertSync = Arc<ReqwestTransport>;
