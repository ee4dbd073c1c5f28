//! Core utilities shared by the interceptor and the resolver.

pub mod reqwest_client;
pub mod transport;
pub mod types;

pub use reqwest_client::ReqwestTransport;
pub use transport::{Transport, TransportError};
pub use types::{HttpRequest, HttpResponse};
