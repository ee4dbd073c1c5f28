//! Challenge detection.
//!
//! The interstitial heuristic is deliberately narrow: an origin 503 whose
//! `Server` header names Cloudflare. That is a necessary condition, not a
//! sufficient one; the resolver independently confirms the challenge page
//! through main-frame signals before treating the 503 as solvable.

use http::header::SERVER;

use super::core::types::HttpResponse;

/// `Server` header values that identify a Cloudflare front.
pub const SERVER_CHECK: [&str; 2] = ["cloudflare-nginx", "cloudflare"];

/// Bypass-related cookies cleared before each resolution attempt.
pub const COOKIE_NAMES: [&str; 2] = ["__cfduid", "cf_clearance"];

/// Name of the credential granted once the challenge is solved.
pub const CLEARANCE_COOKIE: &str = "cf_clearance";

/// Whether a response looks like a Cloudflare anti-bot interstitial.
pub fn is_challenge(response: &HttpResponse) -> bool {
    if response.status != 503 {
        return false;
    }

    response
        .headers
        .get(SERVER)
        .and_then(|value| value.to_str().ok())
        .map(|server| SERVER_CHECK.contains(&server))
        .unwrap_or(false)
}
