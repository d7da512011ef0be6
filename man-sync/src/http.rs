//! HTTP client construction shared by outbound integrations.

use crate::config::defaults;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::Duration;

const USER_AGENT: &str = concat!("man-sync/", env!("CARGO_PKG_VERSION"));

/// JSON client with the transport timeout every request is bound by
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .timeout(Duration::from_secs(defaults::HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
}
