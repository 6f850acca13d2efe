//! Shared HTTP plumbing for OpenAI-compatible services.

use std::time::Duration;

use fieldmap_match::ProviderError;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

/// User agent string for API requests.
const USER_AGENT_VALUE: &str = concat!("fieldmap/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt carried in an error.
const BODY_EXCERPT: usize = 200;

/// Blocking client with the default headers and a request timeout.
///
/// The engine also puts its own deadline around every call; this timeout
/// only stops abandoned requests from lingering.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

/// `{base_url}/{path}` without doubled slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a send failure onto the provider error taxonomy.
pub fn send_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Unavailable(format!("request timed out: {err}"))
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

/// Map a non-success status onto the provider error taxonomy.
pub fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
    let message = format!("{status}: {excerpt}");
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
            ProviderError::QuotaExceeded(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(message),
        s if s.is_server_error() => ProviderError::Unavailable(message),
        _ => ProviderError::InvalidResponse(message),
    }
}

/// Check the status and decode a JSON body.
pub fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(status_error(status, &body));
    }
    response
        .json()
        .map_err(|err| ProviderError::InvalidResponse(format!("undecodable body: {err}")))
}
