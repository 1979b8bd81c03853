//! Shared JSON-over-HTTP plumbing for the search and completion clients.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tidings_types::ApiError;

/// Build a reqwest client with a whole-request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::Network(e.to_string()))
}

/// JSON content type plus one API key header.
pub(crate) fn key_headers(name: &'static str, key: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static(name),
        HeaderValue::from_str(key).map_err(|_| ApiError::Auth {
            message: "Invalid API key format".into(),
        })?,
    );
    Ok(headers)
}

/// POST a JSON body and decode a JSON response, classifying failures.
pub(crate) async fn post_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    body: &serde_json::Value,
) -> Result<T, ApiError> {
    tracing::debug!("POST {url}");

    let response = http
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = retry_after_header(response.headers());
        let body_text = response.text().await.unwrap_or_default();
        let err = classify_error(status.as_u16(), &body_text, retry_after);
        tracing::warn!("POST {url} failed: {err}");
        return Err(err);
    }

    let text = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

/// `Retry-After` as delta-seconds, in milliseconds.
fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(secs.saturating_mul(1000))
}

/// A protobuf duration such as `"38s"` or `"1.5s"`, in milliseconds.
fn duration_ms(text: &str) -> Option<u64> {
    let secs: f64 = text.strip_suffix('s')?.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0).round() as u64)
}

#[derive(Deserialize)]
struct ErrorBody {
    /// Gemini wraps a `google.rpc.Status`.
    error: Option<RpcStatus>,
    /// Serper puts the message at the top level.
    message: Option<String>,
}

#[derive(Deserialize)]
struct RpcStatus {
    message: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

impl RpcStatus {
    /// `retryDelay` from a `google.rpc.RetryInfo` detail.
    fn retry_delay_ms(&self) -> Option<u64> {
        self.details
            .iter()
            .find_map(|detail| detail.get("retryDelay")?.as_str())
            .and_then(duration_ms)
    }
}

/// Map a failed response onto [`ApiError`].
///
/// The header's retry hint wins over one found in a Gemini body.
pub(crate) fn classify_error(status: u16, body: &str, retry_after: Option<u64>) -> ApiError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let rpc = parsed.as_ref().and_then(|b| b.error.as_ref());
    let message = rpc
        .and_then(|e| e.message.clone())
        .or_else(|| parsed.as_ref().and_then(|b| b.message.clone()))
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => ApiError::Auth { message },
        400 => ApiError::BadRequest { message },
        429 => ApiError::RateLimited {
            retry_after_ms: retry_after.or_else(|| rpc.and_then(RpcStatus::retry_delay_ms)),
        },
        _ => ApiError::Server { status, message },
    }
}
