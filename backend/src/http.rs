//! Shared HTTP plumbing for the backend clients.

use std::time::Duration;

use crate::BackendError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client. Payments can take a while to route, so the request
/// timeout is generous.
pub(crate) fn build_client() -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("prism/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| BackendError::Config(format!("failed to create HTTP client: {e}")))
}

/// Read a JSON body, mapping a 401 to [`BackendError::Unauthorized`] and a
/// non-JSON body to [`BackendError::InvalidResponse`].
///
/// Error payloads are left for the caller to inspect, since every backend
/// names its error field differently.
pub(crate) async fn read_json(
    response: reqwest::Response,
) -> Result<(reqwest::StatusCode, serde_json::Value), BackendError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    if !is_json {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized(format!("HTTP {status}")));
        }
        return Err(BackendError::InvalidResponse(format!(
            "expected JSON, got HTTP {status}"
        )));
    }

    let json = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| BackendError::InvalidResponse(format!("invalid JSON: {e}")))?;
    Ok((status, json))
}

/// The string at `path` (e.g. `["transaction", "payment", "hash"]`).
pub(crate) fn str_at<'a>(json: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(json, |v, key| v.get(*key))
        .and_then(|v| v.as_str())
}

/// The number at `path`, accepting integers and floats.
pub(crate) fn i64_at(json: &serde_json::Value, path: &[&str]) -> Option<i64> {
    let v = path.iter().try_fold(json, |v, key| v.get(*key))?;
    v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64))
}

pub(crate) fn required_str(
    json: &serde_json::Value,
    path: &[&str],
) -> Result<String, BackendError> {
    str_at(json, path)
        .map(str::to_string)
        .ok_or_else(|| BackendError::InvalidResponse(format!("missing {}", path.join("."))))
}
