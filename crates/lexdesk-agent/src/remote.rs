use std::time::Duration;

use lexdesk_core::LexError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Transport failure before any status was received.
pub(crate) fn send_error(service: &str, e: reqwest::Error) -> LexError {
    if e.is_timeout() {
        warn!(service, "request timed out");
        LexError::remote(None, format!("{service} timed out"))
    } else {
        warn!(service, "request failed: {e}");
        LexError::remote(None, format!("{service} unreachable: {e}"))
    }
}

/// The human-readable message from an error body, if the service sent one.
///
/// Accepts `{error: "..."}`, `{error: {message: "..."}}` and `{message: "..."}`.
pub fn error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let msg = v["error"]
        .as_str()
        .or_else(|| v["error"]["message"].as_str())
        .or_else(|| v["message"].as_str())?;
    let msg = msg.trim();
    (!msg.is_empty()).then(|| msg.to_string())
}

/// Read a JSON body, mapping non-2xx statuses and malformed JSON to
/// `RemoteService`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &str,
    response: reqwest::Response,
) -> Result<T, LexError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| LexError::remote(Some(status.as_u16()), format!("{service}: {e}")))?;

    if !status.is_success() {
        warn!(service, status = %status, "non-success response");
        let message = error_message(&body)
            .unwrap_or_else(|| format!("{service} returned {status}"));
        return Err(LexError::remote(Some(status.as_u16()), message));
    }

    serde_json::from_str(&body).map_err(|e| {
        warn!(service, "malformed response: {e}");
        LexError::remote(Some(status.as_u16()), format!("malformed response from {service}"))
    })
}

/// Pull the first JSON value out of model text that may be wrapped in a
/// markdown code fence.
pub fn strip_fences(text: &str) -> &str {
    let t = text.trim();
    if !t.starts_with("```") {
        return t;
    }
    let Some(nl) = t.find('\n') else {
        return t;
    };
    let inner = &t[nl + 1..];
    match inner.trim_end().strip_suffix("```") {
        Some(body) => body.trim_end(),
        None => inner,
    }
}
