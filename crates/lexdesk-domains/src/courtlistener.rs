use std::time::Duration;

use lexdesk_core::LexError;
use serde_json::Value;
use tracing::{debug, warn};

const BASE: &str = "https://www.courtlistener.com/api/rest/v4";

/// Read-only CourtListener lookups by numeric id.
pub struct CourtListenerClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl CourtListenerClient {
    /// `token` is optional; anonymous requests are rate limited harder.
    pub fn new(token: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent("lexdesk/0.1 (court record lookup)")
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base: BASE.to_string(),
            token: (!token.is_empty()).then(|| token.to_string()),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn get_opinion(&self, id: u64) -> Result<Value, LexError> {
        self.fetch("opinion", &format!("clusters/{id}")).await
    }

    pub async fn get_person(&self, id: u64) -> Result<Value, LexError> {
        self.fetch("person", &format!("people/{id}")).await
    }

    pub async fn get_docket(&self, id: u64) -> Result<Value, LexError> {
        self.fetch("docket", &format!("dockets/{id}")).await
    }

    async fn fetch(&self, what: &str, path: &str) -> Result<Value, LexError> {
        let url = format!("{}/{path}/", self.base);
        debug!(url = %url, "courtlistener lookup");
        let mut req = self.http.get(&url);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Token {token}"));
        }
        let resp = req
            .send()
            .await
            .map_err(|e| LexError::remote(None, format!("CourtListener unreachable: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LexError::NotFound(format!("{what} {}", path.rsplit('/').next().unwrap_or(path))));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, what, "courtlistener error: {body}");
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["detail"].as_str().map(str::to_string))
                .unwrap_or_else(|| format!("CourtListener returned {status}"));
            return Err(LexError::remote(Some(status.as_u16()), detail));
        }
        resp.json()
            .await
            .map_err(|e| LexError::remote(Some(status.as_u16()), format!("malformed CourtListener {what}: {e}")))
    }
}
