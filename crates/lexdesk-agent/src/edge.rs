use std::time::Duration;

use lexdesk_core::conflict::{parse_conflicts, Conflict, ConflictCheckRequest};
use lexdesk_core::LexError;
use serde_json::Value;
use tracing::info;

use crate::remote;

const SERVICE: &str = "edge function";

/// Supabase edge functions, called with the project's anon key.
pub struct EdgeFunctions {
    functions_url: String,
    anon_key: String,
    http: reqwest::Client,
}

impl EdgeFunctions {
    /// `functions_url` is `<project>/functions/v1`; empty means not configured.
    pub fn new(functions_url: impl Into<String>, anon_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            functions_url: functions_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            http: remote::client(timeout),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.functions_url.is_empty()
    }

    async fn invoke(&self, name: &str, body: &impl serde::Serialize) -> Result<Value, LexError> {
        if !self.is_configured() {
            return Err(LexError::remote(None, "SUPABASE_URL is not set"));
        }
        let url = format!("{}/{name}", self.functions_url);
        info!(function = name, "invoking edge function");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.anon_key)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| remote::send_error(SERVICE, e))?;
        remote::read_json(SERVICE, response).await
    }

    pub async fn smart_conflict_check(
        &self,
        request: &ConflictCheckRequest,
    ) -> Result<Vec<Conflict>, LexError> {
        let body = self.invoke("smart-conflict-check", request).await?;
        let conflicts = parse_conflicts(body)?;
        info!(
            client = request.client_name(),
            conflicts = conflicts.len(),
            "conflict check complete"
        );
        Ok(conflicts)
    }
}
