use std::time::Duration;

use async_trait::async_trait;
use lexdesk_core::{
    agent::AnalysisBackend, AnalysisResult, LexError, MotionDraft, MotionRequest, ResearchAnswer,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::remote;

const SERVICE: &str = "research service";

/// Client for the hosted legal research service, which fronts Gemini with
/// its own prompts. Each operation is a single JSON POST.
pub struct ResearchService {
    base_url: String,
    http: reqwest::Client,
}

impl ResearchService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: remote::client(timeout),
        }
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LexError> {
        let url = format!("{}{path}", self.base_url);
        info!(url = %url, "calling research service");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| remote::send_error(SERVICE, e))?;
        remote::read_json(SERVICE, response).await
    }
}

#[async_trait]
impl AnalysisBackend for ResearchService {
    async fn analyze_contract(
        &self,
        text: &str,
        jurisdiction: &str,
    ) -> Result<AnalysisResult, LexError> {
        self.post(
            "/api/analyze-contract",
            &json!({ "contract_text": text, "jurisdiction": jurisdiction }),
        )
        .await
    }

    async fn research(&self, query: &str, jurisdiction: &str) -> Result<ResearchAnswer, LexError> {
        self.post(
            "/api/legal-research",
            &json!({ "query": query, "jurisdiction": jurisdiction }),
        )
        .await
    }

    async fn draft_motion(&self, request: &MotionRequest) -> Result<MotionDraft, LexError> {
        self.post("/api/draft-motion", request).await
    }
}
