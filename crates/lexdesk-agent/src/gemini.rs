use std::time::Duration;

use async_trait::async_trait;
use lexdesk_core::{
    agent::AnalysisBackend, AnalysisResult, LexError, MotionDraft, MotionRequest, ResearchAnswer,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::{instruction, remote};

const SERVICE: &str = "Gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Calls Gemini's `generateContent` directly with locally built prompts.
pub struct GeminiBackend {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: remote::client(timeout),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn generate(&self, prompt: &str) -> Result<String, LexError> {
        if self.api_key.is_empty() {
            return Err(LexError::remote(None, "GEMINI_API_KEY is not set"));
        }
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json"
            }
        });

        info!(model = %self.model, prompt_len = prompt.len(), "calling gemini generateContent");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| remote::send_error(SERVICE, e))?;
        let parsed: GenerateResponse = remote::read_json(SERVICE, response).await?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LexError::remote(None, "Gemini returned no text"));
        }
        debug!(output_len = text.len(), "gemini response received");
        Ok(text)
    }

    async fn generate_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, LexError> {
        let text = self.generate(prompt).await?;
        parse_model_json(&text)
    }
}

/// Decode a model answer that should be JSON, tolerating a code fence.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T, LexError> {
    serde_json::from_str(remote::strip_fences(text))
        .map_err(|e| LexError::remote(None, format!("model returned malformed JSON: {e}")))
}

#[async_trait]
impl AnalysisBackend for GeminiBackend {
    async fn analyze_contract(
        &self,
        text: &str,
        jurisdiction: &str,
    ) -> Result<AnalysisResult, LexError> {
        self.generate_json(&instruction::contract_prompt(text, jurisdiction))
            .await
    }

    async fn research(&self, query: &str, jurisdiction: &str) -> Result<ResearchAnswer, LexError> {
        self.generate_json(&instruction::research_prompt(query, jurisdiction))
            .await
    }

    async fn draft_motion(&self, request: &MotionRequest) -> Result<MotionDraft, LexError> {
        self.generate_json(&instruction::motion_prompt(request)).await
    }
}
