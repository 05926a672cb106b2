use async_trait::async_trait;

use crate::{
    error::LexError,
    types::{AnalysisResult, MotionDraft, MotionRequest, ResearchAnswer},
};

/// A remote AI service able to review contracts, answer research questions
/// and draft motions. Implementations live in `lexdesk-agent`.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze_contract(
        &self,
        text: &str,
        jurisdiction: &str,
    ) -> Result<AnalysisResult, LexError>;

    async fn research(&self, query: &str, jurisdiction: &str) -> Result<ResearchAnswer, LexError>;

    async fn draft_motion(&self, request: &MotionRequest) -> Result<MotionDraft, LexError>;
}
