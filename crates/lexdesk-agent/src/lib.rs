pub mod edge;
pub mod gemini;
pub mod instruction;
pub mod remote;
pub mod research;

use std::sync::Arc;
use std::time::Duration;

use lexdesk_core::{agent::AnalysisBackend, config::Config};

pub use edge::EdgeFunctions;
pub use gemini::GeminiBackend;
pub use research::ResearchService;

/// Pick the analysis backend named by `BACKEND`.
pub fn backend_from_config(config: &Config) -> Arc<dyn AnalysisBackend> {
    let timeout = Duration::from_secs(config.http_timeout_s);
    match config.backend.as_str() {
        "gemini" => Arc::new(GeminiBackend::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            timeout,
        )),
        _ => Arc::new(ResearchService::new(config.research_api_url.clone(), timeout)),
    }
}
