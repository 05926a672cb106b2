use std::collections::HashMap;

use anyhow::Result;

/// Full application configuration.
/// Values come from the process environment first, then a `.env` file in the
/// working directory. Secrets (API keys) are never logged.
#[derive(Debug, Clone)]
pub struct Config {
    // Web
    pub web_bind: String,
    pub web_port: u16,
    pub max_upload_mb: usize,

    // Persistence; empty = in-memory store
    pub database_url: String,

    // Analysis backend: "research" (hosted research service) or "gemini"
    pub backend: String,
    pub research_api_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,

    // Supabase edge functions
    pub supabase_url: String,
    pub supabase_anon_key: String,

    // CourtListener lookups
    pub courtlistener_token: String,

    // Forms
    /// Prefix prepended to template URLs (content-rewriting proxy). Empty = fetch directly.
    pub template_proxy: String,
    /// Optional JSON catalog overriding the built-in form definitions.
    pub form_catalog_path: String,

    // OCR
    pub tesseract_path: String,
    pub ocr_language: String,

    pub http_timeout_s: u64,
}

fn parse_dotenv() -> HashMap<String, String> {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return HashMap::new();
    };
    parse_dotenv_str(&contents)
}

fn parse_dotenv_str(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u16(key: &str, dotenv: &HashMap<String, String>, default: u16) -> u16 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();
        Self::from_map(&dotenv)
    }

    fn from_map(dotenv: &HashMap<String, String>) -> Result<Self> {
        let backend = get_str("BACKEND", dotenv, "research");
        if !matches!(backend.as_str(), "research" | "gemini") {
            anyhow::bail!("BACKEND must be \"research\" or \"gemini\", got {backend:?}");
        }

        Ok(Config {
            web_bind: get_str("WEB_BIND", dotenv, "127.0.0.1"),
            web_port: get_u16("WEB_PORT", dotenv, 3232),
            max_upload_mb: get_u64("MAX_UPLOAD_MB", dotenv, 25) as usize,
            database_url: get_str("DATABASE_URL", dotenv, ""),
            backend,
            research_api_url: get_str(
                "RESEARCH_API_URL",
                dotenv,
                "https://legal-research-api.vercel.app",
            ),
            gemini_api_key: get_str("GEMINI_API_KEY", dotenv, ""),
            gemini_model: get_str("GEMINI_MODEL", dotenv, "gemini-1.5-flash"),
            supabase_url: get_str("SUPABASE_URL", dotenv, ""),
            supabase_anon_key: get_str("SUPABASE_ANON_KEY", dotenv, ""),
            courtlistener_token: get_str("COURTLISTENER_TOKEN", dotenv, ""),
            template_proxy: get_str("TEMPLATE_PROXY", dotenv, "https://corsproxy.io/?url="),
            form_catalog_path: get_str("FORM_CATALOG_PATH", dotenv, ""),
            tesseract_path: get_str("TESSERACT_PATH", dotenv, "tesseract"),
            ocr_language: get_str("OCR_LANGUAGE", dotenv, "eng"),
            http_timeout_s: get_u64("HTTP_TIMEOUT_S", dotenv, 120),
        })
    }

    /// Supabase functions base URL (`<project>/functions/v1`), empty when unconfigured.
    pub fn functions_url(&self) -> String {
        if self.supabase_url.is_empty() {
            return String::new();
        }
        format!("{}/functions/v1", self.supabase_url.trim_end_matches('/'))
    }
}
