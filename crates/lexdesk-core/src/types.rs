use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Uploads ──────────────────────────────────────────────────────────────

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Extraction route for an upload, decided once from its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    Docx,
    Text,
    /// Anything else; carries the declared type so the error can name it.
    Unsupported(String),
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Self::Pdf,
            DOCX_MIME => Self::Docx,
            "text/plain" => Self::Text,
            m if m.starts_with("image/") && m.len() > "image/".len() => Self::Image,
            _ => Self::Unsupported(mime.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "text",
            Self::Unsupported(m) => m,
        }
    }
}

/// A file handed in for one analysis request. Never persisted.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// Declared media type (e.g. `application/pdf`).
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.media_type)
    }
}

// ── Analysis results ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

fn de_severity<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Severity, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.as_deref().map(Severity::parse).unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    #[serde(default)]
    pub clause: String,
    #[serde(default, deserialize_with = "de_severity")]
    pub severity: Severity,
    #[serde(default, alias = "risk", alias = "explanation")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDate {
    #[serde(default, alias = "event", alias = "description")]
    pub label: String,
    #[serde(default)]
    pub date: String,
}

/// Structured contract review returned by the analysis backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default, alias = "missingClauses")]
    pub missing_clauses: Vec<String>,
    #[serde(default, alias = "suggestedFixes")]
    pub suggested_fixes: Vec<String>,
    #[serde(default, alias = "keyDates")]
    pub key_dates: Vec<KeyDate>,
}

// ── Documents ────────────────────────────────────────────────────────────

pub const DOC_TYPE_CONTRACT_ANALYSIS: &str = "contract_analysis";

/// A persisted analysis or note as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub name: String,
    /// Which analysis path produced `content` (e.g. "contract_analysis").
    pub doc_type: String,
    pub jurisdiction: String,
    /// "analyzed" | "reviewed"
    pub status: String,
    /// Serialized `AnalysisResult` for analyses, free text otherwise.
    pub content: String,
    pub feedback_rating: Option<i32>,
    pub feedback_comment: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Parse `content` back into the analysis that produced it.
    ///
    /// Returns `None` when the document came from a different path or its
    /// content does not parse; callers render that as "not found".
    pub fn analysis(&self) -> Option<AnalysisResult> {
        if self.doc_type != DOC_TYPE_CONTRACT_ANALYSIS {
            return None;
        }
        serde_json::from_str(&self.content).ok()
    }
}

/// Insert payload for a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub name: String,
    pub doc_type: String,
    pub jurisdiction: String,
    pub status: String,
    pub content: String,
    pub user_id: Option<String>,
}

impl NewDocument {
    pub fn contract_analysis(
        name: &str,
        jurisdiction: &str,
        result: &AnalysisResult,
        user_id: Option<&str>,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            doc_type: DOC_TYPE_CONTRACT_ANALYSIS.into(),
            jurisdiction: jurisdiction.to_string(),
            status: "analyzed".into(),
            content: serde_json::to_string(result)?,
            user_id: user_id.map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

/// A research query a user chose to keep, scoped to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub id: i64,
    pub user_id: String,
    pub query: String,
    pub jurisdiction: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

// ── Research & drafting ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResearchAnswer {
    #[serde(default, alias = "response", alias = "result")]
    pub answer: String,
    #[serde(default, alias = "sources")]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionRequest {
    #[serde(default)]
    pub motion_type: String,
    #[serde(default)]
    pub case_caption: String,
    #[serde(default)]
    pub jurisdiction: String,
    #[serde(default)]
    pub facts: String,
    #[serde(default)]
    pub relief_sought: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotionDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "motion", alias = "content")]
    pub body: String,
}

// ── Progress events ──────────────────────────────────────────────────────

/// One OCR progress tick: engine status label plus completion in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrProgress {
    pub status: String,
    pub progress: f32,
}

/// Batch progress after a file completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub current_file: String,
}
