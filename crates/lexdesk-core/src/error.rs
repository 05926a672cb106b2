use thiserror::Error;

/// Failure taxonomy shared by every flow in the workspace.
///
/// Validation failures are raised before any network call is made. Remote
/// failures carry the upstream status (when there was one) and the message from
/// the `{error: string}` body if the service sent one.
#[derive(Debug, Error)]
pub enum LexError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("extraction engine unavailable: {0}")]
    LibraryUnavailable(String),

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("remote service error{}: {message}", status_suffix(.status))]
    RemoteService { status: Option<u16>, message: String },

    #[error("no template configured for {0}")]
    ConfigurationMissing(String),

    #[error("template fetch failed: {0}")]
    FetchFailed(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Short title + message pair shown to the user as an inline alert.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Alert {
    pub title: &'static str,
    pub message: String,
}

impl LexError {
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteService {
            status,
            message: message.into(),
        }
    }

    pub fn storage(e: impl std::fmt::Display) -> Self {
        Self::Storage(e.to_string())
    }

    /// Stable machine-readable kind, used in API error bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::LibraryUnavailable(_) => "library_unavailable",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::RemoteService { .. } => "remote_service_error",
            Self::ConfigurationMissing(_) => "configuration_missing",
            Self::FetchFailed(_) => "fetch_failed",
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage_error",
        }
    }

    pub fn alert(&self) -> Alert {
        let title = match self {
            Self::UnsupportedFormat(_) => "Unsupported file",
            Self::LibraryUnavailable(_) | Self::ExtractionFailed(_) => "Could not read file",
            Self::RemoteService { .. } => "Service error",
            Self::ConfigurationMissing(_) | Self::FetchFailed(_) => "Template unavailable",
            Self::Validation(_) => "Missing information",
            Self::NotFound(_) => "Not found",
            Self::Storage(_) => "Save failed",
        };
        let message = match self {
            Self::RemoteService { message, .. } => message.clone(),
            Self::ConfigurationMissing(_) | Self::FetchFailed(_) => {
                "The PDF template for this form is not available right now.".to_string()
            }
            other => other.to_string(),
        };
        Alert { title, message }
    }
}
