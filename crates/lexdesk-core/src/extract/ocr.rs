use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::{error::LexError, types::OcrProgress};

/// A live OCR engine instance. Acquired per extraction and always terminated
/// by the caller, on success and on failure.
#[async_trait]
pub trait OcrEngine: Send {
    async fn recognize(
        &mut self,
        image: &[u8],
        progress: &mut (dyn FnMut(OcrProgress) + Send),
    ) -> Result<String, LexError>;

    async fn terminate(self: Box<Self>);
}

#[async_trait]
pub trait OcrEngineFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn OcrEngine>, LexError>;
}

fn tick(progress: &mut (dyn FnMut(OcrProgress) + Send), status: &str, fraction: f32) {
    progress(OcrProgress {
        status: status.to_string(),
        progress: fraction,
    });
}

// ── Tesseract CLI ─────────────────────────────────────────────────────────

/// Spawns the `tesseract` binary. Each engine owns a scratch directory that
/// is removed on terminate.
pub struct TesseractFactory {
    pub binary: String,
    pub language: String,
}

impl TesseractFactory {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrEngineFactory for TesseractFactory {
    async fn create(&self) -> Result<Box<dyn OcrEngine>, LexError> {
        let version_check = tokio::process::Command::new(&self.binary)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;
        match version_check {
            Ok(s) if s.success() => {}
            Ok(s) => {
                return Err(LexError::LibraryUnavailable(format!(
                    "{} --version exited with {s}",
                    self.binary
                )))
            }
            Err(e) => {
                return Err(LexError::LibraryUnavailable(format!(
                    "cannot run {}: {e}",
                    self.binary
                )))
            }
        }

        let workdir = tempfile::Builder::new()
            .prefix("lexdesk-ocr-")
            .tempdir()
            .map_err(|e| LexError::LibraryUnavailable(format!("scratch dir: {e}")))?;
        debug!(dir = %workdir.path().display(), "tesseract engine created");

        Ok(Box::new(TesseractEngine {
            binary: self.binary.clone(),
            language: self.language.clone(),
            workdir: Some(workdir),
        }))
    }
}

struct TesseractEngine {
    binary: String,
    language: String,
    workdir: Option<TempDir>,
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(
        &mut self,
        image: &[u8],
        progress: &mut (dyn FnMut(OcrProgress) + Send),
    ) -> Result<String, LexError> {
        let dir = self
            .workdir
            .as_ref()
            .ok_or_else(|| LexError::LibraryUnavailable("engine already terminated".into()))?;

        tick(progress, "loading tesseract core", 0.0);
        let input = dir.path().join("input");
        tokio::fs::write(&input, image)
            .await
            .map_err(|e| LexError::ExtractionFailed(format!("writing image: {e}")))?;

        tick(progress, "initializing api", 0.2);
        tick(progress, "recognizing text", 0.3);
        let output = tokio::process::Command::new(&self.binary)
            .arg(&input)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .await
            .map_err(|e| LexError::ExtractionFailed(format!("running tesseract: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LexError::ExtractionFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tick(progress, "recognizing text", 1.0);
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn terminate(mut self: Box<Self>) {
        if let Some(dir) = self.workdir.take() {
            let path = dir.path().display().to_string();
            if let Err(e) = dir.close() {
                warn!(dir = %path, "failed to remove OCR scratch dir: {e}");
            }
        }
    }
}
