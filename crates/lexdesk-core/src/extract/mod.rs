//! Text extraction from uploaded files.
//!
//! The declared media type picks exactly one handler:
//! - images go through an OCR engine (Tesseract by default)
//! - PDFs are read page by page from their text layer with `lopdf`
//! - DOCX files are unpacked and their run text collected
//! - plain text is decoded as UTF-8
//!
//! Anything else is rejected with `UnsupportedFormat` before any work is done.
//! There are no retries; the first failure is returned to the caller.

pub mod docx;
pub mod ocr;
pub mod pdf;

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    error::LexError,
    types::{MediaKind, OcrProgress, UploadedFile},
};

pub use ocr::{OcrEngine, OcrEngineFactory, TesseractFactory};

/// Sink for OCR progress ticks. Non-image inputs never call it.
pub type ProgressSink<'a> = &'a mut (dyn FnMut(OcrProgress) + Send);

pub struct TextExtractor {
    ocr: Arc<dyn OcrEngineFactory>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngineFactory>) -> Self {
        Self { ocr }
    }

    pub async fn extract(
        &self,
        file: &UploadedFile,
        progress: ProgressSink<'_>,
    ) -> Result<String, LexError> {
        let kind = file.kind();
        debug!(file = %file.name, kind = kind.as_str(), bytes = file.bytes.len(), "extracting text");

        let text = match kind {
            MediaKind::Image => self.extract_image(&file.bytes, progress).await?,
            MediaKind::Pdf => {
                let bytes = file.bytes.clone();
                run_blocking(move || pdf::extract_pdf_text(&bytes)).await?
            }
            MediaKind::Docx => {
                let bytes = file.bytes.clone();
                run_blocking(move || docx::extract_docx_text(&bytes)).await?
            }
            MediaKind::Text => decode_text(&file.bytes),
            MediaKind::Unsupported(mime) => return Err(LexError::UnsupportedFormat(mime)),
        };

        if text.trim().is_empty() {
            return Err(LexError::ExtractionFailed(format!(
                "no extractable text in {}",
                file.name
            )));
        }
        info!(file = %file.name, chars = text.chars().count(), "text extracted");
        Ok(text)
    }

    /// Run OCR with a fresh engine. The engine is terminated exactly once
    /// whether recognition succeeds or fails.
    async fn extract_image(
        &self,
        bytes: &[u8],
        progress: ProgressSink<'_>,
    ) -> Result<String, LexError> {
        let mut engine = self.ocr.create().await?;
        let mut last = 0.0_f32;
        let mut monotonic = |p: OcrProgress| {
            if p.progress >= last {
                last = p.progress;
                progress(p);
            }
        };
        let result = engine.recognize(bytes, &mut monotonic).await;
        engine.terminate().await;
        result
    }
}

async fn run_blocking<F>(f: F) -> Result<String, LexError>
where
    F: FnOnce() -> Result<String, LexError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LexError::ExtractionFailed(format!("extraction task aborted: {e}")))?
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
