use std::sync::Arc;

use futures::{stream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    agent::AnalysisBackend,
    db::DocumentStore,
    error::LexError,
    extract::TextExtractor,
    types::{AnalysisResult, BatchProgress, Document, NewDocument, OcrProgress, UploadedFile},
};

/// One file's completed extract → analyze → persist cycle.
#[derive(Debug, Clone)]
pub struct FileAnalyzed {
    /// Zero-based position in the submitted list.
    pub index: usize,
    pub result: AnalysisResult,
    pub document: Document,
    pub progress: BatchProgress,
}

/// What the caller gets back once a run finishes.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// One file submitted: the result is shown immediately.
    Single {
        result: AnalysisResult,
        document: Document,
    },
    /// Several files: only the counts are surfaced.
    Multi { processed: usize, total: usize },
}

/// Runs contract analysis over uploaded files strictly one at a time.
///
/// Each file is fully extracted, analyzed and persisted before the next one
/// starts. The first failure ends the run: documents already saved stay saved
/// and the remaining files are never attempted.
#[derive(Clone)]
pub struct BatchDriver {
    extractor: Arc<TextExtractor>,
    backend: Arc<dyn AnalysisBackend>,
    store: Arc<dyn DocumentStore>,
}

struct RunState {
    driver: BatchDriver,
    files: std::vec::IntoIter<UploadedFile>,
    index: usize,
    total: usize,
    jurisdiction: String,
    user_id: Option<String>,
    failed: bool,
}

impl BatchDriver {
    pub fn new(
        extractor: Arc<TextExtractor>,
        backend: Arc<dyn AnalysisBackend>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            extractor,
            backend,
            store,
        }
    }

    /// Stream of per-file completions in input order. After an `Err` item the
    /// stream ends. An empty file list yields a single validation error.
    pub fn stream(
        &self,
        files: Vec<UploadedFile>,
        jurisdiction: &str,
        user_id: Option<&str>,
    ) -> impl Stream<Item = Result<FileAnalyzed, LexError>> + Send + 'static {
        let state = RunState {
            driver: self.clone(),
            total: files.len(),
            files: files.into_iter(),
            index: 0,
            jurisdiction: jurisdiction.to_string(),
            user_id: user_id.map(str::to_string),
            failed: false,
        };

        stream::unfold(state, |mut st| async move {
            if st.failed {
                return None;
            }
            if st.total == 0 {
                st.failed = true;
                return Some((
                    Err(LexError::Validation("select at least one file to analyze".into())),
                    st,
                ));
            }
            let file = st.files.next()?;
            let index = st.index;
            st.index += 1;

            let item = st
                .driver
                .process_one(&file, &st.jurisdiction, st.user_id.as_deref())
                .await
                .map(|(result, document)| FileAnalyzed {
                    index,
                    result,
                    document,
                    progress: BatchProgress {
                        processed: index + 1,
                        total: st.total,
                        current_file: file.name.clone(),
                    },
                });

            if let Err(e) = &item {
                warn!(
                    file = %file.name,
                    position = index + 1,
                    total = st.total,
                    kind = e.kind(),
                    "batch aborted: {e}"
                );
                st.failed = true;
            }
            Some((item, st))
        })
    }

    /// Drive a whole run, reporting progress after each file.
    pub async fn run(
        &self,
        files: Vec<UploadedFile>,
        jurisdiction: &str,
        user_id: Option<&str>,
        mut on_progress: impl FnMut(&BatchProgress) + Send,
    ) -> Result<BatchOutcome, LexError> {
        let total = files.len();
        let mut events = Box::pin(self.stream(files, jurisdiction, user_id));
        let mut last: Option<FileAnalyzed> = None;

        while let Some(event) = events.next().await {
            let event = event?;
            on_progress(&event.progress);
            last = Some(event);
        }

        match (total, last) {
            (1, Some(only)) => Ok(BatchOutcome::Single {
                result: only.result,
                document: only.document,
            }),
            (_, last) => Ok(BatchOutcome::Multi {
                processed: last.map(|e| e.progress.processed).unwrap_or(0),
                total,
            }),
        }
    }

    async fn process_one(
        &self,
        file: &UploadedFile,
        jurisdiction: &str,
        user_id: Option<&str>,
    ) -> Result<(AnalysisResult, Document), LexError> {
        let name = file.name.clone();
        let mut ocr_progress = |p: OcrProgress| {
            tracing::debug!(file = %name, status = %p.status, progress = p.progress, "ocr");
        };
        let text = self.extractor.extract(file, &mut ocr_progress).await?;

        let result = self.backend.analyze_contract(&text, jurisdiction).await?;

        let new_doc = NewDocument::contract_analysis(&file.name, jurisdiction, &result, user_id)
            .map_err(LexError::storage)?;
        let document = self
            .store
            .insert_document(&new_doc)
            .await
            .map_err(|e| LexError::Storage(format!("{e:#}")))?;

        info!(
            file = %file.name,
            document_id = document.id,
            risks = result.risks.len(),
            "contract analyzed and saved"
        );
        Ok((result, document))
    }
}
