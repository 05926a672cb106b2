use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use lexdesk_core::agent::AnalysisBackend;
use lexdesk_core::batch::{BatchDriver, BatchOutcome};
use lexdesk_core::db::{DocumentStore, MemoryStore};
use lexdesk_core::extract::{OcrEngine, OcrEngineFactory, TextExtractor};
use lexdesk_core::{
    AnalysisResult, BatchProgress, KeyDate, LexError, MotionDraft, MotionRequest, ResearchAnswer,
    Risk, Severity, UploadedFile, DOC_TYPE_CONTRACT_ANALYSIS,
};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Echoes the contract text back as the summary; fails on call `fail_on`.
struct ScriptedBackend {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

impl ScriptedBackend {
    fn new(fail_on: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on,
        })
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn analyze_contract(
        &self,
        text: &str,
        jurisdiction: &str,
    ) -> Result<AnalysisResult, LexError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(LexError::remote(Some(502), "upstream unavailable"));
        }
        Ok(AnalysisResult {
            summary: format!("{text} ({jurisdiction})"),
            risks: vec![Risk {
                clause: "Termination".into(),
                severity: Severity::High,
                description: "no notice period".into(),
            }],
            key_dates: vec![KeyDate {
                label: "Effective".into(),
                date: "2025-01-01".into(),
            }],
            ..AnalysisResult::default()
        })
    }

    async fn research(&self, _query: &str, _jurisdiction: &str) -> Result<ResearchAnswer, LexError> {
        unreachable!("batch never researches")
    }

    async fn draft_motion(&self, _request: &MotionRequest) -> Result<MotionDraft, LexError> {
        unreachable!("batch never drafts")
    }
}

struct NoOcr;

#[async_trait]
impl OcrEngineFactory for NoOcr {
    async fn create(&self) -> Result<Box<dyn OcrEngine>, LexError> {
        Err(LexError::LibraryUnavailable("no OCR in tests".into()))
    }
}

fn driver(backend: Arc<ScriptedBackend>, store: Arc<MemoryStore>) -> BatchDriver {
    BatchDriver::new(Arc::new(TextExtractor::new(Arc::new(NoOcr))), backend, store)
}

fn text_file(name: &str, body: &str) -> UploadedFile {
    UploadedFile::new(name, "text/plain", body.as_bytes().to_vec())
}

// ── runs ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_file_becomes_a_document_in_order() {
    let backend = ScriptedBackend::new(None);
    let store = Arc::new(MemoryStore::new());
    let files = vec![
        text_file("a.txt", "lease"),
        text_file("b.txt", "nda"),
        text_file("c.txt", "msa"),
    ];
    let progress = Arc::new(Mutex::new(Vec::<BatchProgress>::new()));
    let sink = progress.clone();

    let outcome = driver(backend.clone(), store.clone())
        .run(files, "California", Some("user-1"), move |p| {
            sink.lock().unwrap().push(p.clone())
        })
        .await
        .unwrap();

    assert!(matches!(outcome, BatchOutcome::Multi { processed: 3, total: 3 }));
    let docs = store.documents();
    let names: Vec<_> = docs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    assert!(docs.iter().all(|d| d.doc_type == DOC_TYPE_CONTRACT_ANALYSIS
        && d.status == "analyzed"
        && d.jurisdiction == "California"
        && d.user_id.as_deref() == Some("user-1")));

    let progress = progress.lock().unwrap();
    let processed: Vec<_> = progress.iter().map(|p| p.processed).collect();
    assert_eq!(processed, vec![1, 2, 3]);
    assert_eq!(progress[2].total, 3);
    assert_eq!(progress[2].current_file, "c.txt");
}

#[tokio::test]
async fn failure_stops_the_batch_and_keeps_earlier_documents() {
    let backend = ScriptedBackend::new(Some(2));
    let store = Arc::new(MemoryStore::new());
    let files = vec![
        text_file("one.txt", "first"),
        text_file("two.txt", "second"),
        text_file("three.txt", "third"),
        text_file("four.txt", "fourth"),
    ];

    let err = driver(backend.clone(), store.clone())
        .run(files, "Texas", None, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, LexError::RemoteService { status: Some(502), .. }));
    assert_eq!(store.documents().len(), 1);
    assert_eq!(store.documents()[0].name, "one.txt");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2, "no file after the failure is attempted");
}

#[tokio::test]
async fn extraction_failure_also_stops_the_batch() {
    let backend = ScriptedBackend::new(None);
    let store = Arc::new(MemoryStore::new());
    let files = vec![
        text_file("ok.txt", "fine"),
        UploadedFile::new("song.mp3", "audio/mpeg", vec![0; 4]),
        text_file("later.txt", "never read"),
    ];

    let events: Vec<_> = driver(backend.clone(), store.clone())
        .stream(files, "Ohio", None)
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(events[0].is_ok());
    assert!(matches!(events[1], Err(LexError::UnsupportedFormat(_))));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.documents().len(), 1);
}

#[tokio::test]
async fn empty_selection_is_a_validation_error() {
    let backend = ScriptedBackend::new(None);
    let store = Arc::new(MemoryStore::new());

    let err = driver(backend.clone(), store)
        .run(Vec::new(), "Ohio", None, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, LexError::Validation(_)));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_file_returns_its_result() {
    let backend = ScriptedBackend::new(None);
    let store = Arc::new(MemoryStore::new());

    let outcome = driver(backend, store.clone())
        .run(vec![text_file("lease.txt", "lease")], "New York", None, |_| {})
        .await
        .unwrap();

    let BatchOutcome::Single { result, document } = outcome else {
        panic!("expected single outcome");
    };
    assert_eq!(result.summary, "lease (New York)");
    assert_eq!(document.analysis(), Some(result));
    let stored = store.get_document(document.id).await.unwrap().unwrap();
    assert_eq!(stored, document);
}
