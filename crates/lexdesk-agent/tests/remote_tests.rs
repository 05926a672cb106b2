use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing_test::traced_test;

use lexdesk_agent::{EdgeFunctions, GeminiBackend, ResearchService};
use lexdesk_core::agent::AnalysisBackend;
use lexdesk_core::conflict::ConflictCheckRequest;
use lexdesk_core::{LexError, Severity};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Serve exactly one HTTP response and hand back the raw request.
async fn one_shot_server(status: &str, body: &str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = sock.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());
    });

    (format!("http://{addr}"), rx)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(head_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..head_end]
        .lines()
        .find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.eq_ignore_ascii_case("content-length")
                .then(|| v.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= head_end + 4 + content_length
}

const TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Research service
// =============================================================================

#[tokio::test]
async fn research_service_parses_analysis() {
    let (url, request) = one_shot_server(
        "200 OK",
        r#"{"summary":"Lease","risks":[{"clause":"Deposit","severity":"critical","description":"non-refundable"}],"missingClauses":["Notice"]}"#,
    )
    .await;

    let result = ResearchService::new(url, TIMEOUT)
        .analyze_contract("Deposit is non-refundable.", "Washington")
        .await
        .unwrap();

    assert_eq!(result.summary, "Lease");
    assert_eq!(result.risks[0].severity, Severity::Critical);
    assert_eq!(result.missing_clauses, vec!["Notice"]);

    let raw = request.await.unwrap();
    assert!(raw.starts_with("POST /api/analyze-contract"));
    assert!(raw.contains(r#""jurisdiction":"Washington""#));
}

#[tokio::test]
#[traced_test]
async fn error_body_message_becomes_remote_error() {
    let (url, _request) =
        one_shot_server("400 Bad Request", r#"{"error":"Query is required"}"#).await;

    let err = ResearchService::new(url, TIMEOUT)
        .research("", "Texas")
        .await
        .unwrap_err();

    match err {
        LexError::RemoteService { status, message } => {
            assert_eq!(status, Some(400));
            assert_eq!(message, "Query is required");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(logs_contain("non-success response"));
}

#[tokio::test]
#[traced_test]
async fn malformed_json_is_remote_error() {
    let (url, _request) = one_shot_server("200 OK", "<html>oops</html>").await;

    let err = ResearchService::new(url, TIMEOUT)
        .research("adverse possession", "Texas")
        .await
        .unwrap_err();

    assert!(matches!(err, LexError::RemoteService { status: Some(200), .. }));
    assert!(logs_contain("malformed response"));
}

#[tokio::test]
async fn unreachable_service_is_remote_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = ResearchService::new(format!("http://{addr}"), TIMEOUT)
        .research("q", "j")
        .await
        .unwrap_err();

    assert!(matches!(err, LexError::RemoteService { status: None, .. }));
}

// =============================================================================
// Gemini
// =============================================================================

#[tokio::test]
async fn gemini_fenced_answer_is_parsed() {
    let answer = serde_json::json!({
        "candidates": [{"content": {"parts": [
            {"text": "```json\n{\"answer\":\"Yes, within 30 days.\",\"citations\":[\"Cal. Civ. Code 1950.5\"]}\n```"}
        ]}}]
    })
    .to_string();
    let (url, request) = one_shot_server("200 OK", &answer).await;

    let got = GeminiBackend::new("test-key", "gemini-1.5-flash", TIMEOUT)
        .with_base_url(url)
        .research("deposit return deadline", "California")
        .await
        .unwrap();

    assert_eq!(got.answer, "Yes, within 30 days.");
    assert_eq!(got.citations, vec!["Cal. Civ. Code 1950.5"]);
    let raw = request.await.unwrap();
    assert!(raw.starts_with("POST /models/gemini-1.5-flash:generateContent"));
    assert!(raw.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
}

#[tokio::test]
async fn gemini_without_key_fails_before_network() {
    let err = GeminiBackend::new("", "gemini-1.5-flash", TIMEOUT)
        .with_base_url("http://127.0.0.1:9")
        .research("q", "j")
        .await
        .unwrap_err();
    assert!(matches!(err, LexError::RemoteService { status: None, .. }));
}

// =============================================================================
// Edge functions
// =============================================================================

#[tokio::test]
async fn conflict_check_posts_validated_body() {
    let (url, request) = one_shot_server(
        "200 OK",
        r#"{"conflicts":[{"conflictType":"direct","partiesInvolved":["Acme","Beta"],"reason":"former client"}]}"#,
    )
    .await;
    let req = ConflictCheckRequest::new("Acme LLC", "Breach of supply agreement", None).unwrap();

    let conflicts = EdgeFunctions::new(url, "anon", TIMEOUT)
        .smart_conflict_check(&req)
        .await
        .unwrap();

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].parties_involved.names(), vec!["Acme", "Beta"]);
    let raw = request.await.unwrap();
    assert!(raw.starts_with("POST /smart-conflict-check"));
    assert!(raw.contains(r#""opposing_parties":"""#));
    assert!(raw.to_ascii_lowercase().contains("authorization: bearer anon"));
}

#[tokio::test]
async fn conflict_check_rejects_non_list() {
    let (url, _request) = one_shot_server("200 OK", r#"{"conflicts":{"a":1}}"#).await;
    let req = ConflictCheckRequest::new("Acme LLC", "Breach of supply agreement", None).unwrap();

    let err = EdgeFunctions::new(url, "anon", TIMEOUT)
        .smart_conflict_check(&req)
        .await
        .unwrap_err();

    assert!(matches!(err, LexError::RemoteService { .. }));
}
