use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use lexdesk_core::LexError;
use lexdesk_domains::courtlistener::CourtListenerClient;

// ── helpers ──────────────────────────────────────────────────────────────────

/// Accept one connection, read the request head, then answer with `response`
/// or, when `None`, hold the socket open without replying.
async fn server(response: Option<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = sock.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        match response {
            Some(response) => {
                sock.write_all(response.as_bytes()).await.unwrap();
                sock.shutdown().await.ok();
            }
            None => tokio::time::sleep(Duration::from_secs(30)).await,
        }
    });

    format!("http://{addr}")
}

fn reply(status: &str, body: &str) -> Option<String> {
    Some(format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    ))
}

// ── lookups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn opinion_lookup_returns_cluster_json() {
    let base = server(reply("200 OK", r#"{"id": 42, "case_name": "Doe v. Roe"}"#)).await;
    let client = CourtListenerClient::new("", Duration::from_secs(5)).with_base_url(base);

    let cluster = client.get_opinion(42).await.unwrap();

    assert_eq!(cluster["case_name"], "Doe v. Roe");
}

#[tokio::test]
async fn upstream_404_is_not_found() {
    let base = server(reply("404 Not Found", r#"{"detail": "No Docket matches the given query."}"#)).await;
    let client = CourtListenerClient::new("t0k", Duration::from_secs(5)).with_base_url(base);

    let err = client.get_docket(7).await.unwrap_err();

    assert!(matches!(err, LexError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn silent_upstream_times_out_as_remote_error() {
    let base = server(None).await;
    let client = CourtListenerClient::new("", Duration::from_millis(200)).with_base_url(base);

    let err = tokio::time::timeout(Duration::from_secs(10), client.get_person(1))
        .await
        .expect("lookup should honour the client timeout")
        .unwrap_err();

    assert!(matches!(err, LexError::RemoteService { status: None, .. }), "{err:?}");
}
