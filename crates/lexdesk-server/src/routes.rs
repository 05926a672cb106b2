use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::{stream, Stream, StreamExt};
use lexdesk_core::{
    batch::BatchOutcome,
    conflict::ConflictCheckRequest,
    report::{render_report, timeline},
    Feedback, LexError, MotionRequest, UploadedFile,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};

use crate::AppState;

pub(crate) const USER_HEADER: &str = "x-user-id";

// ── Error mapping ─────────────────────────────────────────────────────────

/// Every failure leaves the handler as `{title, error, kind}` with a status
/// derived from the error kind.
pub(crate) struct ApiError(LexError);

impl From<LexError> for ApiError {
    fn from(e: LexError) -> Self {
        Self(e)
    }
}

/// Unreadable or mistyped JSON bodies get the same alert shape as any other
/// validation failure.
impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self(LexError::Validation(e.body_text()))
    }
}

/// Store failures are logged in full and surfaced as "Save failed".
pub(crate) fn internal(e: anyhow::Error) -> ApiError {
    error!("storage error: {e:#}");
    ApiError(LexError::Storage(format!("{e:#}")))
}

fn status_for(e: &LexError) -> StatusCode {
    match e {
        LexError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        LexError::LibraryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LexError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LexError::RemoteService { .. } | LexError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
        LexError::ConfigurationMissing(_) | LexError::NotFound(_) => StatusCode::NOT_FOUND,
        LexError::Validation(_) => StatusCode::BAD_REQUEST,
        LexError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(e: &LexError) -> Value {
    let alert = e.alert();
    json!({ "title": alert.title, "error": alert.message, "kind": e.kind() })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(error_body(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Request helpers ───────────────────────────────────────────────────────

fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn require_user(headers: &HeaderMap) -> ApiResult<String> {
    user_id(headers)
        .ok_or_else(|| LexError::Validation("X-User-Id header is required".into()).into())
}

fn require(value: &str, what: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(LexError::Validation(format!("{what} is required")).into());
    }
    Ok(())
}

/// Browsers sometimes send uploads as `application/octet-stream`.
fn guess_media_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    Some(match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => lexdesk_core::DOCX_MIME,
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => return None,
    })
}

struct AnalyzeUpload {
    jurisdiction: String,
    files: Vec<UploadedFile>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<AnalyzeUpload> {
    let bad = |e: axum::extract::multipart::MultipartError| {
        ApiError(LexError::Validation(format!("malformed upload: {e}")))
    };
    let mut jurisdiction = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "jurisdiction" => jurisdiction = field.text().await.map_err(bad)?.trim().to_string(),
            "file" | "files" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let declared = field.content_type().unwrap_or_default().to_string();
                let media_type = match declared.as_str() {
                    "" | "application/octet-stream" => guess_media_type(&file_name)
                        .map(str::to_string)
                        .unwrap_or(declared),
                    _ => declared,
                };
                let bytes = field.bytes().await.map_err(bad)?;
                files.push(UploadedFile::new(file_name, media_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    require(&jurisdiction, "jurisdiction")?;
    Ok(AnalyzeUpload {
        jurisdiction,
        files,
    })
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backend": state.backend_name,
        "uptime_s": state.start_time.elapsed().as_secs(),
    }))
}

// Contract analysis

pub(crate) async fn analyze_contracts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let upload = read_upload(multipart).await?;
    let user = user_id(&headers);
    let outcome = state
        .batch
        .run(upload.files, &upload.jurisdiction, user.as_deref(), |p| {
            info!(processed = p.processed, total = p.total, file = %p.current_file, "batch progress");
        })
        .await?;

    Ok(Json(match outcome {
        BatchOutcome::Single { result, document } => json!({
            "document_id": document.id,
            "result": result,
            "report": render_report(&result),
        }),
        BatchOutcome::Multi { processed, total } => json!({
            "processed": processed,
            "total": total,
        }),
    }))
}

/// Per-file progress as server-sent events, then one `done` event.
pub(crate) async fn analyze_batch_sse(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let upload = read_upload(multipart).await?;
    let total = upload.files.len();
    let processed = Arc::new(AtomicUsize::new(0));

    let progress = {
        let processed = processed.clone();
        state
            .batch
            .stream(upload.files, &upload.jurisdiction, user_id(&headers).as_deref())
            .map(move |item| {
                let event = match item {
                    Ok(done) => {
                        processed.store(done.progress.processed, Ordering::SeqCst);
                        Event::default().event("progress").data(
                            json!({
                                "processed": done.progress.processed,
                                "total": done.progress.total,
                                "current_file": done.progress.current_file,
                                "document_id": done.document.id,
                            })
                            .to_string(),
                        )
                    }
                    Err(e) => Event::default().event("error").data(error_body(&e).to_string()),
                };
                Ok::<_, Infallible>(event)
            })
    };
    let done = stream::once(async move {
        let processed = processed.load(Ordering::SeqCst);
        Ok(Event::default().event("done").data(
            json!({ "processed": processed, "total": total, "completed": processed == total && total > 0 })
                .to_string(),
        ))
    });

    Ok(Sse::new(progress.chain(done)).keep_alive(KeepAlive::default()))
}

// Documents

pub(crate) async fn list_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let docs = state
        .store
        .list_documents(user_id(&headers).as_deref())
        .await
        .map_err(internal)?;
    Ok(Json(json!(docs)))
}

pub(crate) async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    match state.store.get_document(id).await.map_err(internal)? {
        Some(doc) => Ok(Json(json!(doc))),
        None => Err(LexError::NotFound(format!("document {id}")).into()),
    }
}

/// Rendered report for a stored contract analysis. Anything that is not a
/// readable analysis is reported as not found.
pub(crate) async fn document_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let not_found = || ApiError(LexError::NotFound(format!("report for document {id}")));
    let doc = state
        .store
        .get_document(id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    let analysis = doc.analysis().ok_or_else(not_found)?;

    Ok(Json(json!({
        "document_id": doc.id,
        "name": doc.name,
        "jurisdiction": doc.jurisdiction,
        "analysis": analysis,
        "report": render_report(&analysis),
        "timeline": timeline(&analysis.key_dates),
    })))
}

pub(crate) async fn put_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Result<Json<Feedback>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    if let Some(rating) = body.rating {
        if !(1..=5).contains(&rating) {
            return Err(LexError::Validation("rating must be between 1 and 5".into()).into());
        }
    }
    match state.store.update_feedback(id, &body).await.map_err(internal)? {
        Some(doc) => Ok(Json(json!(doc))),
        None => Err(LexError::NotFound(format!("document {id}")).into()),
    }
}

// Research

#[derive(Deserialize)]
pub(crate) struct ResearchBody {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub jurisdiction: String,
}

pub(crate) async fn research(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ResearchBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    require(&body.query, "query")?;
    let answer = state
        .backend
        .research(body.query.trim(), body.jurisdiction.trim())
        .await?;
    Ok(Json(json!(answer)))
}

#[derive(Deserialize)]
pub(crate) struct SaveQueryBody {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub jurisdiction: String,
    #[serde(default)]
    pub answer: String,
}

pub(crate) async fn list_saved_queries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let user = require_user(&headers)?;
    let queries = state
        .store
        .list_saved_queries(&user)
        .await
        .map_err(internal)?;
    Ok(Json(json!(queries)))
}

pub(crate) async fn save_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<SaveQueryBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = body?;
    let user = require_user(&headers)?;
    require(&body.query, "query")?;
    let saved = state
        .store
        .insert_saved_query(&user, body.query.trim(), &body.jurisdiction, &body.answer)
        .await
        .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(json!(saved))))
}

pub(crate) async fn delete_saved_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let user = require_user(&headers)?;
    if state
        .store
        .delete_saved_query(id, &user)
        .await
        .map_err(internal)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(LexError::NotFound(format!("saved query {id}")).into())
    }
}

// Court records

pub(crate) async fn get_opinion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.courtlistener.get_opinion(id).await?))
}

pub(crate) async fn get_person(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.courtlistener.get_person(id).await?))
}

pub(crate) async fn get_docket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.courtlistener.get_docket(id).await?))
}

// Motions

pub(crate) async fn draft_motion(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MotionRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    require(&body.motion_type, "motion type")?;
    require(&body.jurisdiction, "jurisdiction")?;
    require(&body.facts, "facts")?;
    let draft = state.backend.draft_motion(&body).await?;
    Ok(Json(json!(draft)))
}

// Conflict check

#[derive(Deserialize)]
pub(crate) struct ConflictBody {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub matter_summary: String,
    pub opposing_parties: Option<String>,
}

pub(crate) async fn conflict_check(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ConflictBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let request = ConflictCheckRequest::new(
        &body.client_name,
        &body.matter_summary,
        body.opposing_parties.as_deref(),
    )?;
    let conflicts = state.edge.smart_conflict_check(&request).await?;
    Ok(Json(json!({ "conflicts": conflicts })))
}

// USCIS forms

pub(crate) async fn list_forms(State(state): State<Arc<AppState>>) -> Json<Value> {
    let forms: Vec<Value> = state
        .forms
        .list()
        .map(|f| {
            json!({
                "form_id": f.form_id,
                "title": f.title,
                "fields": f.fields.keys().collect::<Vec<_>>(),
            })
        })
        .collect();
    Json(json!(forms))
}

pub(crate) async fn fill_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    answers: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(answers) = answers?;
    let template = state
        .forms
        .get(&form_id)
        .ok_or_else(|| LexError::ConfigurationMissing(form_id.clone()))?;
    let (pdf, report) = state.filler.fill(template, &answers).await?;

    let file_name = format!("{}-filled.pdf", template.form_id.to_ascii_lowercase());
    Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .header("x-fields-filled", report.filled.len())
        .header("x-fields-failed", report.failed.len())
        .body(Body::from(pdf))
        .map_err(|e| LexError::Storage(format!("building PDF response: {e}")).into())
}

// SSE logs: replays ring buffer history then streams live events

pub(crate) async fn sse_logs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    // Subscribe before snapshotting ring to avoid race
    let mut live_rx = state.log_tx.subscribe();
    let history: Vec<String> = state
        .log_ring
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .cloned()
        .collect();
    tokio::spawn(async move {
        for line in history {
            if tx.send(line).is_err() {
                return;
            }
        }
        loop {
            match live_rx.recv().await {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
    let stream = UnboundedReceiverStream::new(rx)
        .map(|data| Ok::<_, Infallible>(Event::default().data(data)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    )
}
