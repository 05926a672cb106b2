mod logging;
mod routes;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use lexdesk_agent::{backend_from_config, EdgeFunctions};
use lexdesk_core::{
    agent::AnalysisBackend,
    batch::BatchDriver,
    config::Config,
    db::{DocumentStore, MemoryStore, PgStore},
    extract::{TesseractFactory, TextExtractor},
    forms::FormFiller,
};
use lexdesk_domains::{courtlistener::CourtListenerClient, FormCatalog};
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::logging::{BroadcastLayer, LogRing, RING_CAPACITY};
use crate::routes::*;

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub backend_name: String,
    pub start_time: Instant,
    pub store: Arc<dyn DocumentStore>,
    pub backend: Arc<dyn AnalysisBackend>,
    pub batch: BatchDriver,
    pub edge: EdgeFunctions,
    pub courtlistener: CourtListenerClient,
    pub forms: FormCatalog,
    pub filler: FormFiller,
    pub log_tx: broadcast::Sender<String>,
    pub log_ring: LogRing,
}

pub(crate) fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(health))
        // Contract analysis
        .route("/api/contracts/analyze", post(analyze_contracts))
        .route("/api/contracts/batch", post(analyze_batch_sse))
        // Documents
        .route("/api/documents", get(list_documents))
        .route("/api/documents/:id", get(get_document))
        .route("/api/documents/:id/report", get(document_report))
        .route("/api/documents/:id/feedback", put(put_feedback))
        // Research
        .route("/api/research", post(research))
        .route("/api/saved-queries", get(list_saved_queries).post(save_query))
        .route("/api/saved-queries/:id", axum::routing::delete(delete_saved_query))
        // Court records
        .route("/api/opinions/:id", get(get_opinion))
        .route("/api/people/:id", get(get_person))
        .route("/api/dockets/:id", get(get_docket))
        // Drafting and intake
        .route("/api/motions/draft", post(draft_motion))
        .route("/api/conflicts/check", post(conflict_check))
        // USCIS forms
        .route("/api/forms", get(list_forms))
        .route("/api/forms/:form_id/fill", post(fill_form))
        // SSE logs
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ── main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_tx, _) = broadcast::channel::<String>(1024);
    let log_ring: LogRing = Arc::new(Mutex::new(VecDeque::with_capacity(RING_CAPACITY)));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lexdesk_server=info,lexdesk_core=info,lexdesk_agent=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(BroadcastLayer {
            tx: log_tx.clone(),
            ring: Arc::clone(&log_ring),
        })
        .init();

    let config = Config::from_env()?;
    let timeout = Duration::from_secs(config.http_timeout_s);

    let store: Arc<dyn DocumentStore> = if config.database_url.is_empty() {
        warn!("DATABASE_URL not set; documents are kept in memory only");
        Arc::new(MemoryStore::new())
    } else {
        let pg = PgStore::connect(&config.database_url)?;
        pg.migrate().await?;
        Arc::new(pg)
    };

    let backend = backend_from_config(&config);
    info!(backend = %config.backend, "analysis backend selected");

    let extractor = Arc::new(TextExtractor::new(Arc::new(TesseractFactory::new(
        config.tesseract_path.clone(),
        config.ocr_language.clone(),
    ))));

    let forms = FormCatalog::load(&config.form_catalog_path)?;
    info!(forms = forms.list().count(), "form catalog ready");

    let state = Arc::new(AppState {
        backend_name: config.backend.clone(),
        start_time: Instant::now(),
        batch: BatchDriver::new(extractor, Arc::clone(&backend), Arc::clone(&store)),
        store,
        backend,
        edge: EdgeFunctions::new(config.functions_url(), config.supabase_anon_key.clone(), timeout),
        courtlistener: CourtListenerClient::new(&config.courtlistener_token, timeout),
        forms,
        filler: FormFiller::new(config.template_proxy.clone(), timeout),
        log_tx,
        log_ring,
    });

    let app = router(state, config.max_upload_mb * 1024 * 1024);

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
