// Tenure Metrics - Web Server
// REST API with Axum over the engine and the ranked record store

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use tenure_metrics::config::CONFIG_ENV;
use tenure_metrics::{
    AverageTable, BlobStore, Config, ConsolidatedTable, DisplayRecord, GrowthFormula, Inputs,
    RankedRecord, RankingStore, RecordDraft, StoreError,
};

type Store = RankingStore<Box<dyn BlobStore + Send>>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    /// Computed once at startup; None when the source tables failed to load
    consolidated: Option<Arc<ConsolidatedTable>>,
    averages: Option<Arc<AverageTable>>,
    store: Arc<Mutex<Store>>,
    growth: GrowthFormula,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
        .into_response()
}

fn store_failure(err: StoreError) -> Response {
    let status = match &err {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Duplicate { .. } | StoreError::Ambiguous { .. } => StatusCode::CONFLICT,
        StoreError::Storage(_) | StoreError::Format(_) => {
            error!("Rankings storage failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    failure(status, err.to_string())
}

fn not_loaded() -> Response {
    failure(
        StatusCode::SERVICE_UNAVAILABLE,
        "source tables are not loaded; check [data] in the config".to_string(),
    )
}

/// Row of the rankings table as the UI shows it
#[derive(Serialize)]
struct RankingResponse {
    #[serde(flatten)]
    shown: DisplayRecord,
}

impl From<&RankedRecord> for RankingResponse {
    fn from(record: &RankedRecord) -> Self {
        RankingResponse {
            shown: record.display_record(),
        }
    }
}

#[derive(Deserialize)]
struct ListParams {
    /// Order by growth instead of most-recent-first
    #[serde(default)]
    ranked: bool,
}

#[derive(Deserialize)]
struct RemoveParams {
    growth: Option<f64>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/consolidated - Tenures joined at their boundary years
async fn get_consolidated(State(state): State<AppState>) -> Response {
    match &state.consolidated {
        Some(table) => ApiResponse::ok(table.as_ref()),
        None => not_loaded(),
    }
}

/// GET /api/averages - Indicator means over each tenure
async fn get_averages(State(state): State<AppState>) -> Response {
    match &state.averages {
        Some(table) => ApiResponse::ok(table.as_ref()),
        None => not_loaded(),
    }
}

/// GET /api/rankings - Current list
async fn get_rankings(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let store = state.store.lock().unwrap_or_else(PoisonError::into_inner);

    let rows: Vec<RankingResponse> = if params.ranked {
        store.ranked().into_iter().map(RankingResponse::from).collect()
    } else {
        store.records().iter().map(RankingResponse::from).collect()
    };

    ApiResponse::ok(rows)
}

/// Malformed bodies get the same envelope as validation failures
fn read_draft(payload: Result<Json<RecordDraft>, JsonRejection>) -> Result<RecordDraft, Response> {
    payload
        .map(|Json(draft)| draft)
        .map_err(|rejection| failure(StatusCode::BAD_REQUEST, rejection.body_text()))
}

/// POST /api/rankings - Add a record
async fn add_ranking(
    State(state): State<AppState>,
    payload: Result<Json<RecordDraft>, JsonRejection>,
) -> Response {
    let draft = match read_draft(payload) {
        Ok(draft) => draft,
        Err(response) => return response,
    };

    let mut store = state.store.lock().unwrap_or_else(PoisonError::into_inner);

    match store.insert(&draft, &state.growth) {
        Ok(record) => {
            info!(name = %record.name, growth = record.derived_growth, "ranking added");
            ApiResponse::ok(RankingResponse::from(&record))
        }
        Err(e) => store_failure(e),
    }
}

/// DELETE /api/rankings/:name?growth= - Remove a record
async fn remove_ranking(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<RemoveParams>,
) -> Response {
    // Decode URL-encoded name
    let decoded_name = urlencoding::decode(&name)
        .unwrap_or_else(|_| name.clone().into())
        .into_owned();

    let mut store = state.store.lock().unwrap_or_else(PoisonError::into_inner);

    match store.remove(&decoded_name, params.growth) {
        Ok(record) => {
            info!(name = %record.name, "ranking removed");
            ApiResponse::ok(RankingResponse::from(&record))
        }
        Err(e) => store_failure(e),
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/consolidated", get(get_consolidated))
        .route("/averages", get(get_averages))
        .route("/rankings", get(get_rankings).post(add_ranking))
        .route("/rankings/:name", delete(remove_ranking))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    info!("🌐 Tenure Metrics - Web Server");

    let (consolidated, averages) = match Inputs::load(&config) {
        Ok(inputs) => (
            Some(Arc::new(inputs.consolidate())),
            Some(Arc::new(inputs.average())),
        ),
        Err(e) => {
            warn!("Source tables not loaded: {}", e);
            (None, None)
        }
    };

    let backend = config.store.open_backend()?;
    let store = RankingStore::open(backend, config.store.options()).context("Failed to load rankings")?;
    info!(records = store.len(), backend = store.backend().backend(), "rankings loaded");

    let state = AppState {
        consolidated,
        averages,
        store: Arc::new(Mutex::new(store)),
        growth: config.store.growth,
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;

    info!("🚀 Server running on http://{}", config.server.bind);
    info!("   API: http://{}/api/rankings", config.server.bind);

    axum::serve(listener, router(state))
        .await
        .context("Server stopped")?;

    Ok(())
}
