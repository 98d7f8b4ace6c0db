use axum::{
    Json, Router,
    body::Body,
    extract::{Extension, Multipart, Path, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::auth::{self, CurrentUser, SessionStore, UserStore};
use crate::config::AppConfig;
use crate::report::{self, ReportContext};
use crate::retention::enforce_retention;
use crate::store::{Dataset, DatasetStore, HistoryEntry, store_upload};
use crate::summary::{Summary, SummaryOutcome, compute_summary};

/// Shared application state
///
/// Holds the stores and configuration explicitly; handlers receive it
/// through axum's state extractor rather than through module-level globals.
pub struct AppState {
    pub config: AppConfig,
    pub users: UserStore,
    pub sessions: SessionStore,
    pub datasets: DatasetStore,
}

/// Open all stores under the configured data directory
pub fn build_state(config: AppConfig) -> Result<Arc<AppState>, String> {
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| format!("Failed to create data directory: {}", e))?;
    let users = UserStore::open(config.users_file())?;
    let datasets = DatasetStore::open(config.datasets_file()).map_err(|e| e.to_string())?;

    Ok(Arc::new(AppState {
        users,
        sessions: SessionStore::new(),
        datasets,
        config,
    }))
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let datasets = Router::new()
        .route("/upload", post(upload_dataset))
        .route("/history", get(dataset_history))
        .route("/:id/summary", get(dataset_summary))
        .route("/:id/report", get(dataset_report))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/", get(serve_index))
        .route("/api/auth/register", post(auth::handle_register))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/logout", post(auth::handle_logout))
        .nest("/api/datasets", datasets)
        .with_state(state)
}

/// Start the web application
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr.clone();
    let state = build_state(config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "dataset not found"})),
    )
        .into_response()
}

/// Handle dataset upload
///
/// Persists the uploaded file, inserts the record, computes the summary
/// synchronously and then prunes the owner's history to the retention
/// window. A summary computation failure is cached as an error marker; the
/// upload itself still succeeds.
async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Response {
    let mut file_data = Vec::new();
    let mut original_filename = String::new();

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("file") {
            original_filename = field.file_name().unwrap_or("upload.csv").to_string();
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "No file data received"})),
        )
            .into_response();
    }

    let stored = match store_upload(&state.config.data_dir, &owner, &original_filename, &file_data)
    {
        Ok(path) => path,
        Err(e) => {
            error!("upload: failed to persist file for {}: {}", owner, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to store uploaded file"})),
            )
                .into_response();
        }
    };

    let record = match state.datasets.insert(&owner, stored, &original_filename) {
        Ok(record) => record,
        Err(e) => {
            error!("upload: failed to insert record for {}: {}", owner, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to record upload"})),
            )
                .into_response();
        }
    };

    let outcome = match compute_summary(&record.file, state.config.preview_rows) {
        Ok(summary) => SummaryOutcome::Ready(summary),
        Err(e) => {
            warn!(
                "upload: summary computation failed for dataset {}: {}",
                record.id, e
            );
            SummaryOutcome::Failed {
                error: format!("summary failed: {}", e),
            }
        }
    };
    let summary_value = serde_json::to_value(&outcome).unwrap_or(Value::Null);
    if let Err(e) = state.datasets.set_summary(record.id, outcome) {
        error!("upload: failed to cache summary for dataset {}: {}", record.id, e);
    }

    enforce_retention(&state.datasets, &owner, state.config.retention_keep);

    (
        StatusCode::CREATED,
        Json(json!({
            "dataset_id": record.id,
            "summary": summary_value,
            "summary_url": format!("/api/datasets/{}/summary", record.id),
            "history_url": "/api/datasets/history",
        })),
    )
        .into_response()
}

/// Flatten a summary into the response payload, merging in the dataset id
fn summary_response(id: u64, summary: &Summary) -> Response {
    let mut payload = match serde_json::to_value(summary) {
        Ok(Value::Object(map)) => map,
        _ => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "summary serialization failed"})),
            )
                .into_response();
        }
    };
    payload.insert("dataset_id".to_string(), json!(id));
    Json(Value::Object(payload)).into_response()
}

/// Handle summary retrieval
///
/// Serves the cached summary when present; otherwise computes it from the
/// backing file and caches the result (cache miss path). A cached error
/// marker is reported as a computation failure.
async fn dataset_summary(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Response {
    let Some(record) = state.datasets.get_for_owner(id, &owner) else {
        return not_found();
    };

    match record.summary_json {
        Some(SummaryOutcome::Ready(summary)) => summary_response(id, &summary),
        Some(SummaryOutcome::Failed { error }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": error})),
        )
            .into_response(),
        None => {
            if !record.file.exists() {
                return (StatusCode::NOT_FOUND, Json(json!({"error": "file missing"})))
                    .into_response();
            }
            match compute_summary(&record.file, state.config.preview_rows) {
                Ok(summary) => {
                    if let Err(e) = state
                        .datasets
                        .set_summary(id, SummaryOutcome::Ready(summary.clone()))
                    {
                        error!("summary: failed to cache result for dataset {}: {}", id, e);
                    }
                    summary_response(id, &summary)
                }
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": e.to_string()})),
                )
                    .into_response(),
            }
        }
    }
}

/// Handle history retrieval: newest-first, at most the retention window
async fn dataset_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
) -> Json<Vec<HistoryEntry>> {
    let entries = state
        .datasets
        .list_for_owner(&owner)
        .iter()
        .take(state.config.retention_keep)
        .map(HistoryEntry::from_record)
        .collect();
    Json(entries)
}

/// Resolve the summary a report should be built from
///
/// Uses the cached summary when one is present; an error marker or an
/// uncomputed record triggers recomputation from the backing file.
fn resolve_report_summary(state: &AppState, record: &Dataset) -> Option<Summary> {
    if let Some(SummaryOutcome::Ready(summary)) = &record.summary_json {
        return Some(summary.clone());
    }
    if !record.file.exists() {
        return None;
    }
    match compute_summary(&record.file, state.config.preview_rows) {
        Ok(summary) => {
            if let Err(e) = state
                .datasets
                .set_summary(record.id, SummaryOutcome::Ready(summary.clone()))
            {
                error!("report: failed to cache summary for dataset {}: {}", record.id, e);
            }
            Some(summary)
        }
        Err(e) => {
            warn!(
                "report: summary recomputation failed for dataset {}: {}",
                record.id, e
            );
            None
        }
    }
}

/// Handle report retrieval
///
/// Returns the PDF as an attachment named `dataset_report_<id>.pdf`. A 404
/// means the dataset, its summary, or its file could not be resolved for
/// this caller; a 500 means both rendering strategies failed.
async fn dataset_report(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Response {
    let Some(record) = state.datasets.get_for_owner(id, &owner) else {
        return not_found();
    };

    let Some(summary) = resolve_report_summary(&state, &record) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no summary and file missing"})),
        )
            .into_response();
    };

    let ctx = ReportContext::build(&record, &summary);
    match report::generate_report(&ctx) {
        Ok(result) => {
            if result.fallback_used {
                info!("report: dataset {} rendered via fallback strategy", id);
            }
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/pdf")
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"dataset_report_{}.pdf\"", id),
                )
                .body(Body::from(result.bytes))
                .unwrap()
        }
        Err(e) => {
            error!("report: generation failed for dataset {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
