//! HTTP interface: latest-snapshot page, interval control and record
//! management.
//!
//! All endpoints are GET and unauthenticated, matching the original
//! service. Handlers only touch [`SharedState`] and [`SnapshotStore`];
//! they never talk to the weather provider or the mirror.

use crate::state::SharedState;
use crate::store::{SnapshotStore, StoreError};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
    pub store: Arc<SnapshotStore>,
}

/// Query params for `/update_interval`.
///
/// Raw strings rather than integers so missing and non-numeric input can
/// be answered with a structured 400 instead of axum's default rejection.
#[derive(Deserialize)]
pub struct IntervalQuery {
    #[serde(rename = "intervalHour")]
    pub interval_hour: Option<String>,
    #[serde(rename = "intervalMinutes")]
    pub interval_minutes: Option<String>,
}

/// Query params for `/download` and `/delete`.
#[derive(Deserialize)]
pub struct FilenameQuery {
    pub filename: Option<String>,
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Render a scalar cell without JSON string quoting.
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// GET / - render the latest snapshot, or an empty state before the
/// first successful cycle.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    match state.shared.latest().await {
        Some(snapshot) => {
            let mut body = String::from("<html><head><title>meteosnap</title></head><body>");
            body.push_str("<h1>Current weather</h1>");
            if let Some(updated) = snapshot.fields.get("last_update_time").and_then(Value::as_str)
            {
                body.push_str(&format!("<p>Last update: {}</p>", updated));
            }
            body.push_str(&format!("<p>Record: {}</p>", snapshot.record_id));
            if snapshot.fields.get("mirror_enabled") == Some(&Value::Bool(false)) {
                body.push_str("<p>Remote mirror: disabled</p>");
            }
            body.push_str("<table>");
            for (key, value) in &snapshot.fields {
                match value {
                    Value::Object(block) => {
                        body.push_str(&format!(
                            "<tr><th colspan=\"2\">{}</th></tr>",
                            key
                        ));
                        for (subkey, subvalue) in block {
                            if !subvalue.is_array() && !subvalue.is_object() {
                                body.push_str(&format!(
                                    "<tr><td>{}</td><td>{}</td></tr>",
                                    subkey,
                                    render_scalar(subvalue)
                                ));
                            }
                        }
                    }
                    Value::Array(_) => {}
                    scalar => {
                        body.push_str(&format!(
                            "<tr><td>{}</td><td>{}</td></tr>",
                            key,
                            render_scalar(scalar)
                        ));
                    }
                }
            }
            body.push_str("</table></body></html>");
            Html(body)
        }
        None => Html(
            "<html><head><title>meteosnap</title></head><body>\
             <h1>Current weather</h1><p>No weather data yet.</p>\
             </body></html>"
                .to_string(),
        ),
    }
}

/// GET /update_interval?intervalHour=H&intervalMinutes=M - update the
/// poll interval. Zero is accepted and means continuous polling.
pub async fn update_interval(
    State(state): State<AppState>,
    Query(query): Query<IntervalQuery>,
) -> Response {
    let (Some(hour_raw), Some(minutes_raw)) = (query.interval_hour, query.interval_minutes)
    else {
        return bad_request("intervalHour and intervalMinutes are required");
    };

    let (Ok(hours), Ok(minutes)) = (hour_raw.parse::<u64>(), minutes_raw.parse::<u64>()) else {
        return bad_request("intervalHour and intervalMinutes must be non-negative integers");
    };

    // Checked arithmetic: absurdly large but parseable values must come
    // back as a 400, not an overflow panic.
    let Some(secs) = hours
        .checked_mul(60)
        .and_then(|h| h.checked_add(minutes))
        .and_then(|m| m.checked_mul(60))
    else {
        return bad_request("interval is too large");
    };
    state.shared.set_interval_secs(secs);
    log::info!("poll interval updated to {}s", secs);

    let status = format!(
        "Update Interval time will be : {} hours and {} minutes",
        hours, minutes
    );
    Json(json!({ "status": status })).into_response()
}

fn file_list_response(store: &SnapshotStore) -> Response {
    match store.list() {
        Ok(files) => (StatusCode::OK, Json(json!({ "files": files }))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /get_allfiles - list stored record identifiers.
pub async fn get_allfiles(State(state): State<AppState>) -> Response {
    file_list_response(&state.store)
}

/// GET /download?filename=<id> - stream a record as a CSV attachment.
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<FilenameQuery>,
) -> Response {
    let Some(filename) = query.filename else {
        return bad_request("filename is required");
    };

    match state.store.read(&filename) {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(StoreError::NotFound(id)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("snapshot not found: {}", id) })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /delete?filename=<id> - delete a record (idempotent), then return
/// the fresh file list so a client can refresh its view in one
/// round trip.
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<FilenameQuery>,
) -> Response {
    let Some(filename) = query.filename else {
        return bad_request("filename is required");
    };

    if let Err(e) = state.store.delete(&filename) {
        log::warn!("delete of {} failed: {}", filename, e);
    }

    file_list_response(&state.store)
}

/// GET /health - liveness probe.
pub async fn health_check() -> &'static str {
    "ok"
}

/// Create the HTTP router.
pub fn create_router(shared: Arc<SharedState>, store: Arc<SnapshotStore>) -> Router {
    let state = AppState { shared, store };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/update_interval", get(update_interval))
        .route("/get_allfiles", get(get_allfiles))
        .route("/download", get(download))
        .route("/delete", get(delete))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until the shutdown signal fires.
pub async fn run_http_server(
    shared: Arc<SharedState>,
    store: Arc<SnapshotStore>,
    port: u16,
    mut shutdown: tokio::sync::watch::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(shared, store);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    log::info!("HTTP server listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.changed().await.ok();
        })
        .await?;

    Ok(())
}
