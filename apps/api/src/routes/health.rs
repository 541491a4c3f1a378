use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

/// GET /health
/// Returns service version and whether the document store answers.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let store = match state.pipeline.store().ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!("Health check: store unavailable: {e}");
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "resume-pipeline",
        "store": store,
        "store_backend": state.config.store_backend.as_str(),
        "staging_dir": state.pipeline.staging().root().display().to_string(),
        "keep_raw_responses": state.config.keep_raw_responses,
    }))
}
