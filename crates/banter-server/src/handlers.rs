use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::server::AppState;
use crate::wire::HistoryResponse;

const HISTORY_LIMIT: usize = 50;

/// `GET /messages`: the most recent messages, newest first, display
/// fields re-resolved against the directory at read time.
pub async fn history(State(state): State<AppState>) -> Response {
    let mut messages = match state.store.recent(HISTORY_LIMIT).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::error!(error = %e, "history read failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut uids: Vec<String> = Vec::new();
    for message in &messages {
        if !message.uid.is_empty() && !uids.contains(&message.uid) {
            uids.push(message.uid.clone());
        }
    }

    if !uids.is_empty() {
        match state.directory.lookup(&uids).await {
            Ok(records) => {
                let by_uid: HashMap<&str, _> =
                    records.iter().map(|r| (r.uid.as_str(), r)).collect();
                for message in &mut messages {
                    if let Some(record) = by_uid.get(message.uid.as_str()) {
                        message.login = record.login.clone();
                        message.avatar = record.avatar.clone();
                    }
                }
            }
            // History still goes out, just without display fields.
            Err(e) => tracing::warn!(error = %e, "history enrichment failed"),
        }
    }

    Json(HistoryResponse::success(messages)).into_response()
}

/// `GET /health`: store reachability.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy" }))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "error": e.to_string() })),
        )
            .into_response(),
    }
}
