use crate::{
    error::AppError,
    router::AppState,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
};

/// Records one network stats sample posted by a call participant.
pub async fn handler(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, AppError> {
    let ingestor = state.ingestor.clone();
    tokio::task::spawn_blocking(move || ingestor.ingest_json(&body)).await??;
    Ok(StatusCode::NO_CONTENT)
}
