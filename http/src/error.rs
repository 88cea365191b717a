use axum::{
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
};
use call_metrics_core::{
    IngestError,
    RenderError,
    StoreError,
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Creating a meeting room failed: {0}")]
    Provisioning(eyre::Report),
    #[error("Internal error: {0}")]
    Internal(eyre::Report),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ingest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            AppError::Render(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            AppError::Provisioning(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Render(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, axum::Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
