use crate::{
    error::AppError,
    pages,
    router::{
        end_session,
        AppState,
    },
};
use axum::{
    body::Body,
    extract::{
        Path,
        State,
    },
    http::{
        header::CONTENT_TYPE,
        StatusCode,
    },
    response::{
        Html,
        IntoResponse,
        Response,
    },
};
use call_metrics_core::{
    render_session_chart,
    FlushTrigger,
    SessionId,
    StoreError,
};

/// Landing page listing all stored calls.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    end_session(&state, FlushTrigger::LandingPage).await?;

    let lifecycle = state.lifecycle.clone();
    let video_calls = tokio::task::spawn_blocking(move || lifecycle.store().list()).await??;
    Ok(Html(pages::index(&video_calls)))
}

/// Page showing the chart of one stored call.
pub async fn metrics_page(State(state): State<AppState>, Path(entry): Path<String>) -> Result<Html<String>, AppError> {
    end_session(&state, FlushTrigger::MetricsPage).await?;

    let lifecycle = state.lifecycle.clone();
    let id = tokio::task::spawn_blocking(move || {
        SessionId::parse(&entry)
            .filter(|id| lifecycle.store().contains(id.as_str()))
            .ok_or(StoreError::NotFound(entry))
    })
    .await??;
    Ok(Html(pages::video_metrics(&id)))
}

/// PNG chart of one stored call. Unknown calls get an empty 404.
pub async fn plot(State(state): State<AppState>, Path(entry): Path<String>) -> Result<Response, AppError> {
    end_session(&state, FlushTrigger::ChartImage).await?;

    let lifecycle = state.lifecycle.clone();
    let rendered = tokio::task::spawn_blocking(move || render_session_chart(lifecycle.store(), &entry)).await?;
    match rendered {
        Ok(png) => Ok(([(CONTENT_TYPE, "image/png")], png).into_response()),
        Err(err) if err.is_not_found() => {
            debug!(error = %err, "chart requested for unknown call");
            Ok((StatusCode::NOT_FOUND, [(CONTENT_TYPE, "image/png")], Body::empty()).into_response())
        }
        Err(err) => Err(err.into()),
    }
}
