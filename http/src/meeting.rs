use crate::{
    error::AppError,
    pages,
    router::{
        end_session,
        AppState,
    },
};
use axum::{
    extract::State,
    response::{
        Html,
        IntoResponse,
        Redirect,
        Response,
    },
};
use call_metrics_core::FlushTrigger;

/// Ends the running call, creates a fresh room and sends the caller there.
pub async fn new_meeting(State(state): State<AppState>) -> Result<Redirect, AppError> {
    end_session(&state, FlushTrigger::NewMeeting).await?;

    let url = state.provisioner.create_room().await.map_err(AppError::Provisioning)?;
    state.lifecycle.open_room(url);

    Ok(Redirect::to("/videocall"))
}

/// Call page of the current room. Every load hands out a new participant id.
pub async fn video_call(State(state): State<AppState>) -> Response {
    match state.lifecycle.join_room() {
        Some((call_url, participant_id)) => {
            Html(pages::video_call(&call_url, &state.invite_url, participant_id)).into_response()
        }
        None => "No meeting available".into_response(),
    }
}
