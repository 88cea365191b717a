use crate::{
    daily::{
        DailyRoomProvisioner,
        RoomProvisioner,
    },
    error::AppError,
    history,
    meeting,
    netlog,
};
use axum::{
    routing::{
        get,
        post,
    },
    Router,
};
use call_metrics_config::Config;
use call_metrics_core::{
    FlushTrigger,
    LogStore,
    SampleIngestor,
    SessionAccumulator,
    SessionLifecycle,
};
use eyre::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SessionLifecycle>,
    pub ingestor: SampleIngestor,
    pub provisioner: Arc<dyn RoomProvisioner>,
    pub invite_url: String,
}

impl AppState {
    pub fn new(lifecycle: Arc<SessionLifecycle>, provisioner: Arc<dyn RoomProvisioner>, invite_url: String) -> Self {
        let ingestor = SampleIngestor::new(lifecycle.accumulator().clone());
        Self {
            lifecycle,
            ingestor,
            provisioner,
            invite_url,
        }
    }

    /// Opens the log store and the room API client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = LogStore::open(config.log_dir())?;
        let lifecycle = SessionLifecycle::new(Arc::new(SessionAccumulator::new()), store);
        let provisioner = DailyRoomProvisioner::new(&config.daily)?;
        Ok(Self::new(Arc::new(lifecycle), Arc::new(provisioner), config.invite_url()))
    }
}

/// Persists the active call session before handling a request that means the
/// call is over.
pub(crate) async fn end_session(state: &AppState, trigger: FlushTrigger) -> Result<(), AppError> {
    let lifecycle = state.lifecycle.clone();
    tokio::task::spawn_blocking(move || lifecycle.end_session(trigger)).await??;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(history::index))
        .route("/new_meeting", get(meeting::new_meeting))
        .route("/videocall", get(meeting::video_call))
        .route("/meeting/netlog", post(netlog::handler))
        .route("/videocalls/{entry}/metrics", get(history::metrics_page))
        .route("/videocalls/{entry}/metrics/plot.png", get(history::plot))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "Hello!"
}
