//! Live network-quality telemetry for video calls.
//!
//! Clients post a stats sample roughly every 15 seconds while in a call. The
//! [`SampleIngestor`] records them into the [`SessionAccumulator`], the
//! [`SessionLifecycle`] moves the finished call into the [`LogStore`] once
//! someone navigates away from it, and [`render`] turns a stored call into a
//! chart.

#[macro_use]
extern crate tracing;

pub mod accumulator;
pub mod ingest;
pub mod lifecycle;
pub mod log_store;
pub mod render;
pub mod session;

pub use accumulator::SessionAccumulator;
pub use ingest::{
    IngestError,
    NetlogPayload,
    SampleIngestor,
};
pub use lifecycle::{
    FlushTrigger,
    MeetingRoom,
    SessionLifecycle,
};
pub use log_store::{
    LogStore,
    StoreError,
};
pub use render::{
    render_session_chart,
    ChartData,
    RenderError,
};
pub use session::{
    CallSession,
    Metric,
    ParticipantMetrics,
    Sample,
    SampleTimestamp,
    SessionId,
};
