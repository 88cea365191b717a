use crate::{
    ingest::IngestError,
    session::{
        CallSession,
        Sample,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use std::sync::{
    Mutex,
    MutexGuard,
    PoisonError,
};

#[derive(Debug, Default)]
enum SessionState {
    #[default]
    Idle,
    Active(CallSession),
}

/// Holds the telemetry of the call currently in progress.
///
/// All reads and writes go through one mutex, so concurrent ingestion and
/// flushing never observe or produce a torn session.
#[derive(Debug)]
pub struct SessionAccumulator {
    state: Mutex<SessionState>,
    clock: fn() -> DateTime<Utc>,
}

impl Default for SessionAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAccumulator {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Uses `clock` to stamp the start of new sessions.
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // The state is replaced wholesale or appended to, a panicking holder
        // cannot leave it half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.lock(), SessionState::Active(_))
    }

    pub fn participant_count(&self) -> usize {
        match &*self.lock() {
            SessionState::Idle => 0,
            SessionState::Active(session) => session.participant_count(),
        }
    }

    /// Records `sample` for `participant_id`, starting a new session if none
    /// is active.
    ///
    /// The id may address an existing participant or be exactly the current
    /// participant count, which appends a new participant. Anything larger is
    /// rejected and leaves the state untouched.
    pub fn record(&self, participant_id: usize, sample: &Sample) -> Result<(), IngestError> {
        let mut state = self.lock();

        let participant_count = match &*state {
            SessionState::Idle => 0,
            SessionState::Active(session) => session.participant_count(),
        };
        if participant_id > participant_count {
            return Err(IngestError::ParticipantOutOfRange {
                participant_id,
                participant_count,
            });
        }

        if let SessionState::Idle = *state {
            let session = CallSession::new((self.clock)());
            debug!(start_timestamp = session.start_timestamp, "call session started");
            *state = SessionState::Active(session);
        }
        let SessionState::Active(session) = &mut *state else {
            unreachable!("session is active after start");
        };

        if participant_id == participant_count {
            debug!(participant_id, "participant joined the call session");
        }
        if let Some(participant) = session.participant_or_append(participant_id) {
            participant.record(sample);
        }
        Ok(())
    }

    /// A copy of the active session, if any.
    pub fn snapshot(&self) -> Option<CallSession> {
        match &*self.lock() {
            SessionState::Idle => None,
            SessionState::Active(session) => Some(session.clone()),
        }
    }

    /// Removes and returns the active session, leaving the accumulator idle.
    pub fn take(&self) -> Option<CallSession> {
        match std::mem::take(&mut *self.lock()) {
            SessionState::Idle => None,
            SessionState::Active(session) => Some(session),
        }
    }

    /// Hands the active session to `persist` while holding the lock and resets
    /// to idle only if `persist` succeeds. Samples arriving meanwhile wait and
    /// land in the next session.
    ///
    /// Returns `Ok(None)` without calling `persist` when no session is active.
    pub fn flush_with<T, E>(&self, persist: impl FnOnce(&CallSession) -> Result<T, E>) -> Result<Option<T>, E> {
        let mut state = self.lock();
        let SessionState::Active(session) = &*state else {
            return Ok(None);
        };
        let persisted = persist(session)?;
        *state = SessionState::Idle;
        Ok(Some(persisted))
    }
}
