use crate::{
    accumulator::SessionAccumulator,
    log_store::{
        LogStore,
        StoreError,
    },
    session::SessionId,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};
use url::Url;

/// Interactions that mean nobody is inside the live call anymore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FlushTrigger {
    NewMeeting,
    MetricsPage,
    ChartImage,
    LandingPage,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRoom {
    pub url: Url,
    next_participant_id: usize,
}

/// Ends call sessions and tracks the meeting room participants join.
///
/// There is no explicit end-of-call signal: any [`FlushTrigger`] moves an
/// active session to the [`LogStore`] and resets the accumulator.
#[derive(Debug)]
pub struct SessionLifecycle {
    accumulator: Arc<SessionAccumulator>,
    store: LogStore,
    meeting: Mutex<Option<MeetingRoom>>,
}

impl SessionLifecycle {
    pub fn new(accumulator: Arc<SessionAccumulator>, store: LogStore) -> Self {
        Self {
            accumulator,
            store,
            meeting: Mutex::new(None),
        }
    }

    pub fn accumulator(&self) -> &Arc<SessionAccumulator> {
        &self.accumulator
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    fn meeting(&self) -> MutexGuard<'_, Option<MeetingRoom>> {
        self.meeting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persists the active session, if any, and clears the meeting room.
    ///
    /// Idle accumulators are left alone and `Ok(None)` is returned. When
    /// persisting fails the session stays in memory so a later trigger can
    /// retry.
    #[instrument(level = "debug", skip(self))]
    pub fn end_session(&self, trigger: FlushTrigger) -> Result<Option<SessionId>, StoreError> {
        let flushed = self.accumulator.flush_with(|session| -> Result<SessionId, StoreError> {
            let id = self.store.persist(session)?;
            self.meeting().take();
            info!(%trigger, session_id = %id, participants = session.participant_count(), "call session persisted");
            Ok(id)
        });

        match &flushed {
            Ok(None) => trace!(%trigger, "no active call session"),
            Ok(Some(_)) => {}
            Err(err) => error!(%trigger, error = %err, "failed to persist call session, keeping it in memory"),
        }
        flushed
    }

    /// Makes `url` the room new participants join, replacing any previous one.
    pub fn open_room(&self, url: Url) {
        info!(%url, "meeting room opened");
        *self.meeting() = Some(MeetingRoom {
            url,
            next_participant_id: 0,
        });
    }

    /// Assigns the next participant id of the current room.
    pub fn join_room(&self) -> Option<(Url, usize)> {
        let mut meeting = self.meeting();
        let room = meeting.as_mut()?;
        let participant_id = room.next_participant_id;
        room.next_participant_id += 1;
        debug!(participant_id, "participant id handed out");
        Some((room.url.clone(), participant_id))
    }

    pub fn current_room(&self) -> Option<MeetingRoom> {
        self.meeting().clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ingest::SampleIngestor,
        session::{
            Metric,
            SampleTimestamp,
        },
    };
    use chrono::{
        DateTime,
        TimeZone,
        Utc,
    };
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 2, 14, 0, 5).unwrap()
    }

    const SAMPLE: &str = r#"{
        "participant_id": 0,
        "netstats": {"stats": {"latest": {
            "timestamp": 1000,
            "videoRecvBitsPerSecond": 64000,
            "videoSendBitsPerSecond": 32000,
            "videoRecvPacketLoss": 0.02,
            "videoSendPacketLoss": 0.01
        }}}
    }"#;

    fn lifecycle(dir: &TempDir) -> (SessionLifecycle, SampleIngestor) {
        let accumulator = Arc::new(SessionAccumulator::with_clock(fixed_clock));
        let store = LogStore::open(dir.path()).unwrap();
        let ingestor = SampleIngestor::new(accumulator.clone());
        (SessionLifecycle::new(accumulator, store), ingestor)
    }

    #[test]
    fn ending_an_active_session_persists_it() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, ingestor) = lifecycle(&dir);
        ingestor.ingest_json(SAMPLE.as_bytes()).unwrap();

        let id = lifecycle.end_session(FlushTrigger::LandingPage).unwrap().unwrap();
        assert_eq!(id.as_str(), "2023_11_02_14_00_05");
        assert!(!lifecycle.accumulator().is_active());

        let stored = lifecycle.store().list().unwrap();
        assert_eq!(stored, vec![id.clone()]);

        let session = lifecycle.store().load(id.as_str()).unwrap();
        assert_eq!(session.participant_count(), 1);
        let key = SampleTimestamp::new(1000.0).unwrap();
        let participant = &session.participants[0];
        assert_eq!(participant.series(Metric::VideoRecvBitsPerSecond)[&key], 64);
        assert_eq!(participant.series(Metric::VideoSendBitsPerSecond)[&key], 32);
        assert_eq!(participant.series(Metric::VideoRecvPacketLoss)[&key], 2);
        assert_eq!(participant.series(Metric::VideoSendPacketLoss)[&key], 1);
    }

    #[test]
    fn ending_an_idle_session_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, _) = lifecycle(&dir);

        assert_eq!(lifecycle.end_session(FlushTrigger::NewMeeting).unwrap(), None);
        assert!(lifecycle.store().list().unwrap().is_empty());
    }

    #[test]
    fn triggering_twice_persists_once() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, ingestor) = lifecycle(&dir);
        ingestor.ingest_json(SAMPLE.as_bytes()).unwrap();

        assert!(lifecycle.end_session(FlushTrigger::MetricsPage).unwrap().is_some());
        assert!(lifecycle.end_session(FlushTrigger::ChartImage).unwrap().is_none());
        assert_eq!(lifecycle.store().list().unwrap().len(), 1);
    }

    #[test]
    fn failed_persist_keeps_session_in_memory() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, ingestor) = lifecycle(&dir);
        ingestor.ingest_json(SAMPLE.as_bytes()).unwrap();

        // Occupy the target name with a directory so the rename fails.
        std::fs::create_dir(dir.path().join("2023_11_02_14_00_05.json")).unwrap();
        std::fs::write(dir.path().join("2023_11_02_14_00_05.json").join("keep"), "x").unwrap();

        assert!(lifecycle.end_session(FlushTrigger::LandingPage).is_err());
        assert!(lifecycle.accumulator().is_active());
        assert_eq!(lifecycle.accumulator().participant_count(), 1);
    }

    #[test]
    fn participant_ids_are_handed_out_in_order() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, _) = lifecycle(&dir);
        assert!(lifecycle.join_room().is_none());

        let url = Url::parse("https://example.daily.co/room").unwrap();
        lifecycle.open_room(url.clone());
        assert_eq!(lifecycle.join_room(), Some((url.clone(), 0)));
        assert_eq!(lifecycle.join_room(), Some((url, 1)));
    }

    #[test]
    fn persisting_a_session_closes_the_room() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, ingestor) = lifecycle(&dir);
        lifecycle.open_room(Url::parse("https://example.daily.co/room").unwrap());

        // Nothing to persist, the room stays open.
        lifecycle.end_session(FlushTrigger::LandingPage).unwrap();
        assert!(lifecycle.current_room().is_some());

        ingestor.ingest_json(SAMPLE.as_bytes()).unwrap();
        lifecycle.end_session(FlushTrigger::LandingPage).unwrap();
        assert!(lifecycle.current_room().is_none());
    }
}
