//! Parsing and conversion of the network stats clients post during a call.
//!
//! A payload looks like
//!
//! ```json
//! {
//!   "participant_id": 0,
//!   "netstats": {
//!     "stats": {
//!       "latest": {
//!         "timestamp": 1000,
//!         "videoRecvBitsPerSecond": 64000,
//!         "videoSendBitsPerSecond": 32000,
//!         "videoRecvPacketLoss": 0.02,
//!         "videoSendPacketLoss": 0.01
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Bitrates are stored as whole kb/s and packet loss fractions as whole
//! percentages, both rounded down.

use crate::{
    accumulator::SessionAccumulator,
    session::{
        Sample,
        SampleTimestamp,
    },
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Malformed network stats payload: {0}")]
    Malformed(String),
    #[error("Participant id {participant_id} is out of range, the call has {participant_count} participants")]
    ParticipantOutOfRange {
        participant_id: usize,
        participant_count: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetlogPayload {
    pub participant_id: usize,
    pub netstats: NetStats,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetStats {
    pub stats: NetStatsSnapshot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetStatsSnapshot {
    #[serde(default)]
    pub latest: Option<LatestStats>,
}

/// Raw values as reported by the call client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestStats {
    pub timestamp: f64,
    pub video_recv_bits_per_second: f64,
    pub video_send_bits_per_second: f64,
    pub video_recv_packet_loss: f64,
    pub video_send_packet_loss: f64,
}

impl NetlogPayload {
    pub fn from_json(body: &[u8]) -> Result<Self, IngestError> {
        serde_json::from_slice(body).map_err(|err| IngestError::Malformed(err.to_string()))
    }

    /// Converts the latest stats into a [`Sample`].
    pub fn sample(&self) -> Result<Sample, IngestError> {
        let latest = self
            .netstats
            .stats
            .latest
            .as_ref()
            .ok_or_else(|| IngestError::Malformed("netstats.stats.latest is missing".to_string()))?;
        latest.to_sample()
    }
}

impl LatestStats {
    pub fn to_sample(&self) -> Result<Sample, IngestError> {
        let timestamp = SampleTimestamp::new(self.timestamp)
            .ok_or_else(|| IngestError::Malformed(format!("timestamp {} is not finite", self.timestamp)))?;
        Ok(Sample {
            timestamp,
            video_recv_kbps: kbps("videoRecvBitsPerSecond", self.video_recv_bits_per_second)?,
            video_send_kbps: kbps("videoSendBitsPerSecond", self.video_send_bits_per_second)?,
            video_recv_loss_percent: percent("videoRecvPacketLoss", self.video_recv_packet_loss)?,
            video_send_loss_percent: percent("videoSendPacketLoss", self.video_send_packet_loss)?,
        })
    }
}

fn finite(field: &str, value: f64) -> Result<f64, IngestError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(IngestError::Malformed(format!("{field} is not a finite number")))
    }
}

fn kbps(field: &str, bits_per_second: f64) -> Result<i64, IngestError> {
    Ok((finite(field, bits_per_second)? / 1000.0).floor() as i64)
}

fn percent(field: &str, fraction: f64) -> Result<i64, IngestError> {
    Ok((finite(field, fraction)? * 100.0).floor() as i64)
}

/// Validates incoming payloads and records them in the active session.
#[derive(Debug, Clone)]
pub struct SampleIngestor {
    accumulator: Arc<SessionAccumulator>,
}

impl SampleIngestor {
    pub fn new(accumulator: Arc<SessionAccumulator>) -> Self {
        Self { accumulator }
    }

    pub fn ingest(&self, payload: &NetlogPayload) -> Result<(), IngestError> {
        let sample = payload.sample()?;
        self.accumulator.record(payload.participant_id, &sample)?;
        trace!(
            participant_id = payload.participant_id,
            timestamp = %sample.timestamp,
            "recorded network stats sample"
        );
        Ok(())
    }

    pub fn ingest_json(&self, body: &[u8]) -> Result<(), IngestError> {
        let result = NetlogPayload::from_json(body).and_then(|payload| self.ingest(&payload));
        if let Err(err) = &result {
            warn!(error = %err, "rejected network stats sample");
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::Metric;
    use pretty_assertions::assert_eq;

    fn payload(participant_id: u64, timestamp: u64) -> serde_json::Value {
        serde_json::json!({
            "participant_id": participant_id,
            "netstats": {
                "stats": {
                    "latest": {
                        "timestamp": timestamp,
                        "videoRecvBitsPerSecond": 64000,
                        "videoSendBitsPerSecond": 32000,
                        "videoRecvPacketLoss": 0.02,
                        "videoSendPacketLoss": 0.01
                    }
                }
            }
        })
    }

    fn ingestor() -> (Arc<SessionAccumulator>, SampleIngestor) {
        let accumulator = Arc::new(SessionAccumulator::new());
        (accumulator.clone(), SampleIngestor::new(accumulator))
    }

    #[test]
    fn sample_values_are_converted() {
        let (accumulator, ingestor) = ingestor();
        ingestor.ingest_json(payload(0, 1000).to_string().as_bytes()).unwrap();

        let session = accumulator.snapshot().unwrap();
        assert_eq!(session.participant_count(), 1);
        let key = SampleTimestamp::new(1000.0).unwrap();
        let participant = &session.participants[0];
        assert_eq!(participant.series(Metric::VideoRecvBitsPerSecond)[&key], 64);
        assert_eq!(participant.series(Metric::VideoSendBitsPerSecond)[&key], 32);
        assert_eq!(participant.series(Metric::VideoRecvPacketLoss)[&key], 2);
        assert_eq!(participant.series(Metric::VideoSendPacketLoss)[&key], 1);
    }

    #[test]
    fn values_are_rounded_down() {
        let stats = LatestStats {
            timestamp: 1.0,
            video_recv_bits_per_second: 1999.9,
            video_send_bits_per_second: 999.0,
            video_recv_packet_loss: 0.999,
            video_send_packet_loss: 0.0,
        };
        let sample = stats.to_sample().unwrap();
        assert_eq!(sample.video_recv_kbps, 1);
        assert_eq!(sample.video_send_kbps, 0);
        assert_eq!(sample.video_recv_loss_percent, 99);
        assert_eq!(sample.video_send_loss_percent, 0);
    }

    #[test]
    fn malformed_payloads_are_rejected_without_mutation() {
        let (accumulator, ingestor) = ingestor();

        let bodies = [
            "not json".to_string(),
            "{}".to_string(),
            r#"{"participant_id": -1, "netstats": {"stats": {"latest": null}}}"#.to_string(),
            r#"{"participant_id": 0, "netstats": {"stats": {}}}"#.to_string(),
            r#"{"participant_id": 0, "netstats": {"stats": {"latest": {"timestamp": 1}}}}"#.to_string(),
            serde_json::json!({
                "participant_id": 0,
                "netstats": {"stats": {"latest": {
                    "timestamp": 1,
                    "videoRecvBitsPerSecond": "fast",
                    "videoSendBitsPerSecond": 1,
                    "videoRecvPacketLoss": 0,
                    "videoSendPacketLoss": 0
                }}}
            })
            .to_string(),
        ];

        for body in bodies {
            let err = ingestor.ingest_json(body.as_bytes()).unwrap_err();
            assert!(matches!(err, IngestError::Malformed(_)), "{body}: {err}");
        }
        assert!(!accumulator.is_active());
    }

    #[test]
    fn out_of_range_participant_is_rejected() {
        let (accumulator, ingestor) = ingestor();
        ingestor.ingest_json(payload(0, 1).to_string().as_bytes()).unwrap();

        let err = ingestor.ingest_json(payload(2, 2).to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::ParticipantOutOfRange { .. }));
        assert_eq!(accumulator.participant_count(), 1);
    }
}
