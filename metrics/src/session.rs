use chrono::{
    DateTime,
    Utc,
};
use serde::{
    de,
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
};
use strum::{
    Display,
    EnumIter,
};

/// The network metrics tracked for every participant, in panel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Metric {
    #[strum(to_string = "videoRecvBitsPerSecond")]
    VideoRecvBitsPerSecond,
    #[strum(to_string = "videoSendBitsPerSecond")]
    VideoSendBitsPerSecond,
    #[strum(to_string = "videoRecvPacketLoss")]
    VideoRecvPacketLoss,
    #[strum(to_string = "videoSendPacketLoss")]
    VideoSendPacketLoss,
}

impl Metric {
    pub fn is_packet_loss(&self) -> bool {
        matches!(self, Metric::VideoRecvPacketLoss | Metric::VideoSendPacketLoss)
    }

    pub fn unit(&self) -> &'static str {
        if self.is_packet_loss() {
            "percentage"
        } else {
            "kb/s"
        }
    }
}

/// Timestamp assigned by the client that produced a sample.
///
/// Ordered numerically. Serialized as a string so it can be used as a JSON
/// object key, e.g. `"1000"` or `"1000.5"`.
#[derive(Debug, Clone, Copy)]
pub struct SampleTimestamp(f64);

impl SampleTimestamp {
    /// Returns `None` for NaN and infinities.
    pub fn new(value: f64) -> Option<Self> {
        // `+ 0.0` folds -0.0 into 0.0 so both map to the same key.
        value.is_finite().then_some(Self(value + 0.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for SampleTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SampleTimestamp {}

impl PartialOrd for SampleTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SampleTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for SampleTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SampleTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SampleTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl de::Visitor<'_> for TimestampVisitor {
            type Value = SampleTimestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a finite number or a string containing one")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                SampleTimestamp::new(v).ok_or_else(|| E::custom(format!("timestamp {v} is not finite")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                self.visit_f64(v as f64)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                self.visit_f64(v as f64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                let value = v
                    .parse::<f64>()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))?;
                self.visit_f64(value)
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// Values of one metric keyed by sample timestamp. Iteration is in ascending
/// timestamp order regardless of arrival order.
pub type MetricSeries = BTreeMap<SampleTimestamp, i64>;

/// One sample after unit conversion, ready to be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: SampleTimestamp,
    pub video_recv_kbps: i64,
    pub video_send_kbps: i64,
    pub video_recv_loss_percent: i64,
    pub video_send_loss_percent: i64,
}

impl Sample {
    pub fn value(&self, metric: Metric) -> i64 {
        match metric {
            Metric::VideoRecvBitsPerSecond => self.video_recv_kbps,
            Metric::VideoSendBitsPerSecond => self.video_send_kbps,
            Metric::VideoRecvPacketLoss => self.video_recv_loss_percent,
            Metric::VideoSendPacketLoss => self.video_send_loss_percent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantMetrics {
    #[serde(default)]
    pub video_recv_bits_per_second: MetricSeries,
    #[serde(default)]
    pub video_send_bits_per_second: MetricSeries,
    #[serde(default)]
    pub video_recv_packet_loss: MetricSeries,
    #[serde(default)]
    pub video_send_packet_loss: MetricSeries,
}

impl ParticipantMetrics {
    pub fn series(&self, metric: Metric) -> &MetricSeries {
        match metric {
            Metric::VideoRecvBitsPerSecond => &self.video_recv_bits_per_second,
            Metric::VideoSendBitsPerSecond => &self.video_send_bits_per_second,
            Metric::VideoRecvPacketLoss => &self.video_recv_packet_loss,
            Metric::VideoSendPacketLoss => &self.video_send_packet_loss,
        }
    }

    fn series_mut(&mut self, metric: Metric) -> &mut MetricSeries {
        match metric {
            Metric::VideoRecvBitsPerSecond => &mut self.video_recv_bits_per_second,
            Metric::VideoSendBitsPerSecond => &mut self.video_send_bits_per_second,
            Metric::VideoRecvPacketLoss => &mut self.video_recv_packet_loss,
            Metric::VideoSendPacketLoss => &mut self.video_send_packet_loss,
        }
    }

    /// Writes all four values of `sample`, replacing earlier values that
    /// share its timestamp.
    pub fn record(&mut self, sample: &Sample) {
        use strum::IntoEnumIterator;
        for metric in Metric::iter() {
            self.series_mut(metric).insert(sample.timestamp, sample.value(metric));
        }
    }
}

/// Telemetry of one call, from its first sample until it is flushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    /// Seconds since the unix epoch at which the first sample arrived.
    #[serde(rename = "timestamp")]
    pub start_timestamp: f64,
    /// Indexed by participant id.
    pub participants: Vec<ParticipantMetrics>,
}

impl CallSession {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            start_timestamp: started_at.timestamp_micros() as f64 / 1_000_000.0,
            participants: Vec::new(),
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        if !self.start_timestamp.is_finite() {
            return None;
        }
        DateTime::from_timestamp_micros((self.start_timestamp * 1_000_000.0).round() as i64)
    }

    /// The identifier this session is stored under, `None` if the start
    /// timestamp is not a representable date.
    pub fn id(&self) -> Option<SessionId> {
        self.started_at().map(SessionId::from_start)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Returns the metrics of `participant_id`, appending a fresh record when
    /// the id is exactly one past the last participant. Larger ids yield
    /// `None`.
    pub fn participant_or_append(&mut self, participant_id: usize) -> Option<&mut ParticipantMetrics> {
        if participant_id == self.participants.len() {
            self.participants.push(ParticipantMetrics::default());
        }
        self.participants.get_mut(participant_id)
    }
}

/// Name of a persisted session, derived from its start time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct SessionId(String);

impl SessionId {
    pub const FORMAT: &'static str = "%Y_%m_%d_%H_%M_%S";

    pub fn from_start(started_at: DateTime<Utc>) -> Self {
        Self(started_at.format(Self::FORMAT).to_string())
    }

    /// Accepts externally supplied names. Only ASCII alphanumerics, `_` and
    /// `-` are allowed so an identifier can never escape the log directory.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
