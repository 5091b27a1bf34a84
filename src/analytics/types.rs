use serde::{Deserialize, Serialize};

/// Per-page duration sum for one view, as reported by the backend.
///
/// `sum_duration` is in seconds; the engine converts to milliseconds exactly
/// once, at the aggregation boundary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageDurationEvent {
    #[serde(rename = "pageNumber")]
    pub page_number: String,
    pub sum_duration: f64,
}

/// Per-page average duration across the views of a document (seconds).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageAvgDuration {
    #[serde(rename = "pageNumber")]
    pub page_number: String,
    #[serde(rename = "versionNumber")]
    pub version_number: u32,
    pub avg_duration: f64,
}

/// One playback interval observation, half-open `[start_time, end_time)` in
/// seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoPlaybackEvent {
    pub view_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub event_type: String,
}

impl VideoPlaybackEvent {
    /// Event types that represent actual playback.
    pub const COUNTED_EVENT_TYPES: [&'static str; 4] =
        ["played", "muted", "unmuted", "rate_changed"];

    /// Whether this event contributes watch time. Zero-length and sub-second
    /// intervals are noise (scrub flicker, double-fired events) and are
    /// discarded.
    pub fn is_countable(&self) -> bool {
        Self::COUNTED_EVENT_TYPES.contains(&self.event_type.as_str())
            && self.end_time > self.start_time
            && self.end_time - self.start_time >= 1.0
    }
}
