use crate::analytics::types::VideoPlaybackEvent;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Engagement metrics for one view of a video document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoEngagement {
    /// Seconds of playback counting overlaps: a rewatched section counts
    /// every time, so replays show up as engagement.
    pub total_watch_secs: u64,
    /// Distinct seconds of the video that were played at least once.
    pub unique_watch_secs: u64,
    /// min(100, round(100 * unique / length)), 0 for unknown length.
    pub completion_rate: u8,
}

impl VideoEngagement {
    pub const fn total_watch_time_ms(&self) -> u64 {
        self.total_watch_secs * 1000
    }
}

/// Distinct watched-seconds set.
///
/// Backed by a fixed bit arena sized from the video length, so memory stays
/// predictable on long videos; seconds past the arena (events beyond the
/// reported length) spill into a hash set.
struct SecondSet {
    bits: Vec<u64>,
    arena_secs: usize,
    spill: HashSet<u64>,
}

impl SecondSet {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn sized_for(video_length_secs: f64) -> Self {
        let arena_secs = if video_length_secs > 0.0 {
            video_length_secs.ceil() as usize + 1
        } else {
            0
        };
        Self {
            bits: vec![0u64; arena_secs.div_ceil(64)],
            arena_secs,
            spill: HashSet::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn insert(&mut self, second: u64) {
        let index = second as usize;
        if index < self.arena_secs {
            self.bits[index / 64] |= 1 << (index % 64);
        } else {
            self.spill.insert(second);
        }
    }

    fn len(&self) -> u64 {
        let arena: u64 = self
            .bits
            .iter()
            .map(|word| u64::from(word.count_ones()))
            .sum();
        arena + self.spill.len() as u64
    }
}

/// Whole seconds covered by `[start, end)`, floored.
///
/// Walks from `start` in 1-second steps, flooring each position, exactly as
/// the playback tracker buckets them. Sub-second playback at interval edges
/// under-counts; that is a known approximation, not something to fix here.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn each_whole_second(start: f64, end: f64, mut visit: impl FnMut(u64)) {
    let mut t = start;
    while t < end {
        visit(t.floor().max(0.0) as u64);
        t += 1.0;
    }
}

/// Aggregate the playback intervals of a single view.
///
/// Only events for `view_id` that pass [`VideoPlaybackEvent::is_countable`]
/// contribute. Two counters on purpose: total keeps overlaps (replay
/// engagement), completion uses the dedup set because rewatching a second
/// must not inflate how much of the video was seen.
pub fn aggregate_video(
    view_id: &str,
    events: &[VideoPlaybackEvent],
    video_length_secs: f64,
) -> VideoEngagement {
    let mut counts: HashMap<u64, u32> = HashMap::new();
    let mut seen = SecondSet::sized_for(video_length_secs);

    for event in events
        .iter()
        .filter(|event| event.view_id == view_id && event.is_countable())
    {
        each_whole_second(event.start_time, event.end_time, |second| {
            *counts.entry(second).or_insert(0) += 1;
            seen.insert(second);
        });
    }

    let total_watch_secs: u64 = counts.values().map(|&count| u64::from(count)).sum();
    let unique_watch_secs = seen.len();
    VideoEngagement {
        total_watch_secs,
        unique_watch_secs,
        completion_rate: completion_rate(unique_watch_secs, video_length_secs),
    }
}

/// min(100, round(100 * unique / length)), 0 for unknown length.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn completion_rate(unique_watch_secs: u64, video_length_secs: f64) -> u8 {
    if video_length_secs <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss)]
    let percent = (unique_watch_secs as f64 / video_length_secs) * 100.0;
    percent.round().min(100.0) as u8
}

/// Unclamped completion percentage, for averaging across views.
#[allow(clippy::cast_precision_loss)]
pub fn completion_percent(unique_watch_secs: u64, video_length_secs: f64) -> f64 {
    if video_length_secs <= 0.0 {
        return 0.0;
    }
    ((unique_watch_secs as f64 / video_length_secs) * 100.0).min(100.0)
}

/// One second of the playback curve: how many times it was played.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PlaybackSecond {
    pub start_time: u64,
    pub views: u32,
}

/// Per-second view-count curve for one view, zero-filled over the whole
/// video so the UI can plot gaps.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn playback_distribution(
    view_id: &str,
    events: &[VideoPlaybackEvent],
    video_length_secs: f64,
) -> Vec<PlaybackSecond> {
    let mut curve: BTreeMap<u64, u32> = BTreeMap::new();
    if video_length_secs > 0.0 {
        for second in 0..=(video_length_secs.floor() as u64) {
            curve.insert(second, 0);
        }
    }

    for event in events
        .iter()
        .filter(|event| event.view_id == view_id && event.is_countable())
    {
        each_whole_second(event.start_time, event.end_time, |second| {
            *curve.entry(second).or_insert(0) += 1;
        });
    }

    curve
        .into_iter()
        .map(|(start_time, views)| PlaybackSecond { start_time, views })
        .collect()
}
