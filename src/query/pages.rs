use crate::analytics::types::PageDurationEvent;
use std::collections::HashSet;

/// Engagement metrics for one view of a paged document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEngagement {
    /// Total reading time in milliseconds.
    pub total_duration_ms: u64,
    /// Share of pages with any signal, 0..=100.
    pub completion_rate: u8,
}

/// Convert backend seconds to milliseconds, exactly once at this boundary.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_millis(seconds: f64) -> u64 {
    (seconds * 1000.0).round().max(0.0) as u64
}

/// Distinct pages with a positive duration.
///
/// Counting distinct page numbers (not rows) keeps duplicate rows in the
/// event stream from inflating the completion rate.
pub fn pages_with_signal(events: &[PageDurationEvent]) -> usize {
    events
        .iter()
        .filter(|event| event.sum_duration > 0.0)
        .map(|event| event.page_number.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Unclamped completion percentage for a paged view.
pub fn completion_percent(events: &[PageDurationEvent], num_pages: u32) -> f64 {
    if num_pages == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let signal = pages_with_signal(events) as f64;
    (signal / f64::from(num_pages)) * 100.0
}

/// Aggregate one view's per-page duration sums.
pub fn aggregate_paged(events: &[PageDurationEvent], num_pages: u32) -> PageEngagement {
    let total_seconds: f64 = events.iter().map(|event| event.sum_duration).sum();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let completion_rate = completion_percent(events, num_pages).round().min(100.0) as u8;
    PageEngagement {
        total_duration_ms: to_millis(total_seconds),
        completion_rate,
    }
}
