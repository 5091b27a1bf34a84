//! Viewprint: self-hosted view-engagement analytics for shared documents.
//!
//! Turns raw time-series events (page durations, video playback intervals)
//! into per-view and per-document engagement metrics, attributed against the
//! document version active at viewing time, filtered, paginated, and
//! resilient to an unauthorized or unreachable analytics backend.

pub mod analytics;
pub mod api;
pub mod config;
pub mod query;
pub mod server;
pub mod storage;
