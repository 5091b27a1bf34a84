use crate::analytics::types::{PageAvgDuration, PageDurationEvent, VideoPlaybackEvent};
use crate::analytics::{AnalyticsClient, SourceError};
use crate::query::pages;
use crate::query::policy::{self, Resolved, UNAUTHORIZED_REASON};
use crate::query::versions::resolve_version;
use crate::query::video::{self, PlaybackSecond};
use crate::storage::records::{Document, Team, View};
use crate::storage::{StoreError, ViewStore};
use futures::future;
use futures::stream::{self, StreamExt};
use serde::Serialize;

/// Fan-out width for per-view backend queries outside the paged list path,
/// where no page size bounds the view set.
const STATS_FAN_OUT: usize = 16;

/// Options for a view listing request.
#[derive(Debug, Clone, Copy)]
pub struct ListOptions {
    pub page: u32,
    pub limit: u32,
    pub exclude_team_members: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            exclude_team_members: false,
        }
    }
}

/// Hard pipeline failure: a store error or a non-unauthorized backend error.
/// Unauthorized backends never produce this; they degrade instead.
#[derive(Debug)]
pub enum PipelineError {
    Store(StoreError),
    Analytics(SourceError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(error) => error.fmt(f),
            Self::Analytics(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl From<SourceError> for PipelineError {
    fn from(error: SourceError) -> Self {
        Self::Analytics(error)
    }
}

/// Pagination envelope.
///
/// `total_items` counts every non-archived view, independent of filters and
/// of the plan cap: what is pageable is not the same as what the plan shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    fn new(page: u32, limit: u32, total_items: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_items.div_ceil(u64::from(limit))
        };
        Self {
            current_page: page,
            page_size: limit,
            total_items,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

/// One view with its computed engagement metrics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRow {
    #[serde(flatten)]
    pub view: View,
    /// Total engagement in milliseconds (reading time, or watch time with
    /// replays counted).
    pub total_duration: u64,
    pub completion_rate: u8,
    pub version_number: u32,
    /// Page count of the attributed version; 0 for video documents.
    pub version_num_pages: u32,
    /// Whether the viewer email belongs to a team member.
    pub internal: bool,
}

/// Response envelope shared by document view listings and link visits.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewListResponse {
    pub rows: Vec<ViewRow>,
    /// Views filtered in but hidden by the plan cap.
    pub hidden_view_count: u64,
    pub total_views: u64,
    pub pagination: Pagination,
    pub analytics_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_unavailable_reason: Option<&'static str>,
}

impl ViewListResponse {
    /// Well-formed empty result for a missing or deleted document/link.
    /// "No data" is a valid terminal state, distinct from a broken backend.
    fn empty(options: ListOptions) -> Self {
        Self {
            rows: Vec::new(),
            hidden_view_count: 0,
            total_views: 0,
            pagination: Pagination::new(options.page, options.limit, 0),
            analytics_enabled: true,
            analytics_unavailable_reason: None,
        }
    }
}

/// Aggregate stats for a whole document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub views: Vec<View>,
    /// Per-page average durations in milliseconds.
    pub duration: Vec<PageAvgDuration>,
    /// Average total duration per view, milliseconds.
    pub total_duration_ms: u64,
    pub avg_completion_rate: u8,
    pub total_views: u64,
    pub analytics_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_unavailable_reason: Option<&'static str>,
}

impl DocumentStats {
    fn empty() -> Self {
        Self {
            views: Vec::new(),
            duration: Vec::new(),
            total_duration_ms: 0,
            avg_completion_rate: 0,
            total_views: 0,
            analytics_enabled: true,
            analytics_unavailable_reason: None,
        }
    }
}

/// Per-view page duration detail (milliseconds).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStats {
    pub duration: Vec<PageDurationEvent>,
    pub total_duration: u64,
    pub analytics_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_unavailable_reason: Option<&'static str>,
}

/// Per-view playback curve.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStats {
    pub data: Vec<PlaybackSecond>,
    pub analytics_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_unavailable_reason: Option<&'static str>,
}

/// List the views of a document with per-view engagement metrics.
pub async fn document_view_list(
    store: &dyn ViewStore,
    analytics: &AnalyticsClient,
    document_id: &str,
    options: ListOptions,
    free_plan_view_limit: usize,
) -> Result<ViewListResponse, PipelineError> {
    let Some(document) = store.document(document_id).await? else {
        return Ok(ViewListResponse::empty(options));
    };
    let team = store.team(&document.team_id).await?;
    let views = store.document_views(document_id).await?;
    build_list(
        analytics,
        &document,
        team.as_ref(),
        views,
        options,
        free_plan_view_limit,
    )
    .await
}

/// List the visits recorded through a link, same shape as the document list.
pub async fn link_view_list(
    store: &dyn ViewStore,
    analytics: &AnalyticsClient,
    link_id: &str,
    options: ListOptions,
    free_plan_view_limit: usize,
) -> Result<ViewListResponse, PipelineError> {
    let Some(link) = store.link(link_id).await? else {
        return Ok(ViewListResponse::empty(options));
    };
    if link.is_deleted() {
        return Ok(ViewListResponse::empty(options));
    }
    let Some(document) = store.document(&link.document_id).await? else {
        return Ok(ViewListResponse::empty(options));
    };
    let team = store.team(&document.team_id).await?;
    let views = store.link_views(link_id).await?;
    build_list(
        analytics,
        &document,
        team.as_ref(),
        views,
        options,
        free_plan_view_limit,
    )
    .await
}

/// Engagement data for one page of views, already fetched and classified.
enum Engagement {
    Video {
        events: Vec<VideoPlaybackEvent>,
        length_secs: f64,
    },
    Paged {
        durations: Vec<Vec<PageDurationEvent>>,
    },
    /// Backend unauthorized: every metric is zeroed, none is partially kept.
    Degraded,
}

async fn build_list(
    analytics: &AnalyticsClient,
    document: &Document,
    team: Option<&Team>,
    views: Vec<View>,
    options: ListOptions,
    free_plan_view_limit: usize,
) -> Result<ViewListResponse, PipelineError> {
    // Views arrive viewed_at-descending; archived ones never count anywhere.
    let mut filtered: Vec<View> = views.into_iter().filter(|view| !view.is_archived).collect();
    let total_items = filtered.len() as u64;
    if options.exclude_team_members {
        if let Some(team) = team {
            filtered.retain(|view| !team.is_member_email(view.viewer_email.as_deref()));
        }
    }

    // The plan cap is decided on the whole filtered list, before paging: it
    // hides the tail of the list, not a slice of each page.
    let eligible_count = if team.is_some_and(Team::is_free_plan) {
        filtered.len().min(free_plan_view_limit)
    } else {
        filtered.len()
    };
    let hidden_view_count = (filtered.len() - eligible_count) as u64;
    let eligible = &filtered[..eligible_count];

    let offset = (options.page.saturating_sub(1) as usize).saturating_mul(options.limit as usize);
    let page_views: &[View] = if offset >= eligible.len() {
        &[]
    } else {
        let end = offset.saturating_add(options.limit as usize).min(eligible.len());
        &eligible[offset..end]
    };

    let engagement = fetch_engagement(analytics, document, page_views).await?;
    let analytics_enabled = !matches!(engagement, Engagement::Degraded);
    let rows = build_rows(document, team, page_views, &engagement);

    Ok(ViewListResponse {
        rows,
        hidden_view_count,
        total_views: total_items,
        pagination: Pagination::new(options.page, options.limit, total_items),
        analytics_enabled,
        analytics_unavailable_reason: (!analytics_enabled).then_some(UNAUTHORIZED_REASON),
    })
}

async fn fetch_engagement(
    analytics: &AnalyticsClient,
    document: &Document,
    views: &[View],
) -> Result<Engagement, PipelineError> {
    if views.is_empty() {
        return Ok(Engagement::Paged {
            durations: Vec::new(),
        });
    }

    if document.is_video() {
        // One bulk query per document, partitioned by view client-side.
        let outcome = analytics.video_events_by_document(&document.id).await;
        match policy::resolve(vec![outcome])? {
            Resolved::Unavailable => Ok(Engagement::Degraded),
            Resolved::Available(mut batches) => Ok(Engagement::Video {
                events: batches.pop().unwrap_or_default(),
                length_secs: document.video_length_secs(),
            }),
        }
    } else {
        // One query per view on this page, issued concurrently. Fan-out
        // width is bounded by the page size.
        let outcomes = future::join_all(
            views
                .iter()
                .map(|view| analytics.page_duration(&document.id, &view.id, 0)),
        )
        .await;
        match policy::resolve(outcomes)? {
            Resolved::Unavailable => Ok(Engagement::Degraded),
            Resolved::Available(durations) => Ok(Engagement::Paged { durations }),
        }
    }
}

fn build_rows(
    document: &Document,
    team: Option<&Team>,
    views: &[View],
    engagement: &Engagement,
) -> Vec<ViewRow> {
    views
        .iter()
        .enumerate()
        .map(|(index, view)| {
            let version = resolve_version(view.viewed_at, &document.versions);
            let version_number = version.map_or(1, |v| v.version_number);
            let num_pages = version
                .and_then(|v| v.num_pages)
                .or(document.num_pages)
                .unwrap_or(0);

            let (total_duration, completion_rate, version_num_pages) = match engagement {
                Engagement::Degraded => (0, 0, if document.is_video() { 0 } else { num_pages }),
                Engagement::Video {
                    events,
                    length_secs,
                } => {
                    let watched = video::aggregate_video(&view.id, events, *length_secs);
                    (watched.total_watch_time_ms(), watched.completion_rate, 0)
                }
                Engagement::Paged { durations } => {
                    let events = durations.get(index).map_or(&[][..], Vec::as_slice);
                    let read = pages::aggregate_paged(events, num_pages);
                    (read.total_duration_ms, read.completion_rate, num_pages)
                }
            };

            ViewRow {
                view: view.clone(),
                total_duration,
                completion_rate,
                version_number,
                version_num_pages,
                internal: team.is_some_and(|team| team.is_member_email(view.viewer_email.as_deref())),
            }
        })
        .collect()
}

/// Aggregate stats across all (non-excluded) views of a document.
#[allow(clippy::too_many_lines)]
pub async fn document_stats(
    store: &dyn ViewStore,
    analytics: &AnalyticsClient,
    document_id: &str,
    exclude_team_members: bool,
) -> Result<DocumentStats, PipelineError> {
    let Some(document) = store.document(document_id).await? else {
        return Ok(DocumentStats::empty());
    };
    let team = store.team(&document.team_id).await?;
    let views = store.document_views(document_id).await?;

    let mut excluded_view_ids = Vec::new();
    let mut filtered = Vec::new();
    for view in views {
        let member_view = exclude_team_members
            && team
                .as_ref()
                .is_some_and(|team| team.is_member_email(view.viewer_email.as_deref()));
        if view.is_archived || member_view {
            excluded_view_ids.push(view.id);
        } else {
            filtered.push(view);
        }
    }
    if filtered.is_empty() {
        return Ok(DocumentStats::empty());
    }

    let (avg_outcome, total_outcome) = tokio::join!(
        analytics.avg_page_duration(&document.id, &excluded_view_ids, 0),
        analytics.total_document_duration(&document.id, &excluded_view_ids, 0),
    );

    let mut degraded = false;
    let avg_rows = match policy::resolve(vec![avg_outcome])? {
        Resolved::Available(mut batches) => batches.pop().unwrap_or_default(),
        Resolved::Unavailable => {
            degraded = true;
            Vec::new()
        }
    };
    let total_secs = match policy::resolve(vec![total_outcome])? {
        Resolved::Available(mut totals) => totals.pop().unwrap_or(0.0),
        Resolved::Unavailable => {
            degraded = true;
            0.0
        }
    };

    let completion_percents: Vec<f64> = if document.is_video() {
        let outcome = analytics.video_events_by_document(&document.id).await;
        match policy::resolve(vec![outcome])? {
            Resolved::Unavailable => {
                degraded = true;
                Vec::new()
            }
            Resolved::Available(mut batches) => {
                let events = batches.pop().unwrap_or_default();
                let length = document.video_length_secs();
                filtered
                    .iter()
                    .map(|view| {
                        let watched = video::aggregate_video(&view.id, &events, length);
                        video::completion_percent(watched.unique_watch_secs, length)
                    })
                    .collect()
            }
        }
    } else {
        // The stats endpoint has no page bound, so fan out with a fixed
        // width instead of one task per view.
        let queries: Vec<_> = filtered
            .iter()
            .map(|view| analytics.page_duration(&document.id, &view.id, 0))
            .collect();
        let outcomes: Vec<_> = stream::iter(queries)
            .buffered(STATS_FAN_OUT)
            .collect()
            .await;
        match policy::resolve(outcomes)? {
            Resolved::Unavailable => {
                degraded = true;
                Vec::new()
            }
            Resolved::Available(durations) => filtered
                .iter()
                .zip(durations)
                .map(|(view, events)| {
                    let num_pages = resolve_version(view.viewed_at, &document.versions)
                        .and_then(|v| v.num_pages)
                        .or(document.num_pages)
                        .unwrap_or(0);
                    pages::completion_percent(&events, num_pages).min(100.0)
                })
                .collect(),
        }
    };

    let total_views = filtered.len() as u64;
    if degraded {
        return Ok(DocumentStats {
            views: filtered,
            duration: Vec::new(),
            total_duration_ms: 0,
            avg_completion_rate: 0,
            total_views,
            analytics_enabled: false,
            analytics_unavailable_reason: Some(UNAUTHORIZED_REASON),
        });
    }

    let duration: Vec<PageAvgDuration> = avg_rows
        .into_iter()
        .map(|row| PageAvgDuration {
            page_number: row.page_number,
            version_number: row.version_number,
            avg_duration: row.avg_duration * 1000.0,
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let view_count = filtered.len() as f64;
    let total_duration_ms = pages::to_millis(total_secs / view_count);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let avg_completion_rate =
        (completion_percents.iter().sum::<f64>() / view_count).round().min(100.0) as u8;

    Ok(DocumentStats {
        views: filtered,
        duration,
        total_duration_ms,
        avg_completion_rate,
        total_views,
        analytics_enabled: true,
        analytics_unavailable_reason: None,
    })
}

/// Page duration detail for a single view, converted to milliseconds.
pub async fn view_stats(
    analytics: &AnalyticsClient,
    document_id: &str,
    view_id: &str,
) -> Result<ViewStats, PipelineError> {
    let outcome = analytics.page_duration(document_id, view_id, 0).await;
    match policy::resolve(vec![outcome])? {
        Resolved::Unavailable => Ok(ViewStats {
            duration: Vec::new(),
            total_duration: 0,
            analytics_enabled: false,
            analytics_unavailable_reason: Some(UNAUTHORIZED_REASON),
        }),
        Resolved::Available(mut batches) => {
            let mut events = batches.pop().unwrap_or_default();
            for event in &mut events {
                event.sum_duration *= 1000.0;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let total_duration = events
                .iter()
                .map(|event| event.sum_duration)
                .sum::<f64>()
                .round()
                .max(0.0) as u64;
            Ok(ViewStats {
                duration: events,
                total_duration,
                analytics_enabled: true,
                analytics_unavailable_reason: None,
            })
        }
    }
}

/// Playback curve for a single view of a video document.
pub async fn video_stats(
    analytics: &AnalyticsClient,
    document: &Document,
    view_id: &str,
) -> Result<VideoStats, PipelineError> {
    let outcome = analytics.video_events_by_view(view_id, &document.id).await;
    match policy::resolve(vec![outcome])? {
        Resolved::Unavailable => Ok(VideoStats {
            data: Vec::new(),
            analytics_enabled: false,
            analytics_unavailable_reason: Some(UNAUTHORIZED_REASON),
        }),
        Resolved::Available(mut batches) => {
            let events = batches.pop().unwrap_or_default();
            Ok(VideoStats {
                data: video::playback_distribution(view_id, &events, document.video_length_secs()),
                analytics_enabled: true,
                analytics_unavailable_reason: None,
            })
        }
    }
}
