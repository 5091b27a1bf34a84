use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use viewprint::analytics::types::{PageAvgDuration, PageDurationEvent, VideoPlaybackEvent};
use viewprint::analytics::{AnalyticsClient, EventSource, SourceError};
use viewprint::api::AppState;
use viewprint::server::build_router;
use viewprint::storage::memory::MemoryStore;
use viewprint::storage::records::{Document, DocumentVersion, Link, Team, View};

/// Scripted time-series backend for integration tests.
#[derive(Default)]
struct ScriptedSource {
    /// Page durations per view id.
    page_durations: HashMap<String, Vec<PageDurationEvent>>,
    video_events: Vec<VideoPlaybackEvent>,
    fail_with: Option<SourceError>,
}

impl ScriptedSource {
    fn check(&self) -> Result<(), SourceError> {
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn page_duration(
        &self,
        _document_id: &str,
        view_id: &str,
        _since: i64,
    ) -> Result<Vec<PageDurationEvent>, SourceError> {
        self.check()?;
        Ok(self.page_durations.get(view_id).cloned().unwrap_or_default())
    }

    async fn video_events_by_document(
        &self,
        _document_id: &str,
    ) -> Result<Vec<VideoPlaybackEvent>, SourceError> {
        self.check()?;
        Ok(self.video_events.clone())
    }

    async fn video_events_by_view(
        &self,
        view_id: &str,
        _document_id: &str,
    ) -> Result<Vec<VideoPlaybackEvent>, SourceError> {
        self.check()?;
        Ok(self
            .video_events
            .iter()
            .filter(|event| event.view_id == view_id)
            .cloned()
            .collect())
    }

    async fn avg_page_duration(
        &self,
        _document_id: &str,
        _excluded_view_ids: &[String],
        _since: i64,
    ) -> Result<Vec<PageAvgDuration>, SourceError> {
        self.check()?;
        Ok(Vec::new())
    }

    async fn total_document_duration(
        &self,
        _document_id: &str,
        _excluded_view_ids: &[String],
        _since: i64,
    ) -> Result<f64, SourceError> {
        self.check()?;
        Ok(0.0)
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn page_event(page: &str, sum_duration: f64) -> PageDurationEvent {
    PageDurationEvent {
        page_number: page.to_string(),
        sum_duration,
    }
}

fn played(view_id: &str, start: f64, end: f64) -> VideoPlaybackEvent {
    VideoPlaybackEvent {
        view_id: view_id.to_string(),
        start_time: start,
        end_time: end,
        event_type: "played".to_string(),
    }
}

fn view(id: &str, document_id: &str, viewed_secs: i64) -> View {
    View {
        id: id.to_string(),
        document_id: document_id.to_string(),
        link_id: None,
        link_name: None,
        viewer_email: None,
        viewed_at: ts(viewed_secs),
        is_archived: false,
    }
}

fn pdf_store(num_pages: u32) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_team(Team {
        id: "team".to_string(),
        plan: "pro".to_string(),
        member_emails: vec!["owner@acme.com".to_string()],
    });
    store.insert_document(Document {
        id: "doc".to_string(),
        team_id: "team".to_string(),
        num_pages: Some(num_pages),
        kind: Some("pdf".to_string()),
        versions: vec![DocumentVersion {
            version_number: 1,
            created_at: ts(0),
            num_pages: Some(num_pages),
            kind: Some("pdf".to_string()),
            length_secs: None,
        }],
    });
    store
}

fn make_state(store: MemoryStore, source: ScriptedSource, token_configured: bool) -> Arc<AppState> {
    Arc::new(AppState {
        store: Arc::new(store),
        analytics: AnalyticsClient::new(Arc::new(source), token_configured),
        free_plan_view_limit: 20,
        api_origin: None,
    })
}

async fn get_json(
    state: Arc<AppState>,
    uri: &str,
) -> (StatusCode, serde_json::Value) {
    let app = build_router(state);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_pdf_views_end_to_end() {
    // 10-page pdf, one view reading pages 1..3 for 2, 3 and 1 seconds.
    let store = pdf_store(10);
    store.insert_view(view("v1", "doc", 100));
    let mut source = ScriptedSource::default();
    source.page_durations.insert(
        "v1".to_string(),
        vec![page_event("1", 2.0), page_event("2", 3.0), page_event("3", 1.0)],
    );

    let (status, json) = get_json(make_state(store, source, true), "/api/documents/doc/views").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["analyticsEnabled"], true);
    assert_eq!(json["totalViews"], 1);
    let row = &json["rows"][0];
    assert_eq!(row["id"], "v1");
    assert_eq!(row["totalDuration"], 6000);
    assert_eq!(row["completionRate"], 30);
    assert_eq!(row["versionNumber"], 1);
    assert_eq!(row["versionNumPages"], 10);
    assert_eq!(row["internal"], false);
}

#[tokio::test]
async fn test_video_views_end_to_end() {
    let store = MemoryStore::new();
    store.insert_team(Team {
        id: "team".to_string(),
        plan: "pro".to_string(),
        member_emails: Vec::new(),
    });
    store.insert_document(Document {
        id: "vid".to_string(),
        team_id: "team".to_string(),
        num_pages: None,
        kind: Some("video".to_string()),
        versions: vec![DocumentVersion {
            version_number: 1,
            created_at: ts(0),
            num_pages: None,
            kind: Some("video".to_string()),
            length_secs: Some(20.0),
        }],
    });
    store.insert_view(view("v1", "vid", 100));
    let source = ScriptedSource {
        video_events: vec![played("v1", 0.0, 5.0), played("v1", 10.0, 15.0)],
        ..ScriptedSource::default()
    };

    let (status, json) = get_json(make_state(store, source, true), "/api/documents/vid/views").await;
    assert_eq!(status, StatusCode::OK);
    let row = &json["rows"][0];
    assert_eq!(row["totalDuration"], 10_000);
    assert_eq!(row["completionRate"], 50);
    assert_eq!(row["versionNumPages"], 0);
}

#[tokio::test]
async fn test_free_plan_hidden_views() {
    let store = pdf_store(10);
    // Downgrade the team to the free plan; inserts overwrite by id.
    store.insert_team(Team {
        id: "team".to_string(),
        plan: "free".to_string(),
        member_emails: Vec::new(),
    });
    for i in 0..25 {
        store.insert_view(view(&format!("v{i}"), "doc", 1000 + i));
    }
    let source = ScriptedSource::default();

    let (status, json) = get_json(
        make_state(store, source, true),
        "/api/documents/doc/views?page=1&limit=10",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rows"].as_array().unwrap().len(), 10);
    assert_eq!(json["hiddenViewCount"], 5);
    assert_eq!(json["pagination"]["totalItems"], 25);
    assert_eq!(json["pagination"]["totalPages"], 3);
    assert_eq!(json["pagination"]["hasNext"], true);
    assert_eq!(json["pagination"]["hasPrev"], false);
}

#[tokio::test]
async fn test_unauthorized_backend_degrades_uniformly() {
    let store = pdf_store(10);
    store.insert_view(view("v1", "doc", 100));
    let source = ScriptedSource {
        fail_with: Some(SourceError::with_status(401, "Unauthorized")),
        ..ScriptedSource::default()
    };
    let state = make_state(store, source, true);

    // Views list degrades.
    let (status, json) = get_json(Arc::clone(&state), "/api/documents/doc/views").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["analyticsEnabled"], false);
    assert_eq!(json["analyticsUnavailableReason"], "unauthorized");
    assert_eq!(json["rows"][0]["totalDuration"], 0);
    assert_eq!(json["rows"][0]["completionRate"], 0);

    // The stats endpoint must answer the same way for the same condition.
    let (status, json) = get_json(Arc::clone(&state), "/api/documents/doc/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["analyticsEnabled"], false);
    assert_eq!(json["totalDurationMs"], 0);
    assert_eq!(json["avgCompletionRate"], 0);

    // And so must the per-view detail.
    let (status, json) = get_json(state, "/api/documents/doc/views/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["analyticsEnabled"], false);
    assert_eq!(json["totalDuration"], 0);
}

#[tokio::test]
async fn test_missing_token_degrades_without_network() {
    let store = pdf_store(10);
    store.insert_view(view("v1", "doc", 100));
    // A source that would fail hard if it were ever called.
    let source = ScriptedSource {
        fail_with: Some(SourceError::with_status(500, "must not be called")),
        ..ScriptedSource::default()
    };

    let (status, json) = get_json(make_state(store, source, false), "/api/documents/doc/views").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["analyticsEnabled"], false);
    assert_eq!(json["analyticsUnavailableReason"], "unauthorized");
}

#[tokio::test]
async fn test_backend_error_is_a_500() {
    let store = pdf_store(10);
    store.insert_view(view("v1", "doc", 100));
    let source = ScriptedSource {
        fail_with: Some(SourceError::with_status(500, "backend down")),
        ..ScriptedSource::default()
    };

    let (status, _json) = get_json(make_state(store, source, true), "/api/documents/doc/views").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_link_visits_endpoint() {
    let store = pdf_store(4);
    store.insert_link(Link {
        id: "link".to_string(),
        document_id: "doc".to_string(),
        deleted_at: None,
    });
    let mut visit = view("v1", "doc", 100);
    visit.link_id = Some("link".to_string());
    store.insert_view(visit);
    let mut source = ScriptedSource::default();
    source
        .page_durations
        .insert("v1".to_string(), vec![page_event("1", 2.0)]);

    let (status, json) = get_json(make_state(store, source, true), "/api/links/link/visits").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rows"][0]["totalDuration"], 2000);
    assert_eq!(json["rows"][0]["completionRate"], 25);
    assert_eq!(json["totalViews"], 1);
}

#[tokio::test]
async fn test_deleted_link_is_empty_not_error() {
    let store = pdf_store(4);
    store.insert_link(Link {
        id: "link".to_string(),
        document_id: "doc".to_string(),
        deleted_at: Some(ts(999)),
    });

    let (status, json) = get_json(
        make_state(store, ScriptedSource::default(), true),
        "/api/links/link/visits",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalViews"], 0);
    assert_eq!(json["analyticsEnabled"], true);
    assert!(json["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_video_stats_curve_endpoint() {
    let store = MemoryStore::new();
    store.insert_team(Team {
        id: "team".to_string(),
        plan: "pro".to_string(),
        member_emails: Vec::new(),
    });
    store.insert_document(Document {
        id: "vid".to_string(),
        team_id: "team".to_string(),
        num_pages: None,
        kind: Some("video".to_string()),
        versions: vec![DocumentVersion {
            version_number: 1,
            created_at: ts(0),
            num_pages: None,
            kind: Some("video".to_string()),
            length_secs: Some(3.0),
        }],
    });
    store.insert_view(view("v1", "vid", 100));
    let source = ScriptedSource {
        video_events: vec![played("v1", 0.0, 2.0), played("v1", 1.0, 3.0)],
        ..ScriptedSource::default()
    };

    let (status, json) = get_json(
        make_state(store, source, true),
        "/api/documents/vid/views/v1/video-stats",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["analyticsEnabled"], true);
    let curve = json["data"].as_array().unwrap();
    assert_eq!(curve.len(), 4);
    assert_eq!(curve[1]["start_time"], 1);
    assert_eq!(curve[1]["views"], 2);
    assert_eq!(curve[3]["views"], 0);
}

#[tokio::test]
async fn test_video_stats_requires_length() {
    let store = pdf_store(10);
    store.insert_view(view("v1", "doc", 100));

    let (status, _json) = get_json(
        make_state(store, ScriptedSource::default(), true),
        "/api/documents/doc/views/v1/video-stats",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_exclude_team_members_filter() {
    let store = pdf_store(10);
    let mut member_view = view("v1", "doc", 200);
    member_view.viewer_email = Some("owner@acme.com".to_string());
    store.insert_view(member_view);
    let mut visitor_view = view("v2", "doc", 100);
    visitor_view.viewer_email = Some("visitor@example.com".to_string());
    store.insert_view(visitor_view);

    let (status, json) = get_json(
        make_state(store, ScriptedSource::default(), true),
        "/api/documents/doc/views?excludeTeamMembers=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["viewerEmail"], "visitor@example.com");
    // totalItems keeps counting the member view.
    assert_eq!(json["pagination"]["totalItems"], 2);
}
