use chrono::{DateTime, Utc};
use serde::Serialize;

/// One recorded visit of a document via a shareable link.
///
/// Read-only to this engine; the viewing flow creates these. Archived views
/// stay stored but are excluded from every aggregate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub document_id: String,
    pub link_id: Option<String>,
    /// Display name of the link the view came through, denormalized.
    pub link_name: Option<String>,
    pub viewer_email: Option<String>,
    pub viewed_at: DateTime<Utc>,
    pub is_archived: bool,
}

/// One revision of a document's content.
///
/// Versions of a document form a total order by `created_at`; stores hand
/// them to the engine sorted descending (most recent first).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub version_number: u32,
    pub created_at: DateTime<Utc>,
    /// Page count for paged documents; None for videos.
    pub num_pages: Option<u32>,
    pub kind: Option<String>,
    /// Video length in seconds; None for paged documents.
    pub length_secs: Option<f64>,
}

/// A shared document with its version history (descending by creation time).
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub team_id: String,
    /// Page count of the latest version, denormalized.
    pub num_pages: Option<u32>,
    pub kind: Option<String>,
    pub versions: Vec<DocumentVersion>,
}

impl Document {
    /// Whether views of this document are aggregated by playback intervals
    /// instead of per-page durations.
    pub fn is_video(&self) -> bool {
        self.kind.as_deref() == Some("video")
    }

    /// Length in seconds of the most recent version, 0 when unknown.
    pub fn video_length_secs(&self) -> f64 {
        self.versions
            .first()
            .and_then(|version| version.length_secs)
            .unwrap_or(0.0)
    }
}

/// A shareable link pointing at a document.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: String,
    pub document_id: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Link {
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The team owning a document: plan tier plus active member emails.
#[derive(Debug, Clone)]
pub struct Team {
    pub id: String,
    pub plan: String,
    /// Emails of active members, used for the internal-viewer flag and the
    /// team-member exclusion filter.
    pub member_emails: Vec<String>,
}

impl Team {
    /// Free-plan teams only get detailed aggregation for a capped number of
    /// views per document.
    pub fn is_free_plan(&self) -> bool {
        self.plan == "free"
    }

    pub fn is_member_email(&self, email: Option<&str>) -> bool {
        email.is_some_and(|email| self.member_emails.iter().any(|member| member == email))
    }
}
