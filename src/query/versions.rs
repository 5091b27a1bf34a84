use crate::storage::records::DocumentVersion;
use chrono::{DateTime, Utc};

/// Select the document version in effect at `viewed_at`.
///
/// `versions` must be sorted descending by `created_at`. Returns the first
/// version created at or before the view; a view older than every recorded
/// version (possible for data migrated from another source) falls back to
/// the most recent version. The fallback attributes such views to a newer
/// revision's page count on purpose: best effort beats dropping the view.
/// `None` only for an empty history.
pub fn resolve_version(
    viewed_at: DateTime<Utc>,
    versions: &[DocumentVersion],
) -> Option<&DocumentVersion> {
    versions
        .iter()
        .find(|version| version.created_at <= viewed_at)
        .or_else(|| versions.first())
}
