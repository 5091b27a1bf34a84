use crate::storage::records::{Document, Link, Team, View};
use crate::storage::{StoreError, ViewStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory `ViewStore` used by tests and the standalone binary.
///
/// Reads return clones; views come back sorted by `viewed_at` descending, the
/// order the pipeline expects from any store implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Document>,
    links: HashMap<String, Link>,
    teams: HashMap<String, Team>,
    views: Vec<View>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, document: Document) {
        self.inner
            .write()
            .documents
            .insert(document.id.clone(), document);
    }

    pub fn insert_link(&self, link: Link) {
        self.inner.write().links.insert(link.id.clone(), link);
    }

    pub fn insert_team(&self, team: Team) {
        self.inner.write().teams.insert(team.id.clone(), team);
    }

    pub fn insert_view(&self, view: View) {
        self.inner.write().views.push(view);
    }

    /// Convenience for tests: record a non-archived view with a fresh id.
    pub fn record_view(
        &self,
        document_id: &str,
        link_id: Option<&str>,
        viewer_email: Option<&str>,
        viewed_at: DateTime<Utc>,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.insert_view(View {
            id: id.clone(),
            document_id: document_id.to_string(),
            link_id: link_id.map(ToString::to_string),
            link_name: None,
            viewer_email: viewer_email.map(ToString::to_string),
            viewed_at,
            is_archived: false,
        });
        id
    }

    fn sorted_views<F>(&self, keep: F) -> Vec<View>
    where
        F: Fn(&View) -> bool,
    {
        let mut views: Vec<View> = self
            .inner
            .read()
            .views
            .iter()
            .filter(|view| keep(view))
            .cloned()
            .collect();
        views.sort_by(|a, b| b.viewed_at.cmp(&a.viewed_at));
        views
    }
}

#[async_trait]
impl ViewStore for MemoryStore {
    async fn document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.inner.read().documents.get(document_id).cloned())
    }

    async fn link(&self, link_id: &str) -> Result<Option<Link>, StoreError> {
        Ok(self.inner.read().links.get(link_id).cloned())
    }

    async fn document_views(&self, document_id: &str) -> Result<Vec<View>, StoreError> {
        Ok(self.sorted_views(|view| view.document_id == document_id))
    }

    async fn link_views(&self, link_id: &str) -> Result<Vec<View>, StoreError> {
        Ok(self.sorted_views(|view| view.link_id.as_deref() == Some(link_id)))
    }

    async fn team(&self, team_id: &str) -> Result<Option<Team>, StoreError> {
        Ok(self.inner.read().teams.get(team_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_document_views_sorted_descending() {
        let store = MemoryStore::new();
        store.record_view("doc", None, None, ts(100));
        store.record_view("doc", None, None, ts(300));
        store.record_view("doc", None, None, ts(200));
        store.record_view("other", None, None, ts(400));

        let views = store.document_views("doc").await.unwrap();
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].viewed_at, ts(300));
        assert_eq!(views[1].viewed_at, ts(200));
        assert_eq!(views[2].viewed_at, ts(100));
    }

    #[tokio::test]
    async fn test_link_views_filters_by_link() {
        let store = MemoryStore::new();
        store.record_view("doc", Some("link-a"), None, ts(100));
        store.record_view("doc", Some("link-b"), None, ts(200));
        store.record_view("doc", None, None, ts(300));

        let views = store.link_views("link-a").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].link_id.as_deref(), Some("link-a"));
    }

    #[tokio::test]
    async fn test_missing_lookups_return_none() {
        let store = MemoryStore::new();
        assert!(store.document("nope").await.unwrap().is_none());
        assert!(store.link("nope").await.unwrap().is_none());
        assert!(store.team("nope").await.unwrap().is_none());
    }
}
