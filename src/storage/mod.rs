pub mod memory;
pub mod records;

use crate::storage::records::{Document, Link, Team, View};
use async_trait::async_trait;

/// Error surfaced by a `ViewStore` implementation.
#[derive(Debug, Clone)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store error: {}", self.message)
    }
}

impl std::error::Error for StoreError {}

/// Read access to View, Document, Link and Team records.
///
/// Persistence lives with an external collaborator; this engine only needs
/// these reads. [`memory::MemoryStore`] backs tests and the standalone
/// binary.
#[async_trait]
pub trait ViewStore: Send + Sync {
    async fn document(&self, document_id: &str) -> Result<Option<Document>, StoreError>;

    async fn link(&self, link_id: &str) -> Result<Option<Link>, StoreError>;

    /// All views of a document, archived included, sorted by `viewed_at`
    /// descending.
    async fn document_views(&self, document_id: &str) -> Result<Vec<View>, StoreError>;

    /// All views recorded through a link, archived included, sorted by
    /// `viewed_at` descending.
    async fn link_views(&self, link_id: &str) -> Result<Vec<View>, StoreError>;

    async fn team(&self, team_id: &str) -> Result<Option<Team>, StoreError>;
}
