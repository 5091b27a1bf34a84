pub mod http;
pub mod types;

pub use http::HttpEventSource;

use crate::analytics::types::{PageAvgDuration, PageDurationEvent, VideoPlaybackEvent};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Failure reported by the time-series backend.
#[derive(Debug, Clone)]
pub struct SourceError {
    status: Option<u16>,
    message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// A credential rejection rather than a real failure: HTTP 401/403, or a
    /// backend that only reports "Unauthorized" in the message body.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, Some(401 | 403)) || self.message.contains("Unauthorized")
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "analytics backend error ({status}): {}", self.message),
            None => write!(f, "analytics backend error: {}", self.message),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<reqwest::Error> for SourceError {
    fn from(error: reqwest::Error) -> Self {
        Self {
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

/// Outcome of one backend query.
///
/// Every call into the time-series backend is wrapped in this shape before
/// it crosses into aggregation logic; nothing downstream may assume success.
/// `Unauthorized` degrades the response (zeroed metrics), `Failed` fails it.
#[derive(Debug)]
pub enum QueryOutcome<T> {
    Success(T),
    Unauthorized,
    Failed(SourceError),
}

impl<T> QueryOutcome<T> {
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Raw queries against the external time-series backend.
///
/// Implementations return plain `Result`s; classification into the tri-state
/// [`QueryOutcome`] happens in [`AnalyticsClient`], never here.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Page duration sums for one view of a document.
    async fn page_duration(
        &self,
        document_id: &str,
        view_id: &str,
        since: i64,
    ) -> Result<Vec<PageDurationEvent>, SourceError>;

    /// All playback events recorded for a document, across views.
    async fn video_events_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<VideoPlaybackEvent>, SourceError>;

    /// Playback events for a single view.
    async fn video_events_by_view(
        &self,
        view_id: &str,
        document_id: &str,
    ) -> Result<Vec<VideoPlaybackEvent>, SourceError>;

    /// Per-page average durations across a document's views, minus the
    /// excluded view ids.
    async fn avg_page_duration(
        &self,
        document_id: &str,
        excluded_view_ids: &[String],
        since: i64,
    ) -> Result<Vec<PageAvgDuration>, SourceError>;

    /// Summed view duration (seconds) across a document's views, minus the
    /// excluded view ids.
    async fn total_document_duration(
        &self,
        document_id: &str,
        excluded_view_ids: &[String],
        since: i64,
    ) -> Result<f64, SourceError>;
}

/// Classifying wrapper around an [`EventSource`].
///
/// A missing backend token short-circuits every query to `Unauthorized`
/// without a network call, so an unconfigured deployment behaves exactly
/// like one whose credentials the backend rejects.
#[derive(Clone)]
pub struct AnalyticsClient {
    source: Arc<dyn EventSource>,
    token_configured: bool,
}

impl AnalyticsClient {
    pub fn new(source: Arc<dyn EventSource>, token_configured: bool) -> Self {
        Self {
            source,
            token_configured,
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.token_configured
    }

    pub async fn page_duration(
        &self,
        document_id: &str,
        view_id: &str,
        since: i64,
    ) -> QueryOutcome<Vec<PageDurationEvent>> {
        self.classify(self.source.page_duration(document_id, view_id, since))
            .await
    }

    pub async fn video_events_by_document(
        &self,
        document_id: &str,
    ) -> QueryOutcome<Vec<VideoPlaybackEvent>> {
        self.classify(self.source.video_events_by_document(document_id))
            .await
    }

    pub async fn video_events_by_view(
        &self,
        view_id: &str,
        document_id: &str,
    ) -> QueryOutcome<Vec<VideoPlaybackEvent>> {
        self.classify(self.source.video_events_by_view(view_id, document_id))
            .await
    }

    pub async fn avg_page_duration(
        &self,
        document_id: &str,
        excluded_view_ids: &[String],
        since: i64,
    ) -> QueryOutcome<Vec<PageAvgDuration>> {
        self.classify(
            self.source
                .avg_page_duration(document_id, excluded_view_ids, since),
        )
        .await
    }

    pub async fn total_document_duration(
        &self,
        document_id: &str,
        excluded_view_ids: &[String],
        since: i64,
    ) -> QueryOutcome<f64> {
        self.classify(
            self.source
                .total_document_duration(document_id, excluded_view_ids, since),
        )
        .await
    }

    async fn classify<T>(
        &self,
        call: impl Future<Output = Result<T, SourceError>> + Send,
    ) -> QueryOutcome<T> {
        if !self.token_configured {
            return QueryOutcome::Unauthorized;
        }
        match call.await {
            Ok(data) => QueryOutcome::Success(data),
            Err(error) if error.is_unauthorized() => QueryOutcome::Unauthorized,
            Err(error) => QueryOutcome::Failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedSource {
        response: Result<Vec<PageDurationEvent>, SourceError>,
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn page_duration(
            &self,
            _document_id: &str,
            _view_id: &str,
            _since: i64,
        ) -> Result<Vec<PageDurationEvent>, SourceError> {
            self.response.clone()
        }

        async fn video_events_by_document(
            &self,
            _document_id: &str,
        ) -> Result<Vec<VideoPlaybackEvent>, SourceError> {
            Ok(Vec::new())
        }

        async fn video_events_by_view(
            &self,
            _view_id: &str,
            _document_id: &str,
        ) -> Result<Vec<VideoPlaybackEvent>, SourceError> {
            Ok(Vec::new())
        }

        async fn avg_page_duration(
            &self,
            _document_id: &str,
            _excluded_view_ids: &[String],
            _since: i64,
        ) -> Result<Vec<PageAvgDuration>, SourceError> {
            Ok(Vec::new())
        }

        async fn total_document_duration(
            &self,
            _document_id: &str,
            _excluded_view_ids: &[String],
            _since: i64,
        ) -> Result<f64, SourceError> {
            Ok(0.0)
        }
    }

    fn client_with(
        response: Result<Vec<PageDurationEvent>, SourceError>,
        token_configured: bool,
    ) -> AnalyticsClient {
        AnalyticsClient::new(Arc::new(ScriptedSource { response }), token_configured)
    }

    #[tokio::test]
    async fn test_success_is_wrapped() {
        let client = client_with(Ok(Vec::new()), true);
        let outcome = client.page_duration("doc", "view", 0).await;
        assert!(matches!(outcome, QueryOutcome::Success(_)));
    }

    #[tokio::test]
    async fn test_http_401_classified_unauthorized() {
        let client = client_with(Err(SourceError::with_status(401, "nope")), true);
        let outcome = client.page_duration("doc", "view", 0).await;
        assert!(outcome.is_unauthorized());
    }

    #[tokio::test]
    async fn test_http_403_classified_unauthorized() {
        let client = client_with(Err(SourceError::with_status(403, "forbidden")), true);
        assert!(client.page_duration("doc", "view", 0).await.is_unauthorized());
    }

    #[tokio::test]
    async fn test_unauthorized_message_classified_unauthorized() {
        let client = client_with(Err(SourceError::new("token Unauthorized by backend")), true);
        assert!(client.page_duration("doc", "view", 0).await.is_unauthorized());
    }

    #[tokio::test]
    async fn test_other_errors_stay_failed() {
        let client = client_with(Err(SourceError::with_status(500, "boom")), true);
        let outcome = client.page_duration("doc", "view", 0).await;
        assert!(matches!(outcome, QueryOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_missing_token_short_circuits() {
        // The source would succeed, but without a token the client must not
        // even ask it.
        let client = client_with(Ok(Vec::new()), false);
        assert!(client.page_duration("doc", "view", 0).await.is_unauthorized());
    }
}
