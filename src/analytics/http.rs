use crate::analytics::types::{PageAvgDuration, PageDurationEvent, VideoPlaybackEvent};
use crate::analytics::{EventSource, SourceError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Cap on how much of an error body gets copied into a `SourceError`.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Pipes-style HTTP implementation of [`EventSource`].
///
/// Each query hits `GET {base_url}/v0/pipes/{pipe}.json` with the pipe's
/// parameters in the query string and the token as a bearer header, and the
/// backend answers `{"data": [...]}` rows. The token never appears in
/// errors or logs.
pub struct HttpEventSource {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct PipeResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TotalDurationRow {
    sum_duration: f64,
}

impl HttpEventSource {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SourceError::from)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn pipe<T: DeserializeOwned>(
        &self,
        pipe: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, SourceError> {
        let url = format!("{}/v0/pipes/{pipe}.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY_LEN {
                let mut cut = MAX_ERROR_BODY_LEN;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(SourceError::with_status(status.as_u16(), body));
        }

        let payload: PipeResponse<T> = response.json().await?;
        Ok(payload.data)
    }
}

fn joined(view_ids: &[String]) -> String {
    view_ids.join(",")
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn page_duration(
        &self,
        document_id: &str,
        view_id: &str,
        since: i64,
    ) -> Result<Vec<PageDurationEvent>, SourceError> {
        self.pipe(
            "page_duration_per_view",
            &[
                ("documentId", document_id.to_string()),
                ("viewId", view_id.to_string()),
                ("since", since.to_string()),
            ],
        )
        .await
    }

    async fn video_events_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<VideoPlaybackEvent>, SourceError> {
        self.pipe(
            "video_events_by_document",
            &[("document_id", document_id.to_string())],
        )
        .await
    }

    async fn video_events_by_view(
        &self,
        view_id: &str,
        document_id: &str,
    ) -> Result<Vec<VideoPlaybackEvent>, SourceError> {
        self.pipe(
            "video_events_by_view",
            &[
                ("view_id", view_id.to_string()),
                ("document_id", document_id.to_string()),
            ],
        )
        .await
    }

    async fn avg_page_duration(
        &self,
        document_id: &str,
        excluded_view_ids: &[String],
        since: i64,
    ) -> Result<Vec<PageAvgDuration>, SourceError> {
        self.pipe(
            "avg_page_duration_by_document",
            &[
                ("documentId", document_id.to_string()),
                ("excludedViewIds", joined(excluded_view_ids)),
                ("since", since.to_string()),
            ],
        )
        .await
    }

    async fn total_document_duration(
        &self,
        document_id: &str,
        excluded_view_ids: &[String],
        since: i64,
    ) -> Result<f64, SourceError> {
        let rows: Vec<TotalDurationRow> = self
            .pipe(
                "total_document_duration",
                &[
                    ("documentId", document_id.to_string()),
                    ("excludedViewIds", joined(excluded_view_ids)),
                    ("since", since.to_string()),
                ],
            )
            .await?;
        Ok(rows.first().map_or(0.0, |row| row.sum_duration))
    }
}
