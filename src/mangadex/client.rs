use crate::mangadex::models::{
    BatchEnvelope, BeginSessionRequest, ChapterDraft, CommitRequest, ErrorEnvelope, IdEnvelope,
    PageUploadResult,
};
use crate::validate::ValidatedPage;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("tankobon/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum UploadApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upload session conflict: {0}")]
    SessionConflict(String),
    #[error("platform returned status {status}: {detail}")]
    Api { status: u16, detail: String },
}

/// The upload-session protocol surface (allows a test double to stand in for
/// the platform).
#[async_trait::async_trait]
pub trait UploadApi: Send + Sync {
    /// ID of the caller's active session, if one exists. Not-found is a
    /// normal empty result, not an error.
    async fn active_session(&self) -> Result<Option<String>, UploadApiError>;

    async fn begin_session(
        &self,
        manga_id: &str,
        group_ids: &[String],
    ) -> Result<String, UploadApiError>;

    async fn abort_session(&self, session_id: &str) -> Result<(), UploadApiError>;

    async fn upload_batch(
        &self,
        session_id: &str,
        pages: &[ValidatedPage],
    ) -> Result<Vec<PageUploadResult>, UploadApiError>;

    async fn commit_session(
        &self,
        session_id: &str,
        draft: &ChapterDraft,
        page_order: &[String],
    ) -> Result<String, UploadApiError>;
}

/// Bearer-authenticated client for the platform's upload endpoints
#[derive(Clone)]
pub struct MangaDexClient {
    client: Client,
    base_url: String,
    token: String,
}

impl MangaDexClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/upload", self.base_url)
    }

    /// Map a non-success response to the error taxonomy, pulling the
    /// platform's detail string out of the error body when present
    async fn error_from_response(response: reqwest::Response) -> UploadApiError {
        let status = response.status();
        let detail = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(|body| body.errors.into_iter().next())
            .and_then(|e| e.detail)
            .unwrap_or_else(|| "no detail provided".to_string());

        if status == StatusCode::CONFLICT {
            warn!("Upload session conflict: {}", detail);
            UploadApiError::SessionConflict(detail)
        } else {
            warn!("Upload API error ({}): {}", status, detail);
            UploadApiError::Api {
                status: status.as_u16(),
                detail,
            }
        }
    }
}

#[async_trait::async_trait]
impl UploadApi for MangaDexClient {
    async fn active_session(&self) -> Result<Option<String>, UploadApiError> {
        let response = self
            .client
            .get(self.upload_url())
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let envelope: IdEnvelope = response.json().await?;
        Ok(Some(envelope.data.id))
    }

    async fn begin_session(
        &self,
        manga_id: &str,
        group_ids: &[String],
    ) -> Result<String, UploadApiError> {
        let response = self
            .client
            .post(format!("{}/begin", self.upload_url()))
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .json(&BeginSessionRequest {
                manga: manga_id,
                groups: group_ids,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let envelope: IdEnvelope = response.json().await?;
        Ok(envelope.data.id)
    }

    async fn abort_session(&self, session_id: &str) -> Result<(), UploadApiError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.upload_url(), session_id))
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn upload_batch(
        &self,
        session_id: &str,
        pages: &[ValidatedPage],
    ) -> Result<Vec<PageUploadResult>, UploadApiError> {
        let mut form = reqwest::multipart::Form::new();
        for (index, page) in pages.iter().enumerate() {
            let part = reqwest::multipart::Part::bytes(page.bytes.clone())
                .file_name(page.upload_filename());
            form = form.part(format!("file{}", index + 1), part);
        }

        debug!("Uploading batch of {} page(s)", pages.len());

        let response = self
            .client
            .post(format!("{}/{}", self.upload_url(), session_id))
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let envelope: BatchEnvelope = response.json().await?;
        Ok(envelope
            .data
            .into_iter()
            .map(|file| PageUploadResult {
                remote_page_id: file.id,
                original_filename: file.attributes.original_file_name,
            })
            .collect())
    }

    async fn commit_session(
        &self,
        session_id: &str,
        draft: &ChapterDraft,
        page_order: &[String],
    ) -> Result<String, UploadApiError> {
        let response = self
            .client
            .post(format!("{}/{}/commit", self.upload_url(), session_id))
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .json(&CommitRequest {
                chapter_draft: draft,
                page_order,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let envelope: IdEnvelope = response.json().await?;
        Ok(envelope.data.id)
    }
}
