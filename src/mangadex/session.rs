//! Upload-session state machine.
//!
//! One chapter is one protocol run: displace any stale session, begin,
//! upload page batches strictly in sequence, then commit with a page order
//! derived from filenames rather than completion order.

use crate::mangadex::client::{UploadApi, UploadApiError};
use crate::mangadex::models::{ChapterDraft, PageUploadResult};
use crate::validate::ValidatedPage;
use tracing::{info, warn};

/// Pages per multipart request; the platform caps files per request at 10
pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SessionActive,
    Uploading,
    /// The chapter attempt was abandoned. Non-terminal: the caller may retry
    /// the chapter from `Idle`; the pre-flight probe cleans up whatever the
    /// platform still holds.
    Aborted,
    Committed,
}

/// Drives one chapter through the begin/batch/commit protocol
pub struct ChapterUploader<'a, A: UploadApi + ?Sized> {
    api: &'a A,
    state: SessionState,
}

impl<'a, A: UploadApi + ?Sized> ChapterUploader<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pre-flight: the platform allows a single active session per account,
    /// so a session left behind by an earlier failed run must be aborted
    /// before begin can succeed.
    async fn displace_stale_session(&mut self) -> Result<(), UploadApiError> {
        if let Some(stale_id) = self.api.active_session().await? {
            warn!("Aborting stale upload session: {}", stale_id);
            self.api.abort_session(&stale_id).await?;
        }
        Ok(())
    }

    pub async fn upload_chapter(
        &mut self,
        manga_id: &str,
        group_ids: &[String],
        pages: &[ValidatedPage],
        draft: &ChapterDraft,
    ) -> Result<String, UploadApiError> {
        self.displace_stale_session().await?;

        let session_id = self.api.begin_session(manga_id, group_ids).await?;
        self.state = SessionState::SessionActive;
        info!("Upload session started: {}", session_id);

        // Batches run strictly in sequence: rate limits, and a failure maps
        // unambiguously to one request. A failed batch abandons the chapter;
        // the session is left for the next run's pre-flight to clean up.
        self.state = SessionState::Uploading;
        let mut results = Vec::with_capacity(pages.len());
        for batch in pages.chunks(MAX_BATCH_SIZE) {
            match self.api.upload_batch(&session_id, batch).await {
                Ok(uploaded) => results.extend(uploaded),
                Err(e) => {
                    self.state = SessionState::Aborted;
                    return Err(e);
                }
            }
        }

        let page_order = page_order(&mut results);

        // Commit is not idempotent against partial remote state, so a failed
        // commit is neither retried nor aborted here.
        match self
            .api
            .commit_session(&session_id, draft, &page_order)
            .await
        {
            Ok(chapter_id) => {
                self.state = SessionState::Committed;
                info!("Committed chapter: {}", chapter_id);
                Ok(chapter_id)
            }
            Err(e) => {
                self.state = SessionState::Aborted;
                Err(e)
            }
        }
    }
}

/// Canonical reading order: sort accepted pages by the filename each was
/// sent as (case-insensitive) and take their platform IDs. Independent of
/// upload completion order and of the server's response array order.
pub fn page_order(results: &mut [PageUploadResult]) -> Vec<String> {
    results.sort_by(|a, b| {
        a.original_filename
            .to_lowercase()
            .cmp(&b.original_filename.to_lowercase())
    });
    results
        .iter()
        .map(|r| r.remote_page_id.clone())
        .collect()
}
