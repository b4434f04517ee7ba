//! A scripted stand-in for the upload platform that records every call it
//! receives, in order.

use std::sync::Mutex;
use tankobon::mangadex::client::{UploadApi, UploadApiError};
use tankobon::mangadex::models::{ChapterDraft, PageUploadResult};
use tankobon::validate::ValidatedPage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ActiveSession,
    AbortSession(String),
    BeginSession {
        manga_id: String,
        group_ids: Vec<String>,
    },
    UploadBatch(usize),
    Commit {
        draft: ChapterDraft,
        page_order: Vec<String>,
    },
}

pub struct RecordingUploadApi {
    pub calls: Mutex<Vec<Call>>,
    /// Session the probe reports before the first begin
    stale_session: Option<String>,
    /// 0-based batch index that fails with a synthetic API error
    fail_batch_index: Option<usize>,
    batches_seen: Mutex<usize>,
}

impl RecordingUploadApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            stale_session: None,
            fail_batch_index: None,
            batches_seen: Mutex::new(0),
        }
    }

    pub fn with_stale_session(session_id: &str) -> Self {
        Self {
            stale_session: Some(session_id.to_string()),
            ..Self::new()
        }
    }

    pub fn failing_at_batch(index: usize) -> Self {
        Self {
            fail_batch_index: Some(index),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl UploadApi for RecordingUploadApi {
    async fn active_session(&self) -> Result<Option<String>, UploadApiError> {
        self.record(Call::ActiveSession);
        // The stale session is only visible until it has been aborted
        let aborted = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, Call::AbortSession(_)));
        Ok(self.stale_session.clone().filter(|_| !aborted))
    }

    async fn begin_session(
        &self,
        manga_id: &str,
        group_ids: &[String],
    ) -> Result<String, UploadApiError> {
        self.record(Call::BeginSession {
            manga_id: manga_id.to_string(),
            group_ids: group_ids.to_vec(),
        });
        Ok("session-1".to_string())
    }

    async fn abort_session(&self, session_id: &str) -> Result<(), UploadApiError> {
        self.record(Call::AbortSession(session_id.to_string()));
        Ok(())
    }

    async fn upload_batch(
        &self,
        _session_id: &str,
        pages: &[ValidatedPage],
    ) -> Result<Vec<PageUploadResult>, UploadApiError> {
        self.record(Call::UploadBatch(pages.len()));

        let index = {
            let mut seen = self.batches_seen.lock().unwrap();
            let index = *seen;
            *seen += 1;
            index
        };
        if self.fail_batch_index == Some(index) {
            return Err(UploadApiError::Api {
                status: 500,
                detail: "injected batch failure".to_string(),
            });
        }

        // Results come back in reverse to prove ordering is reconciled from
        // filenames, not from the response array
        Ok(pages
            .iter()
            .rev()
            .map(|page| PageUploadResult {
                remote_page_id: format!("id-{}", page.upload_filename()),
                original_filename: page.upload_filename(),
            })
            .collect())
    }

    async fn commit_session(
        &self,
        _session_id: &str,
        draft: &ChapterDraft,
        page_order: &[String],
    ) -> Result<String, UploadApiError> {
        self.record(Call::Commit {
            draft: draft.clone(),
            page_order: page_order.to_vec(),
        });
        Ok("chapter-1".to_string())
    }
}
