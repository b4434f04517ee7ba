pub mod client;
pub mod models;
pub mod session;

pub use client::{MangaDexClient, UploadApi, UploadApiError};
pub use models::{sanitize_value, ChapterDraft, PageUploadResult};
pub use session::{ChapterUploader, SessionState, MAX_BATCH_SIZE};
