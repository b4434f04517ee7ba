use crate::discover::ChapterDescriptor;
use crate::mangadex::client::{UploadApi, UploadApiError};
use crate::mangadex::models::ChapterDraft;
use crate::mangadex::session::ChapterUploader;
use crate::validate::{validate_chapter, ChapterRejection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("chapter rejected: {0}")]
    Invalid(#[from] ChapterRejection),
    #[error(transparent)]
    Upload(#[from] UploadApiError),
}

/// Validate a discovered chapter and drive it through the upload protocol.
/// Errors are chapter-scoped; the caller logs and moves on to the next one.
pub async fn publish_chapter<A: UploadApi + ?Sized>(
    api: &A,
    descriptor: &ChapterDescriptor,
) -> Result<String, PublishError> {
    let validated = validate_chapter(descriptor).await?;
    let draft = ChapterDraft::from_descriptor(descriptor);

    let mut uploader = ChapterUploader::new(api);
    let chapter_id = uploader
        .upload_chapter(
            &descriptor.title_id,
            &descriptor.group_ids,
            &validated.pages,
            &draft,
        )
        .await?;

    Ok(chapter_id)
}
