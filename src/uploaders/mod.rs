use crate::common_types::HostedImageRef;
use crate::devices::CapturedImage;
use crate::AppResult;

mod imgbb;
pub use imgbb::*;

/// Remote image host: one multipart upload, no retry. A failed upload
/// terminates the pipeline run.
pub trait ImageUploader {
    async fn upload(&self, image: CapturedImage) -> AppResult<HostedImageRef>;
}
