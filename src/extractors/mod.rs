use crate::common_types::{HostedImageRef, RetryPolicy};
use crate::errors::AppError;
use crate::reporter::AppReporter;
use crate::AppResult;
use tracing::warn;

mod ocr_api;
pub use ocr_api::*;

/// One OCR request against a hosted image URL. Implementations do not
/// retry; bounded retry lives in [`TextExtractor`].
pub trait TextRecognizer {
    async fn recognize(&self, image_url: &HostedImageRef) -> AppResult<String>;
}

/// Bounded fixed-delay retry around a [`TextRecognizer`]. The attempt
/// counter is local to each `extract` call, so successive runs never
/// inherit an exhausted count.
pub struct TextExtractor<'a, R: TextRecognizer> {
    recognizer: R,
    retry_policy: RetryPolicy,
    reporter: &'a AppReporter<'a>,
}

impl<'a, R: TextRecognizer> TextExtractor<'a, R> {
    pub fn new(recognizer: R, reporter: &'a AppReporter<'a>) -> Self {
        Self::with_retry_policy(recognizer, RetryPolicy::default(), reporter)
    }

    pub fn with_retry_policy(
        recognizer: R,
        retry_policy: RetryPolicy,
        reporter: &'a AppReporter<'a>,
    ) -> Self {
        Self {
            recognizer,
            retry_policy,
            reporter,
        }
    }

    pub async fn extract(&self, image_url: &HostedImageRef) -> AppResult<String> {
        let mut attempts: usize = 0;
        loop {
            match self.recognizer.recognize(image_url).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    attempts += 1;
                    warn!(
                        attempt = attempts,
                        max = self.retry_policy.max_attempts,
                        "OCR attempt failed: {}",
                        err
                    );
                    if attempts >= self.retry_policy.max_attempts {
                        return Err(AppError::OcrRetriesExhausted {
                            attempts,
                            last_error: err.to_string(),
                        });
                    }
                    self.reporter.report(format!(
                        "OCR attempt {} of {} failed, retrying: {}",
                        attempts, self.retry_policy.max_attempts, err
                    ))?;
                    tokio::time::sleep(self.retry_policy.delay).await;
                }
            }
        }
    }
}
