use crate::devices::{CaptureDevice, FlashMode};
use crate::errors::AppError;
use crate::extractors::{TextExtractor, TextRecognizer};
use crate::reporter::AppReporter;
use crate::uploaders::ImageUploader;
use crate::AppResult;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Stage a run failed in, with a human-readable reason. No raw transport
/// error crosses this boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    Capture(String),
    Upload(String),
    Extraction(String),
}

impl Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageFailure::Capture(message) => write!(f, "Capture failed: {}", message),
            StageFailure::Upload(message) => write!(f, "Upload failed: {}", message),
            StageFailure::Extraction(message) => write!(f, "Extraction failed: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Idle,
    Capturing,
    Uploading,
    Extracting,
    Succeeded(String),
    Failed(StageFailure),
}

impl PipelineStatus {
    /// Advisory UI hint accompanying the state; not part of the contract.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            PipelineStatus::Capturing => Some("Taking Image.."),
            PipelineStatus::Uploading => Some("Saving Image.."),
            PipelineStatus::Extracting => Some("Analyzing your image..."),
            PipelineStatus::Succeeded(_) => Some("Image Analyzing Completed.."),
            PipelineStatus::Idle | PipelineStatus::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Succeeded(_) | PipelineStatus::Failed(_)
        )
    }
}

/// Discrete user intents forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    StartCapture,
    ShutterPress,
    Cancel,
    CopyResult,
    ToggleFlash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Handled,
    RunFinished(RunOutcome),
    FlashChanged(FlashMode),
    ResultText(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded(String),
    Failed(StageFailure),
    Cancelled,
}

#[derive(Debug)]
struct PipelineShared {
    status: PipelineStatus,
    epoch: u64,
}

/// Cheap cloneable view of the pipeline for the presentation layer:
/// reads status, cancels cooperatively.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    shared: Arc<Mutex<PipelineShared>>,
}

impl PipelineHandle {
    pub fn status(&self) -> PipelineStatus {
        lock_shared(&self.shared).status.clone()
    }

    /// Cancel from any non-idle state: restores `Idle` and bumps the run
    /// epoch so in-flight stage results are dropped instead of applied.
    pub fn cancel(&self) {
        let mut shared = lock_shared(&self.shared);
        if shared.status != PipelineStatus::Idle {
            shared.status = PipelineStatus::Idle;
            shared.epoch += 1;
        }
    }

    /// Clear a terminal state back to `Idle`, discarding the result.
    pub fn reset(&self) {
        let mut shared = lock_shared(&self.shared);
        if shared.status.is_terminal() {
            shared.status = PipelineStatus::Idle;
        }
    }

    pub fn result_text(&self) -> Option<String> {
        match &lock_shared(&self.shared).status {
            PipelineStatus::Succeeded(text) => Some(text.clone()),
            _ => None,
        }
    }
}

fn lock_shared(shared: &Arc<Mutex<PipelineShared>>) -> MutexGuard<'_, PipelineShared> {
    shared.lock().unwrap_or_else(|err| err.into_inner())
}

/// Orchestrates one capture run: device capture, upload, extraction, in
/// strict sequence. Owns the status state machine; stages never overlap.
pub struct CapturePipeline<'a, D, U, R>
where
    D: CaptureDevice,
    U: ImageUploader,
    R: TextRecognizer,
{
    device: D,
    uploader: U,
    extractor: TextExtractor<'a, R>,
    shared: Arc<Mutex<PipelineShared>>,
    reporter: &'a AppReporter<'a>,
}

impl<'a, D, U, R> CapturePipeline<'a, D, U, R>
where
    D: CaptureDevice,
    U: ImageUploader,
    R: TextRecognizer,
{
    pub fn new(
        device: D,
        uploader: U,
        extractor: TextExtractor<'a, R>,
        reporter: &'a AppReporter<'a>,
    ) -> Self {
        Self {
            device,
            uploader,
            extractor,
            shared: Arc::new(Mutex::new(PipelineShared {
                status: PipelineStatus::Idle,
                epoch: 0,
            })),
            reporter,
        }
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn status(&self) -> PipelineStatus {
        lock_shared(&self.shared).status.clone()
    }

    pub async fn handle_intent(&mut self, intent: UserIntent) -> AppResult<IntentOutcome> {
        match intent {
            UserIntent::StartCapture => {
                self.device.activate().await?;
                Ok(IntentOutcome::Handled)
            }
            UserIntent::ShutterPress => Ok(IntentOutcome::RunFinished(self.run().await?)),
            UserIntent::Cancel => {
                self.handle().cancel();
                Ok(IntentOutcome::Handled)
            }
            UserIntent::CopyResult => Ok(IntentOutcome::ResultText(self.handle().result_text())),
            UserIntent::ToggleFlash => Ok(IntentOutcome::FlashChanged(self.device.toggle_flash()?)),
        }
    }

    /// One end-to-end run. Stage failures resolve into `Failed`, never
    /// into the `Err` channel; `Err` is reserved for run admission and
    /// presentation I/O.
    pub async fn run(&mut self) -> AppResult<RunOutcome> {
        let run_epoch = self.begin_run()?;

        let image = match self.device.capture().await {
            Ok(image) => image,
            Err(err) => return self.fail(run_epoch, StageFailure::Capture(err.to_string())),
        };

        if !self.apply(run_epoch, PipelineStatus::Uploading)? {
            return Ok(RunOutcome::Cancelled);
        }
        let image_url = match self.uploader.upload(image).await {
            Ok(image_url) => image_url,
            Err(err) => return self.fail(run_epoch, StageFailure::Upload(err.to_string())),
        };

        if !self.apply(run_epoch, PipelineStatus::Extracting)? {
            return Ok(RunOutcome::Cancelled);
        }
        match self.extractor.extract(&image_url).await {
            Ok(text) => {
                if !self.apply(run_epoch, PipelineStatus::Succeeded(text.clone()))? {
                    return Ok(RunOutcome::Cancelled);
                }
                Ok(RunOutcome::Succeeded(text))
            }
            Err(err) => self.fail(run_epoch, StageFailure::Extraction(err.to_string())),
        }
    }

    /// Admit a new run: legal from `Idle` or a terminal state only. A run
    /// abandoned mid-flight (dropped future) leaves a non-terminal status
    /// behind and must be cancelled before the next run.
    fn begin_run(&self) -> AppResult<u64> {
        let run_epoch = {
            let mut shared = lock_shared(&self.shared);
            if !matches!(shared.status, PipelineStatus::Idle) && !shared.status.is_terminal() {
                return Err(AppError::CaptureRunActive);
            }
            shared.epoch += 1;
            shared.status = PipelineStatus::Capturing;
            shared.epoch
        };
        if let Some(message) = PipelineStatus::Capturing.message() {
            self.reporter.update_status(message)?;
        }
        Ok(run_epoch)
    }

    /// Apply a status for the given run; a stale epoch means the run was
    /// cancelled and the result must be dropped.
    fn apply(&self, run_epoch: u64, status: PipelineStatus) -> AppResult<bool> {
        let message = status.message();
        {
            let mut shared = lock_shared(&self.shared);
            if shared.epoch != run_epoch {
                debug!("Dropping stale {:?} result for a cancelled run", status);
                return Ok(false);
            }
            shared.status = status;
        }
        if let Some(message) = message {
            self.reporter.update_status(message)?;
        }
        Ok(true)
    }

    fn fail(&self, run_epoch: u64, failure: StageFailure) -> AppResult<RunOutcome> {
        if self.apply(run_epoch, PipelineStatus::Failed(failure.clone()))? {
            Ok(RunOutcome::Failed(failure))
        } else {
            Ok(RunOutcome::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_types::{HostedImageRef, RetryPolicy};
    use crate::devices::{CapturedImage, FlashSupport};
    use console::Term;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use url::Url;

    #[derive(Default)]
    struct StatusProbe {
        handle: Mutex<Option<PipelineHandle>>,
        observed: Mutex<Vec<PipelineStatus>>,
    }

    impl StatusProbe {
        fn attach(&self, handle: PipelineHandle) {
            *self.handle.lock().unwrap() = Some(handle);
        }

        fn record(&self) {
            if let Some(handle) = self.handle.lock().unwrap().as_ref() {
                self.observed.lock().unwrap().push(handle.status());
            }
        }

        fn observed(&self) -> Vec<PipelineStatus> {
            self.observed.lock().unwrap().clone()
        }
    }

    struct FakeDevice<'p> {
        probe: &'p StatusProbe,
        captures: AtomicUsize,
        fail: bool,
        flash_mode: Mutex<FlashMode>,
    }

    impl<'p> FakeDevice<'p> {
        fn new(probe: &'p StatusProbe) -> Self {
            Self {
                probe,
                captures: AtomicUsize::new(0),
                fail: false,
                flash_mode: Mutex::new(FlashMode::Off),
            }
        }

        fn failing(probe: &'p StatusProbe) -> Self {
            Self {
                fail: true,
                ..Self::new(probe)
            }
        }
    }

    impl<'p> CaptureDevice for FakeDevice<'p> {
        async fn activate(&mut self) -> AppResult<()> {
            Ok(())
        }

        async fn capture(&mut self) -> AppResult<CapturedImage> {
            self.probe.record();
            self.captures.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::CaptureDeviceUnavailable {
                    message: "camera permission denied".to_string(),
                });
            }
            Ok(CapturedImage {
                file_name: "photo.jpg".to_string(),
                media_type: mime::IMAGE_JPEG,
                data: bytes::Bytes::from_static(b"jpeg-bytes"),
            })
        }

        fn flash_support(&self) -> FlashSupport {
            FlashSupport::Supported
        }

        fn toggle_flash(&mut self) -> AppResult<FlashMode> {
            let mut flash_mode = self.flash_mode.lock().unwrap();
            *flash_mode = flash_mode.next();
            Ok(*flash_mode)
        }

        fn describe(&self) -> String {
            "fake://".to_string()
        }
    }

    struct FakeUploader<'p> {
        probe: &'p StatusProbe,
        uploads: AtomicUsize,
        fail: bool,
    }

    impl<'p> FakeUploader<'p> {
        fn new(probe: &'p StatusProbe) -> Self {
            Self {
                probe,
                uploads: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing(probe: &'p StatusProbe) -> Self {
            Self {
                fail: true,
                ..Self::new(probe)
            }
        }
    }

    impl<'p> ImageUploader for &FakeUploader<'p> {
        async fn upload(&self, _image: CapturedImage) -> AppResult<HostedImageRef> {
            self.probe.record();
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::UploadFailed {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    message: "boom".to_string(),
                });
            }
            Ok(Url::parse("https://img/x.jpg").unwrap().into())
        }
    }

    struct FakeRecognizer<'p> {
        probe: &'p StatusProbe,
        calls: AtomicUsize,
        failures_before_success: usize,
        text: Option<String>,
        started: Notify,
        release: Notify,
        gated: bool,
    }

    impl<'p> FakeRecognizer<'p> {
        fn succeeding(probe: &'p StatusProbe, text: &str) -> Self {
            Self {
                probe,
                calls: AtomicUsize::new(0),
                failures_before_success: 0,
                text: Some(text.to_string()),
                started: Notify::new(),
                release: Notify::new(),
                gated: false,
            }
        }

        fn flaky(probe: &'p StatusProbe, failures_before_success: usize, text: &str) -> Self {
            Self {
                failures_before_success,
                ..Self::succeeding(probe, text)
            }
        }

        fn gated(probe: &'p StatusProbe, text: &str) -> Self {
            Self {
                gated: true,
                ..Self::succeeding(probe, text)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<'p> TextRecognizer for &FakeRecognizer<'p> {
        async fn recognize(&self, _image_url: &HostedImageRef) -> AppResult<String> {
            self.probe.record();
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gated {
                self.started.notify_one();
                self.release.notified().await;
            }
            if call < self.failures_before_success {
                return Err(AppError::OcrRequestFailed {
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    message: "cold start".to_string(),
                });
            }
            match &self.text {
                Some(text) => Ok(text.clone()),
                None => Err(AppError::NoTextRecognized),
            }
        }
    }

    fn pipeline<'a>(
        device: FakeDevice<'a>,
        uploader: &'a FakeUploader<'a>,
        recognizer: &'a FakeRecognizer<'a>,
        reporter: &'a AppReporter<'a>,
    ) -> CapturePipeline<'a, FakeDevice<'a>, &'a FakeUploader<'a>, &'a FakeRecognizer<'a>> {
        let extractor = TextExtractor::with_retry_policy(
            recognizer,
            RetryPolicy::new(4, Duration::from_millis(1000)),
            reporter,
        );
        CapturePipeline::new(device, uploader, extractor, reporter)
    }

    #[tokio::test]
    async fn successful_run_transitions_through_all_stages() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::succeeding(&probe, "আমি ভালো আছি");
        let mut pipeline = pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);
        probe.attach(pipeline.handle());

        let outcome = pipeline.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Succeeded("আমি ভালো আছি".to_string()));
        // each collaborator saw the stage it belongs to, in order
        assert_eq!(
            probe.observed(),
            vec![
                PipelineStatus::Capturing,
                PipelineStatus::Uploading,
                PipelineStatus::Extracting
            ]
        );
        assert_eq!(
            pipeline.status(),
            PipelineStatus::Succeeded("আমি ভালো আছি".to_string())
        );
        assert_eq!(uploader.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(recognizer.calls(), 1);
    }

    #[tokio::test]
    async fn upload_failure_short_circuits_extraction() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::failing(&probe);
        let recognizer = FakeRecognizer::succeeding(&probe, "never seen");
        let mut pipeline = pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);

        let outcome = pipeline.run().await.unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Failed(StageFailure::Upload(_))
        ));
        assert!(matches!(pipeline.status(), PipelineStatus::Failed(_)));
        assert_eq!(recognizer.calls(), 0);
    }

    #[tokio::test]
    async fn capture_failure_fails_the_run() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::succeeding(&probe, "never seen");
        let mut pipeline = pipeline(FakeDevice::failing(&probe), &uploader, &recognizer, &reporter);

        let outcome = pipeline.run().await.unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Failed(StageFailure::Capture(_))
        ));
        assert_eq!(uploader.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(recognizer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_ocr_failures_recover_within_the_retry_budget() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::flaky(&probe, 3, "recovered");
        let mut pipeline = pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);

        let started = tokio::time::Instant::now();
        let outcome = pipeline.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Succeeded("recovered".to_string()));
        assert_eq!(recognizer.calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_ocr_retries_fail_the_run() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::flaky(&probe, usize::MAX, "unreachable");
        let mut pipeline = pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);

        let outcome = pipeline.run().await.unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Failed(StageFailure::Extraction(_))
        ));
        assert_eq!(recognizer.calls(), 4);
    }

    #[tokio::test]
    async fn cancel_while_extracting_drops_the_stale_result() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::gated(&probe, "too late");
        let mut pipeline = pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);
        let handle = pipeline.handle();

        let (outcome, _) = tokio::join!(pipeline.run(), async {
            recognizer.started.notified().await;
            assert_eq!(handle.status(), PipelineStatus::Extracting);
            handle.cancel();
            assert_eq!(handle.status(), PipelineStatus::Idle);
            recognizer.release.notify_one();
        });

        assert_eq!(outcome.unwrap(), RunOutcome::Cancelled);
        // the late OCR response never mutated the cancelled status
        assert_eq!(handle.status(), PipelineStatus::Idle);
        assert_eq!(handle.result_text(), None);
    }

    #[tokio::test]
    async fn abandoned_run_is_rejected_until_cancelled() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::gated(&probe, "never delivered");
        let mut pipeline = pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);
        let handle = pipeline.handle();

        {
            let run = pipeline.run();
            tokio::pin!(run);
            assert!(futures::poll!(run.as_mut()).is_pending());
        }
        assert_eq!(handle.status(), PipelineStatus::Extracting);

        let result = pipeline.run().await;
        assert!(matches!(result, Err(AppError::CaptureRunActive)));

        handle.cancel();
        recognizer.release.notify_one();
        let outcome = pipeline.run().await.unwrap();
        assert_eq!(outcome, RunOutcome::Succeeded("never delivered".to_string()));
    }

    #[tokio::test]
    async fn new_run_after_terminal_state_discards_prior_result() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let failing_uploader = FakeUploader::failing(&probe);
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::succeeding(&probe, "second time lucky");

        let mut pipeline = pipeline(FakeDevice::new(&probe), &failing_uploader, &recognizer, &reporter);
        let outcome = pipeline.run().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Failed(_)));
        drop(pipeline);

        let mut pipeline = self::pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);
        let first = pipeline.run().await.unwrap();
        assert!(matches!(first, RunOutcome::Succeeded(_)));
        // a terminal state admits the next run directly
        let second = pipeline.run().await.unwrap();
        assert!(matches!(second, RunOutcome::Succeeded(_)));
    }

    #[tokio::test]
    async fn reset_clears_a_terminal_state() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::succeeding(&probe, "done");
        let mut pipeline = pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);
        let handle = pipeline.handle();

        pipeline.run().await.unwrap();
        assert_eq!(handle.result_text(), Some("done".to_string()));

        handle.reset();
        assert_eq!(handle.status(), PipelineStatus::Idle);
        assert_eq!(handle.result_text(), None);
    }

    #[tokio::test]
    async fn intents_drive_the_pipeline() {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let probe = StatusProbe::default();
        let uploader = FakeUploader::new(&probe);
        let recognizer = FakeRecognizer::succeeding(&probe, "via intents");
        let mut pipeline = pipeline(FakeDevice::new(&probe), &uploader, &recognizer, &reporter);

        assert_eq!(
            pipeline.handle_intent(UserIntent::StartCapture).await.unwrap(),
            IntentOutcome::Handled
        );
        assert_eq!(
            pipeline.handle_intent(UserIntent::ToggleFlash).await.unwrap(),
            IntentOutcome::FlashChanged(FlashMode::On)
        );
        assert_eq!(
            pipeline.handle_intent(UserIntent::ShutterPress).await.unwrap(),
            IntentOutcome::RunFinished(RunOutcome::Succeeded("via intents".to_string()))
        );
        assert_eq!(
            pipeline.handle_intent(UserIntent::CopyResult).await.unwrap(),
            IntentOutcome::ResultText(Some("via intents".to_string()))
        );
        assert_eq!(
            pipeline.handle_intent(UserIntent::Cancel).await.unwrap(),
            IntentOutcome::Handled
        );
        assert_eq!(pipeline.status(), PipelineStatus::Idle);
    }

    #[test]
    fn status_messages_match_the_stages() {
        assert_eq!(PipelineStatus::Capturing.message(), Some("Taking Image.."));
        assert_eq!(PipelineStatus::Uploading.message(), Some("Saving Image.."));
        assert_eq!(
            PipelineStatus::Extracting.message(),
            Some("Analyzing your image...")
        );
        assert_eq!(
            PipelineStatus::Succeeded("x".to_string()).message(),
            Some("Image Analyzing Completed..")
        );
        assert_eq!(PipelineStatus::Idle.message(), None);
    }
}
