use crate::common_types::RetryPolicy;
use crate::devices::{CaptureDevice, DetectCaptureDevice};
use crate::errors::AppError;
use crate::extractors::{OcrApiRecognizer, OcrApiRecognizerOptions, TextExtractor};
use crate::pipeline::{CapturePipeline, IntentOutcome, RunOutcome, UserIntent};
use crate::reporter::AppReporter;
use crate::uploaders::{ImgbbUploader, ImgbbUploaderOptions};
use crate::AppResult;
use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct ScanCommandResult {
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone)]
pub struct ScanServiceOptions {
    pub uploader_options: ImgbbUploaderOptions,
    pub recognizer_options: OcrApiRecognizerOptions,
    pub retry_policy: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct ScanCommandOptions {
    pub services: ScanServiceOptions,
    pub copy_to_clipboard: bool,
}

impl ScanCommandOptions {
    pub fn new(services: ScanServiceOptions, copy_to_clipboard: bool) -> Self {
        ScanCommandOptions {
            services,
            copy_to_clipboard,
        }
    }
}

pub async fn command_scan(
    term: &Term,
    source: &str,
    options: ScanCommandOptions,
) -> AppResult<ScanCommandResult> {
    let bold_style = Style::new().bold();
    term.write_line(
        format!(
            "Scanning {} for text via {}.",
            bold_style.clone().white().apply_to(source),
            bold_style.clone().yellow().apply_to(
                options
                    .services
                    .uploader_options
                    .upload_url
                    .host_str()
                    .unwrap_or("image host")
            ),
        )
        .as_str(),
    )?;
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {msg}",
    )?);
    bar.enable_steady_tick(Duration::from_millis(100));
    let app_reporter = AppReporter::from(&bar);

    let device = DetectCaptureDevice::open(source, &app_reporter).await?;
    let uploader = ImgbbUploader::new(options.services.uploader_options, &app_reporter).await?;
    let recognizer =
        OcrApiRecognizer::new(options.services.recognizer_options, &app_reporter).await?;
    let extractor = TextExtractor::with_retry_policy(
        recognizer,
        options.services.retry_policy,
        &app_reporter,
    );
    let mut pipeline = CapturePipeline::new(device, uploader, extractor, &app_reporter);

    let cancel_handle = pipeline.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    pipeline.handle_intent(UserIntent::StartCapture).await?;
    let outcome = match pipeline.handle_intent(UserIntent::ShutterPress).await? {
        IntentOutcome::RunFinished(outcome) => outcome,
        unexpected => {
            return Err(AppError::SystemError {
                message: format!("Unexpected shutter outcome: {:?}", unexpected),
            })
        }
    };
    bar.finish_and_clear();

    if let RunOutcome::Succeeded(ref text) = outcome {
        term.write_line(
            format!("{}", bold_style.clone().green().apply_to("Extracted text:")).as_str(),
        )?;
        term.write_line(text)?;
        if options.copy_to_clipboard {
            copy_result_to_clipboard(term, &mut pipeline).await?;
        }
    }

    Ok(ScanCommandResult { outcome })
}

#[cfg(feature = "clipboard")]
async fn copy_result_to_clipboard<'a, D, U, R>(
    term: &Term,
    pipeline: &mut CapturePipeline<'a, D, U, R>,
) -> AppResult<()>
where
    D: CaptureDevice,
    U: crate::uploaders::ImageUploader,
    R: crate::extractors::TextRecognizer,
{
    if let IntentOutcome::ResultText(Some(text)) =
        pipeline.handle_intent(UserIntent::CopyResult).await?
    {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_text(text)?;
        term.write_line("Extracted text copied to the clipboard.")?;
    }
    Ok(())
}

#[cfg(not(feature = "clipboard"))]
async fn copy_result_to_clipboard<'a, D, U, R>(
    term: &Term,
    _pipeline: &mut CapturePipeline<'a, D, U, R>,
) -> AppResult<()>
where
    D: CaptureDevice,
    U: crate::uploaders::ImageUploader,
    R: crate::extractors::TextRecognizer,
{
    term.write_line("Clipboard support is not enabled in this build.")?;
    Ok(())
}
