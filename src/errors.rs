use indicatif::style::TemplateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unknown capture device is specified: {source_path}")]
    UnknownCaptureDevice { source_path: String },
    #[error("Capture device is not available: {message}")]
    CaptureDeviceUnavailable { message: String },
    #[error("Capture source is not an image: {source_path}")]
    UnsupportedCaptureSource { source_path: String },
    #[error("Flash is not supported by {device}")]
    FlashUnsupported { device: String },
    #[error("Input/output error")]
    InputOutputError(#[from] std::io::Error),
    #[error("HTTP client error:\n{0}")]
    HttpClientError(#[from] reqwest::Error),
    #[error("URL error:\n{0}")]
    UrlError(#[from] url::ParseError),
    #[error("Image upload failed: {message}. HTTP status: {status}.")]
    UploadFailed {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("Image host response is invalid: {message}")]
    UploadResponseInvalid { message: String },
    #[error("OCR request failed: {message}. HTTP status: {status}.")]
    OcrRequestFailed {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("OCR response is invalid: {message}")]
    OcrResponseInvalid { message: String },
    #[error("No text was recognized in the image")]
    NoTextRecognized,
    #[error("Text extraction failed after {attempts} attempts: {last_error}")]
    OcrRetriesExhausted { attempts: usize, last_error: String },
    #[error("Another capture run is already in progress")]
    CaptureRunActive,
    #[error("Service config error: {message}")]
    ServiceConfigError { message: String },
    #[error("Template error: {0}")]
    TemplateError(#[from] TemplateError),
    #[error("Image conversion error: {0}")]
    ImageError(#[from] image::ImageError),
    #[cfg(feature = "clipboard")]
    #[error("Clipboard error: {0}")]
    ClipboardError(#[from] arboard::Error),
    #[error("System error: {message}")]
    SystemError { message: String },
}
