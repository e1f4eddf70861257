use crate::errors::AppError;
use crate::reporter::AppReporter;
use crate::AppResult;
use bytes::Bytes;
use mime::Mime;

mod local;
pub use local::*;

#[cfg(feature = "clipboard")]
mod clipboard;
#[cfg(feature = "clipboard")]
pub use clipboard::*;

/// Local image produced by a capture device. Consumed by the uploader and
/// discarded with the run that created it.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub file_name: String,
    pub media_type: Mime,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    Off,
    On,
    Torch,
}

impl FlashMode {
    pub fn next(self) -> Self {
        match self {
            FlashMode::Off => FlashMode::On,
            FlashMode::On => FlashMode::Torch,
            FlashMode::Torch => FlashMode::Off,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashSupport {
    Supported,
    Unsupported,
}

pub trait CaptureDevice {
    /// Availability/permission check before the shutter can be pressed.
    async fn activate(&mut self) -> AppResult<()>;

    async fn capture(&mut self) -> AppResult<CapturedImage>;

    fn flash_support(&self) -> FlashSupport;

    fn toggle_flash(&mut self) -> AppResult<FlashMode>;

    fn describe(&self) -> String;
}

pub enum DetectCaptureDevice<'a> {
    LocalFile(LocalFileDevice<'a>),
    #[cfg(feature = "clipboard")]
    Clipboard(ClipboardDevice<'a>),
}

impl<'a> DetectCaptureDevice<'a> {
    pub async fn open(
        source_path: &str,
        reporter: &'a AppReporter<'a>,
    ) -> AppResult<impl CaptureDevice + 'a> {
        if source_path.starts_with("file://") || !source_path.contains("://") {
            Ok(DetectCaptureDevice::LocalFile(
                LocalFileDevice::new(source_path, reporter).await?,
            ))
        } else if source_path.starts_with("clipboard://") {
            #[cfg(feature = "clipboard")]
            {
                Ok(DetectCaptureDevice::Clipboard(
                    ClipboardDevice::new(source_path, reporter).await?,
                ))
            }
            #[cfg(not(feature = "clipboard"))]
            {
                return Err(AppError::UnknownCaptureDevice {
                    source_path: source_path.to_string(),
                });
            }
        } else {
            Err(AppError::UnknownCaptureDevice {
                source_path: source_path.to_string(),
            })
        }
    }
}

impl<'a> CaptureDevice for DetectCaptureDevice<'a> {
    async fn activate(&mut self) -> AppResult<()> {
        match self {
            DetectCaptureDevice::LocalFile(device) => device.activate().await,
            #[cfg(feature = "clipboard")]
            DetectCaptureDevice::Clipboard(device) => device.activate().await,
        }
    }

    async fn capture(&mut self) -> AppResult<CapturedImage> {
        match self {
            DetectCaptureDevice::LocalFile(device) => device.capture().await,
            #[cfg(feature = "clipboard")]
            DetectCaptureDevice::Clipboard(device) => device.capture().await,
        }
    }

    fn flash_support(&self) -> FlashSupport {
        match self {
            DetectCaptureDevice::LocalFile(device) => device.flash_support(),
            #[cfg(feature = "clipboard")]
            DetectCaptureDevice::Clipboard(device) => device.flash_support(),
        }
    }

    fn toggle_flash(&mut self) -> AppResult<FlashMode> {
        match self {
            DetectCaptureDevice::LocalFile(device) => device.toggle_flash(),
            #[cfg(feature = "clipboard")]
            DetectCaptureDevice::Clipboard(device) => device.toggle_flash(),
        }
    }

    fn describe(&self) -> String {
        match self {
            DetectCaptureDevice::LocalFile(device) => device.describe(),
            #[cfg(feature = "clipboard")]
            DetectCaptureDevice::Clipboard(device) => device.describe(),
        }
    }
}
