use crate::devices::{CaptureDevice, CapturedImage, FlashMode, FlashSupport};
use crate::errors::AppError;
use crate::reporter::AppReporter;
use crate::AppResult;
use std::path::PathBuf;

/// Capture device backed by an image file on the local filesystem.
pub struct LocalFileDevice<'a> {
    source_path: PathBuf,
    reporter: &'a AppReporter<'a>,
}

impl<'a> LocalFileDevice<'a> {
    pub async fn new(source_path: &str, reporter: &'a AppReporter<'a>) -> AppResult<Self> {
        let source_path_str = source_path.trim_start_matches("file://").to_string();
        Ok(LocalFileDevice {
            source_path: PathBuf::from(source_path_str),
            reporter,
        })
    }
}

impl<'a> CaptureDevice for LocalFileDevice<'a> {
    async fn activate(&mut self) -> AppResult<()> {
        let metadata = tokio::fs::metadata(&self.source_path).await.map_err(|e| {
            AppError::CaptureDeviceUnavailable {
                message: format!("{}: {}", self.source_path.to_string_lossy(), e),
            }
        })?;
        if !metadata.is_file() {
            return Err(AppError::CaptureDeviceUnavailable {
                message: format!("{} is not a file", self.source_path.to_string_lossy()),
            });
        }
        Ok(())
    }

    async fn capture(&mut self) -> AppResult<CapturedImage> {
        let media_type = mime_guess::from_path(&self.source_path)
            .first()
            .filter(|mime| mime.type_() == mime::IMAGE)
            .ok_or_else(|| AppError::UnsupportedCaptureSource {
                source_path: self.source_path.to_string_lossy().to_string(),
            })?;
        let file_name = self
            .source_path
            .file_name()
            .ok_or_else(|| AppError::SystemError {
                message: "Filename is empty".to_string(),
            })?
            .to_string_lossy()
            .to_string();
        self.reporter.report(format!(
            "Capturing {} ({})",
            self.source_path.to_string_lossy(),
            media_type
        ))?;
        let data = tokio::fs::read(&self.source_path).await?;
        Ok(CapturedImage {
            file_name,
            media_type,
            data: data.into(),
        })
    }

    fn flash_support(&self) -> FlashSupport {
        FlashSupport::Unsupported
    }

    fn toggle_flash(&mut self) -> AppResult<FlashMode> {
        Err(AppError::FlashUnsupported {
            device: self.describe(),
        })
    }

    fn describe(&self) -> String {
        format!("file://{}", self.source_path.to_string_lossy())
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use crate::devices::DetectCaptureDevice;
    use console::Term;

    #[tokio::test]
    async fn capture_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let temp_dir = tempfile::TempDir::with_prefix("local_file_device_tests_capture")?;
        let temp_file = temp_dir.path().join("photo.jpg");
        let temp_content = b"not-really-a-jpeg";
        tokio::fs::write(&temp_file, temp_content).await?;

        let mut device = DetectCaptureDevice::open(
            &format!("file://{}", temp_file.to_string_lossy()),
            &reporter,
        )
        .await?;
        device.activate().await?;
        let image = device.capture().await?;

        assert_eq!(image.file_name, "photo.jpg");
        assert_eq!(image.media_type, mime::IMAGE_JPEG);
        assert_eq!(image.data.as_ref(), temp_content);

        Ok(())
    }

    #[tokio::test]
    async fn activate_fails_for_missing_file() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);

        let mut device = DetectCaptureDevice::open("/definitely/not/here.jpg", &reporter).await?;
        let result = device.activate().await;
        assert!(matches!(
            result,
            Err(AppError::CaptureDeviceUnavailable { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn capture_rejects_non_image_source(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let temp_dir = tempfile::TempDir::with_prefix("local_file_device_tests_non_image")?;
        let temp_file = temp_dir.path().join("notes.txt");
        tokio::fs::write(&temp_file, "plain text").await?;

        let mut device =
            DetectCaptureDevice::open(&temp_file.to_string_lossy(), &reporter).await?;
        device.activate().await?;
        let result = device.capture().await;
        assert!(matches!(
            result,
            Err(AppError::UnsupportedCaptureSource { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn flash_is_unsupported() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);

        let mut device = DetectCaptureDevice::open("photo.jpg", &reporter).await?;
        assert_eq!(device.flash_support(), FlashSupport::Unsupported);
        assert!(matches!(
            device.toggle_flash(),
            Err(AppError::FlashUnsupported { .. })
        ));

        Ok(())
    }
}
