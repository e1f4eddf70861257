use crate::devices::{CaptureDevice, CapturedImage, FlashMode, FlashSupport};
use crate::errors::AppError;
use crate::reporter::AppReporter;
use crate::AppResult;
use arboard::Clipboard;
use image::ImageFormat;

/// Capture device backed by the system clipboard: the "shutter" grabs
/// whatever image is currently on it.
pub struct ClipboardDevice<'a> {
    clipboard: Clipboard,
    reporter: &'a AppReporter<'a>,
}

impl<'a> ClipboardDevice<'a> {
    pub async fn new(source_path: &str, reporter: &'a AppReporter<'a>) -> AppResult<Self> {
        if source_path != "clipboard://" {
            return Err(AppError::UnknownCaptureDevice {
                source_path: source_path.to_string(),
            });
        }
        Ok(Self {
            clipboard: Clipboard::new()?,
            reporter,
        })
    }
}

impl<'a> CaptureDevice for ClipboardDevice<'a> {
    async fn activate(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn capture(&mut self) -> AppResult<CapturedImage> {
        let image_data =
            self.clipboard
                .get()
                .image()
                .map_err(|e| AppError::CaptureDeviceUnavailable {
                    message: format!("No image on the clipboard: {}", e),
                })?;
        let maybe_image: Option<image::RgbaImage> = image::ImageBuffer::from_raw(
            image_data.width as u32,
            image_data.height as u32,
            image_data.bytes.into_owned(),
        );
        let Some(image) = maybe_image else {
            return Err(AppError::CaptureDeviceUnavailable {
                message: "Clipboard image has an unsupported pixel layout".to_string(),
            });
        };
        let mut writer = std::io::Cursor::new(Vec::new());
        image.write_to(&mut writer, ImageFormat::Png)?;
        let png_image_bytes = writer.into_inner();
        let file_name = format!(
            "{}.png",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(|e| AppError::SystemError {
                    message: e.to_string(),
                })?
                .as_secs()
        );
        self.reporter
            .report(format!("Capturing clipboard image as {}", file_name))?;
        Ok(CapturedImage {
            file_name,
            media_type: mime::IMAGE_PNG,
            data: png_image_bytes.into(),
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
        "clipboard://".to_string()
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use console::Term;

    #[tokio::test]
    #[cfg_attr(not(feature = "ci-clipboard"), ignore)]
    async fn capture_from_clipboard_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);

        let mut source = Clipboard::new()?;
        let pixels: Vec<u8> = vec![255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];
        source.set_image(arboard::ImageData {
            width: 2,
            height: 2,
            bytes: pixels.into(),
        })?;

        let mut device = ClipboardDevice::new("clipboard://", &reporter).await?;
        device.activate().await?;
        let image = device.capture().await?;

        assert_eq!(image.media_type, mime::IMAGE_PNG);
        assert!(image.file_name.ends_with(".png"));
        assert!(!image.data.is_empty());

        Ok(())
    }
}
