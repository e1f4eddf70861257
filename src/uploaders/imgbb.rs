use crate::common_types::{HostedImageRef, ImageHostApiKey};
use crate::devices::CapturedImage;
use crate::errors::AppError;
use crate::reporter::AppReporter;
use crate::uploaders::ImageUploader;
use crate::AppResult;
use rvstruct::ValueStruct;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone)]
pub struct ImgbbUploaderOptions {
    pub upload_url: Url,
    pub api_key: ImageHostApiKey,
}

/// Uploader for the imgbb-compatible image host API:
/// `POST <upload_url>?key=<apiKey>` with a multipart `image` field.
#[derive(Clone)]
pub struct ImgbbUploader<'a> {
    client: reqwest::Client,
    imgbb_options: ImgbbUploaderOptions,
    reporter: &'a AppReporter<'a>,
}

#[derive(Deserialize, Clone, Debug)]
struct ImgbbUploadResponse {
    data: ImgbbUploadResponseData,
}

#[derive(Deserialize, Clone, Debug)]
struct ImgbbUploadResponseData {
    url: Option<String>,
}

impl<'a> ImgbbUploader<'a> {
    pub async fn new(
        imgbb_options: ImgbbUploaderOptions,
        reporter: &'a AppReporter<'a>,
    ) -> AppResult<Self> {
        let client = reqwest::Client::new();
        Ok(Self {
            client,
            imgbb_options,
            reporter,
        })
    }

    fn parse_upload_response(response_text: &str) -> AppResult<HostedImageRef> {
        let response: ImgbbUploadResponse =
            serde_json::from_str(response_text).map_err(|e| AppError::UploadResponseInvalid {
                message: format!("Unexpected response shape: {}", e),
            })?;
        let url_str = response
            .data
            .url
            .ok_or_else(|| AppError::UploadResponseInvalid {
                message: "Hosted image URL is missing in the response".to_string(),
            })?;
        let url = Url::parse(&url_str).map_err(|e| AppError::UploadResponseInvalid {
            message: format!("Hosted image URL is not a valid URL: {}", e),
        })?;
        Ok(url.into())
    }
}

impl<'a> ImageUploader for ImgbbUploader<'a> {
    async fn upload(&self, image: CapturedImage) -> AppResult<HostedImageRef> {
        self.reporter.report(format!(
            "Uploading {} ({}) to {}",
            image.file_name,
            image.media_type,
            self.imgbb_options
                .upload_url
                .host_str()
                .unwrap_or("image host")
        ))?;
        let file_part = reqwest::multipart::Part::bytes(image.data.to_vec())
            .file_name(image.file_name)
            .mime_str(image.media_type.as_ref())?;
        let form = reqwest::multipart::Form::new().part("image", file_part);
        let response = self
            .client
            .post(self.imgbb_options.upload_url.clone())
            .query(&[("key", self.imgbb_options.api_key.value().as_str())])
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            let response_status = response.status();
            let response_text = response.text().await.unwrap_or_default();
            return Err(AppError::UploadFailed {
                status: response_status,
                message: response_text,
            });
        }
        let response_text = response.text().await?;
        Self::parse_upload_response(&response_text)
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use console::Term;

    #[test]
    fn parses_hosted_image_url() {
        let hosted = ImgbbUploader::parse_upload_response(
            r#"{"data":{"url":"https://img/x.jpg"},"success":true,"status":200}"#,
        )
        .expect("valid response");
        assert_eq!(hosted.value().as_str(), "https://img/x.jpg");
    }

    #[test]
    fn rejects_response_without_url() {
        let result = ImgbbUploader::parse_upload_response(r#"{"data":{"id":"abc"}}"#);
        assert!(matches!(
            result,
            Err(AppError::UploadResponseInvalid { .. })
        ));
    }

    #[test]
    fn rejects_non_json_response() {
        let result = ImgbbUploader::parse_upload_response("<html>502 Bad Gateway</html>");
        assert!(matches!(
            result,
            Err(AppError::UploadResponseInvalid { .. })
        ));
    }

    #[test]
    fn rejects_malformed_hosted_url() {
        let result = ImgbbUploader::parse_upload_response(r#"{"data":{"url":"not a url"}}"#);
        assert!(matches!(
            result,
            Err(AppError::UploadResponseInvalid { .. })
        ));
    }

    #[tokio::test]
    #[cfg_attr(not(feature = "ci-image-host"), ignore)]
    async fn upload_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let upload_url: Url = Url::parse(
            std::env::var("TEST_IMAGE_HOST_URL")
                .unwrap_or_else(|_| "https://api.imgbb.com/1/upload".to_string())
                .as_str(),
        )?;
        let api_key: ImageHostApiKey = std::env::var("TEST_IMAGE_HOST_API_KEY")
            .expect("TEST_IMAGE_HOST_API_KEY required")
            .into();

        let uploader = ImgbbUploader::new(
            ImgbbUploaderOptions {
                upload_url,
                api_key,
            },
            &reporter,
        )
        .await?;

        let mut writer = std::io::Cursor::new(Vec::new());
        image::RgbaImage::new(2, 2).write_to(&mut writer, image::ImageFormat::Png)?;
        let image = CapturedImage {
            file_name: "photo.png".to_string(),
            media_type: mime::IMAGE_PNG,
            data: writer.into_inner().into(),
        };
        let hosted = uploader.upload(image).await?;
        assert!(!hosted.value().as_str().is_empty());

        Ok(())
    }
}
