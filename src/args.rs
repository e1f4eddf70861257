use crate::commands::ScanServiceOptions;
use crate::common_types::{ImageHostApiKey, OcrAccessToken, RetryPolicy};
use crate::config_env_var;
use crate::errors::AppError;
use crate::extractors::OcrApiRecognizerOptions;
use crate::uploaders::ImgbbUploaderOptions;
use clap::*;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    #[command(about = "Capture an image from a source device and extract its text")]
    Scan {
        #[arg(
            help = "Capture source such as photo.jpg, file:///tmp/photo.jpg or clipboard://"
        )]
        source: String,

        #[arg(
            long,
            help = "Copy the extracted text to the clipboard",
            default_value = "false"
        )]
        copy: bool,

        #[command(flatten)]
        service_args: ServiceArgs,
    },
}

#[derive(Args, Debug, Clone)]
#[group(required = false)]
pub struct ServiceArgs {
    #[arg(
        long,
        help = "Image host upload endpoint",
        default_value = "https://api.imgbb.com/1/upload"
    )]
    pub image_host_url: Url,

    #[arg(
        long,
        help = "Image host API key (defaults to SNAPTEXT_IMAGE_HOST_API_KEY)"
    )]
    pub image_host_api_key: Option<ImageHostApiKey>,

    #[arg(long, help = "OCR endpoint URL (defaults to SNAPTEXT_OCR_URL)")]
    pub ocr_url: Option<Url>,

    #[arg(
        long,
        help = "OCR access token (defaults to SNAPTEXT_OCR_ACCESS_TOKEN)"
    )]
    pub ocr_token: Option<OcrAccessToken>,

    #[arg(
        long,
        help = "OCR retry policy as attempts and fixed delay, such as 4x1000ms"
    )]
    pub ocr_retry: Option<RetryPolicy>,
}

impl TryInto<ScanServiceOptions> for ServiceArgs {
    type Error = AppError;

    fn try_into(self) -> Result<ScanServiceOptions, Self::Error> {
        let api_key = match self.image_host_api_key {
            Some(api_key) => api_key,
            None => config_env_var("SNAPTEXT_IMAGE_HOST_API_KEY")
                .map_err(|message| AppError::ServiceConfigError { message })?
                .into(),
        };
        let ocr_url = match self.ocr_url {
            Some(ocr_url) => ocr_url,
            None => Url::parse(
                config_env_var("SNAPTEXT_OCR_URL")
                    .map_err(|message| AppError::ServiceConfigError { message })?
                    .as_str(),
            )?,
        };
        let access_token = match self.ocr_token {
            Some(access_token) => access_token,
            None => config_env_var("SNAPTEXT_OCR_ACCESS_TOKEN")
                .map_err(|message| AppError::ServiceConfigError { message })?
                .into(),
        };
        Ok(ScanServiceOptions {
            uploader_options: ImgbbUploaderOptions {
                upload_url: self.image_host_url,
                api_key,
            },
            recognizer_options: OcrApiRecognizerOptions {
                endpoint: ocr_url,
                access_token,
            },
            retry_policy: self.ocr_retry.unwrap_or_default(),
        })
    }
}
