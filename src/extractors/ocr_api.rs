use crate::common_types::{HostedImageRef, OcrAccessToken};
use crate::errors::AppError;
use crate::extractors::TextRecognizer;
use crate::reporter::AppReporter;
use crate::AppResult;
use rvstruct::ValueStruct;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone)]
pub struct OcrApiRecognizerOptions {
    pub endpoint: Url,
    pub access_token: OcrAccessToken,
}

/// Recognizer for the remote OCR API:
/// `GET <endpoint>?token=<token>&url=<imageUrl>`.
///
/// Response contract: an `application/json` body must carry the extracted
/// text in the `inlineSentence` field; any other content type is taken as
/// raw UTF-8 text.
#[derive(Clone)]
pub struct OcrApiRecognizer<'a> {
    client: reqwest::Client,
    ocr_api_options: OcrApiRecognizerOptions,
    #[allow(dead_code)]
    reporter: &'a AppReporter<'a>,
}

#[derive(Deserialize, Clone, Debug)]
struct OcrApiResponse {
    #[serde(rename = "inlineSentence")]
    inline_sentence: Option<String>,
}

impl<'a> OcrApiRecognizer<'a> {
    pub async fn new(
        ocr_api_options: OcrApiRecognizerOptions,
        reporter: &'a AppReporter<'a>,
    ) -> AppResult<Self> {
        let client = reqwest::Client::new();
        Ok(Self {
            client,
            ocr_api_options,
            reporter,
        })
    }

    fn parse_recognize_response(is_json: bool, response_text: &str) -> AppResult<String> {
        let text = if is_json {
            let response: OcrApiResponse =
                serde_json::from_str(response_text).map_err(|e| AppError::OcrResponseInvalid {
                    message: format!("Unexpected response shape: {}", e),
                })?;
            response
                .inline_sentence
                .ok_or_else(|| AppError::OcrResponseInvalid {
                    message: "Extracted text is missing in the response".to_string(),
                })?
        } else {
            response_text.to_string()
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::NoTextRecognized);
        }
        Ok(text.to_string())
    }
}

impl<'a> TextRecognizer for OcrApiRecognizer<'a> {
    async fn recognize(&self, image_url: &HostedImageRef) -> AppResult<String> {
        let response = self
            .client
            .get(self.ocr_api_options.endpoint.clone())
            .query(&[
                ("token", self.ocr_api_options.access_token.value().as_str()),
                ("url", image_url.value().as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let response_status = response.status();
            let response_text = response.text().await.unwrap_or_default();
            return Err(AppError::OcrRequestFailed {
                status: response_status,
                message: response_text,
            });
        }
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with(mime::APPLICATION_JSON.as_ref()))
            .unwrap_or(false);
        let response_text = response.text().await?;
        Self::parse_recognize_response(is_json, &response_text)
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use console::Term;

    #[test]
    fn parses_json_response() {
        let text = OcrApiRecognizer::parse_recognize_response(
            true,
            r#"{"inlineSentence":"আমি ভালো আছি"}"#,
        )
        .expect("valid response");
        assert_eq!(text, "আমি ভালো আছি");
    }

    #[test]
    fn parses_raw_text_response() {
        let text = OcrApiRecognizer::parse_recognize_response(false, "  Hello, world \n")
            .expect("valid response");
        assert_eq!(text, "Hello, world");
    }

    #[test]
    fn rejects_json_without_text_field() {
        let result = OcrApiRecognizer::parse_recognize_response(true, r#"{"status":"ok"}"#);
        assert!(matches!(result, Err(AppError::OcrResponseInvalid { .. })));
    }

    #[test]
    fn rejects_malformed_json() {
        let result = OcrApiRecognizer::parse_recognize_response(true, "<html>oops</html>");
        assert!(matches!(result, Err(AppError::OcrResponseInvalid { .. })));
    }

    #[test]
    fn rejects_empty_text() {
        let result =
            OcrApiRecognizer::parse_recognize_response(true, r#"{"inlineSentence":"  "}"#);
        assert!(matches!(result, Err(AppError::NoTextRecognized)));
        let result = OcrApiRecognizer::parse_recognize_response(false, "");
        assert!(matches!(result, Err(AppError::NoTextRecognized)));
    }

    #[tokio::test]
    #[cfg_attr(not(feature = "ci-ocr"), ignore)]
    async fn recognize_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let endpoint: Url = Url::parse(
            std::env::var("TEST_OCR_URL")
                .expect("TEST_OCR_URL required")
                .as_str(),
        )?;
        let access_token: OcrAccessToken = std::env::var("TEST_OCR_ACCESS_TOKEN")
            .expect("TEST_OCR_ACCESS_TOKEN required")
            .into();
        let image_url: HostedImageRef = Url::parse(
            std::env::var("TEST_OCR_IMAGE_URL")
                .expect("TEST_OCR_IMAGE_URL required")
                .as_str(),
        )?
        .into();

        let recognizer = OcrApiRecognizer::new(
            OcrApiRecognizerOptions {
                endpoint,
                access_token,
            },
            &reporter,
        )
        .await?;

        let text = recognizer.recognize(&image_url).await?;
        assert!(!text.is_empty());

        Ok(())
    }
}
