//! Free OCR boundary (phase 1 captcha reads).

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::PanelError;

/// Best-effort image-to-text service.
#[async_trait]
pub trait CaptchaOcr: Send + Sync {
    /// Raw extracted text; the caller picks out a usable numeric code.
    async fn extract_text(&self, image: &[u8]) -> Result<String, PanelError>;
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Vec<OcrParsedResult>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    errored: bool,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OcrParsedResult {
    #[serde(rename = "ParsedText", default)]
    parsed_text: String,
}

/// HTTP client for the free OCR service.
pub struct OcrHttpClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OcrHttpClient {
    pub fn new(client: Client, config: &OcrConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl CaptchaOcr for OcrHttpClient {
    async fn extract_text(&self, image: &[u8]) -> Result<String, PanelError> {
        let image_b64 = format!("data:image/png;base64,{}", BASE64.encode(image));
        let form = [
            ("apikey", self.api_key.as_str()),
            ("base64Image", image_b64.as_str()),
            ("OCREngine", "2"),
            ("scale", "true"),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(PanelError::from_transport)?;

        let body: OcrResponse = response.json().await.map_err(PanelError::from_transport)?;
        if body.errored {
            let detail = body
                .error_message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "unspecified OCR error".into());
            return Err(PanelError::Unavailable(format!("ocr service: {detail}")));
        }

        let text = body
            .parsed_results
            .into_iter()
            .map(|r| r.parsed_text)
            .collect::<Vec<_>>()
            .join(" ");
        debug!(text = %text.trim(), "OCR pass complete");
        Ok(text)
    }
}
