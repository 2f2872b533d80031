use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde_json::{Value, json};

use super::{VisionError, VisionModel};
use crate::config::GeminiConfig;

/// Google Gemini `generateContent` with an inline image part.
pub struct GeminiVision {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiVision {
    /// `request_timeout` bounds the HTTP call itself, independently of how long
    /// a caller is willing to wait for it.
    pub fn new(config: &GeminiConfig, request_timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

pub fn request_body(prompt: &str, image: &[u8], mime_type: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "text": prompt },
                { "inline_data": { "mime_type": mime_type, "data": STANDARD.encode(image) } }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "temperature": 0.2
        }
    })
}

/// Concatenate the text parts of the first candidate.
pub fn reply_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl VisionModel for GeminiVision {
    fn name(&self) -> &str {
        &self.model
    }

    async fn describe(
        &self,
        prompt: &str,
        image: Bytes,
        mime_type: &'static str,
    ) -> Result<String, VisionError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt, &image, mime_type))
            .send()
            .await
            .map_err(|e| VisionError::Upstream(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(512)
                .collect::<String>();
            return Err(VisionError::Upstream(format!("HTTP {status}: {body}")));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| VisionError::Malformed(format!("response is not JSON: {e}")))?;

        reply_text(&payload)
            .ok_or_else(|| VisionError::Malformed("response has no text part".to_string()))
    }
}
