/// Hosted text generation over the `generateContent` REST endpoint
///
/// Request: POST `{api_url}/models/{model}:generateContent?key=...` with the
/// prompt as the only user turn. The reply text is the concatenation of the
/// first candidate's text parts.
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use super::TextGenerator;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct GeminiGenerator {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> AppResult<String> {
        let url = format!("{}/models/{}:generateContent", self.api_url, model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Text generation API returned status {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed.text();

        tracing::debug!(model = %model, chars = text.len(), "Text generated");

        Ok(text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
