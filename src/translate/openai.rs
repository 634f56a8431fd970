use anyhow::{Context, Result, anyhow};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::Translator;
use super::retry::{Backoff, is_throttled, retry_after};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions translator for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiTranslator {
    client: reqwest::Client,
    key: String,
    model: String,
    base_url: String,
    source_lang: String,
    target_lang: String,
}

impl OpenAiTranslator {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            source_lang: "ja".to_string(),
            target_lang: "en".to_string(),
        }
    }

    /// Uses `key` when given, otherwise `OPENAI_API_KEY`.
    pub fn from_env(key: Option<&str>) -> Result<Self> {
        if let Some(key) = key.filter(|value| !value.trim().is_empty()) {
            return Ok(Self::new(key));
        }
        let key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("no API key found (pass --key or set OPENAI_API_KEY)"))?;
        Ok(Self::new(key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_lang = source.into();
        self.target_lang = target.into();
        self
    }

    fn system_prompt(&self) -> String {
        format!(
            "You translate manga dialogue from language '{}' to language '{}'. \
             The input is OCR output from a single speech bubble and may contain line-break noise. \
             Reply with the translation only, as natural spoken dialogue, without quotes or notes.",
            self.source_lang, self.target_lang
        )
    }

    async fn call_chat_completions(&self, text: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_prompt()},
                {"role": "user", "content": text}
            ]
        });

        let mut backoff = Backoff::default();
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.key)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("failed to call {}", url))?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return extract_message_content(&text);
            }
            if is_throttled(status, &text) && attempt < backoff.max_attempts {
                backoff.wait(attempt, retry_after).await;
                continue;
            }
            return Err(anyhow!(
                "OpenAI API error ({}): {}",
                status,
                extract_openai_error(&text).unwrap_or(text)
            ));
        }
    }
}

impl Translator for OpenAiTranslator {
    fn translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let input = text.trim();
            if input.is_empty() {
                return Ok(String::new());
            }
            debug!("translating {} chars with {}", input.chars().count(), self.model);
            self.call_chat_completions(input).await
        })
    }
}

fn extract_message_content(body: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: Option<String>,
    }

    let parsed: ChatResponse =
        serde_json::from_str(body).with_context(|| "failed to parse chat completion response")?;
    let content = parsed
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("chat completion response has no message content"))?;
    Ok(content.trim().to_string())
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let parts = [
        error.message,
        error.kind.map(|kind| format!("type: {}", kind)),
        error.code.map(|code| format!("code: {}", code)),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .collect::<Vec<_>>();
    if parts.is_empty() {
        Some("unknown error".to_string())
    } else {
        Some(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_is_trimmed() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"  Hey, wait!\n"}}]}"#;
        assert_eq!(extract_message_content(body).expect("content"), "Hey, wait!");
    }

    #[test]
    fn missing_content_is_an_error() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(extract_message_content(body).is_err());
    }

    #[test]
    fn error_body_is_summarized() {
        let body = r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(
            extract_openai_error(body).as_deref(),
            Some("Incorrect API key, type: invalid_request_error, code: invalid_api_key")
        );
        assert_eq!(extract_openai_error("not json"), None);
    }

    #[test]
    fn builder_ignores_blank_values() {
        let translator = OpenAiTranslator::new("key")
            .with_model(" ")
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(translator.model, DEFAULT_MODEL);
        assert_eq!(translator.base_url, "http://localhost:8080/v1");
    }

    #[tokio::test]
    async fn blank_input_skips_request() {
        let translator = OpenAiTranslator::new("key").with_base_url("http://127.0.0.1:9");
        assert_eq!(translator.translate("  ").await.expect("translate"), "");
    }
}
