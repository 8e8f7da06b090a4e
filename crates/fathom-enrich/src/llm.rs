use std::time::Duration;

use async_trait::async_trait;
use fathom_core::{FathomError, LlmConfig};
use serde::{Deserialize, Serialize};

/// Remote text-generation collaborator: submit a prompt, receive raw text.
///
/// The returned text is untrusted and is expected to need repair before it
/// parses; see [`crate::sanitize`].
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, FathomError>;
}

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use fathom_enrich::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Describe this function".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Role in the chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// HTTP text-generation client.
///
/// Speaks the OpenAI-compatible `/v1/chat/completions` protocol by default
/// (OpenAI, Ollama, vLLM, LiteLLM, ...), and the Gemini `generateContent`
/// protocol when `provider = "gemini"`.
///
/// # Examples
///
/// ```
/// use fathom_core::LlmConfig;
/// use fathom_enrich::llm::LlmClient;
///
/// let config = LlmConfig {
///     provider: "gemini".into(),
///     model: "gemini-1.5-flash".into(),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// assert_eq!(client.model(), "gemini-1.5-flash");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, FathomError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| FathomError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a chat completion request and return the text response.
    ///
    /// Builds a request to `{base_url}/v1/chat/completions` with the given
    /// messages, temperature 0.1, and JSON response format.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Llm`] on HTTP errors or response parsing failures.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, FathomError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com");
        let url = format!("{base_url}/v1/chat/completions");

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0.1,
            "response_format": { "type": "json_object" },
        });

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response_body = self.send(request.json(&body)).await?;
        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                FathomError::Llm(format!("unexpected response structure: {response_body}"))
            })?;

        Ok(content.to_string())
    }

    /// Send a single-turn `generateContent` request to Gemini.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Llm`] when no API key is configured, on HTTP
    /// errors, or when the response carries no text candidate.
    pub async fn gemini(&self, prompt: &str) -> Result<String, FathomError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            FathomError::Llm("Gemini requires an API key (set GEMINI_API_KEY)".into())
        })?;
        let base_url = self.config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
        let url = format!(
            "{base_url}/v1beta/models/{}:generateContent",
            self.config.model
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.1,
                "responseMimeType": "application/json",
            },
        });

        let request = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body);
        let response_body = self.send(request).await?;

        let text = response_body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                FathomError::Llm(format!("unexpected response structure: {response_body}"))
            })?;

        Ok(text.to_string())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value, FathomError> {
        let response = request
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| FathomError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(FathomError::Llm(format!("LLM API error {status}: {body_text}")));
        }

        response
            .json()
            .await
            .map_err(|e| FathomError::Llm(format!("failed to parse response: {e}")))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, FathomError> {
        tracing::debug!(provider = %self.config.provider, model = %self.config.model, "sending prompt");
        if self.config.provider == "gemini" {
            let combined = format!("{}\n\n{prompt}", crate::prompt::SYSTEM_PROMPT);
            return self.gemini(&combined).await;
        }
        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: crate::prompt::SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: prompt.to_string(),
            },
        ];
        self.chat(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_succeeds() {
        assert!(LlmClient::new(&LlmConfig::default()).is_ok());
    }

    #[test]
    fn model_returns_config_model() {
        let config = LlmConfig {
            model: "gpt-4o-mini".into(),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage {
            role: Role::System,
            content: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hello");
    }

    #[tokio::test]
    async fn gemini_without_key_fails_before_sending() {
        let config = LlmConfig {
            provider: "gemini".into(),
            api_key: None,
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, FathomError::Llm(msg) if msg.contains("GEMINI_API_KEY")));
    }
}
