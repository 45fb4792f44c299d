use super::traits::{ChatMessage, Provider, ProviderError};
use crate::config::AiConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Any backend speaking the OpenAI `chat/completions` protocol.
pub struct OpenAiCompatibleProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    system_prompt: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn from_config(cfg: &AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("failed to initialize AI HTTP client")?;

        let base_url = cfg
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_OPENAI_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            api_key: non_blank(cfg.api_key.as_deref()),
            model: cfg.model.trim().to_string(),
            system_prompt: non_blank(cfg.system_prompt.as_deref()),
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn api_error_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
            })
            .unwrap_or_else(|| body.trim().to_string())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        if self.model.is_empty() {
            return Err(ProviderError::NotConfigured("ai.model"));
        }

        let system = self.system_prompt.as_deref().map(ChatMessage::system);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: system.iter().chain(messages.iter()).collect(),
        };

        let mut builder = self.client.post(self.completions_url()).json(&request);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: Self::api_error_message(&body),
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> AiConfig {
        AiConfig {
            base_url: Some(format!("{}/v1/", server.uri())),
            api_key: Some("sk-test".into()),
            model: "test-model".into(),
            timeout_secs: 5,
            system_prompt: None,
        }
    }

    #[test]
    fn base_url_defaults_to_openai_and_drops_trailing_slash() {
        let mut cfg = AiConfig::default();
        cfg.base_url = Some("   ".into());
        let provider = OpenAiCompatibleProvider::from_config(&cfg).unwrap();
        assert_eq!(
            provider.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );

        cfg.base_url = Some("https://llm.example.com/v1/".into());
        let provider = OpenAiCompatibleProvider::from_config(&cfg).unwrap();
        assert_eq!(
            provider.completions_url(),
            "https://llm.example.com/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn chat_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "test-model",
                "messages": [{"role": "user", "content": "你好"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "你好！"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiCompatibleProvider::from_config(&config_for(&server)).unwrap();
        let reply = provider.chat(&[ChatMessage::user("你好")]).await.unwrap();
        assert_eq!(reply, "你好！");
    }

    #[tokio::test]
    async fn system_prompt_is_prepended_to_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_json(serde_json::json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "again"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config_for(&server);
        cfg.system_prompt = Some("be brief".into());
        let provider = OpenAiCompatibleProvider::from_config(&cfg).unwrap();
        let history = [
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("again"),
        ];
        assert_eq!(provider.chat(&history).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatibleProvider::from_config(&config_for(&server)).unwrap();
        let err = provider.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        match err {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let provider = OpenAiCompatibleProvider::from_config(&config_for(&server)).unwrap();
        let err = provider.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn missing_model_fails_before_any_request() {
        let server = MockServer::start().await;
        let mut cfg = config_for(&server);
        cfg.model = "  ".into();
        let provider = OpenAiCompatibleProvider::from_config(&cfg).unwrap();
        let err = provider.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured("ai.model")));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
