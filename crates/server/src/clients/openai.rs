//! OpenAI-compatible client for chat completions, speech synthesis and
//! transcription. Anything speaking the same wire format works.

use std::time::Duration;

use async_trait::async_trait;
use chess_core::coaching::ChatMessage;
use reqwest::{header, multipart, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("OpenAI API key not configured")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by the language model API")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Model returned an empty completion")]
    EmptyCompletion,
}

/// One chat completion call.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask for `response_format: {"type": "json_object"}`.
    pub json: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, ..Default::default() }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// The language-model operations the service depends on.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;

    async fn speech(&self, text: &str) -> Result<Vec<u8>, LlmError>;

    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, LlmError>;

    /// Cheap round trip used by `/health`.
    async fn ping(&self) -> bool;
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    tts_model: String,
    tts_voice: String,
    stt_model: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let client = Client::builder()
            .user_agent("PgnCoach/1.0")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if config.openai_api_key.is_none() {
            tracing::error!("OpenAI API key not found in environment variables!");
        }

        Ok(Self {
            client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            chat_model: config.chat_model.clone(),
            tts_model: config.tts_model.clone(),
            tts_voice: config.tts_voice.clone(),
            stt_model: config.stt_model.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<String, LlmError> {
        self.api_key
            .as_ref()
            .map(|k| format!("Bearer {k}"))
            .ok_or(LlmError::MissingApiKey)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, LlmError> {
        let resp = request
            .header(header::AUTHORIZATION, self.bearer()?)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }
        Ok(resp)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        let body = ChatBody {
            model: &self.chat_model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json.then(|| json!({ "type": "json_object" })),
        };

        let resp = self
            .send(self.client.post(self.url("/chat/completions")).json(&body))
            .await?;

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }

    async fn speech(&self, text: &str) -> Result<Vec<u8>, LlmError> {
        let body = json!({
            "model": self.tts_model,
            "voice": self.tts_voice,
            "input": text,
        });

        let resp = self
            .send(self.client.post(self.url("/audio/speech")).json(&body))
            .await?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, LlmError> {
        let file = multipart::Part::bytes(audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let form = multipart::Form::new()
            .text("model", self.stt_model.clone())
            .part("file", file);

        let resp = self
            .send(self.client.post(self.url("/audio/transcriptions")).multipart(form))
            .await?;

        let parsed: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(parsed.text)
    }

    async fn ping(&self) -> bool {
        let request = ChatRequest::new(vec![
            ChatMessage::system("You are a chess analyzer."),
            ChatMessage::user("Say 'OK' if you can hear me."),
        ])
        .max_tokens(5);

        match self.chat(request).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("OpenAI connection test failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, key: Option<&str>) -> OpenAiClient {
        let config = Config {
            openai_api_key: key.map(str::to_string),
            openai_base_url: server.uri(),
            ..Config::default()
        };
        OpenAiClient::new(&config).unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    #[tokio::test]
    async fn test_chat_sends_model_and_json_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4-turbo-preview",
                "response_format": { "type": "json_object" },
                "messages": [{ "role": "user", "content": "hi" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  {\"ok\": true}\n")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sk-test"));
        let reply = client
            .chat(ChatRequest::new(vec![ChatMessage::user("hi")]).json())
            .await
            .unwrap();
        assert_eq!(reply, "{\"ok\": true}");
    }

    #[tokio::test]
    async fn test_chat_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sk-test"));
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);

        assert!(matches!(client.chat(request.clone()).await, Err(LlmError::RateLimited)));
        match client.chat(request).await {
            Err(LlmError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream down");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_key_never_sends() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("OK")))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(matches!(
            client.chat(ChatRequest::default()).await,
            Err(LlmError::MissingApiKey)
        ));
        assert!(!client.ping().await);
    }

    #[tokio::test]
    async fn test_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        assert!(matches!(
            client.chat(ChatRequest::default()).await,
            Err(LlmError::EmptyCompletion)
        ));
    }

    #[tokio::test]
    async fn test_speech_and_transcription() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(json!({ "model": "tts-1", "voice": "alloy", "input": "Nice move" })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x49, 0x44, 0x33]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "why did I lose?" })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        assert_eq!(client.speech("Nice move").await.unwrap(), vec![0x49, 0x44, 0x33]);
        assert_eq!(client.transcribe(vec![1, 2, 3]).await.unwrap(), "why did I lose?");
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({ "max_tokens": 5 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("OK")))
            .mount(&server)
            .await;

        assert!(client_for(&server, Some("k")).ping().await);
    }
}
