#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use server::clients::openai::{ChatRequest, LanguageModel, LlmError};
use server::config::Config;

pub const SCHOLARS_MATE: &str = r#"[Event "Casual Game"]
[White "Alice"]
[Black "Bob"]
[Result "1-0"]
[Date "2024.01.15"]
[Opening "Scholar's Mate"]

1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 4. Qxf7# 1-0"#;

pub const SCHOLARS_MATE_ANALYSIS: &str = r#"{
    "summary": "White exploited the weak f7 square.",
    "key_moments": [
        {"move_number": 3, "move": "Nf6", "analysis": "Black ignores the threat on f7.", "evaluation": "+-"},
        {"move_number": 4, "move": "Qxf7#", "analysis": "Checkmate.", "evaluation": "+-"}
    ]
}"#;

/// Language model that replays canned chat replies in order and records
/// every request it sees. A `None` reply fails with an upstream error.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Option<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    reachable: bool,
    speech: Vec<u8>,
    transcript: String,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self { reachable: true, ..Default::default() }
    }

    pub fn reply(self, content: &str) -> Self {
        self.replies.lock().unwrap().push_back(Some(content.to_string()));
        self
    }

    pub fn fail(self) -> Self {
        self.replies.lock().unwrap().push_back(None);
        self
    }

    /// Health checks fail.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Audio returned for every speech request.
    pub fn speech(mut self, audio: Vec<u8>) -> Self {
        self.speech = audio;
        self
    }

    /// Text returned for every transcription.
    pub fn transcript(mut self, text: &str) -> Self {
        self.transcript = text.to_string();
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Some(content)) => Ok(content),
            _ => Err(LlmError::Status { status: 503, body: "scripted failure".to_string() }),
        }
    }

    async fn speech(&self, _text: &str) -> Result<Vec<u8>, LlmError> {
        Ok(self.speech.clone())
    }

    async fn transcribe(&self, _audio: Vec<u8>) -> Result<String, LlmError> {
        Ok(self.transcript.clone())
    }

    async fn ping(&self) -> bool {
        self.reachable
    }
}

/// Serve the app on an ephemeral port and return its base URL.
pub async fn spawn_app(model: Arc<ScriptedModel>) -> String {
    let app = server::app(&Config::default(), model);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server crashed");
    });

    format!("http://{addr}")
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}
