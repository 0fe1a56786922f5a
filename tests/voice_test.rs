//! Integration tests for POST /analyze-with-voice.

mod common;

use std::sync::Arc;

use chess_core::coaching::{AnalysisWithVoice, ChatMessage};
use chess_core::session::ReviewSession;
use common::{ScriptedModel, SCHOLARS_MATE, SCHOLARS_MATE_ANALYSIS};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

async fn post_form(base: &str, form: Form) -> reqwest::Response {
    common::client()
        .post(format!("{base}/analyze-with-voice"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send voice request")
}

#[tokio::test]
async fn test_analysis_without_audio() {
    let model = Arc::new(ScriptedModel::new().reply(SCHOLARS_MATE_ANALYSIS));
    let base = common::spawn_app(model.clone()).await;

    let resp = post_form(&base, Form::new().text("pgn", SCHOLARS_MATE)).await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["game_analysis"]["white_player"], "Alice");
    assert_eq!(body["game_analysis"]["moves"].as_array().unwrap().len(), 4);
    assert!(body["coaching"].is_null());
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn test_voice_coaching_round_trip() {
    let structured = json!({
        "text_response": "Defend f7 with Qe7.",
        "suggestions": ["Qe7"],
        "evaluation": "+-"
    });
    let model = ScriptedModel::new()
        .speech(vec![1, 2, 3])
        .transcript("What went wrong?")
        .reply(SCHOLARS_MATE_ANALYSIS)
    .reply("### Analysis\nYou missed the threat.")
    .reply(&structured.to_string());
    let model = Arc::new(model);
    let base = common::spawn_app(model.clone()).await;

    let history = json!([{ "role": "assistant", "content": "Earlier advice" }]).to_string();
    let form = Form::new()
        .text("pgn", SCHOLARS_MATE)
        .part("audio_file", Part::bytes(vec![0u8; 64]).file_name("question.webm"))
        .text("conversation_history", history);

    let resp = post_form(&base, form).await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let coaching = &body["coaching"];
    assert_eq!(coaching["audio_response"], "AQID");
    assert_eq!(coaching["text_response"], "Defend f7 with Qe7.");
    assert_eq!(coaching["suggestions"], json!(["Qe7"]));
    assert!(coaching["next_steps"].is_null());
    assert_eq!(coaching["evaluation"], "+-");
    assert_eq!(coaching["transcript"], "What went wrong?");

    let requests = model.requests();
    assert_eq!(requests.len(), 3);
    let voice = &requests[1].messages;
    assert!(voice[1].content.starts_with("Game Summary: White exploited the weak f7 square."));
    assert!(voice[1].content.ends_with("Player Question/Comment: What went wrong?"));
    assert_eq!(voice[2].content, "Earlier advice");
}

#[tokio::test]
async fn test_voice_ignores_bad_history_and_uses_fallback() {
    let model = ScriptedModel::new()
        .speech(vec![0xff])
        .transcript("Help")
        .reply(SCHOLARS_MATE_ANALYSIS)
    .reply("Keep your king safe.")
    .reply("{\"suggestions\": []}");
    let base = common::spawn_app(Arc::new(model)).await;

    let form = Form::new()
        .text("pgn", SCHOLARS_MATE)
        .part("audio_file", Part::bytes(vec![7u8; 8]).file_name("q.wav"))
        .text("conversation_history", "{broken");

    let resp = post_form(&base, form).await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let coaching = &body["coaching"];
    assert_eq!(coaching["text_response"], "Keep your king safe.");
    assert_eq!(coaching["suggestions"], json!(["Please review the advice above"]));
    assert_eq!(coaching["evaluation"], "Unable to structure the response");
    assert_eq!(coaching["audio_response"], "/w==");
}

#[tokio::test]
async fn test_voice_rejects_bad_pgn() {
    let base = common::spawn_app(Arc::new(ScriptedModel::new())).await;

    let resp = post_form(&base, Form::new().text("pgn", "")).await;
    assert_eq!(resp.status(), 400);

    let resp = post_form(&base, Form::new().text("conversation_history", "[]")).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Missing form field: pgn");
}

#[tokio::test]
async fn test_voice_reply_lands_in_review_session() {
    let model = ScriptedModel::new()
        .speech(vec![5])
        .transcript("Should I have castled?")
        .reply(SCHOLARS_MATE_ANALYSIS)
        .reply("Yes, castle early.")
        .reply(r#"{"text_response": "Castle early.", "suggestions": ["O-O"]}"#);
    let base = common::spawn_app(Arc::new(model)).await;

    let mut session = ReviewSession::new();
    let request = session
        .coaching_mut()
        .prepare_voice_submission(SCHOLARS_MATE, vec![3u8; 16], "audio/ogg")
        .unwrap();

    let form = Form::new()
        .text("pgn", request.pgn.clone())
        .part("audio_file", Part::bytes(request.audio.clone()).file_name(request.file_name()))
        .text("conversation_history", request.conversation_history.clone());
    let resp = post_form(&base, form).await;
    assert_eq!(resp.status(), 200);

    let reply: AnalysisWithVoice = resp.json().await.unwrap();
    session.voice_replied(Ok(reply));

    let messages = session.coaching().messages();
    assert_eq!(messages[0], ChatMessage::user("Should I have castled?"));
    assert_eq!(messages[1], ChatMessage::assistant("Castle early."));
    assert_eq!(messages[2].content, "Suggestions:\n- O-O");
    assert!(!session.coaching().is_busy());
}
