use axum::extract::Multipart;
use axum::{Extension, Json};
use chess_core::coaching::{AnalysisWithVoice, ChatMessage, VoiceCoaching};

use crate::error::AppError;
use crate::services::{analyst, coach};
use crate::SharedModel;

#[derive(Default)]
struct VoiceForm {
    pgn: Option<String>,
    audio: Option<Vec<u8>>,
    conversation_history: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<VoiceForm, AppError> {
    let mut form = VoiceForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "pgn" => {
                form.pgn = Some(field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?);
            }
            "audio_file" => {
                let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
                form.audio = (!bytes.is_empty()).then(|| bytes.to_vec());
            }
            "conversation_history" => {
                form.conversation_history =
                    Some(field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?);
            }
            other => tracing::debug!("Ignoring unexpected form field {other:?}"),
        }
    }

    Ok(form)
}

/// Prior turns sent as a JSON string. Anything unparseable is dropped.
fn parse_history(raw: Option<&str>) -> Vec<ChatMessage> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str(raw) {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!("Invalid conversation history format: {e}");
            Vec::new()
        }
    }
}

/// POST /analyze-with-voice
/// Analyze the game, then optionally answer a spoken question about it with
/// both text and synthesized audio.
pub async fn analyze_with_voice(
    Extension(llm): Extension<SharedModel>,
    multipart: Multipart,
) -> Result<Json<AnalysisWithVoice>, AppError> {
    tracing::info!("Starting combined analysis and coaching");

    let form = read_form(multipart).await?;
    let pgn = form
        .pgn
        .ok_or_else(|| AppError::BadRequest("Missing form field: pgn".to_string()))?;

    let game = analyst::analyze_pgn(llm.as_ref(), &pgn).await?;

    let Some(audio) = form.audio else {
        return Ok(Json(AnalysisWithVoice { game_analysis: game, coaching: None }));
    };

    let question = llm.transcribe(audio).await?;
    tracing::info!("Transcribed text: {question}");

    let history = parse_history(form.conversation_history.as_deref());
    let messages = coach::voice_messages(&game, &question, history);
    let advice = coach::coaching_reply(llm.as_ref(), messages).await?;

    let structured = coach::structure_reply(llm.as_ref(), &advice).await;
    let audio_response = coach::text_to_speech(llm.as_ref(), &structured.text_response).await?;

    Ok(Json(AnalysisWithVoice {
        game_analysis: game,
        coaching: Some(VoiceCoaching {
            audio_response,
            text_response: structured.text_response,
            suggestions: structured.suggestions,
            next_steps: structured.next_steps,
            evaluation: structured.evaluation,
            transcript: Some(question),
        }),
    }))
}
