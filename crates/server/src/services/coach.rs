//! Coaching replies: free-text advice from the model, then a second pass that
//! reshapes it into response / suggestions / next steps.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chess_core::coaching::{ChatMessage, CoachRequest, CoachingReply, Role};
use chess_core::GameRecord;
use serde::Serialize;
use serde_json::Value;

use crate::clients::openai::{ChatRequest, LanguageModel, LlmError};
use crate::services::analyst::unfence;

pub const COACH_SYSTEM_PROMPT: &str = "You are an experienced chess coach and grandmaster.
Provide clear, constructive advice and explain concepts in an easy-to-understand way.
Format your responses using markdown:

1. Use '### Analysis' for position or question analysis
2. Use '### Key Points' for main takeaways
3. Use '### Strategy' for long-term plans
4. Use '### Tactics' for immediate opportunities
5. Use '### Suggestions' for concrete moves or ideas
6. Use '### Evaluation' for position assessment

Use numbered lists (1., 2., etc.) for sequential points
Use **bold** for emphasis on important terms
Keep paragraphs focused and well-structured";

const FORMATTER_SYSTEM_PROMPT: &str = "You are a JSON formatter. Format the chess coaching advice into a valid JSON object with the exact structure specified. Ensure all strings are properly escaped.";

const STRUCTURE_PROMPT: &str = r#"Convert the following coaching advice into a JSON object with this exact structure:
{
    "text_response": "Main coaching response with markdown formatting",
    "suggestions": ["Suggestion 1", "Suggestion 2", "Suggestion 3"],
    "next_steps": ["Action 1", "Action 2"],
    "evaluation": "Brief evaluation"
}

Original coaching content:
"#;

#[derive(Debug, thiserror::Error)]
pub enum StructureError {
    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("Structured reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredCoaching {
    pub text_response: String,
    pub suggestions: Vec<String>,
    pub next_steps: Option<Vec<String>>,
    pub evaluation: Option<String>,
}

impl StructuredCoaching {
    /// Raw advice with canned follow-ups, used when reshaping fails.
    pub fn fallback(text: &str) -> Self {
        Self {
            text_response: text.to_string(),
            suggestions: vec!["Please review the advice above".to_string()],
            next_steps: Some(vec!["Consider the main points mentioned".to_string()]),
            evaluation: Some("Unable to structure the response".to_string()),
        }
    }

    pub fn into_reply(self) -> CoachingReply {
        CoachingReply {
            response: self.text_response,
            suggestions: self.suggestions,
            next_steps: self.next_steps,
            evaluation: self.evaluation,
        }
    }
}

/// `/coach` reply when the structuring pass fails.
pub fn coach_fallback(text: String) -> CoachingReply {
    CoachingReply {
        response: text,
        suggestions: vec!["Focus on the key points mentioned above".to_string()],
        next_steps: Some(vec!["Review the advice and apply it in your next game".to_string()]),
        evaluation: Some("Please see the main response for evaluation".to_string()),
    }
}

/// Messages for a text coaching turn: history, optional game, then the question.
pub fn coach_messages(request: &CoachRequest) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(COACH_SYSTEM_PROMPT)];
    messages.extend(request.conversation_history.iter().cloned());
    if let Some(context) = request.game_context.as_deref().filter(|c| !c.trim().is_empty()) {
        messages.push(ChatMessage::user(format!(
            "Here's the game we're discussing:\n{context}"
        )));
    }
    messages.push(ChatMessage::user(request.message.clone()));
    messages
}

/// Messages for a voice coaching turn, grounded in the fresh analysis.
pub fn voice_messages(
    game: &GameRecord,
    question: &str,
    history: Vec<ChatMessage>,
) -> Vec<ChatMessage> {
    let key_moments = serde_json::to_string_pretty(&game.key_moments).unwrap_or_default();
    let mut messages = vec![
        ChatMessage::system(COACH_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Game Summary: {}\n\nKey Moments:\n{}\n\nPlayer Question/Comment: {}",
            game.summary, key_moments, question
        )),
    ];
    messages.extend(history);
    messages
}

/// Free-text coaching advice. The leading system message is always the
/// formatting prompt.
pub async fn coaching_reply(
    llm: &dyn LanguageModel,
    mut messages: Vec<ChatMessage>,
) -> Result<String, LlmError> {
    match messages.first_mut() {
        Some(first) if first.role == Role::System => first.content = COACH_SYSTEM_PROMPT.to_string(),
        _ => messages.insert(0, ChatMessage::system(COACH_SYSTEM_PROMPT)),
    }

    let request = ChatRequest::new(messages).temperature(0.7).max_tokens(1000);
    llm.chat(request).await
}

pub async fn try_structure(
    llm: &dyn LanguageModel,
    text: &str,
) -> Result<StructuredCoaching, StructureError> {
    let request = ChatRequest::new(vec![
        ChatMessage::system(FORMATTER_SYSTEM_PROMPT),
        ChatMessage::user(format!("{STRUCTURE_PROMPT}{text}")),
    ])
    .temperature(0.3)
    .max_tokens(1000)
    .json();

    let content = llm.chat(request).await?;
    parse_structured(&content)
}

/// Never fails: any problem yields `StructuredCoaching::fallback`.
pub async fn structure_reply(llm: &dyn LanguageModel, text: &str) -> StructuredCoaching {
    match try_structure(llm, text).await {
        Ok(structured) => structured,
        Err(e) => {
            tracing::error!("Error structuring coaching response: {e}");
            StructuredCoaching::fallback(text)
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_text).collect(),
        Value::Null => Vec::new(),
        other => vec![value_text(other)],
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn parse_structured(content: &str) -> Result<StructuredCoaching, StructureError> {
    let value: Value = serde_json::from_str(unfence(content))?;

    let text_response = value
        .get("text_response")
        .map(value_text)
        .ok_or(StructureError::MissingField("text_response"))?;
    let suggestions = value
        .get("suggestions")
        .map(string_list)
        .ok_or(StructureError::MissingField("suggestions"))?;
    let next_steps = value.get("next_steps").filter(|v| !v.is_null()).map(string_list);
    let evaluation = value.get("evaluation").filter(|v| !v.is_null()).map(value_text);

    Ok(StructuredCoaching { text_response, suggestions, next_steps, evaluation })
}

/// Spoken form of `text`, base64-encoded for JSON transport.
pub async fn text_to_speech(llm: &dyn LanguageModel, text: &str) -> Result<String, LlmError> {
    let audio = llm.speech(text).await?;
    Ok(STANDARD.encode(audio))
}
