//! Game analysis: sends the flattened move list to the model and validates
//! the JSON summary / key moments it returns.

use chess_core::coaching::ChatMessage;
use chess_core::pgn::{extract_moves_from_pgn, PgnError};
use chess_core::{flatten_moves, GameRecord, KeyMoment, MoveRecord};
use serde::Deserialize;

use crate::clients::openai::{ChatRequest, LanguageModel, LlmError};

const ANALYST_SYSTEM_PROMPT: &str =
    "You are a chess grandmaster. You must respond with valid JSON only, no other text or formatting.";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Pgn(#[from] PgnError),

    #[error("Analysis failed: {0}")]
    Model(#[from] LlmError),

    #[error("Invalid response format: {0}")]
    Format(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisOutcome {
    pub summary: String,
    pub key_moments: Vec<KeyMoment>,
}

fn analysis_prompt(moves_text: &str) -> String {
    format!(
        r#"You are a chess analysis engine. Analyze the following chess game and provide your analysis in JSON format.
IMPORTANT: Respond with ONLY valid JSON - no markdown, no code blocks, no additional text.

Required JSON structure:
{{
    "summary": "Brief overall game summary",
    "key_moments": [
        {{
            "move_number": number,
            "move": "move in algebraic notation",
            "analysis": "Analysis of the move",
            "evaluation": "Evaluation symbol (e.g., +=, =, -/+)"
        }}
    ]
}}

Game moves to analyze:
{moves_text}

Remember: Return ONLY the JSON object, nothing else."#
    )
}

pub async fn analyze_game(
    llm: &dyn LanguageModel,
    moves: &[MoveRecord],
) -> Result<AnalysisOutcome, AnalysisError> {
    let moves_text = flatten_moves(moves);
    tracing::info!(pairs = moves.len(), "Sending game to the language model");

    let request = ChatRequest::new(vec![
        ChatMessage::system(ANALYST_SYSTEM_PROMPT),
        ChatMessage::user(analysis_prompt(&moves_text)),
    ])
    .temperature(0.7)
    .max_tokens(2000)
    .json();

    let content = llm.chat(request).await?;
    let outcome = parse_analysis(&content)?;
    tracing::info!(key_moments = outcome.key_moments.len(), "Parsed game analysis");
    Ok(outcome)
}

/// Parse `pgn`, ask the model about it and assemble the full record.
pub async fn analyze_pgn(llm: &dyn LanguageModel, pgn: &str) -> Result<GameRecord, AnalysisError> {
    let parsed = extract_moves_from_pgn(pgn)?;
    let outcome = analyze_game(llm, &parsed.moves).await?;

    Ok(GameRecord {
        moves: parsed.moves,
        summary: outcome.summary,
        key_moments: outcome.key_moments,
        metadata: parsed.metadata,
    })
}

/// Strip a ```json fence if the model added one anyway.
pub fn unfence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub fn parse_analysis(content: &str) -> Result<AnalysisOutcome, AnalysisError> {
    let value: serde_json::Value = serde_json::from_str(unfence(content)).map_err(|e| {
        tracing::error!("Failed to parse model response as JSON: {e}");
        let preview: String = content.chars().take(100).collect();
        AnalysisError::Format(format!("Failed to parse GPT response as JSON. Response: {preview}..."))
    })?;

    let Some(object) = value.as_object() else {
        return Err(AnalysisError::Format("Response is not a dictionary".into()));
    };
    if !object.contains_key("summary") || !object.contains_key("key_moments") {
        return Err(AnalysisError::Format("Missing required fields in response".into()));
    }

    serde_json::from_value(value).map_err(|e| AnalysisError::Format(e.to_string()))
}
