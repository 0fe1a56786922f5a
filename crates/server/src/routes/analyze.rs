use axum::{Extension, Json};
use chess_core::GameRecord;
use serde::Deserialize;

use crate::error::AppError;
use crate::services::analyst;
use crate::SharedModel;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub pgn: String,
}

/// POST /analyze
/// Parse a PGN game and return the move list with the model's summary and key moments.
pub async fn analyze_game(
    Extension(llm): Extension<SharedModel>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<GameRecord>, AppError> {
    tracing::info!("Starting game analysis");

    let game = analyst::analyze_pgn(llm.as_ref(), &body.pgn).await?;

    tracing::info!(
        moves = game.moves.len(),
        key_moments = game.key_moments.len(),
        "Analysis completed successfully"
    );
    Ok(Json(game))
}
