use axum::{Extension, Json};
use chess_core::coaching::{CoachRequest, CoachingReply};

use crate::error::AppError;
use crate::services::coach;
use crate::SharedModel;

/// POST /coach
/// Free-text coaching, reshaped into response / suggestions / next steps.
pub async fn chess_coaching(
    Extension(llm): Extension<SharedModel>,
    Json(request): Json<CoachRequest>,
) -> Result<Json<CoachingReply>, AppError> {
    tracing::info!(
        history = request.conversation_history.len(),
        has_game = request.game_context.is_some(),
        "Starting chess coaching interaction"
    );

    let messages = coach::coach_messages(&request);
    let advice = coach::coaching_reply(llm.as_ref(), messages).await?;

    let reply = match coach::try_structure(llm.as_ref(), &advice).await {
        Ok(structured) => {
            tracing::info!("Successfully structured coaching response");
            structured.into_reply()
        }
        Err(e) => {
            tracing::warn!("Falling back to unstructured coaching reply: {e}");
            coach::coach_fallback(advice)
        }
    };

    Ok(Json(reply))
}
