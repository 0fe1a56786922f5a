use axum::{Extension, Json};
use serde::Serialize;

use crate::SharedModel;

#[derive(Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub openai_connection: bool,
    pub message: &'static str,
}

/// GET /health
/// Checks the language model with a tiny completion. Never fails.
pub async fn health_check(Extension(llm): Extension<SharedModel>) -> Json<HealthCheck> {
    let connected = llm.ping().await;
    if !connected {
        tracing::warn!("Health check: language model unreachable");
    }

    Json(HealthCheck {
        status: if connected { "healthy" } else { "unhealthy" },
        openai_connection: connected,
        message: if connected {
            "Service is healthy and OpenAI connection is working"
        } else {
            "OpenAI connection failed"
        },
    })
}
