pub mod clients;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::clients::openai::LanguageModel;
use crate::config::Config;

/// Language model shared by every handler.
pub type SharedModel = Arc<dyn LanguageModel>;

fn api_routes() -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/analyze", post(routes::analyze::analyze_game))
        .route("/coach", post(routes::coach::chess_coaching))
        .route("/analyze-with-voice", post(routes::voice::analyze_with_voice))
}

/// Full application router. Endpoints answer both at the root and under `/api`.
pub fn app(config: &Config, llm: SharedModel) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(Extension(llm))
        .layer(CompressionLayer::new())
        .layer(cors)
}
