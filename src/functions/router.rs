//! HTTP routing for the edge functions

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::functions::{
    ai_chat, credits, generate_image, orchestrator, social_trends, text_to_speech, FunctionContext,
};

/// Prefix every function is mounted under
pub const FUNCTIONS_PREFIX: &str = "/functions/v1";

pub fn build_router(ctx: FunctionContext, cors_origins: &[String]) -> Router {
    let functions = Router::new()
        .route(&format!("/{}", ai_chat::FUNCTION_NAME), post(ai_chat::handle))
        .route(&format!("/{}", generate_image::FUNCTION_NAME), post(generate_image::handle))
        .route(&format!("/{}", text_to_speech::FUNCTION_NAME), post(text_to_speech::handle))
        .route(&format!("/{}", social_trends::FUNCTION_NAME), post(social_trends::handle))
        .route(&format!("/{}", orchestrator::FUNCTION_NAME), post(orchestrator::handle))
        .route(&format!("/{}", credits::FUNCTION_NAME), post(credits::handle));

    Router::new()
        .route("/health", get(health))
        .nest(FUNCTIONS_PREFIX, functions)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(ctx)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `*` allows any origin; otherwise only the parseable entries are allowed
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if parsed.len() < origins.len() {
        tracing::warn!("Ignoring {} unparseable CORS origin(s)", origins.len() - parsed.len());
    }
    cors.allow_origin(parsed)
}
