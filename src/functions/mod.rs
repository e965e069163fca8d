//! Edge functions
//!
//! Stateless POST handlers. Each one verifies the bearer token, proxies the
//! request to one provider, records a usage row and returns JSON. Request
//! bodies are closed tagged unions so an unknown `task`/`action` is a 400.

pub mod ai_chat;
pub mod auth;
pub mod credits;
pub mod error;
pub mod generate_image;
pub mod orchestrator;
pub mod router;
pub mod social_trends;
pub mod text_to_speech;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::backend::{AuthService, Database, UsageRecord};
use crate::providers::{
    ChatProvider, GatewayClient, ImageClient, ImageProvider, SpeechClient, SpeechProvider,
    TrendsClient, TrendsProvider,
};
use crate::types::config::ServerConfig;

pub use error::{ErrorBody, ErrorCode, FunctionError, FunctionResult};
pub use router::build_router;

/// Per-deployment knobs the handlers read
#[derive(Debug, Clone)]
pub struct FunctionSettings {
    pub image_credit_cost: i64,
    pub orchestrator_max_agents: usize,
}

impl Default for FunctionSettings {
    fn default() -> Self {
        Self {
            image_credit_cost: 1,
            orchestrator_max_agents: 5,
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct FunctionContext {
    pub auth: Arc<dyn AuthService>,
    pub db: Arc<dyn Database>,
    pub chat: Arc<dyn ChatProvider>,
    pub images: Arc<dyn ImageProvider>,
    pub speech: Arc<dyn SpeechProvider>,
    pub trends: Arc<dyn TrendsProvider>,
    pub settings: FunctionSettings,
}

impl FunctionContext {
    /// Wire the HTTP providers from config against the given backend
    pub fn from_config(
        config: &ServerConfig,
        auth: Arc<dyn AuthService>,
        db: Arc<dyn Database>,
    ) -> Self {
        Self {
            auth,
            db,
            chat: Arc::new(GatewayClient::new(config.gateway.clone())),
            images: Arc::new(ImageClient::new(config.image.clone())),
            speech: Arc::new(SpeechClient::new(config.speech.clone())),
            trends: Arc::new(TrendsClient::new(config.trends.clone())),
            settings: FunctionSettings {
                image_credit_cost: config.image_credit_cost,
                orchestrator_max_agents: config.orchestrator_max_agents,
            },
        }
    }
}

/// Unwrap a JSON body, turning rejections (including unknown tags) into a 400
pub(crate) fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> FunctionResult<T> {
    let Json(value) = body?;
    Ok(value)
}

/// Insert the analytics row for a successful call.
///
/// The provider result is already in hand at this point, so a failed insert
/// is logged and dropped.
pub(crate) async fn record_usage(ctx: &FunctionContext, record: UsageRecord) {
    let function = record.function_name.clone();
    let action = record.action.clone();
    if let Err(e) = ctx.db.insert_usage(record).await {
        tracing::warn!(function = %function, action = %action, "Failed to record usage: {}", e);
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> FunctionResult<()> {
    if value.trim().is_empty() {
        return Err(FunctionError::BadRequest(format!("'{}' must not be empty", field)));
    }
    Ok(())
}
