//! `text-to-speech`

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::UsageRecord;
use crate::functions::auth::authenticate;
use crate::functions::{parse_body, record_usage, require_text, FunctionContext, FunctionError, FunctionResult};
use crate::providers::speech::MAX_TEXT_CHARS;
use crate::providers::SpeechAudio;

pub const FUNCTION_NAME: &str = "text-to-speech";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SpeechAction {
    Synthesize {
        text: String,
        #[serde(default)]
        voice: Option<String>,
    },
}

pub async fn handle(
    State(ctx): State<FunctionContext>,
    headers: HeaderMap,
    body: Result<Json<SpeechAction>, JsonRejection>,
) -> FunctionResult<Json<SpeechAudio>> {
    let user = authenticate(&ctx, &headers).await?;
    let SpeechAction::Synthesize { text, voice } = parse_body(body)?;

    require_text("text", &text)?;
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(FunctionError::BadRequest(format!(
            "'text' is {} characters; the limit is {}",
            chars, MAX_TEXT_CHARS
        )));
    }

    tracing::info!(function = FUNCTION_NAME, action = "synthesize", user_id = %user.id, chars, "Handling request");
    let audio = ctx.speech.synthesize(&text, voice.as_deref()).await?;

    record_usage(
        &ctx,
        UsageRecord::new(user.id, FUNCTION_NAME, "synthesize")
            .with_metadata(json!({ "chars": chars, "voice": voice })),
    )
    .await;

    Ok(Json(audio))
}
