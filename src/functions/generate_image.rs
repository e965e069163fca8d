//! `generate-image`: text-to-image and image editing. Charges credits.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::UsageRecord;
use crate::functions::auth::authenticate;
use crate::functions::{parse_body, record_usage, require_text, FunctionContext, FunctionError, FunctionResult};
use crate::providers::image::MAX_IMAGES;
use crate::providers::{GeneratedImage, ImagePrompt};

pub const FUNCTION_NAME: &str = "generate-image";

/// Which upstream renders a `generate` request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageEngine {
    #[default]
    Dedicated,
    Gateway,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ImageAction {
    Generate {
        prompt: String,
        #[serde(default)]
        size: Option<String>,
        #[serde(default)]
        count: Option<u8>,
        #[serde(default)]
        engine: ImageEngine,
    },
    Edit {
        prompt: String,
        /// Source image as a URL or `data:` URL
        image: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    pub images: Vec<GeneratedImage>,
    pub credits_used: i64,
    pub credits_remaining: i64,
}

pub async fn handle(
    State(ctx): State<FunctionContext>,
    headers: HeaderMap,
    body: Result<Json<ImageAction>, JsonRejection>,
) -> FunctionResult<Json<ImageResponse>> {
    let user = authenticate(&ctx, &headers).await?;
    let action = parse_body(body)?;

    let (action_name, prompt, count) = match &action {
        // The gateway renders one image per call
        ImageAction::Generate {
            prompt,
            engine: ImageEngine::Gateway,
            ..
        } => ("generate", prompt, 1),
        ImageAction::Generate { prompt, count, .. } => {
            ("generate", prompt, count.unwrap_or(1).clamp(1, MAX_IMAGES))
        }
        ImageAction::Edit { prompt, image } => {
            require_text("image", image)?;
            ("edit", prompt, 1)
        }
    };
    require_text("prompt", prompt)?;

    let cost = image_cost(ctx.settings.image_credit_cost, usize::from(count))?;
    let available = ctx.db.credits_remaining(user.id).await?;
    if available < cost {
        return Err(FunctionError::InsufficientCredits {
            available,
            required: cost,
        });
    }

    tracing::info!(
        function = FUNCTION_NAME,
        action = action_name,
        user_id = %user.id,
        count,
        "Handling request"
    );

    let mut images = match &action {
        ImageAction::Generate {
            prompt,
            size,
            engine: ImageEngine::Dedicated,
            ..
        } => {
            ctx.images
                .generate(&ImagePrompt {
                    prompt: prompt.clone(),
                    size: size.clone(),
                    count,
                })
                .await?
        }
        ImageAction::Generate {
            prompt,
            engine: ImageEngine::Gateway,
            ..
        } => ctx.chat.generate_image(prompt, None).await?,
        ImageAction::Edit { prompt, image } => {
            ctx.chat.generate_image(prompt, Some(image.as_str())).await?
        }
    };
    images.truncate(usize::from(count));

    // Charge only for images actually delivered
    let charged = image_cost(ctx.settings.image_credit_cost, images.len())?;
    let credits_remaining = if charged > 0 {
        ctx.db.consume_credits(user.id, charged).await?
    } else {
        available
    };

    record_usage(
        &ctx,
        UsageRecord::new(user.id, FUNCTION_NAME, action_name)
            .with_credits(charged)
            .with_metadata(json!({ "images": images.len(), "prompt_chars": prompt.chars().count() })),
    )
    .await;

    Ok(Json(ImageResponse {
        images,
        credits_used: charged,
        credits_remaining,
    }))
}

fn image_cost(unit_cost: i64, images: usize) -> FunctionResult<i64> {
    i64::try_from(images)
        .ok()
        .and_then(|n| unit_cost.checked_mul(n))
        .ok_or_else(|| FunctionError::BadRequest("Image cost out of range".to_string()))
}
