//! `ai-chat`: chat, intent classification, summaries and embeddings
//! through the LLM gateway.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::UsageRecord;
use crate::functions::auth::authenticate;
use crate::functions::{parse_body, record_usage, require_text, FunctionContext, FunctionError, FunctionResult};
use crate::inference::local::{EMBEDDING_DIM, MAX_EMBED_BATCH};
use crate::inference::{Intent, IntentPrediction};
use crate::providers::{ChatRequest, ProviderError, TokenUsage};
use crate::types::message::ChatMessage;

pub const FUNCTION_NAME: &str = "ai-chat";

/// Confidence reported when the model answered with a known label
const LABELED_CONFIDENCE: f32 = 0.9;
/// Confidence reported when the answer could not be parsed
const UNLABELED_CONFIDENCE: f32 = 0.3;

const SUMMARY_DEFAULT_WORDS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum ChatTask {
    Chat {
        messages: Vec<ChatMessage>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        temperature: Option<f32>,
    },
    Classify {
        text: String,
    },
    Summarize {
        text: String,
        #[serde(default)]
        max_words: Option<u32>,
    },
    Embed {
        texts: Vec<String>,
    },
}

impl ChatTask {
    fn name(&self) -> &'static str {
        match self {
            ChatTask::Chat { .. } => "chat",
            ChatTask::Classify { .. } => "classify",
            ChatTask::Summarize { .. } => "summarize",
            ChatTask::Embed { .. } => "embed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum ChatTaskResponse {
    Chat {
        content: String,
        model: String,
        #[serde(default)]
        usage: Option<TokenUsage>,
    },
    Classify(IntentPrediction),
    Summarize {
        summary: String,
    },
    Embed {
        embeddings: Vec<Vec<f32>>,
        dimensions: usize,
    },
}

pub async fn handle(
    State(ctx): State<FunctionContext>,
    headers: HeaderMap,
    body: Result<Json<ChatTask>, JsonRejection>,
) -> FunctionResult<Json<ChatTaskResponse>> {
    let user = authenticate(&ctx, &headers).await?;
    let task = parse_body(body)?;
    let action = task.name();

    tracing::info!(function = FUNCTION_NAME, action, user_id = %user.id, "Handling request");

    let (response, metadata) = match task {
        ChatTask::Chat {
            messages,
            model,
            max_tokens,
            temperature,
        } => {
            if messages.is_empty() {
                return Err(FunctionError::BadRequest("'messages' must not be empty".into()));
            }
            let turns = messages.len();
            let completion = ctx
                .chat
                .complete(ChatRequest {
                    model,
                    messages,
                    max_tokens,
                    temperature,
                })
                .await?;
            let metadata = json!({
                "model": completion.model,
                "messages": turns,
                "total_tokens": completion.usage.as_ref().map(|u| u.total_tokens),
            });
            (
                ChatTaskResponse::Chat {
                    content: completion.content,
                    model: completion.model,
                    usage: completion.usage,
                },
                metadata,
            )
        }
        ChatTask::Classify { text } => {
            require_text("text", &text)?;
            let prediction = classify(&ctx, &text).await?;
            let metadata = json!({ "intent": prediction.intent });
            (ChatTaskResponse::Classify(prediction), metadata)
        }
        ChatTask::Summarize { text, max_words } => {
            require_text("text", &text)?;
            let words = max_words.unwrap_or(SUMMARY_DEFAULT_WORDS).clamp(10, 1000);
            let completion = ctx
                .chat
                .complete(ChatRequest {
                    temperature: Some(0.3),
                    ..ChatRequest::new(vec![
                        ChatMessage::system(format!(
                            "Summarize the user's text in at most {} words. Reply with the summary only.",
                            words
                        )),
                        ChatMessage::user(text.clone()),
                    ])
                })
                .await?;
            let metadata = json!({ "input_chars": text.chars().count(), "max_words": words });
            (
                ChatTaskResponse::Summarize {
                    summary: completion.content.trim().to_string(),
                },
                metadata,
            )
        }
        ChatTask::Embed { texts } => {
            if texts.is_empty() || texts.len() > MAX_EMBED_BATCH {
                return Err(FunctionError::BadRequest(format!(
                    "'texts' must hold between 1 and {} entries",
                    MAX_EMBED_BATCH
                )));
            }
            let embeddings = ctx.chat.embed(&texts, EMBEDDING_DIM).await?;
            if let Some(width) = embeddings.iter().map(Vec::len).find(|w| *w != EMBEDDING_DIM) {
                return Err(ProviderError::InvalidResponse {
                    provider: "gateway",
                    message: format!("expected {}-dimensional embeddings, got {}", EMBEDDING_DIM, width),
                }
                .into());
            }
            let metadata = json!({ "count": texts.len() });
            (
                ChatTaskResponse::Embed {
                    embeddings,
                    dimensions: EMBEDDING_DIM,
                },
                metadata,
            )
        }
    };

    record_usage(
        &ctx,
        UsageRecord::new(user.id, FUNCTION_NAME, action).with_metadata(metadata),
    )
    .await;

    Ok(Json(response))
}

async fn classify(ctx: &FunctionContext, text: &str) -> FunctionResult<IntentPrediction> {
    let labels: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
    let completion = ctx
        .chat
        .complete(ChatRequest {
            max_tokens: Some(8),
            temperature: Some(0.0),
            ..ChatRequest::new(vec![
                ChatMessage::system(format!(
                    "Classify the user's message. Answer with exactly one label from: {}.",
                    labels.join(", ")
                )),
                ChatMessage::user(text),
            ])
        })
        .await?;

    Ok(parse_label(&completion.content))
}

fn parse_label(answer: &str) -> IntentPrediction {
    match Intent::from_label(answer) {
        Some(intent) => IntentPrediction {
            intent,
            confidence: LABELED_CONFIDENCE,
        },
        None => {
            tracing::debug!("Unrecognised intent label '{}'", answer.trim());
            IntentPrediction {
                intent: Intent::Chat,
                confidence: UNLABELED_CONFIDENCE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_tags() {
        let task: ChatTask = serde_json::from_str(r#"{"task":"embed","texts":["a","b"]}"#).unwrap();
        assert_eq!(task.name(), "embed");

        let task: ChatTask = serde_json::from_str(
            r#"{"task":"chat","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert!(matches!(task, ChatTask::Chat { ref messages, .. } if messages.len() == 1));

        assert!(serde_json::from_str::<ChatTask>(r#"{"task":"translate","text":"x"}"#).is_err());
    }

    #[test]
    fn test_parse_label() {
        let prediction = parse_label(" Image_Request\n");
        assert_eq!(prediction.intent, Intent::ImageRequest);
        assert_eq!(prediction.confidence, LABELED_CONFIDENCE);

        let prediction = parse_label("I think it is a question");
        assert_eq!(prediction.intent, Intent::Chat);
        assert_eq!(prediction.confidence, UNLABELED_CONFIDENCE);
    }

    #[test]
    fn test_classify_response_is_flat() {
        let response = ChatTaskResponse::Classify(IntentPrediction {
            intent: Intent::Research,
            confidence: 0.9,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["task"], "classify");
        assert_eq!(json["intent"], "research");
    }
}
