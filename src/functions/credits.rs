//! `credits`: balance and usage history. Read-only, records no usage.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::backend::UsageRecord;
use crate::functions::auth::authenticate;
use crate::functions::{parse_body, FunctionContext, FunctionResult};

pub const FUNCTION_NAME: &str = "credits";

const DEFAULT_HISTORY: usize = 20;
const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CreditsAction {
    Balance,
    History {
        #[serde(default)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CreditsResponse {
    Balance { credits: i64 },
    History { entries: Vec<UsageRecord> },
}

pub async fn handle(
    State(ctx): State<FunctionContext>,
    headers: HeaderMap,
    body: Result<Json<CreditsAction>, JsonRejection>,
) -> FunctionResult<Json<CreditsResponse>> {
    let user = authenticate(&ctx, &headers).await?;

    let response = match parse_body(body)? {
        CreditsAction::Balance => CreditsResponse::Balance {
            credits: ctx.db.credits_remaining(user.id).await?,
        },
        CreditsAction::History { limit } => {
            CreditsResponse::History {
                entries: ctx.db.recent_usage(user.id, history_limit(limit)).await?,
            }
        }
    };

    tracing::debug!(function = FUNCTION_NAME, user_id = %user.id, "Handled request");
    Ok(Json(response))
}

fn history_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_limit() {
        assert_eq!(history_limit(None), 20);
        assert_eq!(history_limit(Some(0)), 1);
        assert_eq!(history_limit(Some(50)), 50);
        assert_eq!(history_limit(Some(500)), 100);
    }

    #[test]
    fn test_history_limit_optional_in_body() {
        let action: CreditsAction = serde_json::from_str(r#"{"action":"history"}"#).unwrap();
        assert_eq!(action, CreditsAction::History { limit: None });
    }
}
