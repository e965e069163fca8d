//! `social-trends`: keyword search and per-region trending topics

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::UsageRecord;
use crate::functions::auth::authenticate;
use crate::functions::{parse_body, record_usage, require_text, FunctionContext, FunctionResult};
use crate::providers::trends::MAX_ITEMS;
use crate::providers::TrendItem;

pub const FUNCTION_NAME: &str = "social-trends";

const DEFAULT_LIMIT: usize = 10;
const DEFAULT_REGION: &str = "US";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TrendsAction {
    Search {
        query: String,
        #[serde(default)]
        limit: Option<usize>,
    },
    Trending {
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendsResponse {
    pub items: Vec<TrendItem>,
    pub count: usize,
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_ITEMS)
}

pub async fn handle(
    State(ctx): State<FunctionContext>,
    headers: HeaderMap,
    body: Result<Json<TrendsAction>, JsonRejection>,
) -> FunctionResult<Json<TrendsResponse>> {
    let user = authenticate(&ctx, &headers).await?;

    let (action, items, metadata) = match parse_body(body)? {
        TrendsAction::Search { query, limit } => {
            require_text("query", &query)?;
            let limit = clamp_limit(limit);
            let items = ctx.trends.search(query.trim(), limit).await?;
            ("search", items, json!({ "query": query, "limit": limit }))
        }
        TrendsAction::Trending { region, limit } => {
            let region = region
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string());
            let limit = clamp_limit(limit);
            let items = ctx.trends.trending(&region, limit).await?;
            ("trending", items, json!({ "region": region, "limit": limit }))
        }
    };

    tracing::info!(function = FUNCTION_NAME, action, user_id = %user.id, items = items.len(), "Handled request");
    record_usage(
        &ctx,
        UsageRecord::new(user.id, FUNCTION_NAME, action).with_metadata(metadata),
    )
    .await;

    Ok(Json(TrendsResponse {
        count: items.len(),
        items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), MAX_ITEMS);
    }
}
