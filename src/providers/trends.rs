//! Social trends provider

use async_trait::async_trait;
use serde::Deserialize;

use crate::providers::{
    decode, send_for_text, ProviderConfig, ProviderError, TrendItem, TrendsProvider,
};

const PROVIDER: &str = "trends";

/// Upper bound on items per call
pub const MAX_ITEMS: usize = 50;

#[derive(Debug, Deserialize)]
struct TrendsResponse {
    #[serde(default, alias = "results", alias = "data")]
    items: Vec<TrendItem>,
}

pub struct TrendsClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl TrendsClient {
    pub fn new(config: ProviderConfig) -> Self {
        let client = config.http_client();
        Self { config, client }
    }

    async fn fetch(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<TrendItem>, ProviderError> {
        let api_key = self.config.require_key(PROVIDER)?;

        let request = self
            .client
            .get(self.config.endpoint(path))
            .header("x-api-key", api_key)
            .query(params);

        let text = send_for_text(PROVIDER, request).await?;
        let response: TrendsResponse = decode(PROVIDER, &text)?;
        Ok(response.items)
    }
}

#[async_trait]
impl TrendsProvider for TrendsClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TrendItem>, ProviderError> {
        let limit = limit.clamp(1, MAX_ITEMS);
        let mut items = self
            .fetch(
                "trends/search",
                &[("q", query.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        items.truncate(limit);
        Ok(items)
    }

    async fn trending(&self, region: &str, limit: usize) -> Result<Vec<TrendItem>, ProviderError> {
        let limit = limit.clamp(1, MAX_ITEMS);
        let mut items = self
            .fetch(
                "trends/top",
                &[("region", region.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        items.truncate(limit);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_aliases() {
        let a: TrendsResponse =
            serde_json::from_str(r#"{"results":[{"title":"rust 2027"}]}"#).unwrap();
        let b: TrendsResponse = serde_json::from_str(r#"{"data":[{"title":"x","volume":12}]}"#).unwrap();
        let c: TrendsResponse = serde_json::from_str(r#"{}"#).unwrap();

        assert_eq!(a.items[0].title, "rust 2027");
        assert_eq!(b.items[0].volume, Some(12));
        assert!(c.items.is_empty());
    }
}
