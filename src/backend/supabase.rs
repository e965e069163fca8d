//! Hosted backend over its REST interface
//!
//! Auth goes through `/auth/v1/user`, table access through PostgREST under
//! `/rest/v1`. Credit deduction is a single RPC so the database keeps it atomic.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::{AuthService, BackendError, Database, UsageRecord, UserIdentity};

pub const USAGE_TABLE: &str = "usage_logs";
pub const CREDITS_TABLE: &str = "user_credits";
pub const CONSUME_CREDITS_RPC: &str = "consume_credits";

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub timeout_secs: u64,
}

pub struct SupabaseBackend {
    config: SupabaseConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreditsRow {
    credits_remaining: i64,
}

#[derive(Debug, Deserialize)]
struct ConsumeResult {
    ok: bool,
    remaining: i64,
}

impl SupabaseBackend {
    pub fn new(config: SupabaseConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn service_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.service_key),
            )
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let response = self.service_request(builder).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl AuthService for SupabaseBackend {
    async fn verify_token(&self, token: &str) -> Result<UserIdentity, BackendError> {
        let url = format!("{}/auth/v1/user", self.config.url.trim_end_matches('/'));

        let response = self
            .client
            .get(url)
            .header("apikey", &self.config.service_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let user: AuthUser =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(UserIdentity {
            id: user.id,
            email: user.email,
        })
    }
}

#[async_trait]
impl Database for SupabaseBackend {
    async fn insert_usage(&self, record: UsageRecord) -> Result<(), BackendError> {
        let builder = self
            .client
            .post(self.rest_url(USAGE_TABLE))
            .header("Prefer", "return=minimal")
            .json(&record);
        self.send(builder).await?;

        tracing::debug!(
            function = %record.function_name,
            action = %record.action,
            "Inserted usage row"
        );
        Ok(())
    }

    async fn credits_remaining(&self, user_id: Uuid) -> Result<i64, BackendError> {
        let builder = self.client.get(self.rest_url(CREDITS_TABLE)).query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("select", "credits_remaining".to_string()),
        ]);
        let body = self.send(builder).await?;

        let rows: Vec<CreditsRow> =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(rows.first().map(|r| r.credits_remaining).unwrap_or(0))
    }

    async fn consume_credits(&self, user_id: Uuid, amount: i64) -> Result<i64, BackendError> {
        let builder = self
            .client
            .post(self.rest_url(&format!("rpc/{}", CONSUME_CREDITS_RPC)))
            .json(&serde_json::json!({
                "p_user_id": user_id,
                "p_amount": amount,
            }));
        let body = self.send(builder).await?;

        let result: ConsumeResult =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        if !result.ok {
            return Err(BackendError::InsufficientCredits {
                available: result.remaining,
                required: amount,
            });
        }
        Ok(result.remaining)
    }

    async fn recent_usage(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, BackendError> {
        let builder = self.client.get(self.rest_url(USAGE_TABLE)).query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        let body = self.send(builder).await?;

        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_url_trims_trailing_slash() {
        let backend = SupabaseBackend::new(SupabaseConfig {
            url: "https://example.supabase.co/".into(),
            service_key: "key".into(),
            timeout_secs: 5,
        });
        assert_eq!(
            backend.rest_url("usage_logs"),
            "https://example.supabase.co/rest/v1/usage_logs"
        );
    }

    #[test]
    fn test_consume_result_shape() {
        let parsed: ConsumeResult =
            serde_json::from_str(r#"{"ok": false, "remaining": 1}"#).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.remaining, 1);
    }
}
