//! Backend collaborators
//!
//! The hosted auth service and Postgres REST layer. Schema, constraints and
//! row-level security live outside this crate; these traits only describe the
//! calls the edge functions make.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryBackend;
pub use supabase::{SupabaseBackend, SupabaseConfig};

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// One analytics row in `usage_logs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub function_name: String,
    pub action: String,
    pub credits_used: i64,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(user_id: Uuid, function_name: &str, action: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            function_name: function_name.to_string(),
            action: action.to_string(),
            credits_used: 0,
            metadata: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_credits(mut self, credits: i64) -> Self {
        self.credits_used = credits;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid or expired token")]
    Unauthorized,
    #[error("Insufficient credits: {available} available, {required} required")]
    InsufficientCredits { available: i64, required: i64 },
    #[error("Backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

/// Bearer-token verification
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<UserIdentity, BackendError>;
}

/// Table access used by the edge functions
#[async_trait]
pub trait Database: Send + Sync {
    async fn insert_usage(&self, record: UsageRecord) -> Result<(), BackendError>;

    async fn credits_remaining(&self, user_id: Uuid) -> Result<i64, BackendError>;

    /// Deduct `amount` in one statement and return the new balance.
    async fn consume_credits(&self, user_id: Uuid, amount: i64) -> Result<i64, BackendError>;

    /// Most recent first
    async fn recent_usage(&self, user_id: Uuid, limit: usize)
        -> Result<Vec<UsageRecord>, BackendError>;
}
