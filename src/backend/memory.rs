//! In-memory backend
//!
//! Stands in for the hosted auth service and database during local
//! development and in tests. Tokens map straight to identities.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::backend::{AuthService, BackendError, Database, UsageRecord, UserIdentity};

#[derive(Default)]
pub struct MemoryBackend {
    tokens: DashMap<String, UserIdentity>,
    credits: DashMap<Uuid, i64>,
    usage: Mutex<Vec<UsageRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a new user holding `credits`
    pub fn add_user(&self, token: &str, email: &str, credits: i64) -> UserIdentity {
        let user = UserIdentity {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        self.tokens.insert(token.to_string(), user.clone());
        self.credits.insert(user.id, credits);
        user
    }

    pub fn set_credits(&self, user_id: Uuid, credits: i64) {
        self.credits.insert(user_id, credits);
    }

    /// Snapshot of every inserted usage row
    pub fn usage_rows(&self) -> Vec<UsageRecord> {
        self.usage.lock().expect("usage mutex poisoned").clone()
    }
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn verify_token(&self, token: &str) -> Result<UserIdentity, BackendError> {
        self.tokens
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(BackendError::Unauthorized)
    }
}

#[async_trait]
impl Database for MemoryBackend {
    async fn insert_usage(&self, record: UsageRecord) -> Result<(), BackendError> {
        self.usage.lock().expect("usage mutex poisoned").push(record);
        Ok(())
    }

    async fn credits_remaining(&self, user_id: Uuid) -> Result<i64, BackendError> {
        Ok(self.credits.get(&user_id).map(|c| *c).unwrap_or(0))
    }

    async fn consume_credits(&self, user_id: Uuid, amount: i64) -> Result<i64, BackendError> {
        let mut entry = self.credits.entry(user_id).or_insert(0);
        if *entry < amount {
            return Err(BackendError::InsufficientCredits {
                available: *entry,
                required: amount,
            });
        }
        *entry -= amount;
        Ok(*entry)
    }

    async fn recent_usage(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, BackendError> {
        let usage = self.usage.lock().expect("usage mutex poisoned");
        let mut rows: Vec<UsageRecord> = usage
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}
