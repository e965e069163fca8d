//! Session state
//!
//! The signed-in user and their credit counter, held in one explicit struct
//! owned by the caller. Credit refreshes are rate limited by a cooldown so a
//! burst of UI events costs at most one backend read.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::backend::UserIdentity;
use crate::client::ClientError;

/// Minimum spacing between two credit fetches
pub const DEFAULT_REFRESH_COOLDOWN_SECS: i64 = 30;

/// Anything that can report the caller's current balance
#[async_trait]
pub trait CreditsSource: Send + Sync {
    async fn fetch_credits(&self) -> Result<i64, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(i64),
    CoolingDown,
    SignedOut,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub user: Option<UserIdentity>,
    pub credits: Option<i64>,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub cooldown: Duration,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_REFRESH_COOLDOWN_SECS))
    }
}

impl SessionState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            user: None,
            credits: None,
            last_refreshed: None,
            cooldown,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Replace any previous session; the counter is unknown until refreshed
    pub fn sign_in(&mut self, user: UserIdentity) {
        tracing::info!(user_id = %user.id, "Signed in");
        self.user = Some(user);
        self.credits = None;
        self.last_refreshed = None;
    }

    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            tracing::info!(user_id = %user.id, "Signed out");
        }
        self.credits = None;
        self.last_refreshed = None;
    }

    /// Optimistically deduct a spend the server has already accepted
    pub fn apply_spend(&mut self, amount: i64) {
        if let Some(credits) = self.credits.as_mut() {
            *credits = (*credits - amount).max(0);
        }
    }

    pub fn cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.last_refreshed
            .is_some_and(|last| now - last < self.cooldown)
    }

    /// Fetch the balance unless signed out or inside the cooldown
    pub async fn refresh_credits(
        &mut self,
        source: &dyn CreditsSource,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, ClientError> {
        if self.user.is_none() {
            return Ok(RefreshOutcome::SignedOut);
        }
        if self.cooling_down(now) {
            tracing::debug!("Credit refresh skipped, cooling down");
            return Ok(RefreshOutcome::CoolingDown);
        }

        let credits = source.fetch_credits().await?;
        self.credits = Some(credits);
        self.last_refreshed = Some(now);
        Ok(RefreshOutcome::Refreshed(credits))
    }
}
