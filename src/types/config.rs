//! Configuration types
//!
//! Server configuration read from the environment, with defaults for
//! everything and a validation pass that normalises out-of-range values.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::providers::ProviderConfig;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.example.com/v1";
pub const DEFAULT_IMAGE_URL: &str = "https://api.images.example.com/v1";
pub const DEFAULT_SPEECH_URL: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_TRENDS_URL: &str = "https://api.trends.example.com/v1";

/// Ceiling for the per-image credit cost
pub const MAX_IMAGE_CREDIT_COST: i64 = 1_000_000;

/// Edge function server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Allowed CORS origins; `*` allows all
    pub cors_origins: Vec<String>,
    pub gateway: ProviderConfig,
    pub image: ProviderConfig,
    pub speech: ProviderConfig,
    pub trends: ProviderConfig,
    /// Hosted backend URL; `None` runs against the in-memory backend
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
    /// Credits charged per generated image
    pub image_credit_cost: i64,
    /// Upper bound on agents per orchestrator run
    pub orchestrator_max_agents: usize,
    /// Timeout applied to every outbound call
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let provider = |url: &str| ProviderConfig {
            base_url: url.to_string(),
            api_key: None,
            default_model: None,
            timeout_secs: 60,
        };

        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cors_origins: vec!["*".to_string()],
            gateway: provider(DEFAULT_GATEWAY_URL),
            image: provider(DEFAULT_IMAGE_URL),
            speech: provider(DEFAULT_SPEECH_URL),
            trends: provider(DEFAULT_TRENDS_URL),
            supabase_url: None,
            supabase_service_key: None,
            image_credit_cost: 1,
            orchestrator_max_agents: 5,
            request_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Build from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, then validate
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("AIHUB_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(origins) = get("AIHUB_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(timeout) = parse_number(get("AIHUB_REQUEST_TIMEOUT_SECS"), "AIHUB_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout;
        }
        if let Some(cost) = parse_number(get("AIHUB_IMAGE_CREDIT_COST"), "AIHUB_IMAGE_CREDIT_COST") {
            config.image_credit_cost = cost;
        }
        if let Some(max) = parse_number(get("AIHUB_ORCHESTRATOR_MAX_AGENTS"), "AIHUB_ORCHESTRATOR_MAX_AGENTS") {
            config.orchestrator_max_agents = max;
        }

        for (prefix, provider) in [
            ("LLM_GATEWAY", &mut config.gateway),
            ("IMAGE_API", &mut config.image),
            ("SPEECH_API", &mut config.speech),
            ("TRENDS_API", &mut config.trends),
        ] {
            if let Some(url) = get(&format!("{}_URL", prefix)) {
                provider.base_url = url;
            }
            provider.api_key = get(&format!("{}_KEY", prefix));
            provider.default_model = get(&format!("{}_MODEL", prefix));
        }

        config.supabase_url = get("SUPABASE_URL");
        config.supabase_service_key = get("SUPABASE_SERVICE_ROLE_KEY");

        config.validate();
        config
    }

    /// Clamp values into supported ranges
    pub fn validate(&mut self) {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            tracing::warn!(
                "Invalid bind address '{}', using {}",
                self.bind_addr,
                DEFAULT_BIND_ADDR
            );
            self.bind_addr = DEFAULT_BIND_ADDR.to_string();
        }

        if self.cors_origins.is_empty() {
            self.cors_origins = vec!["*".to_string()];
        }

        self.request_timeout_secs = self.request_timeout_secs.clamp(5, 300);
        self.image_credit_cost = self.image_credit_cost.clamp(0, MAX_IMAGE_CREDIT_COST);
        self.orchestrator_max_agents = self.orchestrator_max_agents.clamp(1, 5);

        for provider in [
            &mut self.gateway,
            &mut self.image,
            &mut self.speech,
            &mut self.trends,
        ] {
            provider.timeout_secs = self.request_timeout_secs;
        }

        // A URL without a key is as good as no backend
        if self.supabase_url.is_some() != self.supabase_service_key.is_some() {
            tracing::warn!("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set together; using in-memory backend");
            self.supabase_url = None;
            self.supabase_service_key = None;
        }
    }

    /// Snapshot of which providers have credentials, for startup logging
    pub fn provider_status(&self) -> HashMap<&'static str, bool> {
        HashMap::from([
            ("gateway", self.gateway.is_configured()),
            ("image", self.image.is_configured()),
            ("speech", self.speech.is_configured()),
            ("trends", self.trends.is_configured()),
        ])
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, key: &str) -> Option<T> {
    let value = value?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Ignoring non-numeric {}='{}'", key, value);
            None
        }
    }
}
