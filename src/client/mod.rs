//! Functions client
//!
//! Typed access to the edge functions for the client-side hooks. Every call
//! is a POST to `{base}/functions/v1/{name}` carrying the session's bearer
//! token. Error bodies are decoded back into their structured code.

pub mod hybrid;
pub mod notify;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::functions::ai_chat::{self, ChatTask, ChatTaskResponse};
use crate::functions::credits::{self, CreditsAction, CreditsResponse};
use crate::functions::generate_image::{self, ImageAction, ImageResponse};
use crate::functions::orchestrator::{self, OrchestratorAction, OrchestratorResponse};
use crate::functions::router::FUNCTIONS_PREFIX;
use crate::functions::social_trends::{self, TrendsAction, TrendsResponse};
use crate::functions::text_to_speech::{self, SpeechAction};
use crate::functions::{ErrorBody, ErrorCode};
use crate::providers::SpeechAudio;
use crate::session::CreditsSource;

pub use hybrid::HybridAi;
pub use notify::{toast_for, Toast};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Client-side errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not signed in")]
    NotSignedIn,
    #[error("{message}")]
    Function {
        status: u16,
        /// `None` when the body was not a structured error
        code: Option<ErrorCode>,
        message: String,
    },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Unexpected response for '{0}'")]
    UnexpectedResponse(&'static str),
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::NotSignedIn => Some(ErrorCode::Unauthorized),
            ClientError::Function { code, .. } => *code,
            _ => None,
        }
    }
}

/// Turn a non-2xx response body into a [`ClientError::Function`]
pub fn function_error(status: StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => ClientError::Function {
            status: status.as_u16(),
            code: Some(parsed.code),
            message: parsed.error,
        },
        Err(_) => ClientError::Function {
            status: status.as_u16(),
            code: None,
            message: crate::providers::extract_error_message(body),
        },
    }
}

pub struct FunctionsClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl FunctionsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            client,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn function_url(&self, name: &str) -> String {
        format!("{}{}/{}", self.base_url, FUNCTIONS_PREFIX, name)
    }

    /// POST `body` to one function and decode its JSON response
    pub async fn invoke<Req, Resp>(&self, name: &str, body: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let token = self.token.as_deref().ok_or(ClientError::NotSignedIn)?;

        tracing::debug!(function = name, "Invoking function");
        let response = self
            .client
            .post(self.function_url(name))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let err = function_error(status, &text);
            tracing::warn!(function = name, status = status.as_u16(), "Function call failed: {}", err);
            return Err(err);
        }

        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn ai_chat(&self, task: &ChatTask) -> Result<ChatTaskResponse, ClientError> {
        self.invoke(ai_chat::FUNCTION_NAME, task).await
    }

    pub async fn generate_image(&self, action: &ImageAction) -> Result<ImageResponse, ClientError> {
        self.invoke(generate_image::FUNCTION_NAME, action).await
    }

    pub async fn text_to_speech(&self, text: &str, voice: Option<&str>) -> Result<SpeechAudio, ClientError> {
        let action = SpeechAction::Synthesize {
            text: text.to_string(),
            voice: voice.map(str::to_string),
        };
        self.invoke(text_to_speech::FUNCTION_NAME, &action).await
    }

    pub async fn social_trends(&self, action: &TrendsAction) -> Result<TrendsResponse, ClientError> {
        self.invoke(social_trends::FUNCTION_NAME, action).await
    }

    pub async fn orchestrate(
        &self,
        action: &OrchestratorAction,
    ) -> Result<OrchestratorResponse, ClientError> {
        self.invoke(orchestrator::FUNCTION_NAME, action).await
    }

    pub async fn credits(&self, action: &CreditsAction) -> Result<CreditsResponse, ClientError> {
        self.invoke(credits::FUNCTION_NAME, action).await
    }
}

#[async_trait]
impl CreditsSource for FunctionsClient {
    async fn fetch_credits(&self) -> Result<i64, ClientError> {
        match self.credits(&CreditsAction::Balance).await? {
            CreditsResponse::Balance { credits } => Ok(credits),
            _ => Err(ClientError::UnexpectedResponse(credits::FUNCTION_NAME)),
        }
    }
}
