//! Edge function errors
//!
//! Every failure leaves a handler as `{ "error": <message>, "code": <code> }`
//! with a matching non-2xx status. Callers branch on `code`, never on the
//! message text.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendError;
use crate::providers::ProviderError;

/// Structured error code carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    RateLimited,
    PaymentRequired,
    InsufficientCredits,
    Upstream,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::PaymentRequired | ErrorCode::InsufficientCredits => {
                StatusCode::PAYMENT_REQUIRED
            }
            ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body returned by every handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
}

/// Handler errors
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("Missing or malformed Authorization header")]
    MissingToken,
    #[error("Invalid or expired session")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("Insufficient credits: {available} available, {required} required")]
    InsufficientCredits { available: i64, required: i64 },
    #[error("All {0} agents failed")]
    AllAgentsFailed(usize),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Backend error: {0}")]
    Backend(BackendError),
}

pub type FunctionResult<T> = Result<T, FunctionError>;

impl FunctionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FunctionError::MissingToken | FunctionError::Unauthorized => ErrorCode::Unauthorized,
            FunctionError::BadRequest(_) => ErrorCode::BadRequest,
            FunctionError::InsufficientCredits { .. } => ErrorCode::InsufficientCredits,
            FunctionError::AllAgentsFailed(_) => ErrorCode::Upstream,
            FunctionError::Provider(e) => match e {
                ProviderError::NotConfigured(_) => ErrorCode::Unavailable,
                ProviderError::RateLimited { .. } => ErrorCode::RateLimited,
                ProviderError::PaymentRequired { .. } => ErrorCode::PaymentRequired,
                ProviderError::Upstream { .. }
                | ProviderError::Transport { .. }
                | ProviderError::InvalidResponse { .. } => ErrorCode::Upstream,
            },
            FunctionError::Backend(_) => ErrorCode::Internal,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let error = match self {
            // Backend internals stay in the logs
            FunctionError::Backend(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            error,
            code: self.code(),
        }
    }
}

impl From<BackendError> for FunctionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized => FunctionError::Unauthorized,
            BackendError::InsufficientCredits {
                available,
                required,
            } => FunctionError::InsufficientCredits {
                available,
                required,
            },
            other => FunctionError::Backend(other),
        }
    }
}

impl From<JsonRejection> for FunctionError {
    fn from(rejection: JsonRejection) -> Self {
        FunctionError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let code = self.code();
        match code {
            ErrorCode::Internal | ErrorCode::Upstream => {
                tracing::error!(code = ?code, "Function failed: {}", self)
            }
            _ => tracing::warn!(code = ?code, "Function rejected: {}", self),
        }

        (code.status(), Json(self.body())).into_response()
    }
}
