//! User-facing copy for failed calls, keyed on the structured error code

use serde::Serialize;

use crate::client::ClientError;
use crate::functions::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Error,
    Warning,
    Info,
}

/// Follow-up the toast offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastAction {
    SignIn,
    BuyCredits,
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
    pub action: Option<ToastAction>,
}

impl Toast {
    fn new(kind: ToastKind, title: &str, description: &str, action: Option<ToastAction>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description: description.to_string(),
            action,
        }
    }
}

pub fn toast_for(err: &ClientError) -> Toast {
    use ToastAction::*;
    use ToastKind::*;

    match err.code() {
        Some(ErrorCode::Unauthorized) => Toast::new(
            Warning,
            "Sign in required",
            "Your session has expired. Sign in again to continue.",
            Some(SignIn),
        ),
        Some(ErrorCode::InsufficientCredits) => Toast::new(
            Warning,
            "Out of credits",
            "You don't have enough credits for this. Top up to keep creating.",
            Some(BuyCredits),
        ),
        Some(ErrorCode::PaymentRequired) => Toast::new(
            Error,
            "AI credits exhausted",
            "The AI service has run out of credits. Please try again later.",
            None,
        ),
        Some(ErrorCode::RateLimited) => Toast::new(
            Warning,
            "Slow down",
            "Too many requests. Wait a moment and try again.",
            Some(Retry),
        ),
        Some(ErrorCode::BadRequest) => Toast::new(Error, "Invalid request", &err.to_string(), None),
        Some(ErrorCode::Unavailable) => Toast::new(
            Error,
            "Feature unavailable",
            "This feature isn't available right now.",
            None,
        ),
        Some(ErrorCode::Upstream) | Some(ErrorCode::Internal) | None => Toast::new(
            Error,
            "Something went wrong",
            "We couldn't complete your request. Please try again.",
            Some(Retry),
        ),
    }
}

/// Shown when a result was produced by the server fallback
pub fn fallback_toast() -> Toast {
    Toast::new(
        ToastKind::Info,
        "Using cloud AI",
        "On-device AI isn't available here, so this ran in the cloud.",
        None,
    )
}
