//! Bearer-token authentication

use axum::http::{header, HeaderMap};

use crate::backend::UserIdentity;
use crate::functions::{FunctionContext, FunctionError};

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, FunctionError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(FunctionError::MissingToken)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(FunctionError::MissingToken)?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(FunctionError::MissingToken);
    }
    Ok(token)
}

/// Verify the caller before any provider call or database write
pub async fn authenticate(
    ctx: &FunctionContext,
    headers: &HeaderMap,
) -> Result<UserIdentity, FunctionError> {
    let token = bearer_token(headers)?;
    let user = ctx.auth.verify_token(token).await?;
    tracing::debug!(user_id = %user.id, "Authenticated caller");
    Ok(user)
}
