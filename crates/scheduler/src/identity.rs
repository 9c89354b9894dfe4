//! Caller identity.
//!
//! Sign-in happens upstream; the auth proxy forwards the signed-in user's
//! email in a request header (`x-user-email` unless configured otherwise).

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, HeaderName},
};

use crate::error::ApiError;
use crate::AppState;

/// Email of the signed-in caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
}

/// Read the caller's email from `header`. Blank or non-UTF-8 values count
/// as missing.
pub fn caller_email(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    let value = headers.get(header)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        caller_email(&parts.headers, &state.identity_header)
            .map(|email| Caller { email })
            .ok_or_else(|| ApiError::Unauthorized("Missing authentication".to_string()))
    }
}
