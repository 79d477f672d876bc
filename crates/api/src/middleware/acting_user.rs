//! Acting-user extraction.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user in the `X-User-Id` header and the ledger records it on every write.

use axum::{extract::FromRequestParts, http::request::Parts};
use partida_shared::types::UserId;

use crate::error::ApiError;

/// Header carrying the acting user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf the request writes to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub UserId);

impl ActingUser {
    /// Returns the user id.
    #[must_use]
    pub const fn user_id(self) -> UserId {
        self.0
    }
}

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Err(ApiError::unauthorized("X-User-Id header is required"));
        };
        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .map(ActingUser)
            .ok_or_else(|| ApiError::unauthorized("X-User-Id must be a UUID"))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<ActingUser, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("X-User-Id", value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        ActingUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_header() {
        let id = UserId::new();
        let user = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(user.user_id(), id);
    }

    #[tokio::test]
    async fn test_missing_header() {
        let err = extract(None).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let err = extract(Some("not-a-uuid")).await.unwrap_err();
        assert_eq!(err.status().as_u16(), 401);
    }
}
