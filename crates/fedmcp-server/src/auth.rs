//! Caller identity from bearer credentials.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;

/// Number of credential characters kept in the actor id.
const ACTOR_PREFIX_LEN: usize = 8;

/// Authenticated caller, as recorded in audit events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `user:` followed by the first characters of the credential. The full
/// credential is never stored.
pub fn actor_from_credential(credential: &str) -> String {
    let prefix: String = credential.chars().take(ACTOR_PREFIX_LEN).collect();
    format!("user:{}", prefix)
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing bearer credentials".into()))?;

        let (scheme, credential) = header
            .split_once(' ')
            .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".into()))?;
        let credential = credential.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || credential.is_empty() {
            return Err(AppError::Unauthorized("Missing bearer credentials".into()));
        }

        Ok(Actor(actor_from_credential(credential)))
    }
}
