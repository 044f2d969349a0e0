use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use base64::{Engine as _, engine::general_purpose};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::models::User;

/// Caller identity resolved from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

/// `email:password` from a `Basic` authorization header.
pub fn parse_basic_credentials(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;

    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (email, password) = credentials.split_once(':')?;
    if email.is_empty() {
        return None;
    }
    Some((email.to_string(), password.to_string()))
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (email, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic_credentials)
            .ok_or(ApiError::Unauthorized)?;

        let user = User::find_active_by_email(&state.db.pool, &email)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        // bcrypt is deliberately slow; keep it off the async workers
        let verified = tokio::task::spawn_blocking(move || user.verify_password(&password).then_some(user))
            .await
            .map_err(|e| {
                tracing::error!("password verification task failed: {:?}", e);
                ApiError::Unauthorized
            })?;

        let user = verified.ok_or_else(|| {
            tracing::debug!("rejected credentials for {}", email);
            ApiError::Unauthorized
        })?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
        })
    }
}

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON and rule violations both come back as a 400 `ApiError`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}
