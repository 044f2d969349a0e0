//! API error type shared by every controller.
//!
//! Every failure a handler can produce is an [`ApiError`]; its
//! `IntoResponse` implementation renders the JSON envelope
//! `{"success": false, "message": ..., "errors": {...}}`, where `errors`
//! maps field paths (`name`, `tickets[1].seat`) to messages.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::database::{violated_constraint, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};

/// Field path -> messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request")]
    Validation(FieldErrors),

    #[error("authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict with existing data")]
    Conflict(FieldErrors),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl ApiError {
    /// Single-field validation error.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    /// Turns a unique violation into a conflict on `field`; other errors pass through.
    pub fn unique_or(err: sqlx::Error, field: &str, message: &str) -> Self {
        if violated_constraint(&err, UNIQUE_VIOLATION).is_some() {
            let mut errors = FieldErrors::new();
            errors.insert(field.to_string(), vec![message.to_string()]);
            ApiError::Conflict(errors)
        } else {
            ApiError::Database(err)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            ApiError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let errors = match &self {
            ApiError::Validation(errors) | ApiError::Conflict(errors) => Some(errors),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorBody { success: false, message, errors }),
        )
            .into_response();

        if matches!(self, ApiError::Unauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"cinema\""),
            );
        }

        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        // A referenced row vanished between the existence check and the write.
        if violated_constraint(&err, FOREIGN_KEY_VIOLATION).is_some() {
            return ApiError::field("non_field_errors", "referenced object does not exist");
        }
        ApiError::Database(err)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        flatten_validation_errors("", &errors, &mut fields);
        ApiError::Validation(fields)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::field("non_field_errors", rejection.body_text())
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

/// Collapses nested `validator` errors into `path -> messages`.
fn flatten_validation_errors(prefix: &str, errors: &ValidationErrors, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, field);
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(path).or_default();
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", error.code));
                    messages.push(message);
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                flatten_validation_errors(&path, inner, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_validation_errors(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}
