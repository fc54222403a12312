use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::ApiResponse;

/// Request-level failure taxonomy. Every handler returns
/// `Result<Json<ApiResponse<T>>, ApiError>` and lets the `IntoResponse`
/// impl pick the status code and envelope.
#[derive(Debug)]
pub enum ApiError {
    /// Missing/malformed fields, unparsable dates, unknown referenced ids.
    Validation(String),
    /// Missing or invalid admin credentials.
    Auth(String),
    /// Referenced stylist/booking does not exist.
    NotFound(String),
    /// Requested interval overlaps an existing booking, or a delete is
    /// blocked by references.
    Conflict(String),
    /// Anything the client cannot fix. Logged; message stays generic.
    Internal,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("not found".into()),
            other => {
                tracing::error!("database error: {}", other);
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Validation(msg)
            | Self::Auth(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Internal => "internal error".to_string(),
        };
        (self.status(), Json(ApiResponse::<()>::error(message))).into_response()
    }
}

// ── Tests ──
