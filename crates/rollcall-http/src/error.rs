//! Error type for the HTTP routes and its JSON rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_attendance::{AttendanceError, Denial};
use rollcall_session::AuthError;
use rollcall_store::StoreError;
use serde_json::json;

/// Everything a route can fail with. Rendered as
/// `{"success": false, "error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request schema")]
    InvalidSchema,

    #[error("email already exists")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("unauthorized, token missing or invalid")]
    Unauthorized,

    #[error("user not found")]
    UserNotFound,

    #[error("forbidden, teacher access required")]
    TeacherOnly,

    #[error("forbidden, student access required")]
    StudentOnly,

    #[error("forbidden, not class teacher")]
    NotClassTeacher,

    #[error("forbidden, not enrolled in this class")]
    NotEnrolled,

    #[error("class not found")]
    ClassNotFound,

    #[error("student not found")]
    StudentNotFound,

    #[error("student already present in the class")]
    AlreadyEnrolled,

    #[error("no attendance recorded for this class")]
    AttendanceNotFound,

    #[error("an attendance session is already active")]
    SessionActive,

    /// Storage or token signing failed. Details are logged, not returned.
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSchema | Self::EmailTaken | Self::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::TeacherOnly | Self::StudentOnly | Self::NotClassTeacher | Self::NotEnrolled => {
                StatusCode::FORBIDDEN
            }
            Self::UserNotFound
            | Self::ClassNotFound
            | Self::StudentNotFound
            | Self::AttendanceNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyEnrolled | Self::SessionActive => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken | AuthError::InvalidToken(_) => Self::Unauthorized,
            AuthError::Signing(reason) => Self::Internal(reason),
        }
    }
}

impl From<AttendanceError> for ApiError {
    fn from(e: AttendanceError) -> Self {
        match e {
            AttendanceError::Authorization(Denial::NotClassTeacher) => Self::NotClassTeacher,
            AttendanceError::Authorization(Denial::StudentOnly) => Self::StudentOnly,
            AttendanceError::Authorization(Denial::NotEnrolled) => Self::NotEnrolled,
            AttendanceError::Authorization(_) => Self::TeacherOnly,
            AttendanceError::SessionAlreadyActive(_) => Self::SessionActive,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(reason) = &self {
            tracing::error!(%reason, "request failed");
        }
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}
