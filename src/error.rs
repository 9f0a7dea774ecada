use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Error Classes
///
/// - **Authentication** (401): the request was not provably produced by the
///   website within the replay window. Never carries secret material.
/// - **Decode** (400): the body could not be read or decoded.
/// - **Request shape** (422): the body decoded, but a route's field/file
///   contract was not met.
/// - **Collaborator** (400): the submission backend rejected the input; its
///   message is passed through verbatim.
/// - **Internal** (500): anything unexpected. Clients only ever see
///   `"internal server error"`; details are logged.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing X-Signature header")]
    MissingSignature,

    #[error("Missing X-Timestamp header")]
    MissingTimestamp,

    #[error("Invalid X-Timestamp header")]
    InvalidTimestamp,

    #[error("Request timestamp is outside the accepted window")]
    ExpiredTimestamp,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid JSON payload: {0}")]
    InvalidJsonPayload(String),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Request body ended before it was complete")]
    IncompleteBody,

    #[error("Request body exceeds the maximum allowed size")]
    PayloadTooLarge,

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Missing file: {0}")]
    MissingFile(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("{0}")]
    Submission(String),

    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    /// HTTP status code this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature
            | Self::MissingTimestamp
            | Self::InvalidTimestamp
            | Self::ExpiredTimestamp
            | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::InvalidJsonPayload(_) | Self::MalformedBody(_) | Self::IncompleteBody => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MissingField(_) | Self::MissingFile(_) | Self::InvalidField { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Submission(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) | Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingSignature => "missing_signature",
            Self::MissingTimestamp => "missing_timestamp",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::ExpiredTimestamp => "expired_timestamp",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidJsonPayload(_) => "invalid_json_payload",
            Self::MalformedBody(_) => "malformed_body",
            Self::IncompleteBody => "incomplete_body",
            Self::PayloadTooLarge => "payload_too_large",
            Self::MissingField(_) => "missing_field",
            Self::MissingFile(_) => "missing_file",
            Self::InvalidField { .. } => "invalid_field",
            Self::Submission(_) => "submission_rejected",
            Self::NotFound(_) => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Internal(_) => "internal_error",
            Self::ConfigError(_) => "config_error",
        }
    }

    /// Whether this is an authentication failure.
    pub fn is_auth_failure(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }

    /// Message safe to show to the caller.
    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) | Self::ConfigError(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Log the full error details server-side for debugging
        // but only expose sanitized messages to clients
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        } else {
            tracing::warn!(error = %self, kind = self.kind(), "Request rejected");
        }

        let body = ErrorResponse {
            error: self.public_message(),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {e}"))
    }
}

/// Map a JSON decode failure onto the error taxonomy.
///
/// Serde errors can contain internal struct/field names which shouldn't be
/// exposed to external clients. A missing field becomes `MissingField` with
/// the wire name; everything else is a generic `InvalidJsonPayload`.
pub fn classify_json_error(e: &serde_json::Error) -> AppError {
    let msg = e.to_string();

    if msg.contains("missing field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return AppError::MissingField(field.to_string());
    }

    if msg.contains("invalid type") {
        return AppError::InvalidJsonPayload("invalid data type in request body".to_string());
    }

    if e.is_eof() || e.is_syntax() {
        return AppError::InvalidJsonPayload("malformed JSON in request body".to_string());
    }

    // Generic fallback that doesn't leak internal details
    AppError::InvalidJsonPayload("invalid request format".to_string())
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
