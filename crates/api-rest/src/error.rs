//! Mapping from core errors to HTTP responses.

use axum::http::StatusCode;
use carelink_core::{CareError, EntityId, ErrorKind};

/// Error half of every handler result: a status and a plain-text body.
pub type ApiError = (StatusCode, String);

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidCode
        | ErrorKind::Expired
        | ErrorKind::RateLimited
        | ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Storage and serialisation failures are logged and answered with a generic body; everything
/// else carries the core error's message.
pub fn care_error(e: CareError) -> ApiError {
    let status = status_for(e.kind());
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {}", e);
        return (status, "Internal error".into());
    }
    (status, e.to_string())
}

pub fn parse_id(raw: &str) -> Result<EntityId, ApiError> {
    EntityId::parse(raw).map_err(|e| care_error(e.into()))
}

pub fn unauthenticated(message: &str) -> ApiError {
    (StatusCode::UNAUTHORIZED, message.to_string())
}
