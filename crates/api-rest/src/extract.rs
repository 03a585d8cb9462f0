//! Bearer-token authentication for handlers.

use crate::error::{care_error, unauthenticated, ApiError};
use crate::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use carelink_core::Actor;

/// The caller resolved from `Authorization: Bearer <access token>`.
#[derive(Clone, Copy, Debug)]
pub struct AuthActor(pub Actor);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthenticated("Missing Authorization header"))?;
        let token = api_shared::auth::bearer_token(header)
            .ok_or_else(|| unauthenticated("Expected a Bearer token"))?;

        api_shared::auth::actor_from_token(&state.services, token)
            .map(AuthActor)
            .map_err(care_error)
    }
}
