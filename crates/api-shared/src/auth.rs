use carelink_core::{Actor, CareServices};
use std::env;

/// Validates the provided API key against `API_KEY` from the environment.
#[allow(clippy::result_large_err)]
pub fn validate_api_key(provided_key: &str) -> Result<(), tonic::Status> {
    let expected_key = env::var("API_KEY")
        .map_err(|_| tonic::Status::internal("API_KEY not set in environment"))?;

    if provided_key == expected_key {
        Ok(())
    } else {
        Err(tonic::Status::unauthenticated("Invalid API key"))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves an access token to the acting user.
pub fn actor_from_token(services: &CareServices, token: &str) -> carelink_core::CareResult<Actor> {
    let claims = services.auth.authenticate(token)?;
    Ok(Actor::new(claims.sub, claims.role))
}
