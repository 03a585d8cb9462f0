//! # API REST
//!
//! REST API implementation for Carelink.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - bearer-token authentication and error-to-status mapping
//!
//! Uses `api-shared` for wire types and `carelink-core` for every rule.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
pub mod handlers;

use api_shared::{dto, pb};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use carelink_core::CareServices;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<CareServices>,
}

impl AppState {
    pub fn new(services: Arc<CareServices>) -> Self {
        Self { services }
    }
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::request_code,
        handlers::verify_code,
        handlers::run_match,
        handlers::get_match_run,
        handlers::publish_slot,
        handlers::list_slots,
        handlers::retract_slot,
        handlers::create_booking,
        handlers::list_bookings,
        handlers::get_booking,
        handlers::update_booking_status,
        handlers::add_session_note,
        handlers::list_session_notes,
        handlers::create_review,
        handlers::list_reviews,
        handlers::create_referral,
        handlers::list_referrals,
        handlers::get_referral,
        handlers::update_referral_status,
    ),
    components(schemas(
        pb::HealthRes,
        pb::RequestChallengeReq,
        pb::RequestChallengeRes,
        pb::VerifyChallengeReq,
        pb::VerifyChallengeRes,
        pb::UserSummary,
        dto::MatchTestReq,
        dto::MatchTestRes,
        dto::MatchDto,
        dto::MatchedPractitionerDto,
        dto::MatchRunDto,
        dto::MatchResultDto,
        dto::PublishSlotReq,
        dto::SlotDto,
        dto::CreateBookingReq,
        dto::BookingDto,
        dto::UpdateBookingStatusReq,
        dto::SessionNoteReq,
        dto::SessionNoteDto,
        dto::CreateReviewReq,
        dto::ReviewDto,
        dto::ReviewPageMetaDto,
        dto::ReviewPageDto,
        dto::CreateReferralReq,
        dto::ReferralDto,
        dto::NoteEntryDto,
        dto::UpdateReferralStatusReq,
        dto::MessageRes,
        dto::PageMetaDto,
        dto::SlotPage,
        dto::BookingPage,
        dto::ReferralPage,
        dto::SessionNotePage,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Every REST route plus Swagger UI, with permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/otp/request", post(handlers::request_code))
        .route("/auth/otp/verify", post(handlers::verify_code))
        .route("/matching/test", post(handlers::run_match))
        .route("/matching/test/:id", get(handlers::get_match_run))
        .route("/availability", post(handlers::publish_slot))
        .route("/availability/:id", delete(handlers::retract_slot))
        .route(
            "/practitioners/:id/availability",
            get(handlers::list_slots),
        )
        .route(
            "/bookings",
            post(handlers::create_booking).get(handlers::list_bookings),
        )
        .route("/bookings/:id", get(handlers::get_booking))
        .route("/bookings/:id/status", patch(handlers::update_booking_status))
        .route(
            "/bookings/:id/notes",
            post(handlers::add_session_note).get(handlers::list_session_notes),
        )
        .route(
            "/reviews",
            post(handlers::create_review).get(handlers::list_reviews),
        )
        .route(
            "/referrals",
            post(handlers::create_referral).get(handlers::list_referrals),
        )
        .route("/referrals/:id", get(handlers::get_referral))
        .route(
            "/referrals/:id/status",
            patch(handlers::update_referral_status),
        )
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
