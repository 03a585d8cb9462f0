//! Route handlers.
//!
//! Handlers translate JSON to core calls and back; every rule lives in `carelink-core`.

use crate::error::{care_error, parse_id, ApiError};
use crate::extract::AuthActor;
use crate::AppState;
use api_shared::dto::{
    BookingDto, BookingPage, BookingQuery, CreateBookingReq, CreateReferralReq, CreateReviewReq,
    MatchRunDto, MatchTestReq, MatchTestRes, MessageRes, PageDto, PageQuery, PublishSlotReq,
    ReferralDto, ReferralPage, ReferralQuery, ReviewDto, ReviewPageDto, ReviewQuery,
    SessionNoteDto, SessionNotePage, SessionNoteReq, SlotDto, SlotPage, SlotQuery,
    UpdateBookingStatusReq, UpdateReferralStatusReq,
};
use api_shared::{convert, pb, HealthService};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use carelink_core::availability::DateRange;
use carelink_core::referral::ReferralView;
use carelink_core::PageRequest;

// ============================================================================
// HEALTH & IDENTITY
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = pb::HealthRes)
    )
)]
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<pb::HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/auth/otp/request",
    request_body = pb::RequestChallengeReq,
    responses(
        (status = 200, description = "Code issued", body = pb::RequestChallengeRes),
        (status = 400, description = "Malformed identifier"),
        (status = 500, description = "Internal server error")
    )
)]
/// Issue a one-time verification code for an email address or phone number.
///
/// The code itself is echoed back only outside production.
#[axum::debug_handler]
pub async fn request_code(
    State(state): State<AppState>,
    Json(req): Json<pb::RequestChallengeReq>,
) -> Result<Json<pb::RequestChallengeRes>, ApiError> {
    let issued = state
        .services
        .challenges
        .issue(&req.identifier)
        .map_err(care_error)?;
    Ok(Json(convert::challenge_res(&issued)))
}

#[utoipa::path(
    post,
    path = "/auth/otp/verify",
    request_body = pb::VerifyChallengeReq,
    responses(
        (status = 200, description = "Logged in", body = pb::VerifyChallengeRes),
        (status = 401, description = "Invalid, expired or exhausted code"),
        (status = 403, description = "Account suspended")
    )
)]
/// Verify a code and log in, creating a patient account on first use.
#[axum::debug_handler]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<pb::VerifyChallengeReq>,
) -> Result<Json<pb::VerifyChallengeRes>, ApiError> {
    let outcome = state
        .services
        .auth
        .login(&req.identifier, &req.code)
        .map_err(care_error)?;
    if outcome.created {
        tracing::info!("registered user {} on first login", outcome.user.id);
    }
    Ok(Json(convert::login_res(&outcome)))
}

// ============================================================================
// MATCHING
// ============================================================================

#[utoipa::path(
    post,
    path = "/matching/test",
    request_body = MatchTestReq,
    responses(
        (status = 200, description = "Ranked practitioners", body = MatchTestRes),
        (status = 400, description = "Invalid criteria")
    )
)]
/// Rank practitioners against the stated preferences.
///
/// Anonymous callers are allowed; a valid bearer token records the caller as requester.
#[axum::debug_handler]
pub async fn run_match(
    State(state): State<AppState>,
    actor: Option<AuthActor>,
    Json(req): Json<MatchTestReq>,
) -> Result<Json<MatchTestRes>, ApiError> {
    let requester = actor.map(|AuthActor(a)| a.id);
    let outcome = state
        .services
        .matching
        .run_match(req.into(), requester)
        .map_err(care_error)?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/matching/test/{id}",
    params(("id" = String, Path, description = "Match run id")),
    responses(
        (status = 200, description = "Stored match run", body = MatchRunDto),
        (status = 404, description = "Unknown run")
    )
)]
#[axum::debug_handler]
pub async fn get_match_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MatchRunDto>, ApiError> {
    let id = parse_id(&id)?;
    let run = state.services.matching.get_run(&id).map_err(care_error)?;
    Ok(Json(run.into()))
}

// ============================================================================
// AVAILABILITY
// ============================================================================

#[utoipa::path(
    post,
    path = "/availability",
    request_body = PublishSlotReq,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Window published", body = SlotDto),
        (status = 400, description = "Invalid window"),
        (status = 403, description = "Caller is not a practitioner"),
        (status = 404, description = "Caller has no practitioner profile")
    )
)]
#[axum::debug_handler]
pub async fn publish_slot(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<PublishSlotReq>,
) -> Result<(StatusCode, Json<SlotDto>), ApiError> {
    let new = req.into_new_slot().map_err(care_error)?;
    let slot = state
        .services
        .availability
        .publish(&actor, new)
        .map_err(care_error)?;
    Ok((StatusCode::CREATED, Json(slot.into())))
}

#[utoipa::path(
    get,
    path = "/practitioners/{id}/availability",
    params(("id" = String, Path, description = "Practitioner id"), SlotQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Windows by date then start time", body = SlotPage)
    )
)]
#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<AppState>,
    AuthActor(_actor): AuthActor,
    Path(id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<PageDto<SlotDto>>, ApiError> {
    let practitioner_id = parse_id(&id)?;
    let range = DateRange {
        start: query.start_date,
        end: query.end_date,
    };
    let page = state
        .services
        .availability
        .list(&practitioner_id, range, PageRequest::new(query.page, query.limit))
        .map_err(care_error)?;
    Ok(Json(PageDto::from_page(page)))
}

#[utoipa::path(
    delete,
    path = "/availability/{id}",
    params(("id" = String, Path, description = "Availability slot id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Window removed", body = MessageRes),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Window has booked labels")
    )
)]
#[axum::debug_handler]
pub async fn retract_slot(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<MessageRes>, ApiError> {
    let slot_id = parse_id(&id)?;
    state
        .services
        .availability
        .retract(&actor, &slot_id)
        .map_err(care_error)?;
    Ok(Json(MessageRes {
        message: "Availability deleted".into(),
    }))
}

// ============================================================================
// BOOKINGS
// ============================================================================

#[utoipa::path(
    post,
    path = "/bookings",
    request_body = CreateBookingReq,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Booking created", body = BookingDto),
        (status = 400, description = "Slot date or label mismatch"),
        (status = 404, description = "Unknown practitioner, clinic or slot"),
        (status = 409, description = "Slot label already claimed")
    )
)]
/// Book a session. The caller becomes the booking's patient.
#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreateBookingReq>,
) -> Result<(StatusCode, Json<BookingDto>), ApiError> {
    let booking = state
        .services
        .bookings
        .create(&actor, req.into())
        .map_err(care_error)?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

#[utoipa::path(
    get,
    path = "/bookings",
    params(BookingQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's bookings, newest first", body = BookingPage)
    )
)]
#[axum::debug_handler]
pub async fn list_bookings(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<BookingQuery>,
) -> Result<Json<PageDto<BookingDto>>, ApiError> {
    let page = state
        .services
        .bookings
        .list(&actor, query.status, PageRequest::new(query.page, query.limit))
        .map_err(care_error)?;
    Ok(Json(PageDto::from_page(page)))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    params(("id" = String, Path, description = "Booking id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Booking", body = BookingDto),
        (status = 403, description = "Caller is not a party"),
        (status = 404, description = "Unknown booking")
    )
)]
#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<BookingDto>, ApiError> {
    let booking_id = parse_id(&id)?;
    let booking = state
        .services
        .bookings
        .get(&actor, &booking_id)
        .map_err(care_error)?;
    Ok(Json(booking.into()))
}

#[utoipa::path(
    patch,
    path = "/bookings/{id}/status",
    params(("id" = String, Path, description = "Booking id")),
    request_body = UpdateBookingStatusReq,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated booking", body = BookingDto),
        (status = 403, description = "Caller is not a party"),
        (status = 404, description = "Unknown booking")
    )
)]
#[axum::debug_handler]
pub async fn update_booking_status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateBookingStatusReq>,
) -> Result<Json<BookingDto>, ApiError> {
    let booking_id = parse_id(&id)?;
    let booking = state
        .services
        .bookings
        .update_status(&actor, &booking_id, req.status, req.cancellation_reason)
        .map_err(care_error)?;
    Ok(Json(booking.into()))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/notes",
    params(("id" = String, Path, description = "Booking id")),
    request_body = SessionNoteReq,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Note added", body = SessionNoteDto),
        (status = 400, description = "Booking is not completed"),
        (status = 403, description = "Caller is not the booking's practitioner")
    )
)]
#[axum::debug_handler]
pub async fn add_session_note(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(req): Json<SessionNoteReq>,
) -> Result<(StatusCode, Json<SessionNoteDto>), ApiError> {
    let booking_id = parse_id(&id)?;
    let note = state
        .services
        .session_notes
        .add(&actor, &booking_id, req.into())
        .map_err(care_error)?;
    Ok((StatusCode::CREATED, Json(note.into())))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}/notes",
    params(("id" = String, Path, description = "Booking id"), PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Notes, newest first", body = SessionNotePage),
        (status = 403, description = "Caller is not a party")
    )
)]
#[axum::debug_handler]
pub async fn list_session_notes(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageDto<SessionNoteDto>>, ApiError> {
    let booking_id = parse_id(&id)?;
    let page = state
        .services
        .session_notes
        .list(&actor, &booking_id, query.request())
        .map_err(care_error)?;
    Ok(Json(PageDto::from_page(page)))
}

// ============================================================================
// REVIEWS
// ============================================================================

#[utoipa::path(
    post,
    path = "/reviews",
    request_body = CreateReviewReq,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Review recorded", body = ReviewDto),
        (status = 400, description = "Bad rating, no target, or no completed session"),
        (status = 403, description = "Caller is not a patient"),
        (status = 404, description = "Unknown practitioner or clinic")
    )
)]
#[axum::debug_handler]
pub async fn create_review(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreateReviewReq>,
) -> Result<(StatusCode, Json<ReviewDto>), ApiError> {
    let review = state
        .services
        .reviews
        .create(&actor, req.into())
        .map_err(care_error)?;
    Ok((StatusCode::CREATED, Json(review.into())))
}

#[utoipa::path(
    get,
    path = "/reviews",
    params(ReviewQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Reviews, newest first, with the average rating", body = ReviewPageDto)
    )
)]
#[axum::debug_handler]
pub async fn list_reviews(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<ReviewPageDto>, ApiError> {
    let page = state
        .services
        .reviews
        .list(&actor, query.filter(), PageRequest::new(query.page, query.limit))
        .map_err(care_error)?;
    Ok(Json(page.into()))
}

// ============================================================================
// REFERRALS
// ============================================================================

#[utoipa::path(
    post,
    path = "/referrals",
    request_body = CreateReferralReq,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Referral opened", body = ReferralDto),
        (status = 403, description = "Caller may not refer"),
        (status = 404, description = "Unknown patient")
    )
)]
#[axum::debug_handler]
pub async fn create_referral(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreateReferralReq>,
) -> Result<(StatusCode, Json<ReferralDto>), ApiError> {
    let referral = state
        .services
        .referrals
        .create(&actor, req.into())
        .map_err(care_error)?;
    Ok((StatusCode::CREATED, Json(referral.into())))
}

#[utoipa::path(
    get,
    path = "/referrals",
    params(ReferralQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Referrals, newest first", body = ReferralPage),
        (status = 400, description = "Unknown type")
    )
)]
#[axum::debug_handler]
pub async fn list_referrals(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ReferralQuery>,
) -> Result<Json<PageDto<ReferralDto>>, ApiError> {
    let view = match query.kind.as_deref() {
        Some(kind) => kind.parse::<ReferralView>().map_err(care_error)?,
        None => ReferralView::default(),
    };
    let page = state
        .services
        .referrals
        .list(&actor, view, PageRequest::new(query.page, query.limit))
        .map_err(care_error)?;
    Ok(Json(PageDto::from_page(page)))
}

#[utoipa::path(
    get,
    path = "/referrals/{id}",
    params(("id" = String, Path, description = "Referral id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Referral", body = ReferralDto),
        (status = 403, description = "Caller is not a party"),
        (status = 404, description = "Unknown referral")
    )
)]
#[axum::debug_handler]
pub async fn get_referral(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<ReferralDto>, ApiError> {
    let referral_id = parse_id(&id)?;
    let referral = state
        .services
        .referrals
        .get(&actor, &referral_id)
        .map_err(care_error)?;
    Ok(Json(referral.into()))
}

#[utoipa::path(
    patch,
    path = "/referrals/{id}/status",
    params(("id" = String, Path, description = "Referral id")),
    request_body = UpdateReferralStatusReq,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated referral", body = ReferralDto),
        (status = 403, description = "Transition not allowed for caller"),
        (status = 404, description = "Unknown referral")
    )
)]
/// Move a referral to a new status, optionally appending a note.
///
/// The target and the patient may set any status; the referrer may only decline.
#[axum::debug_handler]
pub async fn update_referral_status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateReferralStatusReq>,
) -> Result<Json<ReferralDto>, ApiError> {
    let referral_id = parse_id(&id)?;
    let referral = state
        .services
        .referrals
        .update_status(&actor, &referral_id, req.status, req.notes)
        .map_err(care_error)?;
    Ok(Json(referral.into()))
}
