//! REST request and response bodies.
//!
//! Bodies are `camelCase` JSON. Core enums keep their `SCREAMING_SNAKE_CASE` wire names and are
//! reused directly; identifiers, decimals and timestamps are documented as strings.

use carelink_core::availability::{AvailabilitySlot, NewSlot};
use carelink_core::booking::{Booking, BookingStatus, NewBooking, SessionType};
use carelink_core::matching::{Match, MatchCriteria, MatchOutcome, MatchRun, MatchRunStatus};
use carelink_core::pagination::{Page, PageMeta};
use carelink_core::referral::{
    NewReferral, NoteKind, Referral, ReferralPriority, ReferralStatus,
};
use carelink_core::reviews::{NewReview, Review, ReviewFilter, ReviewPage};
use carelink_core::session_notes::{NewSessionNote, SessionNote};
use carelink_core::validation::parse_time_label;
use carelink_core::{CareResult, EntityId, PageRequest};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// PAGING
// ============================================================================

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMetaDto {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl From<PageMeta> for PageMetaDto {
    fn from(m: PageMeta) -> Self {
        Self {
            total: m.total,
            page: m.page,
            limit: m.limit,
            total_pages: m.total_pages,
            has_next_page: m.has_next_page,
            has_prev_page: m.has_prev_page,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[aliases(
    SlotPage = PageDto<SlotDto>,
    BookingPage = PageDto<BookingDto>,
    ReferralPage = PageDto<ReferralDto>,
    SessionNotePage = PageDto<SessionNoteDto>
)]
pub struct PageDto<T> {
    pub data: Vec<T>,
    pub meta: PageMetaDto,
}

impl<T> PageDto<T> {
    pub fn from_page<U>(page: Page<U>) -> Self
    where
        T: From<U>,
    {
        let page = page.map(T::from);
        Self {
            data: page.data,
            meta: page.meta.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number, from 1.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

// ============================================================================
// MATCHING
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchTestReq {
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "50")]
    pub max_fee: Option<Decimal>,
    #[serde(default)]
    pub preferred_gender: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub preferences: Option<serde_json::Value>,
}

impl From<MatchTestReq> for MatchCriteria {
    fn from(r: MatchTestReq) -> Self {
        MatchCriteria {
            symptoms: r.symptoms,
            languages: r.languages,
            max_fee: r.max_fee,
            preferred_gender: r.preferred_gender,
            preferences: r.preferences,
        }
    }
}

impl From<MatchCriteria> for MatchTestReq {
    fn from(c: MatchCriteria) -> Self {
        MatchTestReq {
            symptoms: c.symptoms,
            languages: c.languages,
            max_fee: c.max_fee,
            preferred_gender: c.preferred_gender,
            preferences: c.preferences,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPractitionerDto {
    #[schema(value_type = String)]
    pub id: EntityId,
    pub name: String,
    pub specializations: Vec<String>,
    #[schema(value_type = String, example = "15000")]
    pub fee: Decimal,
    pub languages: Vec<String>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct MatchDto {
    pub practitioner: MatchedPractitionerDto,
    pub score: u8,
}

impl From<Match> for MatchDto {
    fn from(m: Match) -> Self {
        Self {
            practitioner: MatchedPractitionerDto {
                id: m.practitioner.id,
                name: m.practitioner.name,
                specializations: m.practitioner.specializations,
                fee: m.practitioner.fee,
                languages: m.practitioner.languages,
            },
            score: m.score,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchTestRes {
    #[schema(value_type = String)]
    pub test_id: EntityId,
    pub matches: Vec<MatchDto>,
}

impl From<MatchOutcome> for MatchTestRes {
    fn from(o: MatchOutcome) -> Self {
        Self {
            test_id: o.test_id,
            matches: o.matches.into_iter().map(MatchDto::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchResultDto {
    #[schema(value_type = String)]
    pub practitioner_id: EntityId,
    pub score: u8,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchRunDto {
    #[schema(value_type = String)]
    pub id: EntityId,
    #[schema(value_type = Option<String>)]
    pub requester_id: Option<EntityId>,
    pub criteria: MatchTestReq,
    #[schema(value_type = String, example = "COMPLETED")]
    pub status: MatchRunStatus,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    pub results: Vec<MatchResultDto>,
}

impl From<MatchRun> for MatchRunDto {
    fn from(r: MatchRun) -> Self {
        Self {
            id: r.id,
            requester_id: r.requester_id,
            criteria: r.criteria.into(),
            status: r.status,
            created_at: r.created_at,
            results: r
                .results
                .into_iter()
                .map(|m| MatchResultDto {
                    practitioner_id: m.practitioner_id,
                    score: m.score,
                })
                .collect(),
        }
    }
}

// ============================================================================
// AVAILABILITY
// ============================================================================

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishSlotReq {
    #[schema(value_type = String, example = "2026-03-02")]
    pub date: NaiveDate,
    #[schema(example = "09:00")]
    pub start_time: String,
    #[schema(example = "12:00")]
    pub end_time: String,
    #[serde(default)]
    pub slots: Vec<String>,
}

impl PublishSlotReq {
    pub fn into_new_slot(self) -> CareResult<NewSlot> {
        Ok(NewSlot {
            date: self.date,
            start_time: parse_time_label(&self.start_time)?,
            end_time: parse_time_label(&self.end_time)?,
            slots: self.slots,
        })
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotDto {
    #[schema(value_type = String)]
    pub id: EntityId,
    #[schema(value_type = String)]
    pub practitioner_id: EntityId,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub slots: Vec<String>,
    /// Labels already taken by a booking.
    pub booked_slots: Vec<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<AvailabilitySlot> for SlotDto {
    fn from(s: AvailabilitySlot) -> Self {
        Self {
            booked_slots: s.claims.iter().map(|c| c.label.clone()).collect(),
            id: s.id,
            practitioner_id: s.practitioner_id,
            date: s.date,
            start_time: s.start_time.format("%H:%M").to_string(),
            end_time: s.end_time.format("%H:%M").to_string(),
            slots: s.slots,
            created_at: s.created_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SlotQuery {
    /// Inclusive lower bound, `YYYY-MM-DD`.
    #[param(value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    #[param(value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// ============================================================================
// BOOKINGS
// ============================================================================

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingReq {
    #[schema(value_type = String)]
    pub practitioner_id: EntityId,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub clinic_id: Option<EntityId>,
    /// Availability slot to claim; the `HH:MM` of `scheduledAt` must be one of its labels.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub slot_id: Option<EntityId>,
    #[schema(value_type = String, example = "2026-03-02T09:00:00Z")]
    pub scheduled_at: DateTime<Utc>,
    #[schema(value_type = String, example = "VIDEO")]
    pub session_type: SessionType,
    /// Minutes; defaults to 60.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<CreateBookingReq> for NewBooking {
    fn from(r: CreateBookingReq) -> Self {
        NewBooking {
            practitioner_id: r.practitioner_id,
            clinic_id: r.clinic_id,
            slot_id: r.slot_id,
            scheduled_at: r.scheduled_at,
            session_type: r.session_type,
            duration_minutes: r.duration,
            notes: r.notes,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingDto {
    #[schema(value_type = String)]
    pub id: EntityId,
    #[schema(value_type = String)]
    pub patient_id: EntityId,
    #[schema(value_type = String)]
    pub practitioner_id: EntityId,
    #[schema(value_type = Option<String>)]
    pub clinic_id: Option<EntityId>,
    #[schema(value_type = Option<String>)]
    pub slot_id: Option<EntityId>,
    #[schema(value_type = String)]
    pub scheduled_at: DateTime<Utc>,
    #[schema(value_type = String, example = "VIDEO")]
    pub session_type: SessionType,
    pub duration: u32,
    #[schema(value_type = String, example = "PENDING")]
    pub status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            patient_id: b.patient_id,
            practitioner_id: b.practitioner_id,
            clinic_id: b.clinic_id,
            slot_id: b.slot_id,
            scheduled_at: b.scheduled_at,
            session_type: b.session_type,
            duration: b.duration_minutes,
            status: b.status,
            cancellation_reason: b.cancellation_reason,
            notes: b.notes,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookingQuery {
    /// Only bookings in this status.
    #[param(value_type = Option<String>, example = "CONFIRMED")]
    pub status: Option<BookingStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingStatusReq {
    #[schema(value_type = String, example = "CANCELED")]
    pub status: BookingStatus,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionNoteReq {
    pub notes: String,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<SessionNoteReq> for NewSessionNote {
    fn from(r: SessionNoteReq) -> Self {
        NewSessionNote {
            notes: r.notes,
            ai_summary: r.ai_summary,
            tags: r.tags,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionNoteDto {
    #[schema(value_type = String)]
    pub id: EntityId,
    #[schema(value_type = String)]
    pub booking_id: EntityId,
    #[schema(value_type = String)]
    pub practitioner_id: EntityId,
    pub notes: String,
    pub ai_summary: Option<String>,
    pub tags: Vec<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<SessionNote> for SessionNoteDto {
    fn from(n: SessionNote) -> Self {
        Self {
            id: n.id,
            booking_id: n.booking_id,
            practitioner_id: n.practitioner_id,
            notes: n.notes.into_inner(),
            ai_summary: n.ai_summary,
            tags: n.tags,
            created_at: n.created_at,
        }
    }
}

// ============================================================================
// REFERRALS
// ============================================================================

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferralReq {
    #[schema(value_type = String)]
    pub patient_id: EntityId,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub target_id: Option<EntityId>,
    #[serde(default)]
    pub target_specialty: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "ROUTINE")]
    pub priority: Option<ReferralPriority>,
}

impl From<CreateReferralReq> for NewReferral {
    fn from(r: CreateReferralReq) -> Self {
        NewReferral {
            patient_id: r.patient_id,
            target_id: r.target_id,
            target_specialty: r.target_specialty,
            reason: r.reason,
            notes: r.notes,
            priority: r.priority,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntryDto {
    /// `YYYYMMDDTHHMMSS.mmmZ-<id>`
    pub id: String,
    #[schema(value_type = String, example = "UPDATE")]
    pub kind: NoteKind,
    #[schema(value_type = String)]
    pub author_id: EntityId,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferralDto {
    #[schema(value_type = String)]
    pub id: EntityId,
    #[schema(value_type = String)]
    pub referrer_id: EntityId,
    #[schema(value_type = String)]
    pub patient_id: EntityId,
    #[schema(value_type = Option<String>)]
    pub target_id: Option<EntityId>,
    pub target_specialty: Option<String>,
    pub reason: String,
    /// All notes as one text, updates prefixed with `[Update]:`.
    pub notes: Option<String>,
    pub note_entries: Vec<NoteEntryDto>,
    #[schema(value_type = String, example = "ROUTINE")]
    pub priority: ReferralPriority,
    #[schema(value_type = String, example = "PENDING")]
    pub status: ReferralStatus,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl From<Referral> for ReferralDto {
    fn from(r: Referral) -> Self {
        Self {
            notes: r.notes_text(),
            note_entries: r
                .notes
                .into_iter()
                .map(|n| NoteEntryDto {
                    id: n.id.to_string(),
                    kind: n.kind,
                    author_id: n.author_id,
                    text: n.text,
                })
                .collect(),
            id: r.id,
            referrer_id: r.referrer_id,
            patient_id: r.patient_id,
            target_id: r.target_id,
            target_specialty: r.target_specialty,
            reason: r.reason.into_inner(),
            priority: r.priority,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReferralQuery {
    /// `sent` or `received` (default). Ignored for patients.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReferralStatusReq {
    #[schema(value_type = String, example = "ACCEPTED")]
    pub status: ReferralStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// REVIEWS
// ============================================================================

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewReq {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub practitioner_id: Option<EntityId>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub clinic_id: Option<EntityId>,
    #[schema(example = 5, minimum = 1, maximum = 5)]
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

impl From<CreateReviewReq> for NewReview {
    fn from(r: CreateReviewReq) -> Self {
        NewReview {
            practitioner_id: r.practitioner_id,
            clinic_id: r.clinic_id,
            rating: r.rating,
            comment: r.comment,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDto {
    #[schema(value_type = String)]
    pub id: EntityId,
    #[schema(value_type = String)]
    pub patient_id: EntityId,
    #[schema(value_type = Option<String>)]
    pub practitioner_id: Option<EntityId>,
    #[schema(value_type = Option<String>)]
    pub clinic_id: Option<EntityId>,
    pub rating: u8,
    pub comment: Option<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewDto {
    fn from(r: Review) -> Self {
        Self {
            id: r.id,
            patient_id: r.patient_id,
            practitioner_id: r.practitioner_id,
            clinic_id: r.clinic_id,
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at,
        }
    }
}

/// Page metadata plus the mean rating of every matching review.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPageMetaDto {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    #[schema(example = 4.3)]
    pub average_rating: f64,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ReviewPageDto {
    pub data: Vec<ReviewDto>,
    pub meta: ReviewPageMetaDto,
}

impl From<ReviewPage> for ReviewPageDto {
    fn from(r: ReviewPage) -> Self {
        let meta = r.page.meta;
        Self {
            data: r.page.data.into_iter().map(ReviewDto::from).collect(),
            meta: ReviewPageMetaDto {
                total: meta.total,
                page: meta.page,
                limit: meta.limit,
                total_pages: meta.total_pages,
                has_next_page: meta.has_next_page,
                has_prev_page: meta.has_prev_page,
                average_rating: r.average_rating.to_f64().unwrap_or_default(),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReviewQuery {
    /// Only reviews of this practitioner.
    #[param(value_type = Option<String>)]
    pub practitioner_id: Option<EntityId>,
    /// Only reviews of this clinic.
    #[param(value_type = Option<String>)]
    pub clinic_id: Option<EntityId>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ReviewQuery {
    pub fn filter(&self) -> ReviewFilter {
        ReviewFilter {
            practitioner_id: self.practitioner_id,
            clinic_id: self.clinic_id,
        }
    }
}
