//! Booking lifecycle.
//!
//! ```text
//! PENDING ─▶ CONFIRMED ─▶ COMPLETED
//!    │           │
//!    └───────────┴──▶ CANCELED | NO_SHOW
//! ```
//!
//! The diagram is the intended flow. Every status change passes through
//! [`validate_booking_transition`], which currently accepts any pair.
//!
//! A booking may reference an availability slot. The slot label matching `scheduled_at` is
//! claimed before the booking is written and released again if that write fails, or when the
//! booking is later canceled. Moving a canceled booking back to any live status claims the label
//! again and fails with a conflict if someone else holds it by then.

use crate::availability::{hhmm, AvailabilityService};
use crate::capabilities::{Actor, Operation};
use crate::constants::{BOOKINGS_COLLECTION, DEFAULT_BOOKING_DURATION_MINUTES};
use crate::directory::AccountDirectory;
use crate::error::{CareError, CareResult};
use crate::pagination::{paginate, Page, PageRequest};
use crate::repositories::{Entity, RecordStore, Repository};
use carelink_types::Role;
use carelink_uuid::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    InPerson,
    Video,
    Audio,
    Phone,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Canceled,
    NoShow,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Canceled => "CANCELED",
            BookingStatus::NoShow => "NO_SHOW",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: EntityId,
    pub patient_id: EntityId,
    pub practitioner_id: EntityId,
    pub clinic_id: Option<EntityId>,
    pub slot_id: Option<EntityId>,
    pub scheduled_at: DateTime<Utc>,
    pub session_type: SessionType,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_party(&self, actor_id: &EntityId) -> bool {
        self.patient_id == *actor_id || self.practitioner_id == *actor_id
    }
}

impl Entity for Booking {
    const COLLECTION: &'static str = BOOKINGS_COLLECTION;
    const LABEL: &'static str = "booking";

    fn id(&self) -> EntityId {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBooking {
    pub practitioner_id: EntityId,
    pub clinic_id: Option<EntityId>,
    pub slot_id: Option<EntityId>,
    pub scheduled_at: DateTime<Utc>,
    pub session_type: SessionType,
    /// `None` means the default of 60 minutes.
    pub duration_minutes: Option<u32>,
    pub notes: Option<String>,
}

/// The single gate for status changes.
pub fn validate_booking_transition(_from: BookingStatus, _to: BookingStatus) -> CareResult<()> {
    Ok(())
}

#[derive(Clone, Debug)]
pub struct BookingService {
    directory: AccountDirectory,
    availability: AvailabilityService,
    bookings: Repository<Booking>,
}

impl BookingService {
    pub fn new(
        directory: AccountDirectory,
        availability: AvailabilityService,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            directory,
            availability,
            bookings: Repository::new(store),
        }
    }

    /// Books a session with the acting user as patient.
    pub fn create(&self, actor: &Actor, new: NewBooking) -> CareResult<Booking> {
        actor.authorize(Operation::CreateBooking)?;

        if !self.directory.practitioner_exists(&new.practitioner_id)? {
            return Err(CareError::NotFound(format!(
                "practitioner '{}'",
                new.practitioner_id
            )));
        }
        if let Some(clinic_id) = &new.clinic_id {
            if !self.directory.clinic_exists(clinic_id)? {
                return Err(CareError::NotFound(format!("clinic '{}'", clinic_id)));
            }
        }
        let duration_minutes = match new.duration_minutes {
            None => DEFAULT_BOOKING_DURATION_MINUTES,
            Some(0) => {
                return Err(CareError::InvalidInput(
                    "duration must be at least one minute".into(),
                ))
            }
            Some(d) => d,
        };

        let now = Utc::now();
        let booking = Booking {
            id: EntityId::new(),
            patient_id: actor.id,
            practitioner_id: new.practitioner_id,
            clinic_id: new.clinic_id,
            slot_id: new.slot_id,
            scheduled_at: new.scheduled_at,
            session_type: new.session_type,
            duration_minutes,
            status: BookingStatus::Pending,
            cancellation_reason: None,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };

        if let Some(slot_id) = &booking.slot_id {
            self.claim_slot(slot_id, &booking)?;
        }

        if let Err(e) = self.bookings.insert(&booking) {
            if let Some(slot_id) = &booking.slot_id {
                self.release_slot(slot_id, booking.id);
            }
            return Err(e);
        }

        tracing::info!(
            "booking {} created for patient {} with practitioner {}",
            booking.id,
            booking.patient_id,
            booking.practitioner_id
        );
        Ok(booking)
    }

    fn claim_slot(&self, slot_id: &EntityId, booking: &Booking) -> CareResult<()> {
        let current = self.availability.get(slot_id)?;
        let slot = &current.record;

        if slot.practitioner_id != booking.practitioner_id {
            return Err(CareError::InvalidInput(format!(
                "availability '{}' does not belong to practitioner '{}'",
                slot_id, booking.practitioner_id
            )));
        }
        if slot.date != booking.scheduled_at.date_naive() {
            return Err(CareError::InvalidInput(format!(
                "availability '{}' is for {}, not {}",
                slot_id,
                slot.date,
                booking.scheduled_at.date_naive()
            )));
        }

        let label = booking.scheduled_at.format(hhmm::FORMAT).to_string();
        if slot.claim_for(&label).map(|c| c.booking_id) == Some(booking.id) {
            return Ok(());
        }
        self.availability
            .claim(slot_id, &label, booking.id, current.version)?;
        Ok(())
    }

    /// Releases after the booking write has been decided. A failure here leaves a stale claim
    /// but never undoes the booking change, so it is logged rather than returned.
    fn release_slot(&self, slot_id: &EntityId, booking_id: EntityId) {
        if let Err(e) = self.availability.release(slot_id, booking_id) {
            tracing::error!(
                "failed to release slot {} for booking {}: {}",
                slot_id,
                booking_id,
                e
            );
        }
    }

    /// Patients see bookings they hold; every other role sees bookings where they are the
    /// practitioner. Newest `scheduled_at` first.
    pub fn list(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> CareResult<Page<Booking>> {
        actor.authorize(Operation::ListBookings)?;

        let as_patient = actor.role == Role::Patient;
        let mut found = self.bookings.filter(|b| {
            let mine = if as_patient {
                b.patient_id == actor.id
            } else {
                b.practitioner_id == actor.id
            };
            mine && status.map_or(true, |s| b.status == s)
        })?;
        found.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(paginate(found, page))
    }

    pub fn get(&self, actor: &Actor, booking_id: &EntityId) -> CareResult<Booking> {
        actor.authorize(Operation::ViewBooking)?;
        let booking = self.bookings.require(booking_id)?.record;
        if !booking.is_party(&actor.id) {
            tracing::warn!("actor {} denied booking {}", actor.id, booking_id);
            return Err(CareError::Forbidden(
                "not authorized to view this booking".into(),
            ));
        }
        Ok(booking)
    }

    pub fn update_status(
        &self,
        actor: &Actor,
        booking_id: &EntityId,
        status: BookingStatus,
        cancellation_reason: Option<String>,
    ) -> CareResult<Booking> {
        actor.authorize(Operation::UpdateBookingStatus)?;
        let current = self.bookings.require(booking_id)?;
        let mut booking = current.record;

        if !booking.is_party(&actor.id) {
            tracing::warn!("actor {} denied status change on booking {}", actor.id, booking_id);
            return Err(CareError::Forbidden(
                "not authorized to update this booking".into(),
            ));
        }
        validate_booking_transition(booking.status, status)?;

        let previous = booking.status;
        booking.status = status;
        if cancellation_reason.is_some() {
            booking.cancellation_reason = cancellation_reason;
        }
        booking.updated_at = Utc::now();

        // Leaving CANCELED takes the label back; it may have been booked meanwhile.
        let reclaim = previous == BookingStatus::Canceled && status != BookingStatus::Canceled;
        if reclaim {
            if let Some(slot_id) = &booking.slot_id {
                self.claim_slot(slot_id, &booking)?;
            }
        }

        let saved = match self.bookings.update(current.version, &booking) {
            Ok(saved) => saved.record,
            Err(e) => {
                if reclaim {
                    if let Some(slot_id) = &booking.slot_id {
                        self.release_slot(slot_id, booking.id);
                    }
                }
                return Err(e);
            }
        };

        if status == BookingStatus::Canceled && previous != BookingStatus::Canceled {
            if let Some(slot_id) = &saved.slot_id {
                self.release_slot(slot_id, saved.id);
            }
        }

        tracing::info!(
            "booking {} moved {} -> {} by {}",
            saved.id,
            previous,
            saved.status,
            actor.id
        );
        Ok(saved)
    }

    /// Booking lookup without a relationship check, for other services.
    pub(crate) fn require(&self, booking_id: &EntityId) -> CareResult<Booking> {
        Ok(self.bookings.require(booking_id)?.record)
    }

    /// True when the patient has at least one COMPLETED booking with the practitioner.
    pub(crate) fn has_completed_session(
        &self,
        patient_id: &EntityId,
        practitioner_id: &EntityId,
    ) -> CareResult<bool> {
        let completed = self.bookings.filter(|b| {
            b.patient_id == *patient_id
                && b.practitioner_id == *practitioner_id
                && b.status == BookingStatus::Completed
        })?;
        Ok(!completed.is_empty())
    }
}
