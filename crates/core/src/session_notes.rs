//! Session notes: append-only clinical notes on completed bookings.

use crate::booking::{BookingService, BookingStatus};
use crate::capabilities::{Actor, Operation};
use crate::constants::SESSION_NOTES_COLLECTION;
use crate::error::{CareError, CareResult};
use crate::pagination::{paginate, Page, PageRequest};
use crate::repositories::{Entity, RecordStore, Repository};
use carelink_types::NonEmptyText;
use carelink_uuid::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNote {
    pub id: EntityId,
    pub booking_id: EntityId,
    pub practitioner_id: EntityId,
    pub notes: NonEmptyText,
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for SessionNote {
    const COLLECTION: &'static str = SESSION_NOTES_COLLECTION;
    const LABEL: &'static str = "session note";

    fn id(&self) -> EntityId {
        self.id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewSessionNote {
    pub notes: String,
    pub ai_summary: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SessionNoteService {
    bookings: BookingService,
    notes: Repository<SessionNote>,
}

impl SessionNoteService {
    pub fn new(bookings: BookingService, store: Arc<dyn RecordStore>) -> Self {
        Self {
            bookings,
            notes: Repository::new(store),
        }
    }

    pub fn add(
        &self,
        actor: &Actor,
        booking_id: &EntityId,
        new: NewSessionNote,
    ) -> CareResult<SessionNote> {
        actor.authorize(Operation::AddSessionNote)?;
        let booking = self.bookings.require(booking_id)?;

        if booking.practitioner_id != actor.id {
            tracing::warn!("actor {} denied notes on booking {}", actor.id, booking_id);
            return Err(CareError::Forbidden(
                "not authorized to add notes to this session".into(),
            ));
        }
        if booking.status != BookingStatus::Completed {
            return Err(CareError::InvalidInput(format!(
                "notes can only be added to a COMPLETED booking (booking is {})",
                booking.status
            )));
        }

        let note = SessionNote {
            id: EntityId::new(),
            booking_id: booking.id,
            practitioner_id: actor.id,
            notes: NonEmptyText::new(&new.notes)?,
            ai_summary: new.ai_summary,
            tags: new.tags,
            created_at: Utc::now(),
        };
        self.notes.insert(&note)?;
        tracing::info!("session note {} added to booking {}", note.id, booking.id);
        Ok(note)
    }

    /// Notes of one booking, newest first. Only the booking's patient and practitioner may read.
    pub fn list(
        &self,
        actor: &Actor,
        booking_id: &EntityId,
        page: PageRequest,
    ) -> CareResult<Page<SessionNote>> {
        actor.authorize(Operation::ListSessionNotes)?;
        let booking = self.bookings.require(booking_id)?;
        if !booking.is_party(&actor.id) {
            tracing::warn!("actor {} denied notes of booking {}", actor.id, booking_id);
            return Err(CareError::Forbidden(
                "not authorized to view these notes".into(),
            ));
        }

        let mut found = self.notes.filter(|n| n.booking_id == booking.id)?;
        // Reversed first so equal timestamps list the later insert first.
        found.reverse();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(found, page))
    }
}
