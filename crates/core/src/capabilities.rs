//! Role capabilities.
//!
//! Which roles may *attempt* an operation is decided here, once per request, from a single
//! table. Relationship checks (is this actor the booking's patient? the referral's target?)
//! happen afterwards inside each service and are reported separately.

use crate::error::{CareError, CareResult};
use carelink_types::Role;
use carelink_uuid::EntityId;
use std::fmt;

/// Operations gated by role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    RunMatch,
    ViewMatchRun,
    PublishSlot,
    ListSlots,
    RetractSlot,
    CreateBooking,
    ListBookings,
    ViewBooking,
    UpdateBookingStatus,
    CreateReferral,
    ListReferrals,
    ViewReferral,
    UpdateReferralStatus,
    AddSessionNote,
    ListSessionNotes,
    CreateReview,
    ListReviews,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The capability table.
pub fn allows(role: Role, operation: Operation) -> bool {
    use Operation::*;

    match operation {
        PublishSlot | RetractSlot | AddSessionNote => matches!(role, Role::Practitioner),
        CreateReferral => matches!(role, Role::Practitioner | Role::ClinicStaff),
        CreateReview => matches!(role, Role::Patient),
        RunMatch | ViewMatchRun | ListSlots | CreateBooking | ListBookings | ViewBooking
        | UpdateBookingStatus | ListReferrals | ViewReferral | UpdateReferralStatus
        | ListSessionNotes | ListReviews => true,
    }
}

/// The authenticated caller of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: EntityId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: EntityId, role: Role) -> Self {
        Self { id, role }
    }

    /// Fails with [`CareError::Forbidden`] if the actor's role may not attempt `operation`.
    pub fn authorize(&self, operation: Operation) -> CareResult<()> {
        if allows(self.role, operation) {
            Ok(())
        } else {
            tracing::warn!(
                "role {} denied {} for actor {}",
                self.role,
                operation,
                self.id
            );
            Err(CareError::Forbidden(format!(
                "role {} may not perform {}",
                self.role, operation
            )))
        }
    }
}
