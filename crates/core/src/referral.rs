//! Referral lifecycle.
//!
//! A referral hands a patient from a referrer to either a named practitioner (`target_id`) or a
//! specialty (`target_specialty`). It is independent of bookings.
//!
//! Who may change status:
//! - the target and the patient: any status;
//! - the referrer: only to `DECLINED` (withdrawal);
//! - anyone else: `Forbidden`.
//!
//! Notes are kept as an ordered list of timestamped entries. [`Referral::notes_text`] renders
//! them as one string, each update appended as `"\n[Update]: {note}"`.
//!
//! Referrals addressed only by specialty appear in the referrer's `sent` view and in nobody's
//! `received` view.

use crate::capabilities::{Actor, Operation};
use crate::constants::REFERRALS_COLLECTION;
use crate::directory::AccountDirectory;
use crate::error::{CareError, CareResult};
use crate::pagination::{paginate, Page, PageRequest};
use crate::repositories::{Entity, RecordStore, Repository};
use carelink_types::{NonEmptyText, Role};
use carelink_uuid::{EntityId, TimestampId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralPriority {
    #[default]
    Routine,
    Urgent,
    Emergency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferralStatus::Pending => "PENDING",
            ReferralStatus::Accepted => "ACCEPTED",
            ReferralStatus::Declined => "DECLINED",
            ReferralStatus::Completed => "COMPLETED",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteKind {
    Initial,
    Update,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    pub id: TimestampId,
    pub kind: NoteKind,
    pub author_id: EntityId,
    pub text: String,
}

/// Which side of a referral a non-patient wants to see.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReferralView {
    Sent,
    #[default]
    Received,
}

impl FromStr for ReferralView {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sent" => Ok(ReferralView::Sent),
            "received" => Ok(ReferralView::Received),
            other => Err(CareError::InvalidInput(format!(
                "unknown referral type '{}' (expected sent or received)",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: EntityId,
    pub referrer_id: EntityId,
    pub patient_id: EntityId,
    pub target_id: Option<EntityId>,
    pub target_specialty: Option<String>,
    pub reason: NonEmptyText,
    #[serde(default)]
    pub notes: Vec<NoteEntry>,
    pub priority: ReferralPriority,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    /// Concatenated notes; `None` when there are none.
    pub fn notes_text(&self) -> Option<String> {
        self.notes.iter().fold(None, |acc, entry| match entry.kind {
            NoteKind::Initial => Some(entry.text.clone()),
            NoteKind::Update => Some(format!(
                "{}\n[Update]: {}",
                acc.unwrap_or_default(),
                entry.text
            )),
        })
    }

    pub fn is_party(&self, actor_id: &EntityId) -> bool {
        self.referrer_id == *actor_id
            || self.patient_id == *actor_id
            || self.target_id.as_ref() == Some(actor_id)
    }

    fn append_note(&mut self, kind: NoteKind, author_id: EntityId, text: String) {
        let id = TimestampId::generate(self.notes.last().map(|n| &n.id));
        self.notes.push(NoteEntry {
            id,
            kind,
            author_id,
            text,
        });
    }
}

impl Entity for Referral {
    const COLLECTION: &'static str = REFERRALS_COLLECTION;
    const LABEL: &'static str = "referral";

    fn id(&self) -> EntityId {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReferral {
    pub patient_id: EntityId,
    pub target_id: Option<EntityId>,
    pub target_specialty: Option<String>,
    pub reason: String,
    pub notes: Option<String>,
    pub priority: Option<ReferralPriority>,
}

/// Status change permission, evaluated after the referral has been loaded.
pub fn may_update_referral(referral: &Referral, actor_id: &EntityId, to: ReferralStatus) -> bool {
    referral.target_id.as_ref() == Some(actor_id)
        || referral.patient_id == *actor_id
        || (referral.referrer_id == *actor_id && to == ReferralStatus::Declined)
}

#[derive(Clone, Debug)]
pub struct ReferralService {
    directory: AccountDirectory,
    referrals: Repository<Referral>,
}

impl ReferralService {
    pub fn new(directory: AccountDirectory, store: Arc<dyn RecordStore>) -> Self {
        Self {
            directory,
            referrals: Repository::new(store),
        }
    }

    pub fn create(&self, actor: &Actor, new: NewReferral) -> CareResult<Referral> {
        actor.authorize(Operation::CreateReferral)?;

        // The token's role may be stale; the stored account decides.
        let referrer = self.directory.user(&actor.id)?;
        if !matches!(referrer.role, Role::Practitioner | Role::ClinicStaff) {
            tracing::warn!("user {} with role {} tried to refer", referrer.id, referrer.role);
            return Err(CareError::Forbidden(
                "only practitioners and staff can create referrals".into(),
            ));
        }
        self.directory.user(&new.patient_id)?;
        let reason = NonEmptyText::new(&new.reason)?;

        let now = Utc::now();
        let mut referral = Referral {
            id: EntityId::new(),
            referrer_id: referrer.id,
            patient_id: new.patient_id,
            target_id: new.target_id,
            target_specialty: new
                .target_specialty
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            reason,
            notes: Vec::new(),
            priority: new.priority.unwrap_or_default(),
            status: ReferralStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        if let Some(text) = new.notes.filter(|n| !n.trim().is_empty()) {
            referral.append_note(NoteKind::Initial, referrer.id, text);
        }

        self.referrals.insert(&referral)?;
        tracing::info!(
            "referral {} created by {} for patient {}",
            referral.id,
            referral.referrer_id,
            referral.patient_id
        );
        Ok(referral)
    }

    /// Patients see referrals naming them. Everyone else sees what they sent, or what names
    /// them as target. Newest first.
    pub fn list(
        &self,
        actor: &Actor,
        view: ReferralView,
        page: PageRequest,
    ) -> CareResult<Page<Referral>> {
        actor.authorize(Operation::ListReferrals)?;

        let mut found = self.referrals.filter(|r| match (actor.role, view) {
            (Role::Patient, _) => r.patient_id == actor.id,
            (_, ReferralView::Sent) => r.referrer_id == actor.id,
            (_, ReferralView::Received) => r.target_id == Some(actor.id),
        })?;
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(found, page))
    }

    pub fn get(&self, actor: &Actor, referral_id: &EntityId) -> CareResult<Referral> {
        actor.authorize(Operation::ViewReferral)?;
        let referral = self.referrals.require(referral_id)?.record;
        if !referral.is_party(&actor.id) {
            tracing::warn!("actor {} denied referral {}", actor.id, referral_id);
            return Err(CareError::Forbidden(
                "not authorized to view this referral".into(),
            ));
        }
        Ok(referral)
    }

    pub fn update_status(
        &self,
        actor: &Actor,
        referral_id: &EntityId,
        status: ReferralStatus,
        note: Option<String>,
    ) -> CareResult<Referral> {
        actor.authorize(Operation::UpdateReferralStatus)?;
        let current = self.referrals.require(referral_id)?;
        let mut referral = current.record;

        if !may_update_referral(&referral, &actor.id, status) {
            tracing::warn!(
                "actor {} denied moving referral {} to {}",
                actor.id,
                referral_id,
                status
            );
            return Err(CareError::Forbidden(
                "not authorized to update this referral".into(),
            ));
        }

        referral.status = status;
        if let Some(text) = note.filter(|n| !n.trim().is_empty()) {
            referral.append_note(NoteKind::Update, actor.id, text);
        }
        referral.updated_at = Utc::now();

        let saved = self.referrals.update(current.version, &referral)?.record;
        tracing::info!("referral {} is now {}", saved.id, saved.status);
        Ok(saved)
    }
}
