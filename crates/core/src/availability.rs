//! Availability ledger.
//!
//! A practitioner publishes windows (`date`, `start_time`..`end_time`) each carrying a list of
//! bookable `HH:MM` slot labels. Overlapping windows are allowed.
//!
//! Bookings may claim a label. Claims are recorded on the slot record itself and every claim or
//! release is a compare-and-swap against the version the slot was read at, so two bookings can
//! never hold the same label.

use crate::capabilities::{Actor, Operation};
use crate::constants::SLOTS_COLLECTION;
use crate::directory::AccountDirectory;
use crate::error::{CareError, CareResult};
use crate::pagination::{paginate, Page, PageRequest};
use crate::repositories::{Entity, RecordStore, Repository, Versioned};
use crate::validation::parse_time_label;
use carelink_uuid::EntityId;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serialises [`NaiveTime`] as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotClaim {
    pub label: String,
    pub booking_id: EntityId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub id: EntityId,
    pub practitioner_id: EntityId,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// Bookable `HH:MM` labels.
    pub slots: Vec<String>,
    #[serde(default)]
    pub claims: Vec<SlotClaim>,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn offers(&self, label: &str) -> bool {
        self.slots.iter().any(|s| s == label)
    }

    pub fn claim_for(&self, label: &str) -> Option<&SlotClaim> {
        self.claims.iter().find(|c| c.label == label)
    }

    /// Published labels without a claim, in published order.
    pub fn open_labels(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| self.claim_for(s).is_none())
            .map(String::as_str)
            .collect()
    }
}

impl Entity for AvailabilitySlot {
    const COLLECTION: &'static str = SLOTS_COLLECTION;
    const LABEL: &'static str = "availability slot";

    fn id(&self) -> EntityId {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slots: Vec<String>,
}

/// Inclusive date bounds; either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

#[derive(Clone, Debug)]
pub struct AvailabilityService {
    directory: AccountDirectory,
    slots: Repository<AvailabilitySlot>,
}

impl AvailabilityService {
    pub fn new(directory: AccountDirectory, store: Arc<dyn RecordStore>) -> Self {
        Self {
            directory,
            slots: Repository::new(store),
        }
    }

    /// Publishes a window for the acting practitioner.
    pub fn publish(&self, actor: &Actor, new: NewSlot) -> CareResult<AvailabilitySlot> {
        actor.authorize(Operation::PublishSlot)?;
        if !self.directory.practitioner_exists(&actor.id)? {
            return Err(CareError::NotFound(format!(
                "practitioner profile '{}'",
                actor.id
            )));
        }
        if new.start_time >= new.end_time {
            return Err(CareError::InvalidInput(
                "startTime must be before endTime".into(),
            ));
        }

        let mut labels: Vec<String> = Vec::with_capacity(new.slots.len());
        for raw in &new.slots {
            let label = parse_time_label(raw)?.format(hhmm::FORMAT).to_string();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }

        let slot = AvailabilitySlot {
            id: EntityId::new(),
            practitioner_id: actor.id,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            slots: labels,
            claims: Vec::new(),
            created_at: Utc::now(),
        };
        self.slots.insert(&slot)?;
        tracing::info!(
            "practitioner {} published slot {} on {}",
            slot.practitioner_id,
            slot.id,
            slot.date
        );
        Ok(slot)
    }

    /// Windows of one practitioner within `range`, by date then start time.
    pub fn list(
        &self,
        practitioner_id: &EntityId,
        range: DateRange,
        page: PageRequest,
    ) -> CareResult<Page<AvailabilitySlot>> {
        let mut found = self
            .slots
            .filter(|s| s.practitioner_id == *practitioner_id && range.contains(s.date))?;
        found.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        Ok(paginate(found, page))
    }

    pub fn get(&self, slot_id: &EntityId) -> CareResult<Versioned<AvailabilitySlot>> {
        self.slots.require(slot_id)
    }

    /// Deletes a window. Only its owner may, and not while any label is claimed.
    pub fn retract(&self, actor: &Actor, slot_id: &EntityId) -> CareResult<()> {
        actor.authorize(Operation::RetractSlot)?;
        let current = self.slots.require(slot_id)?;
        if current.record.practitioner_id != actor.id {
            tracing::warn!("actor {} tried to retract slot {}", actor.id, slot_id);
            return Err(CareError::Forbidden(
                "not authorized to delete this availability".into(),
            ));
        }
        if !current.record.claims.is_empty() {
            return Err(CareError::Conflict(format!(
                "availability slot '{}' has {} booked label(s)",
                slot_id,
                current.record.claims.len()
            )));
        }

        self.slots.delete(&current)?;
        tracing::info!("slot {} retracted", slot_id);
        Ok(())
    }

    /// Claims `label` for `booking_id`, provided the slot is still at `expected_version`.
    pub fn claim(
        &self,
        slot_id: &EntityId,
        label: &str,
        booking_id: EntityId,
        expected_version: u64,
    ) -> CareResult<Versioned<AvailabilitySlot>> {
        let current = self.slots.require(slot_id)?;
        if current.version != expected_version {
            return Err(CareError::Conflict(format!(
                "availability slot '{}' changed concurrently",
                slot_id
            )));
        }

        let mut slot = current.record;
        if !slot.offers(label) {
            return Err(CareError::InvalidInput(format!(
                "slot '{}' is not published in availability '{}'",
                label, slot_id
            )));
        }
        if slot.claim_for(label).is_some() {
            return Err(CareError::Conflict(format!(
                "slot '{}' on {} is already booked",
                label, slot.date
            )));
        }

        slot.claims.push(SlotClaim {
            label: label.to_string(),
            booking_id,
        });
        let saved = self.slots.update(expected_version, &slot)?;
        tracing::info!("booking {} claimed {} in slot {}", booking_id, label, slot_id);
        Ok(saved)
    }

    /// Drops any claim held by `booking_id`. A missing slot or claim is not an error.
    ///
    /// Like [`claim`](Self::claim) this is a single compare-and-swap; losing the race surfaces
    /// as `Conflict` to the caller.
    pub fn release(&self, slot_id: &EntityId, booking_id: EntityId) -> CareResult<()> {
        let Some(current) = self.slots.get(slot_id)? else {
            return Ok(());
        };
        let mut slot = current.record;
        let before = slot.claims.len();
        slot.claims.retain(|c| c.booking_id != booking_id);
        if slot.claims.len() == before {
            return Ok(());
        }

        self.slots.update(current.version, &slot)?;
        tracing::info!("booking {} released its claim on slot {}", booking_id, slot_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{AccountStatus, PractitionerProfile, User};
    use crate::repositories::MemoryStore;
    use carelink_types::Role;
    use rust_decimal::Decimal;

    fn setup() -> (AvailabilityService, Actor) {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let directory = AccountDirectory::new(store.clone());
        let now = Utc::now();
        let user = User {
            id: EntityId::new(),
            email: Some("doc@example.com".into()),
            phone: None,
            role: Role::Practitioner,
            status: AccountStatus::Active,
            email_verified: true,
            phone_verified: false,
            first_name: None,
            last_name: None,
            created_at: now,
        };
        directory.register_user(&user).unwrap();
        directory
            .add_practitioner_profile(&PractitionerProfile {
                id: user.id,
                title: None,
                specializations: vec![],
                languages: vec![],
                consultation_fee: Decimal::ZERO,
                accepting_new_patients: true,
                created_at: now,
            })
            .unwrap();
        (
            AvailabilityService::new(directory, store),
            Actor::new(user.id, Role::Practitioner),
        )
    }

    fn window(day: u32, start: u32, end: u32, labels: &[&str]) -> NewSlot {
        NewSlot {
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            slots: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn publish_validates_window_and_labels() {
        let (svc, doc) = setup();
        assert!(matches!(
            svc.publish(&doc, window(2, 12, 9, &[])).unwrap_err(),
            CareError::InvalidInput(_)
        ));
        assert!(matches!(
            svc.publish(&doc, window(2, 9, 12, &["9am"])).unwrap_err(),
            CareError::InvalidInput(_)
        ));

        let slot = svc.publish(&doc, window(2, 9, 12, &["09:00", "10:00", "09:00"])).unwrap();
        assert_eq!(slot.slots, vec!["09:00", "10:00"]);
    }

    #[test]
    fn publish_requires_profile_and_role() {
        let (svc, _) = setup();
        let stranger = Actor::new(EntityId::new(), Role::Practitioner);
        assert!(matches!(
            svc.publish(&stranger, window(2, 9, 12, &[])).unwrap_err(),
            CareError::NotFound(_)
        ));

        let patient = Actor::new(EntityId::new(), Role::Patient);
        assert!(matches!(
            svc.publish(&patient, window(2, 9, 12, &[])).unwrap_err(),
            CareError::Forbidden(_)
        ));
    }

    #[test]
    fn list_filters_inclusively_and_orders_by_date() {
        let (svc, doc) = setup();
        svc.publish(&doc, window(5, 9, 10, &[])).unwrap();
        svc.publish(&doc, window(3, 14, 15, &[])).unwrap();
        svc.publish(&doc, window(3, 9, 10, &[])).unwrap();
        svc.publish(&doc, window(1, 9, 10, &[])).unwrap();

        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2026, 3, 3),
            end: NaiveDate::from_ymd_opt(2026, 3, 5),
        };
        let page = svc.list(&doc.id, range, PageRequest::default()).unwrap();
        let keys: Vec<(u32, String)> = page
            .data
            .iter()
            .map(|s| (chrono::Datelike::day(&s.date), s.start_time.format("%H").to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![(3, "09".into()), (3, "14".into()), (5, "09".into())]
        );
    }

    #[test]
    fn claim_is_exclusive_and_version_checked() {
        let (svc, doc) = setup();
        let slot = svc.publish(&doc, window(2, 9, 12, &["09:00"])).unwrap();

        let first = svc.claim(&slot.id, "09:00", EntityId::new(), 1).unwrap();
        assert_eq!(first.version, 2);

        // Stale version.
        assert!(matches!(
            svc.claim(&slot.id, "09:00", EntityId::new(), 1).unwrap_err(),
            CareError::Conflict(_)
        ));
        // Fresh version, label taken.
        assert!(matches!(
            svc.claim(&slot.id, "09:00", EntityId::new(), 2).unwrap_err(),
            CareError::Conflict(_)
        ));
        // Unpublished label.
        assert!(matches!(
            svc.claim(&slot.id, "11:00", EntityId::new(), 2).unwrap_err(),
            CareError::InvalidInput(_)
        ));
    }

    #[test]
    fn release_is_a_single_swap_that_keeps_other_claims() {
        let (svc, doc) = setup();
        let slot = svc.publish(&doc, window(2, 9, 12, &["09:00", "10:00"])).unwrap();
        let (a, b) = (EntityId::new(), EntityId::new());

        svc.claim(&slot.id, "09:00", a, 1).unwrap();
        svc.claim(&slot.id, "10:00", b, 2).unwrap();

        svc.release(&slot.id, a).unwrap();
        let after = svc.get(&slot.id).unwrap();
        assert_eq!(after.version, 4);
        assert_eq!(after.record.open_labels(), vec!["09:00"]);
        assert_eq!(after.record.claim_for("10:00").unwrap().booking_id, b);

        // Nothing left to drop: no write happens.
        svc.release(&slot.id, a).unwrap();
        svc.release(&EntityId::new(), a).unwrap();
        assert_eq!(svc.get(&slot.id).unwrap().version, 4);
    }

    #[test]
    fn retract_rules() {
        let (svc, doc) = setup();
        let slot = svc.publish(&doc, window(2, 9, 12, &["09:00"])).unwrap();

        let other = Actor::new(EntityId::new(), Role::Practitioner);
        assert!(matches!(
            svc.retract(&other, &slot.id).unwrap_err(),
            CareError::Forbidden(_)
        ));

        let booking = EntityId::new();
        svc.claim(&slot.id, "09:00", booking, 1).unwrap();
        assert!(matches!(
            svc.retract(&doc, &slot.id).unwrap_err(),
            CareError::Conflict(_)
        ));

        svc.release(&slot.id, booking).unwrap();
        svc.retract(&doc, &slot.id).unwrap();
        assert!(matches!(
            svc.retract(&doc, &slot.id).unwrap_err(),
            CareError::NotFound(_)
        ));
    }

    #[test]
    fn hhmm_serialisation() {
        let (svc, doc) = setup();
        let slot = svc.publish(&doc, window(2, 9, 12, &[])).unwrap();
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["startTime"], "09:00");
        assert_eq!(json["endTime"], "12:00");
        assert_eq!(json["date"], "2026-03-02");
    }
}
