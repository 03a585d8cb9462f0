//! Account directory.
//!
//! Users, practitioner profiles and clinic profiles are owned by the wider platform; the core
//! only needs to read them (existence checks, candidate lists, role re-checks) and, at login,
//! create or activate a patient account. [`AccountDirectory`] covers exactly that, plus loading
//! seed data for local deployments.
//!
//! Profiles share their owning user's id.

use crate::constants::{CLINICS_COLLECTION, PRACTITIONERS_COLLECTION, USERS_COLLECTION};
use crate::error::{CareError, CareResult};
use crate::repositories::{Entity, RecordStore, Repository, Versioned};
use crate::validation::{is_email_identifier, validate_identifier};
use carelink_types::Role;
use carelink_uuid::EntityId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    PendingVerification,
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::PendingVerification => "PENDING_VERIFICATION",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Suspended => "SUSPENDED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: EntityId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Display name as shown in match results.
    pub fn display_name(&self) -> String {
        display_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

/// `"{first|Dr.} {last|Practitioner}"`; empty names count as missing.
pub fn display_name(first: Option<&str>, last: Option<&str>) -> String {
    format!(
        "{} {}",
        first.filter(|s| !s.is_empty()).unwrap_or("Dr."),
        last.filter(|s| !s.is_empty()).unwrap_or("Practitioner")
    )
}

impl Entity for User {
    const COLLECTION: &'static str = USERS_COLLECTION;
    const LABEL: &'static str = "user";

    fn id(&self) -> EntityId {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PractitionerProfile {
    /// Owning user id.
    pub id: EntityId,
    pub title: Option<String>,
    pub specializations: Vec<String>,
    pub languages: Vec<String>,
    pub consultation_fee: Decimal,
    pub accepting_new_patients: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for PractitionerProfile {
    const COLLECTION: &'static str = PRACTITIONERS_COLLECTION;
    const LABEL: &'static str = "practitioner";

    fn id(&self) -> EntityId {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicProfile {
    /// Owning user id.
    pub id: EntityId,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for ClinicProfile {
    const COLLECTION: &'static str = CLINICS_COLLECTION;
    const LABEL: &'static str = "clinic";

    fn id(&self) -> EntityId {
        self.id
    }
}

/// A practitioner profile joined with its user's name.
#[derive(Clone, Debug, PartialEq)]
pub struct PractitionerListing {
    pub profile: PractitionerProfile,
    pub name: String,
}

// ============================================================================
// SEED FILES
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUser {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub practitioner: Option<SeedPractitioner>,
    pub clinic: Option<SeedClinic>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPractitioner {
    pub title: Option<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub consultation_fee: Decimal,
    #[serde(default = "default_accepting")]
    pub accepting_new_patients: bool,
}

fn default_accepting() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct SeedClinic {
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: usize,
    pub skipped: usize,
}

// ============================================================================
// DIRECTORY SERVICE
// ============================================================================

/// Read access to accounts and profiles, plus patient self-registration at login.
#[derive(Clone, Debug)]
pub struct AccountDirectory {
    users: Repository<User>,
    practitioners: Repository<PractitionerProfile>,
    clinics: Repository<ClinicProfile>,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            users: Repository::new(store.clone()),
            practitioners: Repository::new(store.clone()),
            clinics: Repository::new(store),
        }
    }

    pub fn user(&self, id: &EntityId) -> CareResult<User> {
        Ok(self.users.require(id)?.record)
    }

    /// Finds the user whose email (identifier containing `@`) or phone equals `identifier`.
    pub fn find_user_by_contact(&self, identifier: &str) -> CareResult<Option<Versioned<User>>> {
        let by_email = is_email_identifier(identifier);
        Ok(self.users.list_versioned()?.into_iter().find(|u| {
            let contact = if by_email {
                u.record.email.as_deref()
            } else {
                u.record.phone.as_deref()
            };
            contact == Some(identifier)
        }))
    }

    /// Inserts a new user. The email or phone must not already belong to another account.
    pub fn register_user(&self, user: &User) -> CareResult<()> {
        if user.email.is_none() && user.phone.is_none() {
            return Err(CareError::InvalidInput(
                "a user needs an email or a phone number".into(),
            ));
        }
        for contact in [user.email.as_deref(), user.phone.as_deref()]
            .into_iter()
            .flatten()
        {
            validate_identifier(contact)?;
            if self.find_user_by_contact(contact)?.is_some() {
                return Err(CareError::Conflict(format!(
                    "an account for '{}' already exists",
                    contact
                )));
            }
        }

        self.users.insert(user)?;
        tracing::info!("registered {} user {}", user.role, user.id);
        Ok(())
    }

    pub fn update_user(&self, expected_version: u64, user: &User) -> CareResult<Versioned<User>> {
        self.users.update(expected_version, user)
    }

    pub fn practitioner(&self, id: &EntityId) -> CareResult<PractitionerProfile> {
        Ok(self.practitioners.require(id)?.record)
    }

    pub fn practitioner_exists(&self, id: &EntityId) -> CareResult<bool> {
        self.practitioners.exists(id)
    }

    /// Every practitioner profile with its display name, in insertion order.
    pub fn practitioners(&self) -> CareResult<Vec<PractitionerListing>> {
        self.practitioners
            .list()?
            .into_iter()
            .map(|profile| {
                let name = match self.users.get(&profile.id)? {
                    Some(user) => user.record.display_name(),
                    None => display_name(None, None),
                };
                Ok(PractitionerListing { profile, name })
            })
            .collect()
    }

    pub fn add_practitioner_profile(&self, profile: &PractitionerProfile) -> CareResult<()> {
        self.users.require(&profile.id)?;
        if profile.consultation_fee.is_sign_negative() {
            return Err(CareError::InvalidInput(
                "consultation fee cannot be negative".into(),
            ));
        }
        self.practitioners.insert(profile)
    }

    pub fn clinic_exists(&self, id: &EntityId) -> CareResult<bool> {
        self.clinics.exists(id)
    }

    pub fn clinic(&self, id: &EntityId) -> CareResult<ClinicProfile> {
        Ok(self.clinics.require(id)?.record)
    }

    pub fn add_clinic_profile(&self, profile: &ClinicProfile) -> CareResult<()> {
        self.users.require(&profile.id)?;
        self.clinics.insert(profile)
    }

    /// Loads accounts from a YAML seed file. Entries whose email or phone is already registered
    /// are skipped.
    pub fn load_seed_file(&self, path: &Path) -> CareResult<SeedSummary> {
        let contents = std::fs::read_to_string(path).map_err(CareError::StorageRead)?;
        self.load_seed(&contents)
    }

    pub fn load_seed(&self, yaml: &str) -> CareResult<SeedSummary> {
        let seed: SeedFile = serde_yaml::from_str(yaml).map_err(CareError::YamlDeserialization)?;
        let mut summary = SeedSummary::default();

        for entry in seed.users {
            let known = [entry.email.as_deref(), entry.phone.as_deref()]
                .into_iter()
                .flatten()
                .map(|c| self.find_user_by_contact(c))
                .collect::<CareResult<Vec<_>>>()?
                .into_iter()
                .any(|found| found.is_some());
            if known {
                summary.skipped += 1;
                continue;
            }

            let now = Utc::now();
            let user = User {
                id: EntityId::new(),
                email_verified: entry.email.is_some(),
                phone_verified: entry.phone.is_some(),
                email: entry.email,
                phone: entry.phone,
                role: entry.role,
                status: AccountStatus::Active,
                first_name: entry.first_name,
                last_name: entry.last_name,
                created_at: now,
            };
            self.register_user(&user)?;

            if let Some(p) = entry.practitioner {
                self.add_practitioner_profile(&PractitionerProfile {
                    id: user.id,
                    title: p.title,
                    specializations: p.specializations,
                    languages: p.languages,
                    consultation_fee: p.consultation_fee,
                    accepting_new_patients: p.accepting_new_patients,
                    created_at: now,
                })?;
            }
            if let Some(c) = entry.clinic {
                self.add_clinic_profile(&ClinicProfile {
                    id: user.id,
                    name: c.name,
                    city: c.city,
                    country: c.country,
                    created_at: now,
                })?;
            }
            summary.created += 1;
        }

        tracing::info!(
            "seed loaded: {} created, {} skipped",
            summary.created,
            summary.skipped
        );
        Ok(summary)
    }
}
