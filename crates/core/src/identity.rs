//! Identity challenges.
//!
//! A challenge is a short numeric code bound to an identifier (email address or phone number).
//! Challenges are created on request and never deleted; the only mutations are the attempt
//! counter and the one-way `verified` flip:
//!
//! ```text
//! unverified ──verify──▶ verified (terminal)
//!      │
//!      └── now > expires_at: abandoned (computed at read time, nothing is written)
//! ```
//!
//! Issuing a new challenge does not invalidate older ones. Verification always works on the
//! most recently created unverified row; how that row is located is governed by
//! [`ChallengeLookup`].

use crate::config::{ChallengeLookup, CoreConfig};
use crate::constants::{
    CHALLENGES_COLLECTION, CHALLENGE_CODE_LENGTH, CHALLENGE_MAX_ATTEMPTS, CHALLENGE_TTL_MINUTES,
};
use crate::error::{CareError, CareResult, ErrorKind};
use crate::notify::NotificationSender;
use crate::repositories::{Entity, RecordStore, Repository, Versioned};
use crate::validation::validate_identifier;
use carelink_uuid::EntityId;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityChallenge {
    pub id: EntityId,
    pub identifier: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub verified: bool,
}

impl IdentityChallenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl Entity for IdentityChallenge {
    const COLLECTION: &'static str = CHALLENGES_COLLECTION;
    const LABEL: &'static str = "identity challenge";

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Result of issuing a challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub challenge_id: EntityId,
    pub identifier: String,
    pub expires_at: DateTime<Utc>,
    /// Present only outside production.
    pub code: Option<String>,
}

impl IssuedChallenge {
    pub fn message(&self) -> &'static str {
        "Verification code sent"
    }
}

/// Draws a fixed-length numeric code from the thread-local CSPRNG.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[derive(Clone, Debug)]
pub struct ChallengeService {
    cfg: Arc<CoreConfig>,
    challenges: Repository<IdentityChallenge>,
    notifier: Arc<dyn NotificationSender>,
}

impl ChallengeService {
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            cfg,
            challenges: Repository::new(store),
            notifier,
        }
    }

    pub fn issue(&self, identifier: &str) -> CareResult<IssuedChallenge> {
        self.issue_at(identifier, Utc::now())
    }

    pub fn issue_at(&self, identifier: &str, now: DateTime<Utc>) -> CareResult<IssuedChallenge> {
        let identifier = validate_identifier(identifier)?;
        let challenge = IdentityChallenge {
            id: EntityId::new(),
            identifier,
            code: generate_code(CHALLENGE_CODE_LENGTH),
            created_at: now,
            expires_at: now + Duration::minutes(CHALLENGE_TTL_MINUTES),
            attempts: 0,
            verified: false,
        };

        self.challenges.insert(&challenge)?;
        self.notifier
            .send_code(&challenge.identifier, &challenge.code)?;
        tracing::info!(
            "issued challenge {} for {}",
            challenge.id,
            challenge.identifier
        );

        Ok(IssuedChallenge {
            challenge_id: challenge.id,
            expires_at: challenge.expires_at,
            code: self
                .cfg
                .environment()
                .exposes_challenge_codes()
                .then(|| challenge.code.clone()),
            identifier: challenge.identifier,
        })
    }

    pub fn verify(&self, identifier: &str, code: &str) -> CareResult<IdentityChallenge> {
        self.verify_at(identifier, code, Utc::now())
    }

    /// Verifies `code` for `identifier` as of `now`, returning the challenge in its verified
    /// state.
    pub fn verify_at(
        &self,
        identifier: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> CareResult<IdentityChallenge> {
        let identifier = validate_identifier(identifier)?;
        let code = code.trim();
        let policy = self.cfg.challenge_lookup();

        let found = match policy {
            ChallengeLookup::ExactCode => {
                self.latest_unverified(|c| c.identifier == identifier && c.code == code)?
            }
            ChallengeLookup::LatestForIdentifier => {
                self.latest_unverified(|c| c.identifier == identifier)?
            }
        };
        let Some(Versioned {
            version,
            record: mut challenge,
        }) = found
        else {
            tracing::warn!("no pending challenge matched for {}", identifier);
            return Err(CareError::InvalidCode);
        };

        if challenge.is_expired_at(now) {
            return Err(CareError::Expired);
        }
        if challenge.attempts >= CHALLENGE_MAX_ATTEMPTS {
            return Err(CareError::AttemptsExceeded);
        }

        if challenge.code != code {
            // Only reachable under LatestForIdentifier.
            challenge.attempts += 1;
            self.save(version, &challenge)?;
            tracing::warn!(
                "wrong code for challenge {} (attempt {})",
                challenge.id,
                challenge.attempts
            );
            return Err(CareError::InvalidCode);
        }

        challenge.verified = true;
        self.save(version, &challenge)?;
        tracing::info!("verified challenge {}", challenge.id);
        Ok(challenge)
    }

    /// Most recently created unverified challenge matching `predicate`; on equal creation
    /// times the later insert wins.
    fn latest_unverified(
        &self,
        predicate: impl Fn(&IdentityChallenge) -> bool,
    ) -> CareResult<Option<Versioned<IdentityChallenge>>> {
        Ok(self
            .challenges
            .list_versioned()?
            .into_iter()
            .filter(|c| !c.record.verified && predicate(&c.record))
            .max_by_key(|c| c.record.created_at))
    }

    /// A concurrent verification of the same row surfaces as `InvalidCode`.
    fn save(&self, version: u64, challenge: &IdentityChallenge) -> CareResult<()> {
        match self.challenges.update(version, challenge) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::Conflict => Err(CareError::InvalidCode),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::notify::LogNotifier;
    use crate::repositories::MemoryStore;
    use std::path::PathBuf;

    fn service(env: Environment, lookup: ChallengeLookup) -> ChallengeService {
        let cfg = CoreConfig::new(PathBuf::from("unused"), env, lookup).unwrap();
        ChallengeService::new(
            Arc::new(cfg),
            Arc::new(MemoryStore::new()),
            Arc::new(LogNotifier),
        )
    }

    fn dev(lookup: ChallengeLookup) -> ChallengeService {
        service(Environment::Development, lookup)
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code(CHALLENGE_CODE_LENGTH);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn issue_rejects_blank_identifier() {
        let svc = dev(ChallengeLookup::ExactCode);
        assert!(matches!(
            svc.issue("  ").unwrap_err(),
            CareError::InvalidInput(_)
        ));
    }

    #[test]
    fn production_does_not_expose_the_code() {
        let svc = service(Environment::Production, ChallengeLookup::ExactCode);
        let issued = svc.issue("pat@example.com").unwrap();
        assert!(issued.code.is_none());
    }

    #[test]
    fn issued_challenge_expires_after_ten_minutes() {
        let svc = dev(ChallengeLookup::ExactCode);
        let now = Utc::now();
        let issued = svc.issue_at("pat@example.com", now).unwrap();
        assert_eq!(issued.expires_at, now + Duration::minutes(10));

        let code = issued.code.unwrap();
        let err = svc
            .verify_at("pat@example.com", &code, now + Duration::minutes(11))
            .unwrap_err();
        assert!(matches!(err, CareError::Expired));
    }

    #[test]
    fn verified_challenge_cannot_be_reverified() {
        let svc = dev(ChallengeLookup::ExactCode);
        let code = svc.issue("pat@example.com").unwrap().code.unwrap();

        let verified = svc.verify("pat@example.com", &code).unwrap();
        assert!(verified.verified);
        assert!(matches!(
            svc.verify("pat@example.com", &code).unwrap_err(),
            CareError::InvalidCode
        ));
    }

    #[test]
    fn exact_code_never_counts_wrong_attempts() {
        let svc = dev(ChallengeLookup::ExactCode);
        let code = svc.issue("pat@example.com").unwrap().code.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..5 {
            assert!(matches!(
                svc.verify("pat@example.com", wrong).unwrap_err(),
                CareError::InvalidCode
            ));
        }
        assert!(svc.verify("pat@example.com", &code).is_ok());
    }

    #[test]
    fn identifiers_do_not_share_codes() {
        let svc = dev(ChallengeLookup::ExactCode);
        let code = svc.issue("a@example.com").unwrap().code.unwrap();
        assert!(matches!(
            svc.verify("b@example.com", &code).unwrap_err(),
            CareError::InvalidCode
        ));
    }
}
