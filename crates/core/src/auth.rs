//! Code-based login.

use crate::directory::{AccountDirectory, AccountStatus, User};
use crate::error::{CareError, CareResult};
use crate::identity::ChallengeService;
use crate::tokens::{TokenClaims, TokenIssuer, TokenKind, TokenPair};
use crate::validation::{is_email_identifier, validate_identifier};
use carelink_types::Role;
use carelink_uuid::EntityId;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: User,
    /// True when this login created the account.
    pub created: bool,
}

#[derive(Clone, Debug)]
pub struct AuthService {
    challenges: ChallengeService,
    directory: AccountDirectory,
    tokens: Arc<dyn TokenIssuer>,
}

impl AuthService {
    pub fn new(
        challenges: ChallengeService,
        directory: AccountDirectory,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            challenges,
            directory,
            tokens,
        }
    }

    /// Verifies the challenge, then locates or creates the account and issues a token pair.
    ///
    /// A new account is a `PATIENT`. Either way the contact point used is marked verified and
    /// the account becomes `ACTIVE`. A `SUSPENDED` account is refused before the code is looked
    /// at, so the challenge stays usable.
    pub fn login(&self, identifier: &str, code: &str) -> CareResult<LoginOutcome> {
        let contact = validate_identifier(identifier)?;
        if let Some(existing) = self.directory.find_user_by_contact(&contact)? {
            if existing.record.status == AccountStatus::Suspended {
                tracing::warn!("login refused for suspended user {}", existing.record.id);
                return Err(CareError::Forbidden("account is suspended".into()));
            }
        }

        let challenge = self.challenges.verify(&contact, code)?;
        let identifier = challenge.identifier.as_str();
        let by_email = is_email_identifier(identifier);

        let (user, created) = match self.directory.find_user_by_contact(identifier)? {
            Some(existing) => {
                let mut user = existing.record;
                mark_verified(&mut user, by_email);
                user.status = AccountStatus::Active;
                let saved = self.directory.update_user(existing.version, &user)?;
                (saved.record, false)
            }
            None => {
                let mut user = User {
                    id: EntityId::new(),
                    email: by_email.then(|| identifier.to_string()),
                    phone: (!by_email).then(|| identifier.to_string()),
                    role: Role::Patient,
                    status: AccountStatus::Active,
                    email_verified: false,
                    phone_verified: false,
                    first_name: None,
                    last_name: None,
                    created_at: Utc::now(),
                };
                mark_verified(&mut user, by_email);
                self.directory.register_user(&user)?;
                (user, true)
            }
        };

        let tokens = self.tokens.issue(&user)?;
        tracing::info!("user {} logged in", user.id);
        Ok(LoginOutcome {
            tokens,
            user,
            created,
        })
    }

    /// Resolves a bearer access token to its claims.
    pub fn authenticate(&self, access_token: &str) -> CareResult<TokenClaims> {
        self.tokens.verify(access_token, TokenKind::Access)
    }
}

fn mark_verified(user: &mut User, by_email: bool) {
    if by_email {
        user.email_verified = true;
    } else {
        user.phone_verified = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChallengeLookup, CoreConfig, Environment};
    use crate::notify::LogNotifier;
    use crate::repositories::{MemoryStore, RecordStore};
    use crate::tokens::EcdsaTokenIssuer;
    use std::path::PathBuf;

    fn setup() -> (AuthService, ChallengeService, AccountDirectory) {
        let cfg = Arc::new(
            CoreConfig::new(
                PathBuf::from("unused"),
                Environment::Development,
                ChallengeLookup::ExactCode,
            )
            .unwrap(),
        );
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let challenges = ChallengeService::new(cfg, store.clone(), Arc::new(LogNotifier));
        let directory = AccountDirectory::new(store);
        let auth = AuthService::new(
            challenges.clone(),
            directory.clone(),
            Arc::new(EcdsaTokenIssuer::generate().unwrap()),
        );
        (auth, challenges, directory)
    }

    #[test]
    fn first_login_creates_an_active_patient() {
        let (auth, challenges, directory) = setup();
        let code = challenges.issue("+250788123456").unwrap().code.unwrap();

        let outcome = auth.login("+250788123456", &code).unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.user.role, Role::Patient);
        assert_eq!(outcome.user.status, AccountStatus::Active);
        assert!(outcome.user.phone_verified);
        assert!(!outcome.user.email_verified);

        let stored = directory.user(&outcome.user.id).unwrap();
        assert_eq!(stored.phone.as_deref(), Some("+250788123456"));

        let claims = auth.authenticate(&outcome.tokens.access_token).unwrap();
        assert_eq!(claims.sub, outcome.user.id);
    }

    #[test]
    fn second_login_reuses_the_account() {
        let (auth, challenges, _) = setup();
        let first = challenges.issue("pat@example.com").unwrap().code.unwrap();
        let id = auth.login("pat@example.com", &first).unwrap().user.id;

        let second = challenges.issue("pat@example.com").unwrap().code.unwrap();
        let outcome = auth.login("pat@example.com", &second).unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.user.id, id);
        assert!(outcome.user.email_verified);
    }

    #[test]
    fn suspended_account_is_refused_without_spending_the_code() {
        let (auth, challenges, directory) = setup();
        let first = challenges.issue("pat@example.com").unwrap().code.unwrap();
        let id = auth.login("pat@example.com", &first).unwrap().user.id;

        let stored = directory.find_user_by_contact("pat@example.com").unwrap().unwrap();
        let mut user = stored.record;
        user.status = AccountStatus::Suspended;
        directory.update_user(stored.version, &user).unwrap();

        let code = challenges.issue("pat@example.com").unwrap().code.unwrap();
        assert!(matches!(
            auth.login(" pat@example.com ", &code).unwrap_err(),
            CareError::Forbidden(_)
        ));

        // The challenge was never touched, so it still verifies once the account is lifted.
        let stored = directory.find_user_by_contact("pat@example.com").unwrap().unwrap();
        let mut user = stored.record;
        user.status = AccountStatus::Active;
        directory.update_user(stored.version, &user).unwrap();
        let outcome = auth.login("pat@example.com", &code).unwrap();
        assert_eq!(outcome.user.id, id);
    }

    #[test]
    fn wrong_code_does_not_create_an_account() {
        let (auth, challenges, directory) = setup();
        let code = challenges.issue("pat@example.com").unwrap().code.unwrap();
        let wrong = if code == "123456" { "654321" } else { "123456" };

        assert!(auth.login("pat@example.com", wrong).is_err());
        assert!(directory
            .find_user_by_contact("pat@example.com")
            .unwrap()
            .is_none());
    }
}
