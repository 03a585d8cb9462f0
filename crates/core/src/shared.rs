//! Service wiring shared by every entry point.
//!
//! The REST server, the gRPC server and the CLI all build one [`CareServices`] at startup and
//! share it (behind `Arc`) across requests.

use crate::auth::AuthService;
use crate::availability::AvailabilityService;
use crate::booking::BookingService;
use crate::config::CoreConfig;
use crate::directory::AccountDirectory;
use crate::error::CareResult;
use crate::identity::ChallengeService;
use crate::matching::MatchingService;
use crate::notify::{LogNotifier, NotificationSender};
use crate::referral::ReferralService;
use crate::repositories::{FileStore, RecordStore};
use crate::reviews::ReviewService;
use crate::session_notes::SessionNoteService;
use crate::tokens::TokenIssuer;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct CareServices {
    cfg: Arc<CoreConfig>,
    pub directory: AccountDirectory,
    pub challenges: ChallengeService,
    pub auth: AuthService,
    pub matching: MatchingService,
    pub availability: AvailabilityService,
    pub bookings: BookingService,
    pub referrals: ReferralService,
    pub session_notes: SessionNoteService,
    pub reviews: ReviewService,
}

impl CareServices {
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn RecordStore>,
        tokens: Arc<dyn TokenIssuer>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let directory = AccountDirectory::new(store.clone());
        let challenges = ChallengeService::new(cfg.clone(), store.clone(), notifier);
        let auth = AuthService::new(challenges.clone(), directory.clone(), tokens);
        let matching = MatchingService::new(directory.clone(), store.clone());
        let availability = AvailabilityService::new(directory.clone(), store.clone());
        let bookings = BookingService::new(directory.clone(), availability.clone(), store.clone());
        let referrals = ReferralService::new(directory.clone(), store.clone());
        let session_notes = SessionNoteService::new(bookings.clone(), store.clone());
        let reviews = ReviewService::new(directory.clone(), bookings.clone(), store);

        Self {
            cfg,
            directory,
            challenges,
            auth,
            matching,
            availability,
            bookings,
            referrals,
            session_notes,
            reviews,
        }
    }

    /// File-backed services rooted at the configured data directory, logging notifications.
    pub fn open(cfg: Arc<CoreConfig>, tokens: Arc<dyn TokenIssuer>) -> CareResult<Self> {
        let store = FileStore::open(cfg.data_dir())?;
        tracing::info!("record store opened at {}", store.root().display());
        Ok(Self::new(cfg, Arc::new(store), tokens, Arc::new(LogNotifier)))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }
}
