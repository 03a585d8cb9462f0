//! Constants used throughout the Carelink core crate.

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "care_data";

/// Number of digits in a verification code.
pub const CHALLENGE_CODE_LENGTH: usize = 6;

/// Minutes a verification code stays valid after issue.
pub const CHALLENGE_TTL_MINUTES: i64 = 10;

/// Verification attempts allowed against a single challenge.
pub const CHALLENGE_MAX_ATTEMPTS: u32 = 3;

/// Candidates must score strictly above this to appear in a match run.
pub const MATCH_SCORE_THRESHOLD: u8 = 40;

/// Maximum number of results kept per match run.
pub const MATCH_RESULT_LIMIT: usize = 10;

/// Booking duration, in minutes, when the caller gives none.
pub const DEFAULT_BOOKING_DURATION_MINUTES: u32 = 60;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Accepted review ratings, inclusive.
pub const MIN_REVIEW_RATING: u8 = 1;
pub const MAX_REVIEW_RATING: u8 = 5;

pub const ACCESS_TOKEN_TTL_HOURS: i64 = 24;
pub const REFRESH_TOKEN_TTL_HOURS: i64 = 24 * 7;

/// Collection names in the record store.
pub const CHALLENGES_COLLECTION: &str = "identity_challenges";
pub const USERS_COLLECTION: &str = "users";
pub const PRACTITIONERS_COLLECTION: &str = "practitioner_profiles";
pub const CLINICS_COLLECTION: &str = "clinic_profiles";
pub const MATCH_RUNS_COLLECTION: &str = "match_runs";
pub const SLOTS_COLLECTION: &str = "availability_slots";
pub const BOOKINGS_COLLECTION: &str = "bookings";
pub const REFERRALS_COLLECTION: &str = "referrals";
pub const SESSION_NOTES_COLLECTION: &str = "session_notes";
pub const REVIEWS_COLLECTION: &str = "reviews";
