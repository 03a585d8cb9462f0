//! Patient reviews of practitioners and clinics.
//!
//! A practitioner may only be reviewed by a patient who has completed a session with them.
//! Listing reports the mean rating of every matching review, rounded to one decimal place.

use crate::booking::BookingService;
use crate::capabilities::{Actor, Operation};
use crate::constants::{MAX_REVIEW_RATING, MIN_REVIEW_RATING, REVIEWS_COLLECTION};
use crate::directory::AccountDirectory;
use crate::error::{CareError, CareResult};
use crate::pagination::{paginate, Page, PageRequest};
use crate::repositories::{Entity, RecordStore, Repository};
use carelink_uuid::EntityId;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: EntityId,
    pub patient_id: EntityId,
    pub practitioner_id: Option<EntityId>,
    pub clinic_id: Option<EntityId>,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Review {
    const COLLECTION: &'static str = REVIEWS_COLLECTION;
    const LABEL: &'static str = "review";

    fn id(&self) -> EntityId {
        self.id
    }
}

/// At least one of `practitioner_id` and `clinic_id` must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewReview {
    pub practitioner_id: Option<EntityId>,
    pub clinic_id: Option<EntityId>,
    pub rating: u8,
    pub comment: Option<String>,
}

/// Both sides empty lists every review.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    pub practitioner_id: Option<EntityId>,
    pub clinic_id: Option<EntityId>,
}

impl ReviewFilter {
    fn matches(&self, review: &Review) -> bool {
        self.practitioner_id
            .map_or(true, |id| review.practitioner_id == Some(id))
            && self.clinic_id.map_or(true, |id| review.clinic_id == Some(id))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReviewPage {
    pub page: Page<Review>,
    /// Zero when nothing matched.
    pub average_rating: Decimal,
}

/// Mean rating, half away from zero to one decimal place.
pub fn average_rating(reviews: &[Review]) -> Decimal {
    if reviews.is_empty() {
        return Decimal::ZERO;
    }
    let sum: u64 = reviews.iter().map(|r| u64::from(r.rating)).sum();
    (Decimal::from(sum) / Decimal::from(reviews.len() as u64))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone, Debug)]
pub struct ReviewService {
    directory: AccountDirectory,
    bookings: BookingService,
    reviews: Repository<Review>,
}

impl ReviewService {
    pub fn new(
        directory: AccountDirectory,
        bookings: BookingService,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            directory,
            bookings,
            reviews: Repository::new(store),
        }
    }

    pub fn create(&self, actor: &Actor, new: NewReview) -> CareResult<Review> {
        actor.authorize(Operation::CreateReview)?;

        if new.practitioner_id.is_none() && new.clinic_id.is_none() {
            return Err(CareError::InvalidInput(
                "either practitionerId or clinicId must be provided".into(),
            ));
        }
        if !(MIN_REVIEW_RATING..=MAX_REVIEW_RATING).contains(&new.rating) {
            return Err(CareError::InvalidInput(format!(
                "rating must be between {} and {}",
                MIN_REVIEW_RATING, MAX_REVIEW_RATING
            )));
        }

        if let Some(practitioner_id) = &new.practitioner_id {
            if !self.directory.practitioner_exists(practitioner_id)? {
                return Err(CareError::NotFound(format!(
                    "practitioner '{}'",
                    practitioner_id
                )));
            }
            if !self
                .bookings
                .has_completed_session(&actor.id, practitioner_id)?
            {
                tracing::warn!(
                    "patient {} tried to review practitioner {} without a completed session",
                    actor.id,
                    practitioner_id
                );
                return Err(CareError::InvalidInput(
                    "you can only review practitioners you have had sessions with".into(),
                ));
            }
        }
        if let Some(clinic_id) = &new.clinic_id {
            if !self.directory.clinic_exists(clinic_id)? {
                return Err(CareError::NotFound(format!("clinic '{}'", clinic_id)));
            }
        }

        let review = Review {
            id: EntityId::new(),
            patient_id: actor.id,
            practitioner_id: new.practitioner_id,
            clinic_id: new.clinic_id,
            rating: new.rating,
            comment: new
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        };
        self.reviews.insert(&review)?;
        tracing::info!("review {} created by patient {}", review.id, review.patient_id);
        Ok(review)
    }

    /// Matching reviews, newest first, with the average over all of them.
    pub fn list(
        &self,
        actor: &Actor,
        filter: ReviewFilter,
        page: PageRequest,
    ) -> CareResult<ReviewPage> {
        actor.authorize(Operation::ListReviews)?;

        let mut found = self.reviews.filter(|r| filter.matches(r))?;
        found.reverse();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let average_rating = average_rating(&found);
        Ok(ReviewPage {
            page: paginate(found, page),
            average_rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rated(ratings: &[u8]) -> Vec<Review> {
        ratings
            .iter()
            .map(|r| Review {
                id: EntityId::new(),
                patient_id: EntityId::new(),
                practitioner_id: None,
                clinic_id: None,
                rating: *r,
                comment: None,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn average_is_rounded_to_one_place() {
        assert_eq!(average_rating(&[]), Decimal::ZERO);
        assert_eq!(average_rating(&rated(&[5, 4, 4])).to_string(), "4.3");
        assert_eq!(average_rating(&rated(&[5, 4, 4, 4])).to_string(), "4.3");
        // 4.25 rounds up, not to even.
        assert_eq!(average_rating(&rated(&[5, 5, 4, 3])).to_string(), "4.3");
        assert_eq!(average_rating(&rated(&[5])).to_string(), "5");
    }

    #[test]
    fn filter_needs_every_given_side() {
        let practitioner = EntityId::new();
        let clinic = EntityId::new();
        let mut review = rated(&[4]).remove(0);
        review.practitioner_id = Some(practitioner);

        assert!(ReviewFilter::default().matches(&review));
        let by_practitioner = ReviewFilter {
            practitioner_id: Some(practitioner),
            clinic_id: None,
        };
        assert!(by_practitioner.matches(&review));
        let both = ReviewFilter {
            practitioner_id: Some(practitioner),
            clinic_id: Some(clinic),
        };
        assert!(!both.matches(&review));
    }
}
