//! Practitioner matching.
//!
//! Scoring is additive over four independent criteria, each an explicit function so the
//! weights stay visible and testable:
//!
//! | criterion        | points | awarded when                                                  |
//! |------------------|--------|---------------------------------------------------------------|
//! | specialization   | 40     | a specialization contains, or is contained in, a symptom      |
//! | language         | 20     | no languages requested, or a candidate language is requested  |
//! | fee              | 20     | no (or zero) max fee, or the fee is within it                 |
//! | gender           | 20     | always                                                        |
//!
//! A run keeps candidates scoring strictly above [`MATCH_SCORE_THRESHOLD`], sorts them by score
//! (stable, so equal scores keep directory order), keeps the top [`MATCH_RESULT_LIMIT`] and
//! persists the run as an immutable audit record.

use crate::constants::{MATCH_RESULT_LIMIT, MATCH_RUNS_COLLECTION, MATCH_SCORE_THRESHOLD};
use crate::directory::{AccountDirectory, PractitionerListing, PractitionerProfile};
use crate::error::{CareError, CareResult};
use crate::repositories::{Entity, RecordStore, Repository};
use carelink_types::NonEmptyText;
use carelink_uuid::EntityId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SPECIALIZATION_POINTS: u8 = 40;
pub const LANGUAGE_POINTS: u8 = 20;
pub const FEE_POINTS: u8 = 20;
pub const GENDER_POINTS: u8 = 20;

/// What the patient asked for.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    pub symptoms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<serde_json::Value>,
}

impl MatchCriteria {
    pub fn validate(&self) -> CareResult<()> {
        if self.symptoms.is_empty() {
            return Err(CareError::InvalidInput(
                "at least one symptom is required".into(),
            ));
        }
        for symptom in &self.symptoms {
            NonEmptyText::new(symptom)?;
        }
        if self.max_fee.is_some_and(|fee| fee.is_sign_negative() && !fee.is_zero()) {
            return Err(CareError::InvalidInput("maxFee cannot be negative".into()));
        }
        Ok(())
    }
}

/// The slice of a practitioner profile the scorer looks at.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub id: EntityId,
    pub specializations: Vec<String>,
    pub languages: Vec<String>,
    pub fee: Decimal,
    pub accepting_new_patients: bool,
}

impl From<&PractitionerProfile> for Candidate {
    fn from(profile: &PractitionerProfile) -> Self {
        Self {
            id: profile.id,
            specializations: profile.specializations.clone(),
            languages: profile.languages.clone(),
            fee: profile.consultation_fee,
            accepting_new_patients: profile.accepting_new_patients,
        }
    }
}

// ============================================================================
// SCORING
// ============================================================================

pub fn specialization_score(candidate: &Candidate, criteria: &MatchCriteria) -> u8 {
    let hit = candidate.specializations.iter().any(|spec| {
        let spec = spec.to_lowercase();
        criteria.symptoms.iter().any(|symptom| {
            let symptom = symptom.to_lowercase();
            spec.contains(&symptom) || symptom.contains(&spec)
        })
    });
    if hit {
        SPECIALIZATION_POINTS
    } else {
        0
    }
}

/// Exact, case-sensitive. An empty requested list awards nothing.
pub fn language_score(candidate: &Candidate, criteria: &MatchCriteria) -> u8 {
    match &criteria.languages {
        None => LANGUAGE_POINTS,
        Some(wanted) if candidate.languages.iter().any(|l| wanted.contains(l)) => {
            LANGUAGE_POINTS
        }
        Some(_) => 0,
    }
}

/// A zero max fee is treated as unspecified.
pub fn fee_score(candidate: &Candidate, criteria: &MatchCriteria) -> u8 {
    match criteria.max_fee {
        Some(max) if !max.is_zero() => {
            if candidate.fee <= max {
                FEE_POINTS
            } else {
                0
            }
        }
        _ => FEE_POINTS,
    }
}

/// Practitioner gender is not recorded, so every candidate gets the points.
pub fn gender_score(_candidate: &Candidate, _criteria: &MatchCriteria) -> u8 {
    GENDER_POINTS
}

/// Total score in `0..=100`.
pub fn score(candidate: &Candidate, criteria: &MatchCriteria) -> u8 {
    specialization_score(candidate, criteria)
        + language_score(candidate, criteria)
        + fee_score(candidate, criteria)
        + gender_score(candidate, criteria)
}

/// Scores accepting candidates and returns `(index, score)` pairs for the kept results, best
/// first. Indices refer to `candidates`.
pub fn rank(candidates: &[Candidate], criteria: &MatchCriteria) -> Vec<(usize, u8)> {
    let mut scored: Vec<(usize, u8)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.accepting_new_patients)
        .map(|(i, c)| (i, score(c, criteria)))
        .filter(|(_, s)| *s > MATCH_SCORE_THRESHOLD)
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(MATCH_RESULT_LIMIT);
    scored
}

// ============================================================================
// MATCH RUNS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchRunStatus {
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub practitioner_id: EntityId,
    pub score: u8,
}

/// Persisted record of one run. Never modified after insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRun {
    pub id: EntityId,
    pub requester_id: Option<EntityId>,
    pub criteria: MatchCriteria,
    pub status: MatchRunStatus,
    pub created_at: DateTime<Utc>,
    pub results: Vec<MatchResult>,
}

impl Entity for MatchRun {
    const COLLECTION: &'static str = MATCH_RUNS_COLLECTION;
    const LABEL: &'static str = "match run";

    fn id(&self) -> EntityId {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPractitioner {
    pub id: EntityId,
    pub name: String,
    pub specializations: Vec<String>,
    pub fee: Decimal,
    pub languages: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub practitioner: MatchedPractitioner,
    pub score: u8,
}

/// What a caller of [`MatchingService::run_match`] gets back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub test_id: EntityId,
    pub matches: Vec<Match>,
}

#[derive(Clone, Debug)]
pub struct MatchingService {
    directory: AccountDirectory,
    runs: Repository<MatchRun>,
}

impl MatchingService {
    pub fn new(directory: AccountDirectory, store: Arc<dyn RecordStore>) -> Self {
        Self {
            directory,
            runs: Repository::new(store),
        }
    }

    pub fn run_match(
        &self,
        criteria: MatchCriteria,
        requester_id: Option<EntityId>,
    ) -> CareResult<MatchOutcome> {
        criteria.validate()?;

        let listings: Vec<PractitionerListing> = self.directory.practitioners()?;
        let candidates: Vec<Candidate> = listings.iter().map(|l| Candidate::from(&l.profile)).collect();
        let ranked = rank(&candidates, &criteria);

        let run = MatchRun {
            id: EntityId::new(),
            requester_id,
            criteria,
            status: MatchRunStatus::Completed,
            created_at: Utc::now(),
            results: ranked
                .iter()
                .map(|(i, s)| MatchResult {
                    practitioner_id: candidates[*i].id,
                    score: *s,
                })
                .collect(),
        };
        self.runs.insert(&run)?;
        tracing::info!(
            "match run {} kept {} of {} practitioners",
            run.id,
            run.results.len(),
            candidates.len()
        );

        let matches = ranked
            .into_iter()
            .map(|(i, score)| {
                let listing = &listings[i];
                Match {
                    practitioner: MatchedPractitioner {
                        id: listing.profile.id,
                        name: listing.name.clone(),
                        specializations: listing.profile.specializations.clone(),
                        fee: listing.profile.consultation_fee,
                        languages: listing.profile.languages.clone(),
                    },
                    score,
                }
            })
            .collect();

        Ok(MatchOutcome {
            test_id: run.id,
            matches,
        })
    }

    pub fn get_run(&self, id: &EntityId) -> CareResult<MatchRun> {
        Ok(self.runs.require(id)?.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(specs: &[&str], langs: &[&str], fee: i64) -> Candidate {
        Candidate {
            id: EntityId::new(),
            specializations: specs.iter().map(|s| s.to_string()).collect(),
            languages: langs.iter().map(|s| s.to_string()).collect(),
            fee: Decimal::from(fee),
            accepting_new_patients: true,
        }
    }

    fn criteria(symptoms: &[&str]) -> MatchCriteria {
        MatchCriteria {
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn specialization_matches_substrings_both_ways() {
        let c = candidate(&["Anxiety Disorders"], &[], 0);
        assert_eq!(specialization_score(&c, &criteria(&["anxiety"])), 40);

        let c = candidate(&["PTSD"], &[], 0);
        assert_eq!(specialization_score(&c, &criteria(&["ptsd after accident"])), 40);
        assert_eq!(specialization_score(&c, &criteria(&["insomnia"])), 0);
    }

    #[test]
    fn language_rules() {
        let c = candidate(&[], &["English", "French"], 0);
        let mut crit = criteria(&["x"]);
        assert_eq!(language_score(&c, &crit), 20);

        crit.languages = Some(vec!["French".into()]);
        assert_eq!(language_score(&c, &crit), 20);

        crit.languages = Some(vec!["french".into()]);
        assert_eq!(language_score(&c, &crit), 0);

        crit.languages = Some(vec![]);
        assert_eq!(language_score(&c, &crit), 0);
    }

    #[test]
    fn fee_rules() {
        let c = candidate(&[], &[], 50);
        let mut crit = criteria(&["x"]);
        assert_eq!(fee_score(&c, &crit), 20);

        crit.max_fee = Some(Decimal::from(50));
        assert_eq!(fee_score(&c, &crit), 20);

        crit.max_fee = Some(Decimal::from(30));
        assert_eq!(fee_score(&c, &crit), 0);

        crit.max_fee = Some(Decimal::ZERO);
        assert_eq!(fee_score(&c, &crit), 20);
    }

    #[test]
    fn score_is_deterministic_and_bounded() {
        let c = candidate(&["Anxiety"], &["English"], 30);
        let crit = MatchCriteria {
            symptoms: vec!["anxiety".into()],
            languages: Some(vec!["English".into()]),
            max_fee: Some(Decimal::from(50)),
            ..Default::default()
        };
        assert_eq!(score(&c, &crit), 100);
        assert_eq!(score(&c, &crit), score(&c, &crit));
    }

    #[test]
    fn threshold_is_strictly_above_forty() {
        // Only the gender criterion and the fee criterion hit: 40, dropped.
        let c = candidate(&["Cardiology"], &["Swahili"], 10);
        let crit = MatchCriteria {
            symptoms: vec!["anxiety".into()],
            languages: Some(vec!["English".into()]),
            ..Default::default()
        };
        assert_eq!(score(&c, &crit), 40);
        assert!(rank(&[c], &crit).is_empty());
    }

    #[test]
    fn rank_is_stable_descending_and_capped() {
        let mut pool: Vec<Candidate> = (0..12).map(|_| candidate(&["Grief"], &[], 0)).collect();
        pool.insert(5, candidate(&["Anxiety"], &[], 0));
        pool.push(Candidate {
            accepting_new_patients: false,
            ..candidate(&["Anxiety"], &[], 0)
        });

        let ranked = rank(&pool, &criteria(&["anxiety"]));
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0], (5, 100));
        // Ties keep pool order.
        let tail: Vec<usize> = ranked[1..].iter().map(|(i, _)| *i).collect();
        assert_eq!(tail, vec![0, 1, 2, 3, 4, 6, 7, 8, 9]);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn criteria_validation() {
        assert!(criteria(&[]).validate().is_err());
        let blank = criteria(&["anxiety", "  "]).validate().unwrap_err();
        assert!(matches!(blank, CareError::Text(carelink_types::TextError::Empty)));
        assert_eq!(blank.kind(), crate::ErrorKind::Validation);

        let mut crit = criteria(&["anxiety"]);
        crit.max_fee = Some(Decimal::from(-1));
        assert!(crit.validate().is_err());
    }
}
