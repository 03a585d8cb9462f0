//! End-to-end flows through the care services, backed by the in-memory store.

use carelink_core::availability::{DateRange, NewSlot};
use carelink_core::booking::{BookingStatus, NewBooking, SessionType};
use carelink_core::matching::MatchCriteria;
use carelink_core::notify::LogNotifier;
use carelink_core::referral::{NewReferral, ReferralStatus, ReferralView};
use carelink_core::reviews::{NewReview, ReviewFilter};
use carelink_core::session_notes::NewSessionNote;
use carelink_core::tokens::EcdsaTokenIssuer;
use carelink_core::{
    Actor, CareError, CareServices, ChallengeLookup, CoreConfig, EntityId, Environment, ErrorKind,
    MemoryStore, PageRequest, Role, TextError,
};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

const SEED: &str = r#"
users:
  - email: amani@example.com
    role: PRACTITIONER
    firstName: Amani
    lastName: Uwase
    practitioner:
      specializations: [Anxiety]
      languages: [English]
      consultationFee: 30
  - email: eric@example.com
    role: PRACTITIONER
    practitioner:
      specializations: [Cardiology]
      languages: [French]
      consultationFee: 80
  - email: grace@example.com
    role: CLINIC_STAFF
    firstName: Grace
  - email: clinic@example.com
    role: CLINIC_ADMIN
    clinic:
      name: Kigali Wellness
  - email: pat@example.com
    role: PATIENT
  - email: other@example.com
    role: PATIENT
"#;

struct World {
    services: CareServices,
}

impl World {
    fn new(lookup: ChallengeLookup) -> Self {
        let cfg = CoreConfig::new(PathBuf::from("unused"), Environment::Development, lookup)
            .unwrap();
        let services = CareServices::new(
            Arc::new(cfg),
            Arc::new(MemoryStore::new()),
            Arc::new(EcdsaTokenIssuer::generate().unwrap()),
            Arc::new(LogNotifier),
        );
        services.directory.load_seed(SEED).unwrap();
        Self { services }
    }

    fn actor(&self, email: &str) -> Actor {
        let user = self
            .services
            .directory
            .find_user_by_contact(email)
            .unwrap()
            .unwrap()
            .record;
        Actor::new(user.id, user.role)
    }
}

fn anxiety_criteria() -> MatchCriteria {
    MatchCriteria {
        symptoms: vec!["anxiety".into()],
        languages: Some(vec!["English".into()]),
        max_fee: Some(Decimal::from(50)),
        ..Default::default()
    }
}

fn booking_at(practitioner: EntityId, hour: u32) -> NewBooking {
    NewBooking {
        practitioner_id: practitioner,
        clinic_id: None,
        slot_id: None,
        scheduled_at: Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap(),
        session_type: SessionType::Video,
        duration_minutes: None,
        notes: None,
    }
}

// ============ Identity challenges ============

#[test]
fn latest_code_verifies_and_cannot_be_reused() {
    let world = World::new(ChallengeLookup::ExactCode);
    let challenges = &world.services.challenges;

    let older = challenges.issue("new@example.com").unwrap().code.unwrap();
    let latest = challenges.issue("new@example.com").unwrap().code.unwrap();

    let verified = challenges.verify("new@example.com", &latest).unwrap();
    assert!(verified.verified);
    assert!(matches!(
        challenges.verify("new@example.com", &latest).unwrap_err(),
        CareError::InvalidCode
    ));

    // Exact-code lookup does not retire a superseded code.
    let superseded = challenges.verify("new@example.com", &older).unwrap();
    assert!(superseded.verified);
    assert_eq!(superseded.code, older);
}

#[test]
fn latest_for_identifier_locks_after_three_wrong_codes() {
    let world = World::new(ChallengeLookup::LatestForIdentifier);
    let challenges = &world.services.challenges;
    let code = challenges.issue("new@example.com").unwrap().code.unwrap();
    let wrong = if code == "000000" { "999999" } else { "000000" };

    for _ in 0..3 {
        assert!(matches!(
            challenges.verify("new@example.com", wrong).unwrap_err(),
            CareError::InvalidCode
        ));
    }
    // Even the right code is refused now.
    assert!(matches!(
        challenges.verify("new@example.com", &code).unwrap_err(),
        CareError::AttemptsExceeded
    ));
}

#[test]
fn login_issues_tokens_for_new_patient() {
    let world = World::new(ChallengeLookup::ExactCode);
    let code = world
        .services
        .challenges
        .issue("+250788000999")
        .unwrap()
        .code
        .unwrap();

    let outcome = world.services.auth.login("+250788000999", &code).unwrap();
    assert_eq!(outcome.user.role, Role::Patient);
    let claims = world
        .services
        .auth
        .authenticate(&outcome.tokens.access_token)
        .unwrap();
    assert_eq!(claims.sub, outcome.user.id);
}

// ============ Matching ============

#[test]
fn match_scores_full_and_partial_candidates() {
    let world = World::new(ChallengeLookup::ExactCode);
    let patient = world.actor("pat@example.com");

    let outcome = world
        .services
        .matching
        .run_match(anxiety_criteria(), Some(patient.id))
        .unwrap();

    // Amani: 40 + 20 + 20 + 20. Eric: 0 + 0 + 0 + 20, dropped.
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.matches[0].score, 100);
    assert_eq!(outcome.matches[0].practitioner.name, "Amani Uwase");

    let run = world.services.matching.get_run(&outcome.test_id).unwrap();
    assert_eq!(run.requester_id, Some(patient.id));
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].score, 100);
}

#[test]
fn match_without_specialization_hit_scores_sixty() {
    let world = World::new(ChallengeLookup::ExactCode);
    let criteria = MatchCriteria {
        symptoms: vec!["insomnia".into()],
        ..Default::default()
    };

    let outcome = world.services.matching.run_match(criteria, None).unwrap();
    let scores: Vec<u8> = outcome.matches.iter().map(|m| m.score).collect();
    assert_eq!(scores, vec![60, 60]);
    // Equal scores keep directory order.
    assert_eq!(outcome.matches[0].practitioner.name, "Amani Uwase");
    assert_eq!(outcome.matches[1].practitioner.name, "Dr. Practitioner");
}

#[test]
fn unknown_match_run_is_not_found() {
    let world = World::new(ChallengeLookup::ExactCode);
    assert!(matches!(
        world.services.matching.get_run(&EntityId::new()).unwrap_err(),
        CareError::NotFound(_)
    ));
}

// ============ Bookings ============

#[test]
fn booking_requires_known_practitioner_and_clinic() {
    let world = World::new(ChallengeLookup::ExactCode);
    let patient = world.actor("pat@example.com");
    let bookings = &world.services.bookings;

    assert!(matches!(
        bookings
            .create(&patient, booking_at(EntityId::new(), 9))
            .unwrap_err(),
        CareError::NotFound(_)
    ));

    let doc = world.actor("amani@example.com");
    let mut with_clinic = booking_at(doc.id, 9);
    with_clinic.clinic_id = Some(EntityId::new());
    assert!(matches!(
        bookings.create(&patient, with_clinic).unwrap_err(),
        CareError::NotFound(_)
    ));

    let mut zero = booking_at(doc.id, 9);
    zero.duration_minutes = Some(0);
    assert!(matches!(
        bookings.create(&patient, zero).unwrap_err(),
        CareError::InvalidInput(_)
    ));

    let mut at_clinic = booking_at(doc.id, 9);
    at_clinic.clinic_id = Some(world.actor("clinic@example.com").id);
    let booking = bookings.create(&patient, at_clinic).unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.duration_minutes, 60);
}

#[test]
fn only_parties_see_or_change_a_booking() {
    let world = World::new(ChallengeLookup::ExactCode);
    let patient = world.actor("pat@example.com");
    let doc = world.actor("amani@example.com");
    let stranger = world.actor("other@example.com");
    let bookings = &world.services.bookings;

    let booking = bookings.create(&patient, booking_at(doc.id, 9)).unwrap();

    assert!(matches!(
        bookings.get(&stranger, &booking.id).unwrap_err(),
        CareError::Forbidden(_)
    ));
    assert!(matches!(
        bookings
            .update_status(&stranger, &booking.id, BookingStatus::Canceled, None)
            .unwrap_err(),
        CareError::Forbidden(_)
    ));
    assert!(matches!(
        bookings
            .update_status(&doc, &EntityId::new(), BookingStatus::Confirmed, None)
            .unwrap_err(),
        CareError::NotFound(_)
    ));

    let confirmed = bookings
        .update_status(&doc, &booking.id, BookingStatus::Confirmed, None)
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(bookings.get(&patient, &booking.id).unwrap().status, BookingStatus::Confirmed);
}

#[test]
fn booking_lists_are_scoped_filtered_and_newest_first() {
    let world = World::new(ChallengeLookup::ExactCode);
    let patient = world.actor("pat@example.com");
    let doc = world.actor("amani@example.com");
    let bookings = &world.services.bookings;

    let early = bookings.create(&patient, booking_at(doc.id, 9)).unwrap();
    let late = bookings.create(&patient, booking_at(doc.id, 15)).unwrap();
    bookings
        .update_status(&doc, &early.id, BookingStatus::Canceled, Some("ill".into()))
        .unwrap();

    let mine = bookings.list(&patient, None, PageRequest::default()).unwrap();
    let ids: Vec<EntityId> = mine.data.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![late.id, early.id]);
    assert_eq!(mine.meta.total, 2);

    let canceled = bookings
        .list(&doc, Some(BookingStatus::Canceled), PageRequest::default())
        .unwrap();
    assert_eq!(canceled.data.len(), 1);
    assert_eq!(canceled.data[0].cancellation_reason.as_deref(), Some("ill"));

    let stranger = world.actor("other@example.com");
    assert!(bookings
        .list(&stranger, None, PageRequest::default())
        .unwrap()
        .data
        .is_empty());
}

#[test]
fn slot_labels_are_claimed_once_and_released_on_cancel() {
    let world = World::new(ChallengeLookup::ExactCode);
    let patient = world.actor("pat@example.com");
    let other = world.actor("other@example.com");
    let doc = world.actor("amani@example.com");

    let slot = world
        .services
        .availability
        .publish(
            &doc,
            NewSlot {
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                slots: vec!["09:00".into(), "10:00".into()],
            },
        )
        .unwrap();

    let mut first = booking_at(doc.id, 9);
    first.slot_id = Some(slot.id);
    let booking = world.services.bookings.create(&patient, first.clone()).unwrap();

    assert!(matches!(
        world.services.bookings.create(&other, first.clone()).unwrap_err(),
        CareError::Conflict(_)
    ));

    let mut unpublished = booking_at(doc.id, 11);
    unpublished.slot_id = Some(slot.id);
    assert!(matches!(
        world.services.bookings.create(&other, unpublished).unwrap_err(),
        CareError::InvalidInput(_)
    ));

    world
        .services
        .bookings
        .update_status(&patient, &booking.id, BookingStatus::Canceled, None)
        .unwrap();
    let rebooked = world.services.bookings.create(&other, first).unwrap();
    assert_eq!(rebooked.slot_id, Some(slot.id));

    let listed = world
        .services
        .availability
        .list(&doc.id, DateRange::default(), PageRequest::default())
        .unwrap();
    assert_eq!(listed.data[0].open_labels(), vec!["10:00"]);
}

#[test]
fn reviving_a_canceled_booking_reclaims_its_label() {
    let world = World::new(ChallengeLookup::ExactCode);
    let patient = world.actor("pat@example.com");
    let other = world.actor("other@example.com");
    let doc = world.actor("amani@example.com");
    let bookings = &world.services.bookings;

    let slot = world
        .services
        .availability
        .publish(
            &doc,
            NewSlot {
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                slots: vec!["09:00".into(), "10:00".into()],
            },
        )
        .unwrap();
    let mut nine = booking_at(doc.id, 9);
    nine.slot_id = Some(slot.id);
    let mut ten = booking_at(doc.id, 10);
    ten.slot_id = Some(slot.id);

    // Label taken by someone else while canceled: the revival is refused and nothing changes.
    let first = bookings.create(&patient, nine.clone()).unwrap();
    bookings
        .update_status(&patient, &first.id, BookingStatus::Canceled, None)
        .unwrap();
    let second = bookings.create(&other, nine).unwrap();
    assert!(matches!(
        bookings
            .update_status(&patient, &first.id, BookingStatus::Confirmed, None)
            .unwrap_err(),
        CareError::Conflict(_)
    ));
    assert_eq!(
        bookings.get(&patient, &first.id).unwrap().status,
        BookingStatus::Canceled
    );
    let held = world.services.availability.get(&slot.id).unwrap().record;
    assert_eq!(held.claim_for("09:00").unwrap().booking_id, second.id);

    // Label still free: the revival claims it again.
    let third = bookings.create(&patient, ten).unwrap();
    bookings
        .update_status(&doc, &third.id, BookingStatus::Canceled, None)
        .unwrap();
    let revived = bookings
        .update_status(&patient, &third.id, BookingStatus::Pending, None)
        .unwrap();
    assert_eq!(revived.status, BookingStatus::Pending);
    let held = world.services.availability.get(&slot.id).unwrap().record;
    assert_eq!(held.claim_for("10:00").unwrap().booking_id, third.id);
    assert!(held.open_labels().is_empty());
}

#[test]
fn session_notes_need_a_completed_booking() {
    let world = World::new(ChallengeLookup::ExactCode);
    let patient = world.actor("pat@example.com");
    let doc = world.actor("amani@example.com");
    let other_doc = world.actor("eric@example.com");
    let notes = &world.services.session_notes;

    let booking = world
        .services
        .bookings
        .create(&patient, booking_at(doc.id, 9))
        .unwrap();
    let note = NewSessionNote {
        notes: "discussed coping strategies".into(),
        ai_summary: None,
        tags: vec!["anxiety".into()],
    };

    assert!(matches!(
        notes.add(&doc, &booking.id, note.clone()).unwrap_err(),
        CareError::InvalidInput(_)
    ));
    world
        .services
        .bookings
        .update_status(&doc, &booking.id, BookingStatus::Completed, None)
        .unwrap();
    assert!(matches!(
        notes.add(&other_doc, &booking.id, note.clone()).unwrap_err(),
        CareError::Forbidden(_)
    ));

    let blank = NewSessionNote {
        notes: " \n ".into(),
        ..note.clone()
    };
    let err = notes.add(&doc, &booking.id, blank).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    notes.add(&doc, &booking.id, note).unwrap();
    let listed = notes.list(&patient, &booking.id, PageRequest::default()).unwrap();
    assert_eq!(listed.data.len(), 1);
    assert_eq!(listed.data[0].notes.as_str(), "discussed coping strategies");
    assert!(matches!(
        notes
            .list(&other_doc, &booking.id, PageRequest::default())
            .unwrap_err(),
        CareError::Forbidden(_)
    ));
}

// ============ Reviews ============

#[test]
fn reviews_need_a_completed_session_and_report_the_average() {
    let world = World::new(ChallengeLookup::ExactCode);
    let patient = world.actor("pat@example.com");
    let other = world.actor("other@example.com");
    let doc = world.actor("amani@example.com");
    let clinic = world.actor("clinic@example.com");
    let reviews = &world.services.reviews;

    let review = |rating: u8| NewReview {
        practitioner_id: Some(doc.id),
        clinic_id: None,
        rating,
        comment: Some("  very patient listener ".into()),
    };

    // A booking that is only PENDING does not count.
    let booking = world
        .services
        .bookings
        .create(&patient, booking_at(doc.id, 9))
        .unwrap();
    assert!(matches!(
        reviews.create(&patient, review(5)).unwrap_err(),
        CareError::InvalidInput(_)
    ));
    world
        .services
        .bookings
        .update_status(&doc, &booking.id, BookingStatus::Completed, None)
        .unwrap();

    assert!(matches!(
        reviews.create(&doc, review(5)).unwrap_err(),
        CareError::Forbidden(_)
    ));
    for bad in [0, 6] {
        assert!(matches!(
            reviews.create(&patient, review(bad)).unwrap_err(),
            CareError::InvalidInput(_)
        ));
    }
    assert!(matches!(
        reviews.create(&patient, NewReview { rating: 4, ..Default::default() }).unwrap_err(),
        CareError::InvalidInput(_)
    ));
    // The other patient never saw this practitioner.
    assert!(matches!(
        reviews.create(&other, review(1)).unwrap_err(),
        CareError::InvalidInput(_)
    ));

    let first = reviews.create(&patient, review(5)).unwrap();
    assert_eq!(first.comment.as_deref(), Some("very patient listener"));
    reviews.create(&patient, review(4)).unwrap();
    reviews.create(&patient, review(4)).unwrap();
    reviews
        .create(
            &other,
            NewReview {
                clinic_id: Some(clinic.id),
                rating: 2,
                ..Default::default()
            },
        )
        .unwrap();

    let filter = ReviewFilter {
        practitioner_id: Some(doc.id),
        clinic_id: None,
    };
    let listed = reviews
        .list(&other, filter, PageRequest::new(Some(1), Some(2)))
        .unwrap();
    assert_eq!(listed.page.meta.total, 3);
    assert_eq!(listed.page.data.len(), 2);
    // Averaged over every match, not just the page.
    assert_eq!(listed.average_rating.to_string(), "4.3");

    let everything = reviews
        .list(&doc, ReviewFilter::default(), PageRequest::default())
        .unwrap();
    assert_eq!(everything.page.meta.total, 4);
    assert_eq!(everything.average_rating.to_string(), "3.8");
}

// ============ Referrals ============

fn referral_to(patient: EntityId, target: Option<EntityId>) -> NewReferral {
    NewReferral {
        patient_id: patient,
        target_id: target,
        target_specialty: None,
        reason: "needs specialist review".into(),
        notes: Some("history of palpitations".into()),
        priority: None,
    }
}

#[test]
fn referrer_may_decline_but_not_accept() {
    let world = World::new(ChallengeLookup::ExactCode);
    let referrer = world.actor("amani@example.com");
    let target = world.actor("eric@example.com");
    let patient = world.actor("pat@example.com");
    let referrals = &world.services.referrals;

    let referral = referrals
        .create(&referrer, referral_to(patient.id, Some(target.id)))
        .unwrap();
    assert_eq!(referral.status, ReferralStatus::Pending);

    assert!(matches!(
        referrals
            .update_status(&referrer, &referral.id, ReferralStatus::Accepted, None)
            .unwrap_err(),
        CareError::Forbidden(_)
    ));
    let declined = referrals
        .update_status(
            &referrer,
            &referral.id,
            ReferralStatus::Declined,
            Some("patient moved".into()),
        )
        .unwrap();
    assert_eq!(declined.status, ReferralStatus::Declined);
    assert_eq!(
        declined.notes_text().as_deref(),
        Some("history of palpitations\n[Update]: patient moved")
    );
}

#[test]
fn target_accepts_and_strangers_are_refused() {
    let world = World::new(ChallengeLookup::ExactCode);
    let referrer = world.actor("grace@example.com");
    let target = world.actor("eric@example.com");
    let patient = world.actor("pat@example.com");
    let stranger = world.actor("other@example.com");
    let referrals = &world.services.referrals;

    let referral = referrals
        .create(&referrer, referral_to(patient.id, Some(target.id)))
        .unwrap();

    assert!(matches!(
        referrals.get(&stranger, &referral.id).unwrap_err(),
        CareError::Forbidden(_)
    ));
    assert!(matches!(
        referrals
            .update_status(&stranger, &referral.id, ReferralStatus::Declined, None)
            .unwrap_err(),
        CareError::Forbidden(_)
    ));
    let accepted = referrals
        .update_status(&target, &referral.id, ReferralStatus::Accepted, None)
        .unwrap();
    assert_eq!(accepted.status, ReferralStatus::Accepted);
}

#[test]
fn referral_creation_checks() {
    let world = World::new(ChallengeLookup::ExactCode);
    let referrer = world.actor("amani@example.com");
    let patient = world.actor("pat@example.com");
    let referrals = &world.services.referrals;

    assert!(matches!(
        referrals
            .create(&patient, referral_to(patient.id, None))
            .unwrap_err(),
        CareError::Forbidden(_)
    ));
    assert!(matches!(
        referrals
            .create(&referrer, referral_to(EntityId::new(), None))
            .unwrap_err(),
        CareError::NotFound(_)
    ));

    let mut blank = referral_to(patient.id, None);
    blank.reason = "   ".into();
    assert!(matches!(
        referrals.create(&referrer, blank).unwrap_err(),
        CareError::Text(TextError::Empty)
    ));

    // A stale practitioner token whose account is not a practitioner.
    let impostor = Actor::new(patient.id, Role::Practitioner);
    assert!(matches!(
        referrals
            .create(&impostor, referral_to(patient.id, None))
            .unwrap_err(),
        CareError::Forbidden(_)
    ));
}

#[test]
fn specialty_only_referral_is_sent_but_never_received() {
    let world = World::new(ChallengeLookup::ExactCode);
    let referrer = world.actor("amani@example.com");
    let cardiologist = world.actor("eric@example.com");
    let patient = world.actor("pat@example.com");
    let referrals = &world.services.referrals;

    let mut by_specialty = referral_to(patient.id, None);
    by_specialty.target_specialty = Some("Cardiology".into());
    let referral = referrals.create(&referrer, by_specialty).unwrap();

    let sent = referrals
        .list(&referrer, ReferralView::Sent, PageRequest::default())
        .unwrap();
    assert_eq!(sent.data.len(), 1);
    assert_eq!(sent.data[0].id, referral.id);

    for actor in [referrer, cardiologist] {
        let received = referrals
            .list(&actor, ReferralView::Received, PageRequest::default())
            .unwrap();
        assert!(received.data.is_empty());
    }

    // The patient always sees referrals naming them.
    let patient_view = referrals
        .list(&patient, ReferralView::Received, PageRequest::default())
        .unwrap();
    assert_eq!(patient_view.data.len(), 1);
}
