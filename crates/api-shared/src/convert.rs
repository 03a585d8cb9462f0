//! Conversions between core results and the protobuf messages.
//!
//! The same messages back the gRPC service and the REST login endpoints, so both transports
//! render challenges, logins and match outcomes identically.

use crate::pb;
use carelink_core::auth::LoginOutcome;
use carelink_core::directory::User;
use carelink_core::identity::IssuedChallenge;
use carelink_core::matching::{MatchCriteria, MatchOutcome};
use carelink_core::{CareError, CareResult, EntityId};
use rust_decimal::Decimal;
use std::str::FromStr;

pub fn challenge_res(issued: &IssuedChallenge) -> pb::RequestChallengeRes {
    pb::RequestChallengeRes {
        message: issued.message().to_string(),
        challenge_id: issued.challenge_id.to_string(),
        expires_at: issued.expires_at.to_rfc3339(),
        code: issued.code.clone().unwrap_or_default(),
    }
}

pub fn user_summary(user: &User) -> pb::UserSummary {
    pb::UserSummary {
        id: user.id.to_string(),
        email: user.email.clone().unwrap_or_default(),
        phone: user.phone.clone().unwrap_or_default(),
        role: user.role.as_str().to_string(),
        status: user.status.as_str().to_string(),
        email_verified: user.email_verified,
        phone_verified: user.phone_verified,
        first_name: user.first_name.clone().unwrap_or_default(),
        last_name: user.last_name.clone().unwrap_or_default(),
    }
}

pub fn login_res(outcome: &LoginOutcome) -> pb::VerifyChallengeRes {
    pb::VerifyChallengeRes {
        access_token: outcome.tokens.access_token.clone(),
        refresh_token: outcome.tokens.refresh_token.clone(),
        user: Some(user_summary(&outcome.user)),
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Splits a `RunMatchReq` into criteria and the optional requester.
///
/// Empty strings mean "not given"; a present but unparseable fee or requester id is a
/// validation error.
pub fn match_request(req: pb::RunMatchReq) -> CareResult<(MatchCriteria, Option<EntityId>)> {
    let max_fee = non_blank(req.max_fee)
        .map(|fee| {
            Decimal::from_str(&fee)
                .map_err(|e| CareError::InvalidInput(format!("maxFee '{}': {}", fee, e)))
        })
        .transpose()?;
    let requester_id = non_blank(req.requester_id)
        .map(|id| EntityId::parse(&id))
        .transpose()?;

    let criteria = MatchCriteria {
        symptoms: req.symptoms,
        languages: req.languages.map(|l| l.values),
        max_fee,
        preferred_gender: non_blank(req.preferred_gender),
        preferences: None,
    };
    Ok((criteria, requester_id))
}

pub fn match_res(outcome: MatchOutcome) -> pb::RunMatchRes {
    pb::RunMatchRes {
        test_id: outcome.test_id.to_string(),
        matches: outcome
            .matches
            .into_iter()
            .map(|m| pb::Match {
                practitioner: Some(pb::MatchedPractitioner {
                    id: m.practitioner.id.to_string(),
                    name: m.practitioner.name,
                    specializations: m.practitioner.specializations,
                    fee: m.practitioner.fee.to_string(),
                    languages: m.practitioner.languages,
                }),
                score: u32::from(m.score),
            })
            .collect(),
    }
}
