//! Session tokens.
//!
//! Access and refresh tokens are JWTs signed with ES256 (ECDSA P-256). The signing key is loaded
//! from a PKCS#8 PEM file at startup or generated per process; the verifying half is derived
//! from it.

use crate::constants::{ACCESS_TOKEN_TTL_HOURS, REFRESH_TOKEN_TTL_HOURS};
use crate::directory::User;
use crate::error::{CareError, CareResult};
use carelink_types::Role;
use carelink_uuid::EntityId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use p256::ecdsa::SigningKey;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: EntityId,
    pub role: Role,
    pub kind: TokenKind,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Snapshot of the user at issue time.
    pub user: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies session tokens.
pub trait TokenIssuer: Send + Sync + fmt::Debug {
    fn issue(&self, user: &User) -> CareResult<TokenPair>;

    /// Checks signature, kind and expiry, returning the embedded claims.
    fn verify(&self, token: &str, kind: TokenKind) -> CareResult<TokenClaims>;
}

pub struct EcdsaTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl fmt::Debug for EcdsaTokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaTokenIssuer").finish_non_exhaustive()
    }
}

fn key_error(e: impl fmt::Display) -> CareError {
    CareError::SigningKeyParse(e.to_string().into())
}

impl EcdsaTokenIssuer {
    pub fn new(signing_key: &SigningKey) -> CareResult<Self> {
        let private_pem = signing_key.to_pkcs8_pem(LineEnding::LF).map_err(key_error)?;
        let public_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(key_error)?;

        Ok(Self {
            encoding_key: EncodingKey::from_ec_pem(private_pem.as_bytes()).map_err(key_error)?,
            decoding_key: DecodingKey::from_ec_pem(public_pem.as_bytes()).map_err(key_error)?,
        })
    }

    /// A fresh random key. Tokens do not survive a restart.
    pub fn generate() -> CareResult<Self> {
        Self::new(&SigningKey::random(&mut rand::thread_rng()))
    }

    pub fn from_pkcs8_pem(pem: &str) -> CareResult<Self> {
        let key = SigningKey::from_pkcs8_pem(pem).map_err(key_error)?;
        Self::new(&key)
    }

    pub fn from_pem_file(path: &Path) -> CareResult<Self> {
        let pem = std::fs::read_to_string(path).map_err(CareError::StorageRead)?;
        Self::from_pkcs8_pem(&pem)
    }

    /// Issues a pair as if the clock read `now`.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> CareResult<TokenPair> {
        let access = claims_for(
            user,
            TokenKind::Access,
            now,
            Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        )?;
        let refresh = claims_for(
            user,
            TokenKind::Refresh,
            now,
            Duration::hours(REFRESH_TOKEN_TTL_HOURS),
        )?;

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
        })
    }

    fn sign(&self, claims: &TokenClaims) -> CareResult<String> {
        encode(&Header::new(Algorithm::ES256), claims, &self.encoding_key)
            .map_err(CareError::TokenSigning)
    }
}

fn claims_for(
    user: &User,
    kind: TokenKind,
    now: DateTime<Utc>,
    ttl: Duration,
) -> CareResult<TokenClaims> {
    Ok(TokenClaims {
        sub: user.id,
        role: user.role,
        kind,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
        user: serde_json::to_value(user).map_err(CareError::Serialization)?,
    })
}

impl TokenIssuer for EcdsaTokenIssuer {
    fn issue(&self, user: &User) -> CareResult<TokenPair> {
        self.issue_at(user, Utc::now())
    }

    fn verify(&self, token: &str, kind: TokenKind) -> CareResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                JwtErrorKind::ExpiredSignature => {
                    CareError::Unauthenticated("token has expired".into())
                }
                JwtErrorKind::InvalidSignature => {
                    CareError::Unauthenticated("invalid token signature".into())
                }
                _ => {
                    tracing::debug!("token rejected: {}", e);
                    CareError::Unauthenticated("malformed token".into())
                }
            }
        })?;

        if data.claims.kind != kind {
            return Err(CareError::Unauthenticated("wrong token type".into()));
        }
        Ok(data.claims)
    }
}
