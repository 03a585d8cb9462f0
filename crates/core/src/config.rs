//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into services as
//! `Arc<CoreConfig>`. Nothing in the core reads environment variables during request handling;
//! binaries read them and hand the raw values to the `*_from_env_value` parsers below.

use crate::{CareError, CareResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Deployment environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Verification codes are echoed back to the caller only outside production.
    pub fn exposes_challenge_codes(&self) -> bool {
        !matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(CareError::InvalidInput(format!(
                "unknown environment '{}' (expected development or production)",
                other
            ))),
        }
    }
}

/// How `VerifyChallenge` locates the challenge row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChallengeLookup {
    /// Latest unverified row matching both identifier and code. A wrong code finds no row, so
    /// attempts are never counted.
    #[default]
    ExactCode,
    /// Latest unverified row for the identifier; the code is compared afterwards and a mismatch
    /// increments that row's attempt counter.
    LatestForIdentifier,
}

impl FromStr for ChallengeLookup {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact-code" => Ok(ChallengeLookup::ExactCode),
            "latest-for-identifier" => Ok(ChallengeLookup::LatestForIdentifier),
            other => Err(CareError::InvalidInput(format!(
                "unknown challenge lookup '{}' (expected exact-code or latest-for-identifier)",
                other
            ))),
        }
    }
}

impl fmt::Display for ChallengeLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeLookup::ExactCode => f.write_str("exact-code"),
            ChallengeLookup::LatestForIdentifier => f.write_str("latest-for-identifier"),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    environment: Environment,
    challenge_lookup: ChallengeLookup,
}

impl CoreConfig {
    pub fn new(
        data_dir: PathBuf,
        environment: Environment,
        challenge_lookup: ChallengeLookup,
    ) -> CareResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(CareError::InvalidInput("data_dir cannot be empty".into()));
        }

        Ok(Self {
            data_dir,
            environment,
            challenge_lookup,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn challenge_lookup(&self) -> ChallengeLookup {
        self.challenge_lookup
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the environment from an optional string value, defaulting to development.
pub fn environment_from_env_value(value: Option<String>) -> CareResult<Environment> {
    Ok(non_blank(value)
        .map(|v| v.parse::<Environment>())
        .transpose()?
        .unwrap_or(Environment::Development))
}

/// Parse the challenge lookup policy from an optional string value, defaulting to exact-code.
pub fn challenge_lookup_from_env_value(value: Option<String>) -> CareResult<ChallengeLookup> {
    Ok(non_blank(value)
        .map(|v| v.parse::<ChallengeLookup>())
        .transpose()?
        .unwrap_or_default())
}
