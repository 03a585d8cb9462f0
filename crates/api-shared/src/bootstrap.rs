//! Startup wiring shared by the binaries.
//!
//! Reads `CARE_DATA_DIR`, `CARE_ENV`, `CARE_CHALLENGE_LOOKUP` and `CARE_TOKEN_KEY_PEM` once and
//! builds the file-backed [`CareServices`].

use carelink_core::config::{challenge_lookup_from_env_value, environment_from_env_value};
use carelink_core::constants::DEFAULT_DATA_DIR;
use carelink_core::tokens::{EcdsaTokenIssuer, TokenIssuer};
use carelink_core::{CareResult, CareServices, CoreConfig};
use std::path::PathBuf;
use std::sync::Arc;

pub fn config_from_env() -> CareResult<CoreConfig> {
    let data_dir = std::env::var("CARE_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let environment = environment_from_env_value(std::env::var("CARE_ENV").ok())?;
    let challenge_lookup =
        challenge_lookup_from_env_value(std::env::var("CARE_CHALLENGE_LOOKUP").ok())?;

    CoreConfig::new(PathBuf::from(data_dir), environment, challenge_lookup)
}

/// Loads the signing key named by `CARE_TOKEN_KEY_PEM`, or generates a throwaway one.
pub fn token_issuer_from_env() -> CareResult<Arc<dyn TokenIssuer>> {
    match std::env::var("CARE_TOKEN_KEY_PEM").ok().filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            let issuer = EcdsaTokenIssuer::from_pem_file(&PathBuf::from(path.trim()))?;
            tracing::info!("token signing key loaded from {}", path.trim());
            Ok(Arc::new(issuer))
        }
        None => {
            tracing::warn!("CARE_TOKEN_KEY_PEM not set; tokens will not survive a restart");
            Ok(Arc::new(EcdsaTokenIssuer::generate()?))
        }
    }
}

pub fn services_from_env() -> CareResult<Arc<CareServices>> {
    let cfg = Arc::new(config_from_env()?);
    tracing::info!(
        "environment {:?}, challenge lookup {}",
        cfg.environment(),
        cfg.challenge_lookup()
    );
    let services = CareServices::open(cfg, token_issuer_from_env()?)?;
    Ok(Arc::new(services))
}
