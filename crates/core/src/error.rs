/// Errors raised by the care-access coordination core.
///
/// API layers do not match on individual variants; they call [`CareError::kind`] and map the
/// resulting [`ErrorKind`] to a transport status.
#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid verification code")]
    InvalidCode,
    #[error("verification code has expired")]
    Expired,
    #[error("too many attempts, request a new verification code")]
    AttemptsExceeded,
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read record: {0}")]
    StorageRead(std::io::Error),
    #[error("failed to write record: {0}")]
    StorageWrite(std::io::Error),
    #[error("storage lock poisoned")]
    StorageLockPoisoned,
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),

    #[error("identifier error: {0}")]
    Identifier(#[from] carelink_uuid::UuidError),
    #[error("text error: {0}")]
    Text(#[from] carelink_types::TextError),

    #[error("failed to parse signing key: {0}")]
    SigningKeyParse(Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to sign token: {0}")]
    TokenSigning(jsonwebtoken::errors::Error),
}

/// Coarse classification of a [`CareError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    InvalidCode,
    Expired,
    RateLimited,
    Unauthenticated,
    Internal,
}

impl CareError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CareError::InvalidInput(_) | CareError::Identifier(_) | CareError::Text(_) => {
                ErrorKind::Validation
            }
            CareError::NotFound(_) => ErrorKind::NotFound,
            CareError::Forbidden(_) => ErrorKind::Forbidden,
            CareError::Conflict(_) => ErrorKind::Conflict,
            CareError::InvalidCode => ErrorKind::InvalidCode,
            CareError::Expired => ErrorKind::Expired,
            CareError::AttemptsExceeded => ErrorKind::RateLimited,
            CareError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            CareError::StorageDirCreation(_)
            | CareError::StorageRead(_)
            | CareError::StorageWrite(_)
            | CareError::StorageLockPoisoned
            | CareError::Serialization(_)
            | CareError::Deserialization(_)
            | CareError::YamlDeserialization(_)
            | CareError::SigningKeyParse(_)
            | CareError::TokenSigning(_) => ErrorKind::Internal,
        }
    }

    /// True for failures the caller may resolve by retrying with a fresh challenge.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Expired | ErrorKind::RateLimited)
    }
}

pub type CareResult<T> = std::result::Result<T, CareError>;
