//! Defines the error type returned across the `kms-core` boundary.
//!
//! Provider and storage failures are translated into [`KmsError`] inside the key store manager.
//! Messages carry identifiers, states and algorithm names only, never key material.

use crate::common::algorithm::Algorithm;
use crate::common::errors::ProviderError;
use crate::registry::{KeyId, KeyState};
use thiserror::Error;

/// The main error type for the `kms-core` crate.
#[derive(Debug, Error)]
pub enum KmsError {
    #[error("key not found: {0}")]
    KeyNotFound(KeyId),

    #[error("key {key_id} is {state}; {operation} is not permitted")]
    InvalidState {
        key_id: KeyId,
        state: KeyState,
        operation: &'static str,
    },

    #[error("key {key_id} has no version {version}")]
    VersionNotFound { key_id: KeyId, version: u32 },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("{operation} is not supported for {algorithm} keys")]
    UnsupportedOperation {
        algorithm: Algorithm,
        operation: &'static str,
    },

    #[error("integrity check failed for key {key_id}")]
    Integrity { key_id: KeyId },

    #[error("key storage unavailable after {attempts} attempts")]
    StorageUnavailable { attempts: u32 },

    #[error("cryptographic operation failed: {0}")]
    Cryptography(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for KMS operations
pub type KmsResult<T> = Result<T, KmsError>;

impl KmsError {
    /// Maps a provider failure for `key_id` into the public taxonomy with a fixed message.
    pub(crate) fn from_provider(key_id: &KeyId, err: ProviderError) -> Self {
        match err {
            ProviderError::Integrity | ProviderError::Decryption => KmsError::Integrity {
                key_id: key_id.clone(),
            },
            ProviderError::MaterialMismatch => {
                KmsError::Internal("stored material does not match the key's algorithm".to_string())
            }
            ProviderError::KeyGeneration(_) => {
                KmsError::Cryptography("key generation failed".to_string())
            }
            ProviderError::InvalidKey(_) => {
                KmsError::Cryptography("stored key material is unusable".to_string())
            }
            ProviderError::Operation(_) => {
                KmsError::Cryptography("provider operation failed".to_string())
            }
        }
    }
}
