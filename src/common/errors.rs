//! 内部错误类型：提供者层与存储层。
//!
//! These never cross the [`KeyStoreManager`](crate::manager::KeyStoreManager) boundary; they
//! are translated into [`KmsError`](crate::error::KmsError) there.

use crate::asymmetric::errors::AsymmetricError;
use crate::symmetric::errors::SymmetricError;
use thiserror::Error;

/// 提供者操作可能遇到的错误类型
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("key material does not belong to this provider's algorithm family")]
    MaterialMismatch,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("integrity check failed")]
    Integrity,

    #[error("decryption failed")]
    Decryption,

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("cryptographic operation failed: {0}")]
    Operation(String),
}

impl From<SymmetricError> for ProviderError {
    fn from(err: SymmetricError) -> Self {
        match err {
            SymmetricError::Integrity | SymmetricError::MalformedCiphertext(_) => {
                ProviderError::Integrity
            }
            SymmetricError::KeyGeneration(e) => ProviderError::KeyGeneration(e.to_string()),
            SymmetricError::InvalidKeySize { .. } => ProviderError::InvalidKey(err.to_string()),
            SymmetricError::Encryption => ProviderError::Operation(err.to_string()),
        }
    }
}

impl From<AsymmetricError> for ProviderError {
    fn from(err: AsymmetricError) -> Self {
        match err {
            AsymmetricError::Decryption | AsymmetricError::MalformedCiphertext(_) => {
                ProviderError::Decryption
            }
            AsymmetricError::KeyGeneration(msg) => ProviderError::KeyGeneration(msg),
            AsymmetricError::InvalidKey(msg) => ProviderError::InvalidKey(msg),
            AsymmetricError::Symmetric(inner) => ProviderError::from(inner),
            AsymmetricError::Encryption(_) | AsymmetricError::Signing(_) => {
                ProviderError::Operation(err.to_string())
            }
        }
    }
}

/// 密钥注册表存储后端的错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("key id {0:?} cannot be used as a storage name")]
    InvalidKeyId(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same call can succeed. Corrupt records and unusable ids cannot.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Unavailable(_))
    }
}
