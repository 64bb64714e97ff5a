use crate::symmetric::errors::SymmetricError;
use thiserror::Error;

/// 非对称加密系统的错误类型
///
/// Messages carry library diagnostics only, never key bytes.
#[derive(Error, Debug)]
pub enum AsymmetricError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed")]
    Decryption,

    #[error("Ciphertext is malformed or truncated: {0}")]
    MalformedCiphertext(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Payload cipher error: {0}")]
    Symmetric(#[from] SymmetricError),
}
