use thiserror::Error;

/// 对称加密系统的错误类型
#[derive(Error, Debug)]
pub enum SymmetricError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(#[from] rand_core::OsError),

    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("Encryption failed")]
    Encryption,

    #[error("Decryption failed: authentication tag mismatch")]
    Integrity,

    #[error("Ciphertext is malformed or truncated: {0}")]
    MalformedCiphertext(String),
}
