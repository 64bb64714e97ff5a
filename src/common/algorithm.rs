//! Algorithm identifiers shared by keys, envelopes and the provider factory.
//!
//! 密钥、信封和提供者工厂共用的算法标识。

use crate::error::KmsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The algorithm a key is bound to for its whole life.
///
/// The string form is what transport collaborators send (`"aes-256-gcm"`), the byte form is
/// what ciphertext and signature envelopes carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    /// AES-256 in Galois/Counter Mode.
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// ChaCha20 stream cipher with a Poly1305 authenticator.
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
    /// RSA key pair: hybrid RSA-OAEP/AES-GCM encryption and RSA-PSS signatures.
    #[serde(rename = "rsa")]
    Rsa,
}

/// 算法族：决定密钥材料的形状以及可用的操作集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmFamily {
    Symmetric,
    Asymmetric,
}

impl Algorithm {
    /// Every algorithm the crate knows how to name. Whether a provider is registered for it
    /// is up to the [`ProviderFactory`](crate::factory::ProviderFactory).
    pub const ALL: [Algorithm; 3] = [
        Algorithm::Aes256Gcm,
        Algorithm::ChaCha20Poly1305,
        Algorithm::Rsa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "aes-256-gcm",
            Algorithm::ChaCha20Poly1305 => "chacha20-poly1305",
            Algorithm::Rsa => "rsa",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Algorithm::Aes256Gcm | Algorithm::ChaCha20Poly1305 => AlgorithmFamily::Symmetric,
            Algorithm::Rsa => AlgorithmFamily::Asymmetric,
        }
    }

    /// Wire tag written into envelopes.
    pub fn tag(&self) -> u8 {
        match self {
            Algorithm::Aes256Gcm => 0x01,
            Algorithm::ChaCha20Poly1305 => 0x02,
            Algorithm::Rsa => 0x10,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|algorithm| algorithm.tag() == tag)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = KmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == normalized)
            .ok_or_else(|| KmsError::UnsupportedAlgorithm(s.to_string()))
    }
}
