//! The master-protection step: wraps key material before it reaches a [`KeyRegistryStore`].
//!
//! Material is encoded into an exactly sized zeroizing buffer and sealed with AES-256-GCM under
//! the master key. The associated data binds the wrapped blob to its key id and version, so blobs cannot be
//! swapped between records or versions in the store without failing authentication.
//!
//! The master key itself comes either from the OS random source or from a passphrase through
//! Argon2id, with costs taken from [`CryptoConfig`].
//!
//! [`KeyRegistryStore`]: crate::storage::KeyRegistryStore

use crate::common::config::CryptoConfig;
use crate::common::utils::Base64Bytes;
use crate::error::{KmsError, KmsResult};
use crate::provider::KeyMaterial;
use crate::registry::KeyId;
use crate::symmetric::systems::aes_gcm::AesGcmSystem;
use crate::symmetric::traits::SymmetricCryptographicSystem;
use argon2::{Algorithm as Argon2Algorithm, Argon2, Params, Version};
use rand_core::{OsRng, TryRngCore};
use secrecy::{ExposeSecret, SecretBox, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

pub const MASTER_KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;

/// Key material sealed under the master key. Safe to persist.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedMaterial(Base64Bytes);

impl WrappedMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for WrappedMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappedMaterial({} bytes)", self.0.as_bytes().len())
    }
}

/// The key-encryption key of a registry.
pub struct MasterKey {
    key: SecretBox<[u8; MASTER_KEY_LEN]>,
}

impl MasterKey {
    /// A fresh random master key. It exists only in memory, so records wrapped under it cannot
    /// be reopened after the process exits.
    pub fn generate() -> KmsResult<Self> {
        let mut key = Box::new([0u8; MASTER_KEY_LEN]);
        OsRng
            .try_fill_bytes(key.as_mut_slice())
            .map_err(|e| KmsError::Cryptography(format!("OS random source failed: {}", e)))?;
        Ok(Self {
            key: SecretBox::new(key),
        })
    }

    /// Derives the master key from a passphrase with Argon2id.
    pub fn from_passphrase(
        passphrase: &SecretString,
        salt: &[u8],
        config: &CryptoConfig,
    ) -> KmsResult<Self> {
        let params = Params::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
            Some(MASTER_KEY_LEN),
        )
        .map_err(|e| KmsError::Configuration(format!("invalid Argon2 parameters: {}", e)))?;
        let argon2 = Argon2::new(Argon2Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Box::new([0u8; MASTER_KEY_LEN]);
        argon2
            .hash_password_into(
                passphrase.expose_secret().as_bytes(),
                salt,
                key.as_mut_slice(),
            )
            .map_err(|e| KmsError::Cryptography(format!("master key derivation failed: {}", e)))?;

        Ok(Self {
            key: SecretBox::new(key),
        })
    }

    /// Random salt for [`from_passphrase`](Self::from_passphrase).
    pub fn generate_salt() -> KmsResult<[u8; SALT_LEN]> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| KmsError::Cryptography(format!("OS random source failed: {}", e)))?;
        Ok(salt)
    }

    pub(crate) fn wrap(
        &self,
        key_id: &KeyId,
        version: u32,
        material: &KeyMaterial,
    ) -> KmsResult<WrappedMaterial> {
        let encoded = material.encode();
        let sealed = AesGcmSystem::encrypt(
            self.key.expose_secret(),
            &encoded,
            Some(binding(key_id, version).as_bytes()),
        )
        .map_err(|_| KmsError::Cryptography("failed to protect key material".to_string()))?;
        Ok(WrappedMaterial(Base64Bytes(sealed)))
    }

    /// Fails with [`KmsError::Integrity`] under the wrong master key or for a blob that was
    /// moved to another key id or version.
    pub(crate) fn unwrap(
        &self,
        key_id: &KeyId,
        version: u32,
        wrapped: &WrappedMaterial,
    ) -> KmsResult<KeyMaterial> {
        let encoded = AesGcmSystem::decrypt(
            self.key.expose_secret(),
            wrapped.as_bytes(),
            Some(binding(key_id, version).as_bytes()),
        )
        .map(Zeroizing::new)
        .map_err(|_| KmsError::Integrity {
            key_id: key_id.clone(),
        })?;
        KeyMaterial::decode(&encoded).ok_or_else(|| KmsError::Integrity {
            key_id: key_id.clone(),
        })
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

fn binding(key_id: &KeyId, version: u32) -> String {
    format!("kms-core/material/{}/v{}", key_id, version)
}
