//! AES-GCM 对称加密实现
use crate::common::algorithm::Algorithm;
use crate::symmetric::errors::SymmetricError;
use crate::symmetric::systems::{aead_decrypt, aead_encrypt};
use crate::symmetric::traits::SymmetricCryptographicSystem;
use aes_gcm::Aes256Gcm;

const KEY_SIZE: usize = 32;

/// AES-256-GCM 对称加密系统
#[derive(Debug)]
pub struct AesGcmSystem;

impl SymmetricCryptographicSystem for AesGcmSystem {
    const ALGORITHM: Algorithm = Algorithm::Aes256Gcm;
    const KEY_SIZE: usize = KEY_SIZE;

    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, SymmetricError> {
        aead_encrypt::<Aes256Gcm>(key, plaintext, additional_data)
    }

    fn decrypt(
        key: &[u8],
        ciphertext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, SymmetricError> {
        aead_decrypt::<Aes256Gcm>(key, ciphertext, additional_data)
    }
}
