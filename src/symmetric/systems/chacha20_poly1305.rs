//! ChaCha20-Poly1305 对称加密实现
use crate::common::algorithm::Algorithm;
use crate::symmetric::errors::SymmetricError;
use crate::symmetric::systems::{aead_decrypt, aead_encrypt};
use crate::symmetric::traits::SymmetricCryptographicSystem;
use chacha20poly1305::ChaCha20Poly1305;

/// ChaCha20-Poly1305 对称加密系统
#[derive(Debug)]
pub struct ChaCha20Poly1305System;

impl SymmetricCryptographicSystem for ChaCha20Poly1305System {
    const ALGORITHM: Algorithm = Algorithm::ChaCha20Poly1305;
    const KEY_SIZE: usize = 32;

    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, SymmetricError> {
        aead_encrypt::<ChaCha20Poly1305>(key, plaintext, additional_data)
    }

    fn decrypt(
        key: &[u8],
        ciphertext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, SymmetricError> {
        aead_decrypt::<ChaCha20Poly1305>(key, ciphertext, additional_data)
    }
}
