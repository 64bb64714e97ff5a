//! # Symmetric Cryptographic Systems Module
//!
//! This module serves as a façade for all symmetric encryption algorithms supported by the crate.
//! ChaCha20-Poly1305 is behind the `chacha` feature.
//!
//! Both systems are AEADs from the RustCrypto family and share the helpers below, which fix the
//! output layout to `nonce | tag | ciphertext`.
//!
//! ---
//!
//! # 对称加密系统模块
//!
//! 本模块是所有对称加密算法的"门面"(façade)。两个系统共享下面的 AEAD 辅助函数。

pub mod aes_gcm;
#[cfg(feature = "chacha")]
pub mod chacha20_poly1305;

use crate::symmetric::errors::SymmetricError;
// `::aes_gcm` is the crate; `self::aes_gcm` is the system module above.
use ::aes_gcm::aead::generic_array::typenum::Unsigned;
use ::aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, KeySizeUser, Nonce, OsRng, Tag};

pub(crate) fn aead_encrypt<C>(
    key: &[u8],
    plaintext: &[u8],
    additional_data: Option<&[u8]>,
) -> Result<Vec<u8>, SymmetricError>
where
    C: AeadInPlace + KeyInit,
{
    let cipher = new_cipher::<C>(key)?;
    let nonce = C::generate_nonce(&mut OsRng);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, additional_data.unwrap_or(&[]), &mut buffer)
        .map_err(|_| SymmetricError::Encryption)?;

    let mut output = Vec::with_capacity(nonce.len() + tag.len() + buffer.len());
    output.extend_from_slice(nonce.as_slice());
    output.extend_from_slice(&tag);
    output.extend_from_slice(&buffer);
    Ok(output)
}

pub(crate) fn aead_decrypt<C>(
    key: &[u8],
    ciphertext: &[u8],
    additional_data: Option<&[u8]>,
) -> Result<Vec<u8>, SymmetricError>
where
    C: AeadInPlace + KeyInit,
{
    let nonce_size = <C as AeadCore>::NonceSize::USIZE;
    let tag_size = <C as AeadCore>::TagSize::USIZE;
    if ciphertext.len() < nonce_size + tag_size {
        return Err(SymmetricError::MalformedCiphertext(
            "Ciphertext is too short".to_string(),
        ));
    }
    let cipher = new_cipher::<C>(key)?;

    let (nonce_slice, rest) = ciphertext.split_at(nonce_size);
    let (tag_slice, ct_slice) = rest.split_at(tag_size);
    let nonce = Nonce::<C>::from_slice(nonce_slice);
    let tag = Tag::<C>::from_slice(tag_slice);

    let mut buffer = ct_slice.to_vec();
    cipher
        .decrypt_in_place_detached(nonce, additional_data.unwrap_or(&[]), &mut buffer, tag)
        .map_err(|_| SymmetricError::Integrity)?;
    Ok(buffer)
}

fn new_cipher<C: KeyInit>(key: &[u8]) -> Result<C, SymmetricError> {
    C::new_from_slice(key).map_err(|_| SymmetricError::InvalidKeySize {
        expected: <C as KeySizeUser>::KeySize::USIZE,
        actual: key.len(),
    })
}
