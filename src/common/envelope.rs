//! 定义 kms-core 的自描述信封格式，用于密文和签名。
//!
//! 布局：`'K' | kind | algorithm | key_version (u32 BE) | payload`
//!
//! The header is authenticated together with the caller's associated data, so any change to it
//! is caught by the provider's integrity check.

use crate::common::algorithm::Algorithm;
use thiserror::Error;

pub const ENVELOPE_MAGIC: u8 = b'K';
pub const HEADER_LEN: usize = 7;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope is shorter than its {HEADER_LEN}-byte header")]
    Truncated,
    #[error("unexpected envelope magic byte 0x{0:02x}")]
    BadMagic(u8),
    #[error("unknown envelope kind 0x{0:02x}")]
    UnknownKind(u8),
    #[error("unknown algorithm tag 0x{0:02x}")]
    UnknownAlgorithm(u8),
}

/// 信封的类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Ciphertext,
    Signature,
}

impl EnvelopeKind {
    fn tag(self) -> u8 {
        match self {
            EnvelopeKind::Ciphertext => 0x01,
            EnvelopeKind::Signature => 0x02,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(EnvelopeKind::Ciphertext),
            0x02 => Some(EnvelopeKind::Signature),
            _ => None,
        }
    }
}

/// `EnvelopeHeader` 位于密文或签名之前，记录了定位正确密钥版本所需的全部信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub kind: EnvelopeKind,
    pub algorithm: Algorithm,
    pub key_version: u32,
}

impl EnvelopeHeader {
    pub fn ciphertext(algorithm: Algorithm, key_version: u32) -> Self {
        Self {
            kind: EnvelopeKind::Ciphertext,
            algorithm,
            key_version,
        }
    }

    pub fn signature(algorithm: Algorithm, key_version: u32) -> Self {
        Self {
            kind: EnvelopeKind::Signature,
            algorithm,
            key_version,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = ENVELOPE_MAGIC;
        out[1] = self.kind.tag();
        out[2] = self.algorithm.tag();
        out[3..].copy_from_slice(&self.key_version.to_be_bytes());
        out
    }

    /// Splits an envelope into its header and the provider payload.
    pub fn parse(envelope: &[u8]) -> Result<(Self, &[u8]), EnvelopeError> {
        if envelope.len() < HEADER_LEN {
            return Err(EnvelopeError::Truncated);
        }
        let (header, payload) = envelope.split_at(HEADER_LEN);
        if header[0] != ENVELOPE_MAGIC {
            return Err(EnvelopeError::BadMagic(header[0]));
        }
        let kind = EnvelopeKind::from_tag(header[1]).ok_or(EnvelopeError::UnknownKind(header[1]))?;
        let algorithm =
            Algorithm::from_tag(header[2]).ok_or(EnvelopeError::UnknownAlgorithm(header[2]))?;
        let key_version = u32::from_be_bytes([header[3], header[4], header[5], header[6]]);

        Ok((
            Self {
                kind,
                algorithm,
                key_version,
            },
            payload,
        ))
    }

    /// Associated data handed to the provider: the encoded header followed by the caller's data.
    /// The header has a fixed length, so the concatenation is unambiguous.
    pub fn associated_data(&self, caller_data: Option<&[u8]>) -> Vec<u8> {
        let caller_data = caller_data.unwrap_or_default();
        let mut aad = Vec::with_capacity(HEADER_LEN + caller_data.len());
        aad.extend_from_slice(&self.to_bytes());
        aad.extend_from_slice(caller_data);
        aad
    }

    /// Prepends the header to a provider payload.
    pub fn seal(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&self.to_bytes());
        out.extend_from_slice(payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = EnvelopeHeader::ciphertext(Algorithm::Rsa, 42);
        let envelope = header.seal(b"payload");

        let (parsed, payload) = EnvelopeHeader::parse(&envelope).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert_eq!(
            EnvelopeHeader::parse(&[ENVELOPE_MAGIC, 0x01]),
            Err(EnvelopeError::Truncated)
        );
    }

    #[test]
    fn test_parse_rejects_bad_magic_kind_and_algorithm() {
        let mut bytes = EnvelopeHeader::signature(Algorithm::Aes256Gcm, 1).to_bytes();
        bytes[0] ^= 0x01;
        assert!(matches!(EnvelopeHeader::parse(&bytes), Err(EnvelopeError::BadMagic(_))));

        let mut bytes = EnvelopeHeader::signature(Algorithm::Aes256Gcm, 1).to_bytes();
        bytes[1] = 0x7f;
        assert_eq!(EnvelopeHeader::parse(&bytes), Err(EnvelopeError::UnknownKind(0x7f)));

        let mut bytes = EnvelopeHeader::signature(Algorithm::Aes256Gcm, 1).to_bytes();
        bytes[2] = 0xee;
        assert_eq!(
            EnvelopeHeader::parse(&bytes),
            Err(EnvelopeError::UnknownAlgorithm(0xee))
        );
    }

    #[test]
    fn test_associated_data_prefixes_header() {
        let header = EnvelopeHeader::ciphertext(Algorithm::Aes256Gcm, 3);
        let aad = header.associated_data(Some(b"context"));
        assert_eq!(&aad[..HEADER_LEN], &header.to_bytes());
        assert_eq!(&aad[HEADER_LEN..], b"context");
        assert_eq!(header.associated_data(None), header.to_bytes().to_vec());
    }
}
