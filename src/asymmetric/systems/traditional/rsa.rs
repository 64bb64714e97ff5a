//! `RsaCryptoSystem` 提供基于 RSA 的非对称加解密与签名功能。
//!
//! 加密采用混合模式：每次调用生成一次性的 256 位数据密钥 (DEK)，用 RSA-OAEP(SHA-256)
//! 封装 DEK，再用 AES-256-GCM 加密载荷。因此明文长度不受 RSA 模数限制，且任何篡改都会被检测到。
//! 签名采用 RSA-PSS(SHA-256)。
//!
//! 密文布局：`wrapped_dek_len (u16 BE) | wrapped_dek | nonce | tag | ciphertext`

use crate::asymmetric::errors::AsymmetricError;
use crate::asymmetric::traits::AsymmetricCryptographicSystem;
use crate::common::algorithm::Algorithm;
use crate::common::config::{CryptoConfig, MIN_RSA_KEY_BITS};
use crate::common::utils::ZeroizingVec;
use crate::symmetric::systems::aes_gcm::AesGcmSystem;
use crate::symmetric::traits::SymmetricCryptographicSystem;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{Signature as PssSignature, SigningKey, VerifyingKey};
use rsa::rand_core::OsRng as RsaOsRng;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

const WRAPPED_LEN_PREFIX: usize = 2;

/// RSA加密系统实现
pub struct RsaCryptoSystem;

impl RsaCryptoSystem {
    fn parse_public_key(public_key: &[u8]) -> Result<RsaPublicKey, AsymmetricError> {
        RsaPublicKey::from_public_key_der(public_key)
            .map_err(|e| AsymmetricError::InvalidKey(format!("failed to parse RSA public key: {}", e)))
    }

    fn parse_private_key(private_key: &[u8]) -> Result<RsaPrivateKey, AsymmetricError> {
        // The pkcs8 error does not echo the input, so it is safe to format.
        RsaPrivateKey::from_pkcs8_der(private_key)
            .map_err(|e| AsymmetricError::InvalidKey(format!("failed to parse RSA private key: {}", e)))
    }
}

impl AsymmetricCryptographicSystem for RsaCryptoSystem {
    const ALGORITHM: Algorithm = Algorithm::Rsa;

    fn generate_keypair(
        config: &CryptoConfig,
    ) -> Result<(Vec<u8>, ZeroizingVec), AsymmetricError> {
        let bits = config.rsa_key_bits;
        if bits < MIN_RSA_KEY_BITS {
            return Err(AsymmetricError::KeyGeneration(format!(
                "RSA keys must be at least {MIN_RSA_KEY_BITS} bits, requested {bits}"
            )));
        }

        let mut rng = RsaOsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| AsymmetricError::KeyGeneration(format!("生成RSA密钥失败: {}", e)))?;
        let public_key = RsaPublicKey::from(&private_key);

        // 将密钥转换为DER格式
        let public_der = public_key
            .to_public_key_der()
            .map_err(|e| AsymmetricError::KeyGeneration(format!("导出RSA公钥DER失败: {}", e)))?;
        let private_der = private_key
            .to_pkcs8_der()
            .map_err(|e| AsymmetricError::KeyGeneration(format!("导出RSA私钥DER失败: {}", e)))?;

        Ok((
            public_der.as_bytes().to_vec(),
            ZeroizingVec(private_der.as_bytes().to_vec()),
        ))
    }

    fn encrypt(
        public_key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, AsymmetricError> {
        let public_key = Self::parse_public_key(public_key)?;

        let dek = AesGcmSystem::generate_key()?;
        let mut rng = RsaOsRng;
        let wrapped_dek = public_key
            .encrypt(&mut rng, Oaep::new::<Sha256>(), &dek)
            .map_err(|e| AsymmetricError::Encryption(format!("RSA-OAEP封装失败: {}", e)))?;
        let wrapped_len = u16::try_from(wrapped_dek.len()).map_err(|_| {
            AsymmetricError::Encryption("wrapped data key exceeds 65535 bytes".to_string())
        })?;

        let sealed = AesGcmSystem::encrypt(&dek, plaintext, additional_data)?;

        let mut output = Vec::with_capacity(WRAPPED_LEN_PREFIX + wrapped_dek.len() + sealed.len());
        output.extend_from_slice(&wrapped_len.to_be_bytes());
        output.extend_from_slice(&wrapped_dek);
        output.extend_from_slice(&sealed);
        Ok(output)
    }

    fn decrypt(
        private_key: &[u8],
        ciphertext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, AsymmetricError> {
        if ciphertext.len() < WRAPPED_LEN_PREFIX {
            return Err(AsymmetricError::MalformedCiphertext(
                "missing wrapped key length".to_string(),
            ));
        }
        let (len_bytes, rest) = ciphertext.split_at(WRAPPED_LEN_PREFIX);
        let wrapped_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        if rest.len() < wrapped_len {
            return Err(AsymmetricError::MalformedCiphertext(
                "wrapped key is truncated".to_string(),
            ));
        }
        let (wrapped_dek, sealed) = rest.split_at(wrapped_len);

        let private_key = Self::parse_private_key(private_key)?;
        let dek = private_key
            .decrypt(Oaep::new::<Sha256>(), wrapped_dek)
            .map(ZeroizingVec)
            .map_err(|_| AsymmetricError::Decryption)?;

        AesGcmSystem::decrypt(&dek, sealed, additional_data).map_err(|_| AsymmetricError::Decryption)
    }

    fn sign(private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, AsymmetricError> {
        let rsa_private_key = Self::parse_private_key(private_key)?;

        let signing_key = SigningKey::<Sha256>::new(rsa_private_key);
        let mut rng = RsaOsRng;
        let signature = signing_key
            .try_sign_with_rng(&mut rng, message)
            .map_err(|e| AsymmetricError::Signing(format!("RSA-PSS签名失败: {}", e)))?;

        Ok(signature.to_vec())
    }

    fn verify(
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, AsymmetricError> {
        let rsa_public_key = Self::parse_public_key(public_key)?;

        let verifying_key = VerifyingKey::<Sha256>::new(rsa_public_key);
        let Ok(rsa_signature) = PssSignature::try_from(signature) else {
            return Ok(false);
        };

        Ok(verifying_key.verify(message, &rsa_signature).is_ok())
    }

    fn export_public_key(public_key: &[u8]) -> Result<String, AsymmetricError> {
        let public_key = Self::parse_public_key(public_key)?;
        public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AsymmetricError::InvalidKey(format!("RSA公钥导出失败: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;
    use std::sync::OnceLock;

    fn test_config() -> CryptoConfig {
        CryptoConfig {
            rsa_key_bits: 2048,
            ..Default::default()
        }
    }

    // RSA key generation dominates test time, so the suite shares two key pairs.
    fn keys() -> &'static (Vec<u8>, ZeroizingVec) {
        static KEYS: OnceLock<(Vec<u8>, ZeroizingVec)> = OnceLock::new();
        KEYS.get_or_init(|| RsaCryptoSystem::generate_keypair(&test_config()).unwrap())
    }

    fn other_keys() -> &'static (Vec<u8>, ZeroizingVec) {
        static KEYS: OnceLock<(Vec<u8>, ZeroizingVec)> = OnceLock::new();
        KEYS.get_or_init(|| RsaCryptoSystem::generate_keypair(&test_config()).unwrap())
    }

    #[test]
    fn test_generated_key_size() {
        let (public_key, _) = keys();
        let pk = RsaPublicKey::from_public_key_der(public_key).unwrap();
        assert_eq!(pk.size() * 8, 2048);
    }

    #[test]
    fn test_weak_key_size_rejected() {
        let config = CryptoConfig {
            rsa_key_bits: 1024,
            ..Default::default()
        };
        let result = RsaCryptoSystem::generate_keypair(&config);
        assert!(matches!(result, Err(AsymmetricError::KeyGeneration(_))));
    }

    #[test]
    fn test_rsa_encryption_roundtrip() {
        let (public_key, private_key) = keys();
        let plaintext = b"some secret data";

        let ciphertext = RsaCryptoSystem::encrypt(public_key, plaintext, Some(b"aad")).unwrap();
        let decrypted = RsaCryptoSystem::decrypt(private_key, &ciphertext, Some(b"aad")).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
    }

    #[test]
    fn test_plaintext_larger_than_modulus() {
        let (public_key, private_key) = keys();
        let plaintext = vec![0x5au8; 64 * 1024];

        let ciphertext = RsaCryptoSystem::encrypt(public_key, &plaintext, None).unwrap();
        let decrypted = RsaCryptoSystem::decrypt(private_key, &ciphertext, None).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_encryption_is_randomized() {
        let (public_key, _) = keys();
        let first = RsaCryptoSystem::encrypt(public_key, b"same", None).unwrap();
        let second = RsaCryptoSystem::encrypt(public_key, b"same", None).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_rsa_decrypt_wrong_key_fails() {
        let (public_key, _) = keys();
        let (_, wrong_private_key) = other_keys();

        let ciphertext = RsaCryptoSystem::encrypt(public_key, b"some secret data", None).unwrap();
        let result = RsaCryptoSystem::decrypt(wrong_private_key, &ciphertext, None);

        assert!(matches!(result, Err(AsymmetricError::Decryption)));
    }

    #[test]
    fn test_rsa_decrypt_tampered_ciphertext_fails() {
        let (public_key, private_key) = keys();
        let ciphertext = RsaCryptoSystem::encrypt(public_key, b"some original text", None).unwrap();

        // 篡改封装的 DEK
        let mut tampered = ciphertext.clone();
        tampered[WRAPPED_LEN_PREFIX + 3] ^= 0xff;
        assert!(matches!(
            RsaCryptoSystem::decrypt(private_key, &tampered, None),
            Err(AsymmetricError::Decryption)
        ));

        // 篡改载荷
        let mut tampered = ciphertext;
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(matches!(
            RsaCryptoSystem::decrypt(private_key, &tampered, None),
            Err(AsymmetricError::Decryption)
        ));
    }

    #[test]
    fn test_rsa_decrypt_truncated_fails() {
        let (_, private_key) = keys();
        assert!(matches!(
            RsaCryptoSystem::decrypt(private_key, &[0x01], None),
            Err(AsymmetricError::MalformedCiphertext(_))
        ));
        assert!(matches!(
            RsaCryptoSystem::decrypt(private_key, &[0x01, 0x00, 0xaa], None),
            Err(AsymmetricError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let (public_key, private_key) = keys();
        let data = b"data to be signed";

        let signature = RsaCryptoSystem::sign(private_key, data).unwrap();
        assert!(RsaCryptoSystem::verify(public_key, data, &signature).unwrap());
    }

    #[test]
    fn test_verify_tampered_signature_or_data_is_false() {
        let (public_key, private_key) = keys();
        let data = b"some important data";

        let mut signature = RsaCryptoSystem::sign(private_key, data).unwrap();
        assert!(!RsaCryptoSystem::verify(public_key, b"some tampered data", &signature).unwrap());

        signature[0] ^= 0xff;
        assert!(!RsaCryptoSystem::verify(public_key, data, &signature).unwrap());
        assert!(!RsaCryptoSystem::verify(public_key, data, &[]).unwrap());
    }

    #[test]
    fn test_verify_with_other_public_key_is_false() {
        let (_, private_key) = keys();
        let (other_public_key, _) = other_keys();

        let signature = RsaCryptoSystem::sign(private_key, b"ledger-entry-42").unwrap();
        assert!(!RsaCryptoSystem::verify(other_public_key, b"ledger-entry-42", &signature).unwrap());
    }

    #[test]
    fn test_export_public_key_pem() {
        let (public_key, _) = keys();
        let pem = RsaCryptoSystem::export_public_key(public_key).unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        let reparsed = RsaPublicKey::from_public_key_pem(&pem).unwrap();
        assert_eq!(reparsed.to_public_key_der().unwrap().as_bytes(), public_key.as_slice());
    }

    #[test]
    fn test_invalid_public_key_is_error() {
        let result = RsaCryptoSystem::verify(b"not-a-der-key", b"msg", b"sig");
        assert!(matches!(result, Err(AsymmetricError::InvalidKey(_))));
    }
}
