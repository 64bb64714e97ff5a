//! Implements the object-safe cryptography provider capability used by the key store manager.
//!
//! The typed systems in [`crate::symmetric`] and [`crate::asymmetric`] are static: their
//! functions take raw key bytes and carry their algorithm as an associated constant. A key
//! registry needs the opposite: one value per algorithm, chosen at runtime from a key's tag.
//! [`SymmetricProvider`] and [`AsymmetricProvider`] bridge the two.
//!
//! Only asymmetric providers expose [`AsymmetricCapability`]; asking a symmetric provider for it
//! returns `None`, which the manager turns into an unsupported-operation error.

use crate::asymmetric::traits::AsymmetricCryptographicSystem;
use crate::common::algorithm::Algorithm;
use crate::common::config::CryptoConfig;
use crate::common::errors::ProviderError;
use crate::common::utils::ZeroizingVec;
use crate::symmetric::traits::SymmetricCryptographicSystem;
use std::fmt;
use std::marker::PhantomData;
use zeroize::Zeroizing;

const SYMMETRIC_TAG: u8 = 0x01;
const ASYMMETRIC_TAG: u8 = 0x02;
const PUBLIC_LEN_PREFIX: usize = 4;

/// Raw key material of one key version.
///
/// Secret halves live in [`ZeroizingVec`] and are wiped when the value is dropped. Outside of
/// the master-protection step this type only exists for the duration of a single operation.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Symmetric {
        secret: ZeroizingVec,
    },
    Asymmetric {
        public_key: Vec<u8>,
        private_key: ZeroizingVec,
    },
}

impl KeyMaterial {
    /// The public half, if this material is a key pair.
    pub fn public_key(&self) -> Option<&[u8]> {
        match self {
            KeyMaterial::Symmetric { .. } => None,
            KeyMaterial::Asymmetric { public_key, .. } => Some(&public_key[..]),
        }
    }

    /// Binary form handed to the master key:
    /// `0x01 | secret` or `0x02 | public_len (u32 BE) | public_key | private_key`.
    ///
    /// The buffer is allocated at its final size, so no partial copy of the secret is left
    /// behind by a reallocation.
    pub(crate) fn encode(&self) -> Zeroizing<Vec<u8>> {
        match self {
            KeyMaterial::Symmetric { secret } => {
                let mut out = Zeroizing::new(Vec::with_capacity(1 + secret.len()));
                out.push(SYMMETRIC_TAG);
                out.extend_from_slice(secret);
                out
            }
            KeyMaterial::Asymmetric {
                public_key,
                private_key,
            } => {
                let len = 1 + PUBLIC_LEN_PREFIX + public_key.len() + private_key.len();
                let mut out = Zeroizing::new(Vec::with_capacity(len));
                out.push(ASYMMETRIC_TAG);
                out.extend_from_slice(&(public_key.len() as u32).to_be_bytes());
                out.extend_from_slice(public_key);
                out.extend_from_slice(private_key);
                out
            }
        }
    }

    /// Inverse of [`encode`](Self::encode). `None` for anything malformed.
    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        let (&tag, rest) = bytes.split_first()?;
        match tag {
            SYMMETRIC_TAG => Some(KeyMaterial::Symmetric {
                secret: ZeroizingVec(rest.to_vec()),
            }),
            ASYMMETRIC_TAG => {
                let prefix: [u8; PUBLIC_LEN_PREFIX] = rest.get(..PUBLIC_LEN_PREFIX)?.try_into().ok()?;
                let rest = &rest[PUBLIC_LEN_PREFIX..];
                let public_len = usize::try_from(u32::from_be_bytes(prefix)).ok()?;
                if rest.len() < public_len {
                    return None;
                }
                let (public_key, private_key) = rest.split_at(public_len);
                Some(KeyMaterial::Asymmetric {
                    public_key: public_key.to_vec(),
                    private_key: ZeroizingVec(private_key.to_vec()),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Symmetric { .. } => f.write_str("KeyMaterial::Symmetric([REDACTED])"),
            KeyMaterial::Asymmetric { public_key, .. } => write!(
                f,
                "KeyMaterial::Asymmetric {{ public_key: {} bytes, private_key: [REDACTED] }}",
                public_key.len()
            ),
        }
    }
}

/// Operations every provider supports, whatever its algorithm family.
///
/// Implementations must be stateless apart from immutable configuration: they receive material
/// by reference for one call and never cache, log, or persist it.
pub trait CryptographyProvider: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Generates fresh material from the operating system's secure random source.
    fn generate(&self) -> Result<KeyMaterial, ProviderError>;

    /// Encrypts with a random nonce per call. The nonce is part of the returned payload.
    fn encrypt(
        &self,
        material: &KeyMaterial,
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProviderError>;

    /// Decrypts and authenticates. Tampered or truncated input is an error, never garbage output.
    fn decrypt(
        &self,
        material: &KeyMaterial,
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProviderError>;

    /// The signing and public-key half of the capability, for key-pair algorithms.
    fn asymmetric(&self) -> Option<&dyn AsymmetricCapability> {
        None
    }
}

/// Operations only key-pair algorithms support.
pub trait AsymmetricCapability: Send + Sync {
    /// Encrypts to a stored public key; the private half is never needed.
    fn encrypt_with_public_key(
        &self,
        public_key: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProviderError>;

    fn sign(&self, material: &KeyMaterial, message: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// `Ok(false)` for a signature that does not match; errors only for unusable public keys.
    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProviderError>;

    /// PEM (SPKI) encoding of a public key.
    fn export_public_key(&self, public_key: &[u8]) -> Result<String, ProviderError>;
}

/// Adapts a [`SymmetricCryptographicSystem`] to [`CryptographyProvider`].
pub struct SymmetricProvider<S> {
    _system: PhantomData<fn() -> S>,
}

impl<S: SymmetricCryptographicSystem> SymmetricProvider<S> {
    pub fn new() -> Self {
        Self {
            _system: PhantomData,
        }
    }

    fn secret(material: &KeyMaterial) -> Result<&[u8], ProviderError> {
        match material {
            KeyMaterial::Symmetric { secret } => Ok(&secret[..]),
            KeyMaterial::Asymmetric { .. } => Err(ProviderError::MaterialMismatch),
        }
    }
}

impl<S: SymmetricCryptographicSystem> Default for SymmetricProvider<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SymmetricCryptographicSystem> CryptographyProvider for SymmetricProvider<S> {
    fn algorithm(&self) -> Algorithm {
        S::ALGORITHM
    }

    fn generate(&self) -> Result<KeyMaterial, ProviderError> {
        let secret = S::generate_key()?;
        Ok(KeyMaterial::Symmetric { secret })
    }

    fn encrypt(
        &self,
        material: &KeyMaterial,
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProviderError> {
        Ok(S::encrypt(Self::secret(material)?, plaintext, associated_data)?)
    }

    fn decrypt(
        &self,
        material: &KeyMaterial,
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProviderError> {
        Ok(S::decrypt(Self::secret(material)?, ciphertext, associated_data)?)
    }
}

/// Adapts an [`AsymmetricCryptographicSystem`] to [`CryptographyProvider`] and
/// [`AsymmetricCapability`]. Holds the crypto configuration for key pair generation.
pub struct AsymmetricProvider<A> {
    config: CryptoConfig,
    _system: PhantomData<fn() -> A>,
}

impl<A: AsymmetricCryptographicSystem> AsymmetricProvider<A> {
    pub fn new(config: CryptoConfig) -> Self {
        Self {
            config,
            _system: PhantomData,
        }
    }

    fn keypair(material: &KeyMaterial) -> Result<(&[u8], &[u8]), ProviderError> {
        match material {
            KeyMaterial::Asymmetric {
                public_key,
                private_key,
            } => Ok((&public_key[..], &private_key[..])),
            KeyMaterial::Symmetric { .. } => Err(ProviderError::MaterialMismatch),
        }
    }
}

impl<A: AsymmetricCryptographicSystem> CryptographyProvider for AsymmetricProvider<A> {
    fn algorithm(&self) -> Algorithm {
        A::ALGORITHM
    }

    fn generate(&self) -> Result<KeyMaterial, ProviderError> {
        let (public_key, private_key) = A::generate_keypair(&self.config)?;
        Ok(KeyMaterial::Asymmetric {
            public_key,
            private_key,
        })
    }

    fn encrypt(
        &self,
        material: &KeyMaterial,
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProviderError> {
        let (public_key, _) = Self::keypair(material)?;
        self.encrypt_with_public_key(public_key, plaintext, associated_data)
    }

    fn decrypt(
        &self,
        material: &KeyMaterial,
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProviderError> {
        let (_, private_key) = Self::keypair(material)?;
        Ok(A::decrypt(private_key, ciphertext, associated_data)?)
    }

    fn asymmetric(&self) -> Option<&dyn AsymmetricCapability> {
        Some(self)
    }
}

impl<A: AsymmetricCryptographicSystem> AsymmetricCapability for AsymmetricProvider<A> {
    fn encrypt_with_public_key(
        &self,
        public_key: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProviderError> {
        Ok(A::encrypt(public_key, plaintext, associated_data)?)
    }

    fn sign(&self, material: &KeyMaterial, message: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let (_, private_key) = Self::keypair(material)?;
        Ok(A::sign(private_key, message)?)
    }

    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProviderError> {
        Ok(A::verify(public_key, message, signature)?)
    }

    fn export_public_key(&self, public_key: &[u8]) -> Result<String, ProviderError> {
        Ok(A::export_public_key(public_key)?)
    }
}
