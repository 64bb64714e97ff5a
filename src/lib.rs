//! # kms-core: Key Lifecycle Engine
//!
//! `kms-core` creates, stores, versions and uses cryptographic keys on behalf of callers. It
//! exposes encryption, decryption and signing without ever returning raw key material.
//!
//! ## Core Concepts
//!
//! - **`KeyStoreManager`**: owns every key and its lifecycle (`Active -> Rotated -> Revoked`),
//!   serializes operations per key, and delegates cryptography to providers.
//! - **`ProviderFactory`**: maps an [`Algorithm`] to its provider. It is the only place that
//!   dispatches on the algorithm.
//! - **`CryptographyProvider`**: the capability every algorithm implements. Key-pair algorithms
//!   additionally expose [`AsymmetricCapability`] for signing and public key export.
//! - **`KeyRegistryStore`**: persistence for key records, whose material is always wrapped by
//!   the [`MasterKey`] first.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kms_core::{Algorithm, KeyStoreManager, KmsConfig};
//!
//! fn main() -> kms_core::KmsResult<()> {
//!     let manager = KeyStoreManager::new(KmsConfig::default())?;
//!     let key_id = manager.create_key(Algorithm::Aes256Gcm)?;
//!
//!     let ciphertext = manager.encrypt(&key_id, b"Hello, kms-core!", Some(b"invoice-7"))?;
//!     let plaintext = manager.decrypt(&key_id, &ciphertext, Some(b"invoice-7"), None)?;
//!     assert_eq!(plaintext, b"Hello, kms-core!");
//!
//!     manager.rotate_key(&key_id)?;
//!     // Data sealed under version 1 still decrypts after rotation.
//!     assert_eq!(manager.decrypt(&key_id, &ciphertext, Some(b"invoice-7"), Some(1))?, plaintext);
//!     Ok(())
//! }
//! ```

pub mod asymmetric;
pub mod command;
pub mod common;
pub mod error;
pub mod factory;
pub mod manager;
pub mod master_key;
pub mod provider;
pub mod registry;
pub mod storage;
pub mod symmetric;

pub use command::{KmsCommand, KmsResponse};
#[cfg(feature = "async")]
pub use command::AsyncCommandExecutor;
pub use common::{Algorithm, AlgorithmFamily, CryptoConfig, KmsConfig, StorageConfig};
pub use error::{KmsError, KmsResult};
pub use factory::ProviderFactory;
pub use manager::KeyStoreManager;
pub use master_key::{MasterKey, WrappedMaterial};
pub use provider::{
    AsymmetricCapability, AsymmetricProvider, CryptographyProvider, KeyMaterial, SymmetricProvider,
};
pub use registry::{KeyId, KeyInfo, KeyRecord, KeyState, KeyVersion, PublicKeyInfo, VersionInfo};
pub use storage::{FileStore, KeyRegistryStore, MemoryStore};

/// The version of the `kms-core` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
