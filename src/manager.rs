//! 密钥存储管理器：密钥生命周期与密码学操作的唯一入口。
//!
//! `KeyStoreManager` owns the registry. Each key sits behind its own mutex, reached through a
//! `DashMap` whose shard guard is released before the mutex is taken, so operations on one key
//! are serialized while unrelated keys proceed independently.
//!
//! Mutations build a successor record, persist it through the [`KeyRegistryStore`] and only then
//! install it in memory; a failed persist leaves the previous state untouched. Because nothing is
//! committed before the last fallible step, a poisoned per-key lock still guards a consistent
//! record and is recovered rather than propagated.
//!
//! Key material is unwrapped from its [`WrappedMaterial`](crate::master_key::WrappedMaterial)
//! for the duration of a single provider call and zeroized when that call returns.

use crate::common::algorithm::Algorithm;
use crate::common::config::KmsConfig;
use crate::common::envelope::{EnvelopeHeader, EnvelopeKind};
use crate::error::{KmsError, KmsResult};
use crate::factory::ProviderFactory;
use crate::master_key::MasterKey;
use crate::provider::{AsymmetricCapability, CryptographyProvider, KeyMaterial};
use crate::registry::{KeyId, KeyInfo, KeyRecord, KeyVersion, PublicKeyInfo};
use crate::storage::{FileStore, KeyRegistryStore, MemoryStore, with_retries};
use chrono::Utc;
use dashmap::DashMap;
use secrecy::SecretString;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

type KeySlot = Arc<Mutex<Option<KeyRecord>>>;

/// The process-wide key store. Construct once and share it, e.g. behind an `Arc`.
pub struct KeyStoreManager {
    config: KmsConfig,
    factory: ProviderFactory,
    master_key: MasterKey,
    store: Arc<dyn KeyRegistryStore>,
    keys: DashMap<KeyId, KeySlot>,
}

impl KeyStoreManager {
    /// An in-memory key store under a random master key.
    pub fn new(config: KmsConfig) -> KmsResult<Self> {
        Self::open(config, MasterKey::generate()?, Arc::new(MemoryStore::new()))
    }

    /// Opens the file store configured in `config.storage`, deriving the master key from
    /// `passphrase` and the salt kept in the storage directory.
    pub fn open_with_passphrase(config: KmsConfig, passphrase: &SecretString) -> KmsResult<Self> {
        config.validate()?;
        let store = with_retries(&config.storage, "open", || {
            FileStore::from_config(&config.storage)
        })?;
        let salt = with_retries(&config.storage, "master_salt", || store.master_salt())?;
        let master_key = MasterKey::from_passphrase(passphrase, &salt, &config.crypto)?;
        Self::open(config, master_key, Arc::new(store))
    }

    /// Loads every record from `store`.
    ///
    /// The current version of each record is unwrapped once, so a wrong master key fails here
    /// with [`KmsError::Integrity`] instead of on first use.
    pub fn open(
        config: KmsConfig,
        master_key: MasterKey,
        store: Arc<dyn KeyRegistryStore>,
    ) -> KmsResult<Self> {
        config.validate()?;
        let factory = ProviderFactory::new(&config.crypto);
        let records = with_retries(&config.storage, "load_all", || store.load_all())?;

        let keys = DashMap::with_capacity(records.len());
        for record in records {
            let current = record.versions.last().ok_or_else(|| KmsError::Integrity {
                key_id: record.id.clone(),
            })?;
            master_key.unwrap(&record.id, current.version, &current.material)?;
            keys.insert(record.id.clone(), Arc::new(Mutex::new(Some(record))));
        }
        info!(keys = keys.len(), "opened key registry");

        Ok(Self {
            config,
            factory,
            master_key,
            store,
            keys,
        })
    }

    pub fn config(&self) -> &KmsConfig {
        &self.config
    }

    /// The provider factory. New algorithms can be registered here at runtime.
    pub fn factory(&self) -> &ProviderFactory {
        &self.factory
    }

    /// Generates version 1 of a new key and returns its id.
    pub fn create_key(&self, algorithm: Algorithm) -> KmsResult<KeyId> {
        let provider = self.factory.resolve(algorithm)?;
        let key_id = KeyId::new();

        let material = provider
            .generate()
            .map_err(|e| KmsError::from_provider(&key_id, e))?;
        let wrapped = self.master_key.wrap(&key_id, 1, &material)?;
        let public_key = material.public_key().map(<[u8]>::to_vec);
        drop(material);

        let record = KeyRecord::new(key_id.clone(), algorithm, wrapped, public_key, Utc::now());
        self.persist(&record)?;
        self.keys
            .insert(key_id.clone(), Arc::new(Mutex::new(Some(record))));

        info!(key_id = %key_id, %algorithm, version = 1, "created key");
        Ok(key_id)
    }

    /// Installs a new Active version and returns its number.
    pub fn rotate_key(&self, key_id: &KeyId) -> KmsResult<u32> {
        self.with_key(key_id, "rotate", |slot| {
            let record = existing(slot, key_id)?;
            record.active_version("rotate")?;
            let provider = self.factory.resolve(record.algorithm)?;

            let version = record.next_version();
            let material = provider
                .generate()
                .map_err(|e| KmsError::from_provider(key_id, e))?;
            let wrapped = self.master_key.wrap(key_id, version, &material)?;
            let public_key = material.public_key().map(<[u8]>::to_vec);
            drop(material);

            let next = record.rotated(wrapped, public_key, Utc::now())?;
            self.persist(&next)?;
            *slot = Some(next);

            info!(key_id = %key_id, version, "rotated key");
            Ok(version)
        })
    }

    /// Revokes every version. Revoking a revoked key is a no-op.
    pub fn revoke_key(&self, key_id: &KeyId) -> KmsResult<()> {
        self.with_key(key_id, "revoke", |slot| {
            let record = existing(slot, key_id)?;
            let Some(next) = record.revoked(Utc::now()) else {
                debug!(key_id = %key_id, "key already revoked");
                return Ok(());
            };
            self.persist(&next)?;
            *slot = Some(next);

            info!(key_id = %key_id, "revoked key");
            Ok(())
        })
    }

    /// Physically erases a revoked key.
    pub fn delete_key(&self, key_id: &KeyId) -> KmsResult<()> {
        self.with_key(key_id, "delete", |slot| {
            let record = existing(slot, key_id)?;
            if !record.is_revoked() {
                return Err(KmsError::InvalidState {
                    key_id: key_id.clone(),
                    state: record.state(),
                    operation: "delete",
                });
            }
            with_retries(&self.config.storage, "remove", || self.store.remove(key_id))?;
            // Callers already waiting on this slot observe `KeyNotFound`.
            *slot = None;
            self.keys.remove(key_id);
            Ok(())
        })?;

        info!(key_id = %key_id, "deleted key");
        Ok(())
    }

    /// Encrypts under the Active version. The result is a self-describing envelope.
    pub fn encrypt(
        &self,
        key_id: &KeyId,
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> KmsResult<Vec<u8>> {
        self.with_key(key_id, "encrypt", |slot| {
            let record = existing(slot, key_id)?;
            let version = record.active_version("encrypt")?;
            let provider = self.factory.resolve(record.algorithm)?;

            let header = EnvelopeHeader::ciphertext(record.algorithm, version.version);
            let aad = header.associated_data(associated_data);
            let payload = match (provider.asymmetric(), &version.public_key) {
                (Some(capability), Some(public_key)) => capability
                    .encrypt_with_public_key(public_key.as_bytes(), plaintext, Some(&aad))
                    .map_err(|e| KmsError::from_provider(key_id, e))?,
                _ => self.with_material(record, version, |material| {
                    provider
                        .encrypt(material, plaintext, Some(&aad))
                        .map_err(|e| KmsError::from_provider(key_id, e))
                })?,
            };

            debug!(key_id = %key_id, version = version.version, "encrypted");
            Ok(header.seal(&payload))
        })
    }

    /// Decrypts an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// The key version comes from the envelope. An explicit `version` must agree with it;
    /// Rotated versions are accepted, Revoked keys are not.
    pub fn decrypt(
        &self,
        key_id: &KeyId,
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
        version: Option<u32>,
    ) -> KmsResult<Vec<u8>> {
        self.with_key(key_id, "decrypt", |slot| {
            let record = existing(slot, key_id)?;
            record.ensure_not_revoked("decrypt")?;
            let integrity = || KmsError::Integrity {
                key_id: key_id.clone(),
            };

            let (header, payload) = EnvelopeHeader::parse(ciphertext).map_err(|_| integrity())?;
            if header.kind != EnvelopeKind::Ciphertext || header.algorithm != record.algorithm {
                return Err(integrity());
            }
            if version.is_some_and(|requested| requested != header.key_version) {
                return Err(integrity());
            }
            let key_version = record.version(header.key_version).ok_or_else(integrity)?;
            let provider = self.factory.resolve(record.algorithm)?;

            let aad = header.associated_data(associated_data);
            let plaintext = self.with_material(record, key_version, |material| {
                provider
                    .decrypt(material, payload, Some(&aad))
                    .map_err(|e| KmsError::from_provider(key_id, e))
            })?;

            debug!(key_id = %key_id, version = header.key_version, "decrypted");
            Ok(plaintext)
        })
    }

    /// Signs with the Active version of an asymmetric key. Returns a signature envelope.
    pub fn sign(&self, key_id: &KeyId, message: &[u8]) -> KmsResult<Vec<u8>> {
        self.with_key(key_id, "sign", |slot| {
            let record = existing(slot, key_id)?;
            let version = record.active_version("sign")?;
            let provider = self.factory.resolve(record.algorithm)?;
            let capability = asymmetric(&*provider, "sign")?;

            let header = EnvelopeHeader::signature(record.algorithm, version.version);
            let signature = self.with_material(record, version, |material| {
                capability
                    .sign(material, message)
                    .map_err(|e| KmsError::from_provider(key_id, e))
            })?;

            debug!(key_id = %key_id, version = version.version, "signed");
            Ok(header.seal(&signature))
        })
    }

    /// Verifies a signature envelope against the public half of the version it names.
    ///
    /// A malformed envelope, or one naming a version this key does not have, verifies as `false`.
    pub fn verify(&self, key_id: &KeyId, message: &[u8], signature: &[u8]) -> KmsResult<bool> {
        self.with_key(key_id, "verify", |slot| {
            let record = existing(slot, key_id)?;
            record.ensure_not_revoked("verify")?;
            let provider = self.factory.resolve(record.algorithm)?;
            let capability = asymmetric(&*provider, "verify")?;

            let Ok((header, raw_signature)) = EnvelopeHeader::parse(signature) else {
                return Ok(false);
            };
            if header.kind != EnvelopeKind::Signature || header.algorithm != record.algorithm {
                return Ok(false);
            }
            let Some(version) = record.version(header.key_version) else {
                return Ok(false);
            };
            let public_key = version.public_key.as_ref().ok_or_else(|| {
                KmsError::Internal(format!(
                    "key {} version {} has no public key",
                    key_id, version.version
                ))
            })?;

            let valid = capability
                .verify(public_key.as_bytes(), message, raw_signature)
                .map_err(|e| KmsError::from_provider(key_id, e))?;
            debug!(key_id = %key_id, version = version.version, valid, "verified");
            Ok(valid)
        })
    }

    /// Metadata of a key, including revoked keys. Never includes material.
    pub fn describe_key(&self, key_id: &KeyId) -> KmsResult<KeyInfo> {
        self.with_key(key_id, "describe", |slot| Ok(existing(slot, key_id)?.info()))
    }

    /// Ids of every key in the registry, sorted.
    pub fn list_keys(&self) -> Vec<KeyId> {
        let mut ids: Vec<KeyId> = self.keys.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// PEM export of an asymmetric key's public half; the current version unless one is named.
    pub fn public_key(&self, key_id: &KeyId, version: Option<u32>) -> KmsResult<PublicKeyInfo> {
        self.with_key(key_id, "get_public_key", |slot| {
            let record = existing(slot, key_id)?;
            record.ensure_not_revoked("get_public_key")?;
            let provider = self.factory.resolve(record.algorithm)?;
            let capability = asymmetric(&*provider, "get_public_key")?;

            let number = version.unwrap_or_else(|| record.current_version());
            let key_version = record
                .version(number)
                .ok_or_else(|| KmsError::VersionNotFound {
                    key_id: key_id.clone(),
                    version: number,
                })?;
            let public_key = key_version.public_key.as_ref().ok_or_else(|| {
                KmsError::Internal(format!("key {} version {} has no public key", key_id, number))
            })?;

            let pem = capability
                .export_public_key(public_key.as_bytes())
                .map_err(|e| KmsError::from_provider(key_id, e))?;
            Ok(PublicKeyInfo {
                key_id: key_id.clone(),
                version: number,
                algorithm: record.algorithm,
                pem,
            })
        })
    }

    /// Runs `op` while holding the key's lock. The map guard is dropped before locking.
    fn with_key<T>(
        &self,
        key_id: &KeyId,
        operation: &'static str,
        op: impl FnOnce(&mut Option<KeyRecord>) -> KmsResult<T>,
    ) -> KmsResult<T> {
        let slot = self
            .keys
            .get(key_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| KmsError::KeyNotFound(key_id.clone()));

        let result = slot.and_then(|slot| {
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut *guard)
        });
        if let Err(err) = &result {
            warn!(key_id = %key_id, operation, error = %err, "operation rejected");
        }
        result
    }

    /// Unwraps one version's material for the duration of `op`.
    fn with_material<T>(
        &self,
        record: &KeyRecord,
        version: &KeyVersion,
        op: impl FnOnce(&KeyMaterial) -> KmsResult<T>,
    ) -> KmsResult<T> {
        let material = self
            .master_key
            .unwrap(&record.id, version.version, &version.material)?;
        op(&material)
    }

    fn persist(&self, record: &KeyRecord) -> KmsResult<()> {
        with_retries(&self.config.storage, "save", || self.store.save(record))
    }
}

fn existing<'a>(slot: &'a Option<KeyRecord>, key_id: &KeyId) -> KmsResult<&'a KeyRecord> {
    slot.as_ref()
        .ok_or_else(|| KmsError::KeyNotFound(key_id.clone()))
}

fn asymmetric<'a>(
    provider: &'a dyn CryptographyProvider,
    operation: &'static str,
) -> KmsResult<&'a dyn AsymmetricCapability> {
    provider
        .asymmetric()
        .ok_or(KmsError::UnsupportedOperation {
            algorithm: provider.algorithm(),
            operation,
        })
}
