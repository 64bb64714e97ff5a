//!
//! 集成测试的通用辅助函数
//!
#![allow(dead_code)]

use kms_core::common::errors::StoreError;
use kms_core::{
    CryptoConfig, KeyId, KeyRecord, KeyRegistryStore, KeyStoreManager, KmsConfig, MasterKey,
    MemoryStore, StorageConfig,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Installs a test-writer subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Small RSA keys, cheap Argon2 and millisecond backoff.
pub fn test_config() -> KmsConfig {
    KmsConfig {
        crypto: CryptoConfig {
            rsa_key_bits: 2048,
            argon2_memory_cost: 1024,
            argon2_time_cost: 1,
            ..Default::default()
        },
        storage: StorageConfig {
            max_attempts: 3,
            retry_backoff_ms: 1,
            ..Default::default()
        },
    }
}

/// (In memory) 创建一个使用随机主密钥的管理器。
pub fn manager() -> KeyStoreManager {
    init_tracing();
    KeyStoreManager::new(test_config()).unwrap()
}

/// A manager over the given store, under a fresh master key.
pub fn manager_with_store(store: Arc<dyn KeyRegistryStore>) -> KeyStoreManager {
    init_tracing();
    KeyStoreManager::open(test_config(), MasterKey::generate().unwrap(), store).unwrap()
}

/// A store whose writes fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failures_remaining: AtomicU32,
    down: AtomicBool,
    pub write_attempts: AtomicU32,
}

impl FlakyStore {
    /// The next `count` writes fail.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is down".to_string()));
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("transient failure".to_string()));
        }
        Ok(())
    }
}

impl KeyRegistryStore for FlakyStore {
    fn load_all(&self) -> Result<Vec<KeyRecord>, StoreError> {
        self.inner.load_all()
    }

    fn save(&self, record: &KeyRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.save(record)
    }

    fn remove(&self, key_id: &KeyId) -> Result<(), StoreError> {
        self.check()?;
        self.inner.remove(key_id)
    }
}

#[derive(Default)]
struct Gate {
    key_id: Option<KeyId>,
    entered: bool,
    released: bool,
}

/// A store that parks `save` and `remove` calls for one chosen key until released.
///
/// Lets a test hold a key's lock for as long as it likes while other work runs.
#[derive(Default)]
pub struct GatedStore {
    pub inner: MemoryStore,
    gate: Mutex<Gate>,
    changed: Condvar,
}

impl GatedStore {
    pub fn gate(&self, key_id: &KeyId) {
        let mut gate = self.gate.lock().unwrap();
        *gate = Gate {
            key_id: Some(key_id.clone()),
            ..Default::default()
        };
    }

    /// Blocks until a save or remove for the gated key is parked.
    pub fn wait_until_entered(&self) {
        let gate = self.gate.lock().unwrap();
        let _gate = self.changed.wait_while(gate, |g| !g.entered).unwrap();
    }

    pub fn release(&self) {
        let mut gate = self.gate.lock().unwrap();
        gate.released = true;
        self.changed.notify_all();
    }

    fn park(&self, key_id: &KeyId) {
        let mut gate = self.gate.lock().unwrap();
        if gate.key_id.as_ref() == Some(key_id) && !gate.released {
            gate.entered = true;
            self.changed.notify_all();
            let _gate = self.changed.wait_while(gate, |g| !g.released).unwrap();
        }
    }
}

impl KeyRegistryStore for GatedStore {
    fn load_all(&self) -> Result<Vec<KeyRecord>, StoreError> {
        self.inner.load_all()
    }

    fn save(&self, record: &KeyRecord) -> Result<(), StoreError> {
        self.park(&record.id);
        self.inner.save(record)
    }

    fn remove(&self, key_id: &KeyId) -> Result<(), StoreError> {
        self.park(key_id);
        self.inner.remove(key_id)
    }
}
