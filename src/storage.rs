//! The storage module, defining how the key registry is persisted.
// 中文: 存储模块，定义密钥注册表如何持久化。
//
// Every store call made by the manager goes through `with_retries`, so a failing backend
// surfaces as `KmsError::StorageUnavailable` after a bounded number of attempts instead of
// hanging the caller.

pub mod file_store;
pub mod memory_store;
pub mod traits;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::KeyRegistryStore;

use crate::common::config::StorageConfig;
use crate::common::errors::StoreError;
use crate::error::{KmsError, KmsResult};
use std::thread;
use tracing::warn;

/// Runs `call` up to `config.max_attempts` times with linear backoff between attempts.
///
/// Only transient failures are retried. A permanent one (a corrupt record, an unusable key id)
/// fails at once with [`KmsError::Internal`], since the backend itself is reachable.
pub(crate) fn with_retries<T, F>(
    config: &StorageConfig,
    operation: &'static str,
    mut call: F,
) -> KmsResult<T>
where
    F: FnMut() -> Result<T, StoreError>,
{
    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => {
                warn!(operation, error = %err, "key registry store rejected call");
                return Err(KmsError::Internal(format!(
                    "key registry store rejected {}: {}",
                    operation,
                    permanent_reason(&err)
                )));
            }
            Err(err) => {
                warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    error = %err,
                    "key registry store call failed"
                );
                if attempt < attempts {
                    thread::sleep(config.retry_backoff() * attempt);
                }
            }
        }
    }
    Err(KmsError::StorageUnavailable { attempts })
}

// Fixed text: serde messages may quote stored content.
fn permanent_reason(err: &StoreError) -> &'static str {
    match err {
        StoreError::Serialization(_) | StoreError::Corrupt(_) => "stored record is corrupt",
        StoreError::InvalidKeyId(_) => "key id cannot be stored",
        StoreError::Io(_) | StoreError::Unavailable(_) => "backend failure",
    }
}
