//! Traits for abstracting key registry persistence.
// 中文: 用于抽象密钥注册表持久化的 Trait。

use crate::common::errors::StoreError;
use crate::registry::{KeyId, KeyRecord};

/// Defines the interface between the key store manager and a persistence backend.
///
/// Records reach the store with their material already wrapped by the master key, so a store
/// never sees key material in clear. Calls are synchronous and may fail transiently; the
/// manager retries them a bounded number of times.
///
/// 中文: 定义密钥存储管理器与持久化后端之间的接口。
///
/// 记录在到达存储之前已由主密钥封装，存储后端永远看不到明文密钥材料。
pub trait KeyRegistryStore: Send + Sync {
    /// Loads every persisted record.
    ///
    /// 中文: 加载所有已持久化的记录。
    fn load_all(&self) -> Result<Vec<KeyRecord>, StoreError>;

    /// Inserts or replaces the record with the same id.
    ///
    /// 中文: 插入或替换具有相同 id 的记录。
    fn save(&self, record: &KeyRecord) -> Result<(), StoreError>;

    /// Physically erases a record. Removing a missing record is not an error.
    ///
    /// 中文: 物理删除记录。删除不存在的记录不是错误。
    fn remove(&self, key_id: &KeyId) -> Result<(), StoreError>;
}
