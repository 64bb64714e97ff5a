//!
//! # 通用配置模块
//!
//! 包含 KMS 核心所使用的配置结构。
//! 这些结构定义了加密参数和存储行为，可以来自默认值、JSON 文件或环境变量。
//!
use crate::error::{KmsError, KmsResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Smallest RSA modulus the asymmetric provider will generate.
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// 加密配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CryptoConfig {
    /// RSA 密钥长度（位）
    pub rsa_key_bits: usize,
    /// Argon2 内存成本 (KiB)，用于从口令派生主密钥
    pub argon2_memory_cost: u32,
    /// Argon2 时间成本（迭代次数）
    pub argon2_time_cost: u32,
    /// Argon2 并行度
    pub argon2_parallelism: u32,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            rsa_key_bits: 3072,
            argon2_memory_cost: 19456, // 19 MiB
            argon2_time_cost: 2,
            argon2_parallelism: 1,
        }
    }
}

/// 存储配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// 密钥注册表目录（仅文件存储使用）
    pub key_storage_dir: String,
    /// 每次持久化调用的最大尝试次数
    pub max_attempts: u32,
    /// 重试间隔基数（毫秒），第 n 次重试前等待 n 倍
    pub retry_backoff_ms: u64,
    /// 持久化文件权限（Unix文件模式，如0o600）
    pub file_permissions: u32,
}

impl StorageConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_storage_dir: "./keys".to_string(),
            max_attempts: 3,
            retry_backoff_ms: 50,
            file_permissions: 0o600, // 等同于 -rw-------
        }
    }
}

/// 完整配置文件
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct KmsConfig {
    /// 加密配置
    #[serde(default)]
    pub crypto: CryptoConfig,
    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,
}

impl KmsConfig {
    /// 从 JSON 文件加载配置，缺失的字段使用默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> KmsResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            KmsError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: KmsConfig = serde_json::from_str(&contents).map_err(|e| {
            KmsError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 从环境变量加载配置
    pub fn from_env() -> KmsResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source, starting from the defaults.
    pub fn from_lookup<F>(lookup: F) -> KmsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bits) = parse_var(&lookup, "KMS_RSA_KEY_BITS")? {
            config.crypto.rsa_key_bits = bits;
        }
        if let Some(mem) = parse_var(&lookup, "KMS_ARGON2_MEMORY_COST")? {
            config.crypto.argon2_memory_cost = mem;
        }
        if let Some(tc) = parse_var(&lookup, "KMS_ARGON2_TIME_COST")? {
            config.crypto.argon2_time_cost = tc;
        }
        if let Some(dir) = lookup("KMS_KEY_STORAGE_DIR") {
            config.storage.key_storage_dir = dir;
        }
        if let Some(attempts) = parse_var(&lookup, "KMS_STORAGE_MAX_ATTEMPTS")? {
            config.storage.max_attempts = attempts;
        }
        if let Some(backoff) = parse_var(&lookup, "KMS_STORAGE_RETRY_BACKOFF_MS")? {
            config.storage.retry_backoff_ms = backoff;
        }
        // 八进制，例如 "600"
        if let Some(mode) = lookup("KMS_FILE_PERMISSIONS") {
            config.storage.file_permissions = u32::from_str_radix(mode.trim(), 8).map_err(|e| {
                KmsError::Configuration(format!("KMS_FILE_PERMISSIONS={mode:?}: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KmsResult<()> {
        if self.crypto.rsa_key_bits < MIN_RSA_KEY_BITS {
            return Err(KmsError::Configuration(format!(
                "rsa_key_bits must be at least {MIN_RSA_KEY_BITS}, got {}",
                self.crypto.rsa_key_bits
            )));
        }
        if self.crypto.argon2_time_cost == 0 || self.crypto.argon2_parallelism == 0 {
            return Err(KmsError::Configuration(
                "argon2 time cost and parallelism must be non-zero".to_string(),
            ));
        }
        if self.storage.max_attempts == 0 {
            return Err(KmsError::Configuration(
                "storage.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> KmsResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| KmsError::Configuration(format!("{name}={raw:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = KmsConfig::default();
        assert_eq!(config.crypto.rsa_key_bits, 3072);
        assert_eq!(config.storage.max_attempts, 3);
        assert_eq!(config.storage.file_permissions, 0o600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = KmsConfig::from_lookup(lookup_from(&[
            ("KMS_RSA_KEY_BITS", "4096"),
            ("KMS_KEY_STORAGE_DIR", "/var/lib/kms"),
            ("KMS_STORAGE_MAX_ATTEMPTS", "5"),
            ("KMS_STORAGE_RETRY_BACKOFF_MS", "10"),
            ("KMS_FILE_PERMISSIONS", "640"),
        ]))
        .unwrap();

        assert_eq!(config.crypto.rsa_key_bits, 4096);
        assert_eq!(config.storage.key_storage_dir, "/var/lib/kms");
        assert_eq!(config.storage.max_attempts, 5);
        assert_eq!(config.storage.retry_backoff(), Duration::from_millis(10));
        assert_eq!(config.storage.file_permissions, 0o640);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = KmsConfig::from_lookup(lookup_from(&[("KMS_RSA_KEY_BITS", "lots")]));
        assert!(matches!(result, Err(KmsError::Configuration(_))));
    }

    #[test]
    fn test_weak_rsa_rejected() {
        let result = KmsConfig::from_lookup(lookup_from(&[("KMS_RSA_KEY_BITS", "1024")]));
        assert!(matches!(result, Err(KmsError::Configuration(msg)) if msg.contains("2048")));
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kms.json");
        fs::write(&path, r#"{ "crypto": { "rsa_key_bits": 2048 } }"#).unwrap();

        let config = KmsConfig::from_file(&path).unwrap();
        assert_eq!(config.crypto.rsa_key_bits, 2048);
        assert_eq!(config.crypto.argon2_time_cost, 2);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_from_file_missing_is_configuration_error() {
        let result = KmsConfig::from_file("/definitely/not/here/kms.json");
        assert!(matches!(result, Err(KmsError::Configuration(_))));
    }
}
