//! 密钥注册表的数据模型：密钥记录、版本以及每个版本的状态机。
//!
//! A [`KeyRecord`] is only ever changed by producing a new record (`rotated`, `revoked`), so the
//! manager can persist the successor before it replaces the in-memory value.
//!
//! State machine per version: `Active --rotate--> Rotated`, `{Active, Rotated} --revoke--> Revoked`.
//! Revocation applies to every version at once and is terminal.

use crate::common::algorithm::{Algorithm, AlgorithmFamily};
use crate::common::utils::Base64Bytes;
use crate::error::{KmsError, KmsResult};
use crate::master_key::WrappedMaterial;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, immutable key identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// A new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for KeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for KeyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for KeyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// 密钥版本的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// 活跃状态，接受所有操作
    Active,
    /// 已轮换，仅用于解密旧数据和验证旧签名
    Rotated,
    /// 已吊销，终止状态
    Revoked,
}

impl KeyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyState::Active => "active",
            KeyState::Rotated => "rotated",
            KeyState::Revoked => "revoked",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation of a key's material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyVersion {
    pub version: u32,
    pub state: KeyState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub rotated_at: Option<DateTime<Utc>>,
    /// DER (SPKI) public key of asymmetric versions, stored in clear.
    #[serde(default)]
    pub public_key: Option<Base64Bytes>,
    pub material: WrappedMaterial,
}

/// 注册表中的一个密钥：算法固定，版本只增不减。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: KeyId,
    pub algorithm: Algorithm,
    pub versions: Vec<KeyVersion>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub rotated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// A record with a single Active version 1.
    pub fn new(
        id: KeyId,
        algorithm: Algorithm,
        material: WrappedMaterial,
        public_key: Option<Vec<u8>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            algorithm,
            versions: vec![KeyVersion {
                version: 1,
                state: KeyState::Active,
                created_at: now,
                rotated_at: None,
                public_key: public_key.map(Base64Bytes),
                material,
            }],
            created_at: now,
            rotated_at: None,
            revoked_at: None,
        }
    }

    /// Highest version number.
    pub fn current_version(&self) -> u32 {
        self.versions.last().map(|v| v.version).unwrap_or(0)
    }

    /// Next version number a rotation will install.
    pub fn next_version(&self) -> u32 {
        self.current_version() + 1
    }

    /// Key-level state: Revoked once revoked, otherwise Active.
    pub fn state(&self) -> KeyState {
        if self.is_revoked() {
            KeyState::Revoked
        } else {
            KeyState::Active
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn version(&self, version: u32) -> Option<&KeyVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Rejects every operation on a revoked key.
    pub fn ensure_not_revoked(&self, operation: &'static str) -> KmsResult<()> {
        if self.is_revoked() {
            return Err(KmsError::InvalidState {
                key_id: self.id.clone(),
                state: KeyState::Revoked,
                operation,
            });
        }
        Ok(())
    }

    /// The single Active version, for operations that produce new ciphertext or signatures.
    pub fn active_version(&self, operation: &'static str) -> KmsResult<&KeyVersion> {
        self.ensure_not_revoked(operation)?;
        self.versions
            .iter()
            .find(|v| v.state == KeyState::Active)
            .ok_or_else(|| KmsError::InvalidState {
                key_id: self.id.clone(),
                state: self.state(),
                operation,
            })
    }

    /// Successor record with `material` installed as the new Active version and the previous
    /// Active version marked Rotated.
    pub fn rotated(
        &self,
        material: WrappedMaterial,
        public_key: Option<Vec<u8>>,
        now: DateTime<Utc>,
    ) -> KmsResult<KeyRecord> {
        self.active_version("rotate")?;

        let mut next = self.clone();
        let version = next.next_version();
        for existing in next
            .versions
            .iter_mut()
            .filter(|v| v.state == KeyState::Active)
        {
            existing.state = KeyState::Rotated;
            existing.rotated_at = Some(now);
        }
        next.versions.push(KeyVersion {
            version,
            state: KeyState::Active,
            created_at: now,
            rotated_at: None,
            public_key: public_key.map(Base64Bytes),
            material,
        });
        next.rotated_at = Some(now);
        Ok(next)
    }

    /// Successor record with every version Revoked, or `None` if already revoked.
    pub fn revoked(&self, now: DateTime<Utc>) -> Option<KeyRecord> {
        if self.is_revoked() {
            return None;
        }
        let mut next = self.clone();
        for version in next.versions.iter_mut() {
            version.state = KeyState::Revoked;
        }
        next.revoked_at = Some(now);
        Some(next)
    }

    /// Metadata without any material.
    pub fn info(&self) -> KeyInfo {
        KeyInfo {
            id: self.id.clone(),
            algorithm: self.algorithm,
            family: self.algorithm.family(),
            state: self.state(),
            current_version: self.current_version(),
            created_at: self.created_at,
            rotated_at: self.rotated_at,
            revoked_at: self.revoked_at,
            versions: self
                .versions
                .iter()
                .map(|v| VersionInfo {
                    version: v.version,
                    state: v.state,
                    created_at: v.created_at,
                    rotated_at: v.rotated_at,
                })
                .collect(),
        }
    }
}

/// 密钥的公开描述信息，不包含任何密钥材料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub id: KeyId,
    pub algorithm: Algorithm,
    pub family: AlgorithmFamily,
    pub state: KeyState,
    pub current_version: u32,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub versions: Vec<VersionInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: u32,
    pub state: KeyState,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

/// Exported public half of an asymmetric key version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    pub key_id: KeyId,
    pub version: u32,
    pub algorithm: Algorithm,
    pub pem: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master_key::MasterKey;
    use crate::provider::KeyMaterial;
    use crate::common::utils::ZeroizingVec;

    fn wrapped(master: &MasterKey, id: &KeyId, version: u32) -> WrappedMaterial {
        let material = KeyMaterial::Symmetric {
            secret: ZeroizingVec(vec![version as u8; 32]),
        };
        master.wrap(id, version, &material).unwrap()
    }

    fn record() -> (MasterKey, KeyRecord) {
        let master = MasterKey::generate().unwrap();
        let id = KeyId::new();
        let material = wrapped(&master, &id, 1);
        let record = KeyRecord::new(id, Algorithm::Aes256Gcm, material, None, Utc::now());
        (master, record)
    }

    #[test]
    fn test_new_record_is_active_v1() {
        let (_, record) = record();
        assert_eq!(record.current_version(), 1);
        assert_eq!(record.state(), KeyState::Active);
        assert_eq!(record.active_version("encrypt").unwrap().version, 1);
        assert!(record.rotated_at.is_none());
    }

    #[test]
    fn test_rotation_marks_previous_rotated() {
        let (master, record) = record();
        let material = wrapped(&master, &record.id, 2);
        let next = record.rotated(material, None, Utc::now()).unwrap();

        // The original is untouched until the caller commits the successor.
        assert_eq!(record.current_version(), 1);

        assert_eq!(next.current_version(), 2);
        assert_eq!(next.version(1).unwrap().state, KeyState::Rotated);
        assert!(next.version(1).unwrap().rotated_at.is_some());
        assert_eq!(next.active_version("encrypt").unwrap().version, 2);
        assert_eq!(
            next.versions
                .iter()
                .filter(|v| v.state == KeyState::Active)
                .count(),
            1
        );
        assert_eq!(next.algorithm, record.algorithm);
    }

    #[test]
    fn test_revocation_is_terminal_and_idempotent() {
        let (master, record) = record();
        let revoked = record.revoked(Utc::now()).unwrap();

        assert_eq!(revoked.state(), KeyState::Revoked);
        assert!(revoked.versions.iter().all(|v| v.state == KeyState::Revoked));
        assert!(revoked.revoked(Utc::now()).is_none());

        let material = wrapped(&master, &revoked.id, 2);
        let result = revoked.rotated(material, None, Utc::now());
        assert!(matches!(
            result,
            Err(KmsError::InvalidState { state: KeyState::Revoked, operation: "rotate", .. })
        ));
        assert!(matches!(
            revoked.active_version("encrypt"),
            Err(KmsError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_info_carries_no_material() {
        let (master, record) = record();
        let material = wrapped(&master, &record.id, 2);
        let record = record.rotated(material, None, Utc::now()).unwrap();

        let info = record.info();
        assert_eq!(info.current_version, 2);
        assert_eq!(info.family, AlgorithmFamily::Symmetric);
        assert_eq!(info.versions.len(), 2);

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("material"));
    }

    #[test]
    fn test_record_json_roundtrip() {
        let (_, record) = record();
        let json = serde_json::to_string_pretty(&record).unwrap();
        let back: KeyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_key_state_display() {
        assert_eq!(KeyState::Rotated.to_string(), "rotated");
        let json = serde_json::to_string(&KeyState::Revoked).unwrap();
        assert_eq!(json, "\"revoked\"");
    }
}
