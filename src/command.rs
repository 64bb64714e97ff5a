//! The command surface consumed by transport collaborators.
//!
//! Commands and responses are plain serde types, tagged by `"command"` and `"response"`, with
//! byte fields carried as Base64 strings. A transport deserializes a [`KmsCommand`], hands it to
//! [`KeyStoreManager::execute`] and serializes the [`KmsResponse`] or maps the [`KmsError`].
//!
//! With the `async` feature, [`AsyncCommandExecutor`] runs commands on tokio's blocking pool so
//! that async request handlers are never blocked by key generation or storage I/O.
//!
//! [`KmsError`]: crate::error::KmsError

use crate::common::utils::Base64Bytes;
use crate::error::KmsResult;
use crate::manager::KeyStoreManager;
use crate::registry::{KeyId, KeyInfo, PublicKeyInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum KmsCommand {
    CreateKey {
        algorithm: String,
    },
    RotateKey {
        key_id: KeyId,
    },
    RevokeKey {
        key_id: KeyId,
    },
    DeleteKey {
        key_id: KeyId,
    },
    Encrypt {
        key_id: KeyId,
        plaintext: Base64Bytes,
        #[serde(default)]
        associated_data: Option<Base64Bytes>,
    },
    Decrypt {
        key_id: KeyId,
        ciphertext: Base64Bytes,
        #[serde(default)]
        associated_data: Option<Base64Bytes>,
        #[serde(default)]
        version: Option<u32>,
    },
    Sign {
        key_id: KeyId,
        message: Base64Bytes,
    },
    Verify {
        key_id: KeyId,
        message: Base64Bytes,
        signature: Base64Bytes,
    },
    DescribeKey {
        key_id: KeyId,
    },
    ListKeys,
    GetPublicKey {
        key_id: KeyId,
        #[serde(default)]
        version: Option<u32>,
    },
}

impl KmsCommand {
    /// Command name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            KmsCommand::CreateKey { .. } => "create_key",
            KmsCommand::RotateKey { .. } => "rotate_key",
            KmsCommand::RevokeKey { .. } => "revoke_key",
            KmsCommand::DeleteKey { .. } => "delete_key",
            KmsCommand::Encrypt { .. } => "encrypt",
            KmsCommand::Decrypt { .. } => "decrypt",
            KmsCommand::Sign { .. } => "sign",
            KmsCommand::Verify { .. } => "verify",
            KmsCommand::DescribeKey { .. } => "describe_key",
            KmsCommand::ListKeys => "list_keys",
            KmsCommand::GetPublicKey { .. } => "get_public_key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum KmsResponse {
    KeyCreated { key_id: KeyId },
    KeyRotated { key_id: KeyId, version: u32 },
    KeyRevoked { key_id: KeyId },
    KeyDeleted { key_id: KeyId },
    Ciphertext { ciphertext: Base64Bytes },
    Plaintext { plaintext: Base64Bytes },
    Signature { signature: Base64Bytes },
    Verified { valid: bool },
    KeyDescription(KeyInfo),
    KeyList { key_ids: Vec<KeyId> },
    PublicKey(PublicKeyInfo),
}

impl KeyStoreManager {
    /// Executes one command against this key store.
    pub fn execute(&self, command: KmsCommand) -> KmsResult<KmsResponse> {
        tracing::trace!(command = command.name(), "executing command");
        let response = match command {
            KmsCommand::CreateKey { algorithm } => KmsResponse::KeyCreated {
                key_id: self.create_key(algorithm.parse()?)?,
            },
            KmsCommand::RotateKey { key_id } => {
                let version = self.rotate_key(&key_id)?;
                KmsResponse::KeyRotated { key_id, version }
            }
            KmsCommand::RevokeKey { key_id } => {
                self.revoke_key(&key_id)?;
                KmsResponse::KeyRevoked { key_id }
            }
            KmsCommand::DeleteKey { key_id } => {
                self.delete_key(&key_id)?;
                KmsResponse::KeyDeleted { key_id }
            }
            KmsCommand::Encrypt {
                key_id,
                plaintext,
                associated_data,
            } => KmsResponse::Ciphertext {
                ciphertext: self
                    .encrypt(
                        &key_id,
                        plaintext.as_bytes(),
                        associated_data.as_ref().map(Base64Bytes::as_bytes),
                    )?
                    .into(),
            },
            KmsCommand::Decrypt {
                key_id,
                ciphertext,
                associated_data,
                version,
            } => KmsResponse::Plaintext {
                plaintext: self
                    .decrypt(
                        &key_id,
                        ciphertext.as_bytes(),
                        associated_data.as_ref().map(Base64Bytes::as_bytes),
                        version,
                    )?
                    .into(),
            },
            KmsCommand::Sign { key_id, message } => KmsResponse::Signature {
                signature: self.sign(&key_id, message.as_bytes())?.into(),
            },
            KmsCommand::Verify {
                key_id,
                message,
                signature,
            } => KmsResponse::Verified {
                valid: self.verify(&key_id, message.as_bytes(), signature.as_bytes())?,
            },
            KmsCommand::DescribeKey { key_id } => {
                KmsResponse::KeyDescription(self.describe_key(&key_id)?)
            }
            KmsCommand::ListKeys => KmsResponse::KeyList {
                key_ids: self.list_keys(),
            },
            KmsCommand::GetPublicKey { key_id, version } => {
                KmsResponse::PublicKey(self.public_key(&key_id, version)?)
            }
        };
        Ok(response)
    }
}

#[cfg(feature = "async")]
pub use self::async_executor::AsyncCommandExecutor;

#[cfg(feature = "async")]
mod async_executor {
    use super::{KmsCommand, KmsResponse};
    use crate::error::{KmsError, KmsResult};
    use crate::manager::KeyStoreManager;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Executes commands from async request handlers.
    #[async_trait]
    pub trait AsyncCommandExecutor {
        async fn execute_async(&self, command: KmsCommand) -> KmsResult<KmsResponse>;
    }

    #[async_trait]
    impl AsyncCommandExecutor for Arc<KeyStoreManager> {
        async fn execute_async(&self, command: KmsCommand) -> KmsResult<KmsResponse> {
            let manager = Arc::clone(self);
            tokio::task::spawn_blocking(move || manager.execute(command))
                .await
                .map_err(|e| KmsError::Internal(format!("command task failed: {}", e)))?
        }
    }
}
