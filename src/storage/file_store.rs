//! Implements a `KeyRegistryStore` that keeps one JSON file per key in a directory.
//!
//! Files are named `<key id>.key.json` and are written atomically through a temporary file.
//! On Unix the files are created with the configured permissions. The directory also holds
//! `master.salt`, the salt for passphrase-derived master keys.

use crate::common::config::StorageConfig;
use crate::common::errors::StoreError;
use crate::master_key::SALT_LEN;
use crate::registry::{KeyId, KeyRecord};
use crate::storage::traits::KeyRegistryStore;
use rand_core::{OsRng, TryRngCore};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const RECORD_SUFFIX: &str = ".key.json";
const SALT_FILE: &str = "master.salt";

/// A `KeyRegistryStore` backed by a directory of JSON files.
#[derive(Debug)]
pub struct FileStore {
    storage_dir: PathBuf,
    file_permissions: u32,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `storage_dir`.
    ///
    /// # Arguments
    ///
    /// * `storage_dir`: The directory where key files will be stored.
    /// * `file_permissions`: Unix mode for new files, e.g. `0o600`. Ignored elsewhere.
    pub fn open<P: AsRef<Path>>(storage_dir: P, file_permissions: u32) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        fs::create_dir_all(&storage_dir)?;
        Ok(Self {
            storage_dir,
            file_permissions,
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        Self::open(&config.key_storage_dir, config.file_permissions)
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Reads the master salt, generating and persisting one on first use.
    pub fn master_salt(&self) -> Result<[u8; SALT_LEN], StoreError> {
        let path = self.storage_dir.join(SALT_FILE);
        match fs::read(&path) {
            Ok(bytes) => bytes.as_slice().try_into().map_err(|_| {
                StoreError::Corrupt(format!("{} is not {} bytes", path.display(), SALT_LEN))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let mut salt = [0u8; SALT_LEN];
                OsRng
                    .try_fill_bytes(&mut salt)
                    .map_err(|e| StoreError::Unavailable(format!("OS random source failed: {}", e)))?;
                self.write_atomic(&path, &salt)?;
                debug!(path = %path.display(), "created master salt");
                Ok(salt)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Path of a key's record file. Only `[A-Za-z0-9_-]` ids are accepted, so an id can never
    /// escape the storage directory.
    fn record_path(&self, key_id: &KeyId) -> Result<PathBuf, StoreError> {
        let id = key_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKeyId(id.to_string()));
        }
        Ok(self.storage_dir.join(format!("{}{}", id, RECORD_SUFFIX)))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        // Atomic write to prevent a torn record if the process dies mid-write.
        let temp_path = path.with_extension("tmp");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.file_permissions);
        }

        let mut file = options.open(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl KeyRegistryStore for FileStore {
    fn load_all(&self) -> Result<Vec<KeyRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.storage_dir)? {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(RECORD_SUFFIX));
            if !path.is_file() || !is_record {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            let record: KeyRecord = serde_json::from_str(&contents)?;
            records.push(record);
        }
        debug!(count = records.len(), dir = %self.storage_dir.display(), "loaded key records");
        Ok(records)
    }

    fn save(&self, record: &KeyRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.id)?;
        let json = serde_json::to_vec_pretty(record)?;
        self.write_atomic(&path, &json)
    }

    fn remove(&self, key_id: &KeyId) -> Result<(), StoreError> {
        let path = self.record_path(key_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::algorithm::Algorithm;
    use crate::common::utils::ZeroizingVec;
    use crate::master_key::MasterKey;
    use crate::provider::KeyMaterial;
    use chrono::Utc;

    fn record(master: &MasterKey) -> KeyRecord {
        let id = KeyId::new();
        let material = KeyMaterial::Symmetric {
            secret: ZeroizingVec(vec![0x11; 32]),
        };
        let wrapped = master.wrap(&id, 1, &material).unwrap();
        KeyRecord::new(id, Algorithm::Aes256Gcm, wrapped, None, Utc::now())
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 0o600).unwrap();
        let master = MasterKey::generate().unwrap();
        let record = record(&master);

        store.save(&record).unwrap();
        let path = dir.path().join(format!("{}.key.json", record.id));
        assert!(path.exists());
        assert!(!dir.path().join(format!("{}.key.tmp", record.id)).exists());

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 0o600).unwrap();
        let record = record(&MasterKey::generate().unwrap());
        store.save(&record).unwrap();

        let path = dir.path().join(format!("{}.key.json", record.id));
        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_record_contains_no_cleartext_material() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 0o600).unwrap();
        let record = record(&MasterKey::generate().unwrap());
        store.save(&record).unwrap();

        let json = fs::read_to_string(dir.path().join(format!("{}.key.json", record.id))).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("17, 17, 17"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 0o600).unwrap();
        let record = record(&MasterKey::generate().unwrap());

        store.save(&record).unwrap();
        store.remove(&record.id).unwrap();
        store.remove(&record.id).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_key_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 0o600).unwrap();
        let result = store.remove(&KeyId::from("../etc/passwd"));
        assert!(matches!(result, Err(StoreError::InvalidKeyId(_))));
    }

    #[test]
    fn test_master_salt_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 0o600).unwrap();
        let first = store.master_salt().unwrap();
        let second = store.master_salt().unwrap();
        assert_eq!(first, second);

        // The salt file is not mistaken for a record.
        assert!(store.load_all().unwrap().is_empty());
    }
}
