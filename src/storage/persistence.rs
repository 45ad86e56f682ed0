//! Wallet persistence layer
//!
//! The wallet and its host environment are stored together as one JSON
//! document. Saves go through a temporary file and an atomic rename, and the
//! previous document is rotated into numbered backups.

use crate::host::Chain;
use crate::multisig::MultisigWallet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("No saved wallet at {0}")]
    NotFound(PathBuf),
    #[error("Backup {0} not found")]
    BackupNotFound(usize),
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub state_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".quorum_wallet"),
            state_file: "wallet.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Everything that survives a restart
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletState {
    pub wallet: MultisigWallet,
    #[serde(default)]
    pub chain: Chain,
}

impl WalletState {
    pub fn new(wallet: MultisigWallet) -> Self {
        Self {
            wallet,
            chain: Chain::new(),
        }
    }

    /// Copy to stage changes on; the wallet copy has no sinks attached
    pub fn detached(&self) -> Self {
        Self {
            wallet: self.wallet.detached(),
            chain: self.chain.clone(),
        }
    }
}

/// Wallet storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a storage manager, creating the data directory if needed
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    /// Storage rooted at `data_dir` with default settings
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::new(StorageConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn state_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.state_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.state_file, index))
    }

    /// Save wallet state to disk
    pub fn save(&self, state: &WalletState) -> Result<(), StorageError> {
        let path = self.state_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        let temp_path = path.with_extension("tmp");
        save_to_file(state, &temp_path)?;
        fs::rename(&temp_path, &path)?;

        log::debug!("Wallet state saved to {}", path.display());
        Ok(())
    }

    /// Load wallet state from disk
    pub fn load(&self) -> Result<WalletState, StorageError> {
        let path = self.state_path();
        if !path.exists() {
            return Err(StorageError::NotFound(path));
        }
        load_from_file(&path)
    }

    /// Check if a saved wallet exists
    pub fn exists(&self) -> bool {
        self.state_path().exists()
    }

    /// Delete the saved wallet; backups are kept
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.state_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Shift backup `i` to `i + 1`, dropping the oldest
    fn rotate_backups(&self) -> Result<(), StorageError> {
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Load a backup; 0 is the most recent
    pub fn restore_backup(&self, backup_index: usize) -> Result<WalletState, StorageError> {
        let backup_path = self.backup_path(backup_index);
        if !backup_path.exists() {
            return Err(StorageError::BackupNotFound(backup_index));
        }
        load_from_file(&backup_path)
    }

    /// Indexes of the backups present on disk
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }

    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let path = self.state_path();
        let file_size = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        Ok(StorageStats {
            file_size,
            backup_count: self.list_backups().len(),
            data_dir: self.config.data_dir.clone(),
        })
    }
}

/// Storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub file_size: u64,
    pub backup_count: usize,
    pub data_dir: PathBuf,
}

/// Save wallet state to a specific file path
pub fn save_to_file(state: &WalletState, path: &Path) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, state)?;
    // Drop would swallow a failed final write
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Load wallet state from a specific file path
pub fn load_from_file(path: &Path) -> Result<WalletState, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Address;

    fn owner(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn test_storage(max_backups: usize) -> (tempfile::TempDir, Storage) {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            max_backups,
            ..Default::default()
        };
        let storage = Storage::new(config).unwrap();
        (temp_dir, storage)
    }

    fn test_state() -> WalletState {
        let wallet = MultisigWallet::new(vec![owner(1), owner(2), owner(3)], 2).unwrap();
        WalletState::new(wallet)
    }

    #[test]
    fn test_save_load_wallet() {
        let (_dir, storage) = test_storage(5);
        let mut state = test_state();
        state.wallet.deposit(owner(9), 1_000).unwrap();
        let tx_id = state.wallet.submit(owner(1), owner(4), 10, vec![]).unwrap();
        state.wallet.confirm(owner(2), tx_id).unwrap();
        state.chain.fund(owner(4), 5).unwrap();

        assert!(!storage.exists());
        storage.save(&state).unwrap();
        assert!(storage.exists());

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.wallet.address(), state.wallet.address());
        assert_eq!(loaded.wallet.balance(), 1_000);
        assert!(loaded.wallet.is_confirmed_by(tx_id, &owner(2)).unwrap());
        assert_eq!(loaded.chain.balance_of(&owner(4)), 5);
    }

    #[test]
    fn test_missing_state() {
        let (_dir, storage) = test_storage(5);
        assert!(matches!(storage.load(), Err(StorageError::NotFound(_))));
        assert!(matches!(
            storage.restore_backup(0),
            Err(StorageError::BackupNotFound(0))
        ));
        storage.delete().unwrap();
    }

    #[test]
    fn test_backup_rotation() {
        let (_dir, storage) = test_storage(3);
        let mut state = test_state();

        for i in 0..5 {
            state.wallet.deposit(owner(9), 1).unwrap();
            storage.save(&state).unwrap();
            assert_eq!(state.wallet.balance(), i + 1);
        }

        assert_eq!(storage.list_backups(), vec![0, 1, 2]);
        // Most recent backup is the save before last
        assert_eq!(storage.restore_backup(0).unwrap().wallet.balance(), 4);
        assert_eq!(storage.restore_backup(2).unwrap().wallet.balance(), 2);

        let stats = storage.stats().unwrap();
        assert!(stats.file_size > 0);
        assert_eq!(stats.backup_count, 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_final_write_is_reported() {
        // Every write to /dev/full fails with ENOSPC, including the buffered tail
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        assert!(matches!(
            save_to_file(&test_state(), full),
            Err(StorageError::IoError(_))
        ));
    }

    #[test]
    fn test_saved_file_is_complete() {
        let (dir, storage) = test_storage(5);
        let mut state = test_state();
        state.wallet.submit(owner(1), owner(4), 10, vec![0xab]).unwrap();
        storage.save(&state).unwrap();

        let written = fs::read_to_string(dir.path().join("wallet.json")).unwrap();
        assert_eq!(written, serde_json::to_string_pretty(&state).unwrap());
        assert!(!dir.path().join("wallet.tmp").exists());
    }

    #[test]
    fn test_corrupt_state_rejected() {
        let (dir, storage) = test_storage(5);
        storage.save(&test_state()).unwrap();

        let path = dir.path().join("wallet.json");
        let json = fs::read_to_string(&path).unwrap();
        let tampered = json.replace(&owner(3).to_hex(), &owner(1).to_hex());
        fs::write(&path, tampered).unwrap();

        assert!(matches!(
            storage.load(),
            Err(StorageError::SerializationError(_))
        ));
    }
}
