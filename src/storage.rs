use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::wallet::{Wallet, WalletError, WalletInfo};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

// Get the appropriate storage directory for the current platform
fn get_storage_dir() -> PathBuf {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home_dir).join(".pluto_bridge")
}

/// `$PLUTO_BRIDGE_KEYPAIR`, else `$HOME/.pluto_bridge/keypair.json`.
pub fn keypair_path() -> PathBuf {
    match std::env::var("PLUTO_BRIDGE_KEYPAIR") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => get_storage_dir().join("keypair.json"),
    }
}

pub fn save_wallet(path: &Path, wallet: &Wallet) -> Result<(), StorageError> {
    log::info!("🔄 Saving bridge keypair {} to {}", wallet.name, path.display());

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let serialized = serde_json::to_string_pretty(&wallet.to_wallet_info()).map_err(|source| {
        StorageError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    std::fs::write(path, serialized).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("✅ Keypair saved");
    Ok(())
}

/// `Ok(None)` when nothing has been stored yet.
pub fn load_wallet(path: &Path) -> Result<Option<Wallet>, StorageError> {
    if !path.exists() {
        log::info!("ℹ️ Keypair file doesn't exist yet: {}", path.display());
        return Ok(None);
    }

    let data = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let info: WalletInfo = serde_json::from_str(&data).map_err(|source| StorageError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let wallet = Wallet::from_wallet_info(&info)?;

    log::info!("✅ Loaded bridge keypair {} ({})", wallet.name, wallet.address());
    Ok(Some(wallet))
}

/// Loads the stored keypair, generating and persisting one on first run.
pub fn load_or_create_wallet(path: &Path, name: &str) -> Result<Wallet, StorageError> {
    if let Some(wallet) = load_wallet(path)? {
        return Ok(wallet);
    }

    let wallet = Wallet::generate(name);
    log::info!("🆕 Generated bridge keypair {}", wallet.address());
    save_wallet(path, &wallet)?;
    Ok(wallet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("pluto-bridge-{}-{}", name, std::process::id()))
            .join("keypair.json")
    }

    #[test]
    fn test_first_run_creates_then_reuses() {
        let path = scratch_path("reuse");
        let _ = std::fs::remove_file(&path);

        let created = load_or_create_wallet(&path, "Bridge").unwrap();
        let loaded = load_or_create_wallet(&path, "Other").unwrap();

        assert_eq!(created.address(), loaded.address());
        assert_eq!(loaded.name, "Bridge");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = scratch_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(load_wallet(&path), Err(StorageError::Parse { .. })));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
