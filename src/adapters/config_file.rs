//! File-backed [`ConfigPort`] for the runtime configuration.
//!
//! The JSON document lives at `<base>/runtime_config.json`.  On the device
//! `<base>` is the SPIFFS mount point; on the host it is any directory.
//!
//! # Atomic writes
//!
//! `write_raw` writes a `.tmp` sibling, syncs it, then renames it over the
//! target.  SPIFFS refuses to rename onto an existing name, so the target is
//! removed first when the direct rename fails; a reader that then finds only
//! the `.tmp` file uses it.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::app::runtime_config::RUNTIME_CONFIG_FILE;

/// SPIFFS mount point on the device.
pub const STORAGE_BASE_PATH: &str = "/spiffs";

/// Mount the default SPIFFS partition at [`STORAGE_BASE_PATH`], formatting
/// it if the mount fails.  An already-mounted partition is fine.
#[cfg(target_os = "espidf")]
pub fn mount_storage() -> Result<(), ConfigError> {
    use esp_idf_svc::sys::*;

    let base = c"/spiffs";
    let conf = esp_vfs_spiffs_conf_t {
        base_path: base.as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: called once from main() before any file access; `conf` and
    // the path literal outlive the call.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret == ESP_ERR_INVALID_STATE as i32 {
        debug!("Storage: SPIFFS already mounted");
        return Ok(());
    }
    if ret != ESP_OK as i32 {
        warn!("Storage: SPIFFS mount failed ({})", ret);
        return Err(ConfigError::IoError);
    }
    info!("Storage: SPIFFS mounted at {}", STORAGE_BASE_PATH);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn mount_storage() -> Result<(), ConfigError> {
    info!("Storage(sim): using host filesystem");
    Ok(())
}

pub struct FileConfigStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl FileConfigStore {
    /// Store rooted at `base_dir`.  The directory must exist.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let path = base_dir.as_ref().join(RUNTIME_CONFIG_FILE);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> Result<Option<Vec<u8>>, ConfigError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!("Storage: read {} failed ({})", path.display(), e);
                Err(ConfigError::IoError)
            }
        }
    }

    fn write_tmp(&self, data: &[u8]) -> std::io::Result<()> {
        let mut f = fs::File::create(&self.tmp_path)?;
        f.write_all(data)?;
        f.sync_all()
    }
}

impl ConfigPort for FileConfigStore {
    fn read_raw(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        match Self::read_file(&self.path)? {
            Some(bytes) => Ok(Some(bytes)),
            None => {
                let recovered = Self::read_file(&self.tmp_path)?;
                if recovered.is_some() {
                    warn!("Storage: recovering config from interrupted write");
                }
                Ok(recovered)
            }
        }
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), ConfigError> {
        self.write_tmp(data).map_err(|e| {
            warn!("Storage: write {} failed ({})", self.tmp_path.display(), e);
            ConfigError::IoError
        })?;

        if fs::rename(&self.tmp_path, &self.path).is_err() {
            let _ = fs::remove_file(&self.path);
            fs::rename(&self.tmp_path, &self.path).map_err(|e| {
                warn!("Storage: rename to {} failed ({})", self.path.display(), e);
                ConfigError::IoError
            })?;
        }
        debug!("Storage: wrote {} bytes to {}", data.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("labsentinel-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_reads_none() {
        let dir = scratch_dir("missing");
        let store = FileConfigStore::new(&dir);
        assert_eq!(store.read_raw(), Ok(None));
    }

    #[test]
    fn write_replaces_and_leaves_no_tmp() {
        let dir = scratch_dir("replace");
        let mut store = FileConfigStore::new(&dir);
        store.write_raw(b"{\"a\":1}").unwrap();
        store.write_raw(b"{\"a\":2}").unwrap();
        assert_eq!(store.read_raw().unwrap().as_deref(), Some(&b"{\"a\":2}"[..]));
        assert!(!store.tmp_path.exists());
    }

    #[test]
    fn interrupted_write_is_recovered() {
        let dir = scratch_dir("recover");
        let store = FileConfigStore::new(&dir);
        fs::write(&store.tmp_path, b"{}").unwrap();
        assert_eq!(store.read_raw().unwrap().as_deref(), Some(&b"{}"[..]));
    }
}
