use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use super::error::{OpError, OpResult};
use crate::models::FileEntry;

// Serializes directory creation between concurrent stores; individual writes
// to distinct paths would be safe on their own, but racing create_dir_all
// calls across type subdirectories are not worth the risk.
static STORAGE_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Write the file under `<storage_dir>/<type>/<id>_<name>`, replacing any
/// previous file at that path, and return where it landed.
pub fn store(file: &FileEntry, storage_dir: &Path) -> OpResult<PathBuf> {
    let _guard = STORAGE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let type_dir = storage_dir.join(file.file_type());
    fs::create_dir_all(&type_dir).map_err(|err| {
        OpError::io(
            format!("Failed to create storage directory {}", type_dir.display()),
            err,
        )
    })?;

    let target = type_dir.join(format!("{}_{}", file.id(), file.name()));
    fs::write(&target, file.content()).map_err(|err| {
        OpError::io(format!("Failed to store {}", target.display()), err)
    })?;

    debug!("Stored {} at {}", file.name(), target.display());
    Ok(target)
}
