//! Whole-file replacement that never exposes a half-written file.
//!
//! Sequence: write the full buffer to `<file>.tmp` beside the target, fsync
//! it, rename it over the target, then fsync the directory so the rename
//! itself is durable. Callers hold the file's exclusive lock for the whole
//! sequence, which is why a fixed temp name is enough.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{StoreError, StoreResult};

const TEMP_SUFFIX: &str = "tmp";

/// `events/2024-03.ndjson` -> `events/2024-03.ndjson.tmp`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Atomically replaces `path` with `content`.
pub fn replace_file(path: &Path, content: &[u8]) -> StoreResult<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    std::fs::create_dir_all(parent)
        .map_err(|err| StoreError::io(Some(parent.to_path_buf()), "create parent directory", err))?;

    let temp_path = temp_path_for(path);
    let mut file = open_temp(&temp_path)?;

    let written = file
        .write_all(content)
        .and_then(|_| file.sync_all())
        .map_err(|err| StoreError::io(Some(temp_path.clone()), "write temp file", err));
    drop(file);

    if let Err(err) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(err);
    }

    if let Err(err) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StoreError::io(Some(path.to_path_buf()), "rename temp file", err));
    }

    sync_dir(parent)
}

#[cfg(target_family = "unix")]
fn open_temp(path: &Path) -> StoreResult<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
        .map_err(|err| StoreError::io(Some(path.to_path_buf()), "create temp file", err))
}

#[cfg(not(target_family = "unix"))]
fn open_temp(path: &Path) -> StoreResult<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|err| StoreError::io(Some(path.to_path_buf()), "create temp file", err))
}

#[cfg(target_family = "unix")]
fn sync_dir(dir: &Path) -> StoreResult<()> {
    let handle = File::open(dir)
        .map_err(|err| StoreError::io(Some(dir.to_path_buf()), "open directory", err))?;
    handle
        .sync_all()
        .map_err(|err| StoreError::io(Some(dir.to_path_buf()), "sync directory", err))
}

// directories cannot be opened for fsync on Windows; rename is already durable there
#[cfg(not(target_family = "unix"))]
fn sync_dir(_dir: &Path) -> StoreResult<()> {
    Ok(())
}
