use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::KiraError;

pub fn ensure_parent(path: &Utf8Path) -> Result<(), KiraError> {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {parent}: {err}"))),
        _ => Ok(()),
    }
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
    ensure_parent(path)?;
    let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));
    fs::write(tmp_path.as_std_path(), content)
        .map_err(|err| KiraError::Filesystem(format!("write {tmp_path}: {err}")))?;
    fs::rename(tmp_path.as_std_path(), path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("rename {tmp_path}: {err}")))?;
    Ok(())
}

/// Renames `from` onto `to`, copying when the two sit on different filesystems.
pub fn move_into_place(from: &Utf8Path, to: &Utf8Path) -> Result<(), KiraError> {
    ensure_parent(to)?;
    if fs::rename(from.as_std_path(), to.as_std_path()).is_ok() {
        return Ok(());
    }
    fs::copy(from.as_std_path(), to.as_std_path())
        .and_then(|_| fs::remove_file(from.as_std_path()))
        .map_err(|err| KiraError::Filesystem(format!("move {from} to {to}: {err}")))
}

/// Deletes a file or directory; a path that is already gone is fine.
pub fn remove_path(path: &Utf8Path) -> Result<(), KiraError> {
    let result = if path.as_std_path().is_dir() {
        fs::remove_dir_all(path.as_std_path())
    } else {
        fs::remove_file(path.as_std_path())
    };
    match result {
        Err(err) if err.kind() != io::ErrorKind::NotFound => {
            Err(KiraError::Filesystem(format!("remove {path}: {err}")))
        }
        _ => Ok(()),
    }
}

/// Creates an empty file unless something already exists at `path`.
pub fn touch(path: &Utf8Path) -> Result<(), KiraError> {
    ensure_parent(path)?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map(|_| ())
        .map_err(|err| KiraError::Filesystem(format!("touch {path}: {err}")))
}

pub fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, KiraError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|err| KiraError::Filesystem(format!("current directory: {err}")))?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| KiraError::Filesystem("current directory is not UTF-8".to_string()))?;
    Ok(cwd.join(path))
}

pub fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
