//! Filesystem helpers shared by the key store, metadata store and cipher

use crate::error::Result;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `contents` via a temp file in the same directory
///
/// The rename is atomic on the same filesystem, so readers see either the
/// old bytes or the new bytes, never a truncated file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if private {
            0o600
        } else {
            // Keep the target's permissions when replacing an existing file
            match fs::metadata(path) {
                Ok(meta) => meta.permissions().mode(),
                Err(_) => 0o644,
            }
        };
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = private;

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
