//! Filesystem utilities for atomic operations on database files and directories.

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Build a sibling path of `path` that does not collide with earlier calls,
/// e.g. `Darts` -> `Darts.copying.1700000000000000000`.
pub fn temp_sibling(path: &Path, tag: &str) -> io::Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent"))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid file name"))?;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| io::Error::other(format!("System time error: {}", e)))?
        .as_nanos();
    Ok(parent.join(format!("{}.{}.{}", name, tag, nanos)))
}

/// Atomically rename a file, with fallback for platforms where rename fails if target exists.
///
/// On some platforms (notably Windows), `fs::rename` fails if the destination already exists.
/// This function handles that case by removing the destination first and retrying.
///
/// If the rename ultimately fails, the temp file is cleaned up.
///
/// # Errors
///
/// Returns an error if the rename fails even after the fallback attempt.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        // Best-effort replace on platforms where rename fails if target exists.
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}

/// Write `data` to a temp file next to `path`, sync it, then rename it over `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let temp_path = temp_sibling(path, "tmp")?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;
    if let Err(err) = file.write_all(data).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    drop(file);

    rename_with_fallback(&temp_path, path)
}

/// Recursively copy `source` into `destination`, creating it if needed.
///
/// Returns the number of bytes copied.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> io::Result<u64> {
    copy_dir_filtered(source, destination, &|_| false)
}

/// Recursive copy that leaves out every path for which `skip` returns true.
pub fn copy_dir_filtered(
    source: &Path,
    destination: &Path,
    skip: &dyn Fn(&Path) -> bool,
) -> io::Result<u64> {
    fs::create_dir_all(destination)?;

    let mut bytes = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        if skip(&path) {
            continue;
        }

        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            bytes += copy_dir_filtered(&path, &target, skip)?;
        } else {
            bytes += fs::copy(&path, &target)?;
        }
    }
    Ok(bytes)
}

/// Replace the directory at `live` with the directory at `replacement`.
///
/// The live directory is first renamed aside, the replacement renamed into its
/// place, and only then is the old copy deleted. If the second rename fails the
/// original directory is put back, so `live` is never left missing.
pub fn swap_in_directory(live: &Path, replacement: &Path) -> io::Result<()> {
    if !replacement.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Replacement directory {} does not exist", replacement.display()),
        ));
    }

    let old = temp_sibling(live, "old")?;
    let had_live = live.exists();
    if had_live {
        fs::rename(live, &old)?;
    }

    if let Err(err) = fs::rename(replacement, live) {
        if had_live {
            let _ = fs::rename(&old, live);
        }
        return Err(io::Error::new(
            err.kind(),
            format!(
                "Failed to move {} into place: {}",
                replacement.display(),
                err
            ),
        ));
    }

    if had_live {
        if let Err(err) = fs::remove_dir_all(&old) {
            log::warn!("Swapped in new files but failed to remove {}: {}", old.display(), err);
        }
    }
    Ok(())
}
