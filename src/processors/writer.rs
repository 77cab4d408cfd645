// webpnorm/src/processors/writer.rs
use crate::core::{NormalizeError, Result};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// `<target>.tmp`, next to the target so the final rename never crosses a
/// filesystem boundary.
pub fn temp_path_for(target: &Path) -> PathBuf {
    target.with_file_name(temp_file_name(target))
}

fn output_name(target: &Path) -> OsString {
    target
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"))
}

fn temp_file_name(target: &Path) -> OsString {
    let mut name = output_name(target);
    name.push(".tmp");
    name
}

/// Create the `<target>.tmp` sibling, replacing a stale one left behind by
/// an interrupted run. Dropping the handle removes the file.
fn sibling_temp(target: &Path) -> Result<NamedTempFile> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let stale = temp_path_for(target);
    if stale.exists() {
        log::debug!("Removing stale temp file {}", stale.display());
        fs::remove_file(&stale)?;
    }

    let prefix = output_name(target);
    let mut builder = Builder::new();
    builder.prefix(&prefix).suffix(".tmp").rand_bytes(0);
    if let Some(permissions) = output_permissions(target) {
        builder.permissions(permissions);
    }

    Ok(builder.tempfile_in(parent)?)
}

/// A replaced file keeps its mode; new files get the usual 0644 instead of
/// the private mode temp files are created with.
fn output_permissions(target: &Path) -> Option<fs::Permissions> {
    if let Ok(metadata) = fs::metadata(target) {
        return Some(metadata.permissions());
    }
    default_permissions()
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

fn persist(temp: NamedTempFile, target: &Path) -> Result<()> {
    let temp_path = temp.path().to_path_buf();
    temp.persist(target).map_err(|e| {
        NormalizeError::Io(format!(
            "failed to replace {} with {}: {}",
            target.display(),
            temp_path.display(),
            e.error
        ))
    })?;

    log::debug!("Replaced {} atomically", target.display());
    Ok(())
}

/// Write `bytes` so readers of `target` only ever see a complete file.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp = sibling_temp(target)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    persist(temp, target)
}

/// Let `produce` fill the temp path, then rename it over `target`.
/// Used directly by producers that write the file themselves.
pub fn commit_with<F>(target: &Path, produce: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let temp = sibling_temp(target)?;
    produce(temp.path())?;

    if !temp.path().is_file() {
        return Err(NormalizeError::Io(format!(
            "temporary output {} was not produced",
            temp.path().display()
        )));
    }

    persist(temp, target)
}
