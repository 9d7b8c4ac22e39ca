//! Crash-safe file replacement.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `data` to a temp file beside `path`, flush it to disk and rename it
/// over `path`. Readers observe either the old or the new contents.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
