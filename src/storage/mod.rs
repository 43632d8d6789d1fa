//! Final file write: hands the reconstructed payload buffer to disk.
//!
//! Multi-file torrents are always written as a single contiguous blob —
//! this never splits a download back into its member files.

use std::fs;
use std::io;
use std::path::Path;

/// Writes `data` to `directory/name` with mode 0644, creating `directory`
/// if necessary.
pub fn save(directory: &str, name: &str, data: &[u8]) -> io::Result<()> {
    if !Path::new(directory).exists() {
        fs::create_dir_all(directory)?;
    }
    let path = Path::new(directory).join(name);
    fs::write(&path, data)?;
    set_permissions(&path)?;
    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
