use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod config;
pub mod credential;
pub mod paths;

pub use config::RotatorConfig;
pub use credential::CredentialStore;
pub use paths::RotatorPaths;

/// Return the per-user store root: `~/.local/share/rotator/` and friends.
/// Falls back to `~/.rotator/` when no data dir is known.
pub fn store_root() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("rotator")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".rotator")
    } else {
        PathBuf::from(".rotator-store")
    }
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}
