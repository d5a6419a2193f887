use std::path::PathBuf;

/// Locations of the repository-local rotator workspace.
#[derive(Debug, Clone)]
pub struct RotatorPaths {
    pub root: PathBuf,
    pub rotator_dir: PathBuf,
    pub config_json: PathBuf,
}

impl RotatorPaths {
    /// Derive all paths from a repo root. Pure computation, no I/O.
    pub fn discover(repo_root: impl Into<PathBuf>) -> Self {
        let root = repo_root.into();
        let rotator_dir = root.join(".rotator");
        Self {
            config_json: rotator_dir.join("config.json"),
            rotator_dir,
            root,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.config_json.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_is_pure() {
        let paths = RotatorPaths::discover("/tmp/does-not-exist-rotator");
        assert!(paths.config_json.ends_with(".rotator/config.json"));
        assert!(!paths.is_initialized());
    }
}
