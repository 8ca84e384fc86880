use std::path::{Path, PathBuf};

/// Logical location of the config on disk.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself.
#[derive(Debug, Clone)]
pub struct ConfigLayout {
    /// Root directory.
    pub root: PathBuf,
    /// Directory for internal metadata (.blox).
    pub meta_dir: PathBuf,
    /// Path to the config file (JSON).
    pub config_path: PathBuf,
}

impl ConfigLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".blox");
        let config_path = meta_dir.join("config.json");
        Self { root, meta_dir, config_path }
    }

    /// Config path relative to `root`, for display.
    pub fn config_path_relative_string(&self) -> String {
        match self.config_path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => self.config_path.to_string_lossy().to_string(),
        }
    }
}
