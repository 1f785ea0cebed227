//! Shared helpers for the integration tests

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated directory standing in for the user's config dir
pub struct TestEnvironment {
    dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn known_hosts_path(&self) -> PathBuf {
        self.dir.path().join("known_hosts")
    }

    /// Write `content` to config.toml and return its path
    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        std::fs::write(&path, content).expect("Failed to write config");
        path
    }
}
