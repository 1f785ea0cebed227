use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("eu", "ill", "illdata").map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Get the path to the default client config file
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the log directory path
///
/// `ILLDATA_LOG_DIR` overrides the default; an empty value disables file logging.
pub fn log_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("ILLDATA_LOG_DIR") {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        return Some(PathBuf::from(trimmed));
    }

    config_dir().map(|d| d.join("logs"))
}

/// Ensure the log directory exists with owner-only permissions
pub fn ensure_log_dir() -> std::io::Result<PathBuf> {
    let dir = log_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine log directory",
        )
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }

    Ok(dir)
}

/// Expand tilde in path (e.g., ~/.ssh/known_hosts -> /home/user/.ssh/known_hosts)
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn home_dir() -> Option<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
}
