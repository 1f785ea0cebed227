use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by [`ProposalDataClient`](crate::client::ProposalDataClient)
#[derive(Error, Debug)]
pub enum IllDataError {
    #[error("Cannot connect to SFTP: {0}")]
    Connection(String),

    #[error("Not connected: call connect() first")]
    NotConnected,

    #[error("No proposal selected: call open_proposal() first")]
    NoProposalSelected,

    #[error("Remote operation failed: {0}")]
    RemoteOperation(String),

    #[error("Local I/O error: {0}")]
    LocalIo(String),
}

impl IllDataError {
    /// Wrap a transport error raised while the session was being set up.
    pub fn connection(err: impl std::fmt::Display) -> Self {
        IllDataError::Connection(err.to_string())
    }
}

/// SSH transport errors
#[derive(Error, Debug)]
pub enum SshError {
    #[error("Host key verification failed: {0}")]
    HostKeyVerification(String),

    #[error("russh error: {0}")]
    Russh(String),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::Russh(err.to_string())
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}
