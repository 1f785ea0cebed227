use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Default SSH port of the data service
pub const DEFAULT_PORT: u16 = 22;

/// Everything needed to open a session with the data service.
///
/// Without a known-hosts file the server key is not verified.
#[derive(Debug)]
pub struct ConnectionSettings {
    pub hostname: String,
    pub username: String,
    pub password: SecretString,
    pub port: u16,
    pub known_hosts_path: Option<PathBuf>,
}

impl ConnectionSettings {
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            port: DEFAULT_PORT,
            known_hosts_path: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

/// Client configuration stored in config.toml
#[derive(Debug, Default, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
}

impl ClientConfig {
    /// Load from an explicit file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Load the default config file, or an empty config when there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        match super::paths::config_file() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }
}

/// `[server]` table of the config file
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub hostname: Option<String>,
    pub username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub known_hosts: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            username: None,
            password: None,
            port: DEFAULT_PORT,
            known_hosts: None,
        }
    }
}

impl ServerConfig {
    /// Turn the table into settings, failing on the first missing credential.
    pub fn into_connection_settings(self) -> Result<ConnectionSettings, ConfigError> {
        let hostname = self.hostname.ok_or(ConfigError::Missing("hostname"))?;
        let username = self.username.ok_or(ConfigError::Missing("username"))?;
        let password = self.password.ok_or(ConfigError::Missing("password"))?;

        Ok(ConnectionSettings {
            hostname,
            username,
            password,
            port: self.port,
            known_hosts_path: self
                .known_hosts
                .as_deref()
                .map(super::paths::expand_tilde),
        })
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
