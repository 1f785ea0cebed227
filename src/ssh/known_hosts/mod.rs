//! Read-only verification of server keys against an OpenSSH known_hosts file

use std::path::{Path, PathBuf};

use russh::keys::{self, HashAlg, PublicKey};

use crate::error::SshError;

mod matchers;

use matchers::HostNames;

/// Result of checking a host key
#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyStatus {
    /// Key matches a stored key
    Known,
    /// No entry for this host and key type
    Unknown {
        fingerprint: String,
        key_type: String,
    },
    /// Stored key of the same type differs (potential MITM)
    Changed {
        old_fingerprint: String,
        new_fingerprint: String,
        key_type: String,
    },
    /// Key matches a `@revoked` entry
    Revoked { fingerprint: String },
}

impl HostKeyStatus {
    pub fn is_known(&self) -> bool {
        matches!(self, HostKeyStatus::Known)
    }
}

#[derive(Default)]
struct HostKeyScan {
    keys: Vec<PublicKey>,
    revoked_keys: Vec<PublicKey>,
}

/// A known_hosts file the server key must appear in
#[derive(Debug, Clone)]
pub struct KnownHostsFile {
    path: PathBuf,
}

impl KnownHostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the fingerprint of a public key
    pub fn fingerprint(key: &PublicKey) -> String {
        key.fingerprint(HashAlg::Sha256).to_string()
    }

    /// Check a server key. A missing or unreadable file is an error, never a pass.
    pub fn check_host_key(
        &self,
        host: &str,
        port: u16,
        key: &PublicKey,
    ) -> Result<HostKeyStatus, SshError> {
        let scan = self.scan(host, port)?;
        let fingerprint = Self::fingerprint(key);
        let key_type = key.algorithm().as_str().to_string();

        if scan.revoked_keys.iter().any(|revoked| revoked == key) {
            return Ok(HostKeyStatus::Revoked { fingerprint });
        }

        if scan.keys.iter().any(|known| known == key) {
            return Ok(HostKeyStatus::Known);
        }

        Ok(match scan.keys.iter().find(|known| known.algorithm() == key.algorithm()) {
            Some(old_key) => HostKeyStatus::Changed {
                old_fingerprint: Self::fingerprint(old_key),
                new_fingerprint: fingerprint,
                key_type,
            },
            None => HostKeyStatus::Unknown {
                fingerprint,
                key_type,
            },
        })
    }

    fn scan(&self, host: &str, port: u16) -> Result<HostKeyScan, SshError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            SshError::HostKeyVerification(format!(
                "Failed to read known_hosts {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let names = HostNames::new(host, port);
        let mut scan = HostKeyScan::default();

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (marker, rest) = match trimmed.strip_prefix('@') {
                Some(stripped) => match stripped.split_once(char::is_whitespace) {
                    Some((marker, rest)) => (Some(marker), rest.trim_start()),
                    None => continue,
                },
                None => (None, trimmed),
            };

            let mut fields = rest.split_whitespace();
            let (Some(hosts_field), Some(_key_type), Some(key_data)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };

            if !names.matches_field(hosts_field) {
                continue;
            }

            let key = match keys::parse_public_key_base64(key_data) {
                Ok(key) => key,
                Err(e) => {
                    tracing::debug!(
                        "Skipping unparsable key in {} line {}: {}",
                        self.path.display(),
                        index + 1,
                        e
                    );
                    continue;
                }
            };

            match marker {
                None => scan.keys.push(key),
                Some("revoked") => scan.revoked_keys.push(key),
                // cert-authority lines vouch for certificates, not plain keys
                Some(_) => {}
            }
        }

        Ok(scan)
    }
}
