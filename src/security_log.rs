//! Security event logging for audit trails.
//!
//! Authentication attempts, session establishment and host key decisions are
//! logged with `target: "security"` so they can be filtered on their own:
//!
//! ```bash
//! RUST_LOG=security=info illdata proposals
//! ```

use tracing::{info, warn};

/// Log an SSH authentication attempt.
pub fn log_auth_attempt(host: &str, port: u16, username: &str) {
    info!(
        target: "security",
        event = "auth_attempt",
        host = %host,
        port = port,
        username = %username,
        method = "password",
        "SSH authentication attempt"
    );
}

/// Log a successful SSH authentication.
pub fn log_auth_success(host: &str, port: u16, username: &str) {
    info!(
        target: "security",
        event = "auth_success",
        host = %host,
        port = port,
        username = %username,
        method = "password",
        "SSH authentication succeeded"
    );
}

/// Log a failed SSH authentication attempt.
pub fn log_auth_failure(host: &str, port: u16, username: &str, reason: &str) {
    warn!(
        target: "security",
        event = "auth_failure",
        host = %host,
        port = port,
        username = %username,
        method = "password",
        reason = %reason,
        "SSH authentication failed"
    );
}

/// Log an SFTP connection establishment.
pub fn log_sftp_connect(host: &str, port: u16, username: &str) {
    info!(
        target: "security",
        event = "sftp_connect",
        host = %host,
        port = port,
        username = %username,
        "SFTP connection established"
    );
}

/// Log a server key accepted without verification.
pub fn log_host_key_unverified(host: &str, port: u16, fingerprint: &str) {
    warn!(
        target: "security",
        event = "host_key_unverified",
        host = %host,
        port = port,
        fingerprint = %fingerprint,
        "Host key verification disabled - accepting server key"
    );
}

/// Log a server key refused against the known_hosts file.
pub fn log_host_key_rejected(host: &str, port: u16, reason: &str) {
    warn!(
        target: "security",
        event = "host_key_rejected",
        host = %host,
        port = port,
        reason = %reason,
        "Host key rejected"
    );
}
