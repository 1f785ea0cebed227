//! OpenSSH host pattern matching for known_hosts host fields

use data_encoding::BASE64_MIME;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// The name a host is recorded under.
///
/// Hosts on port 22 are stored by bare name, others only as `[host]:port`.
pub(crate) struct HostNames {
    lookup: String,
}

impl HostNames {
    pub(crate) fn new(host: &str, port: u16) -> Self {
        let host = host.to_ascii_lowercase();
        let lookup = if port == 22 {
            host
        } else {
            format!("[{}]:{}", host, port)
        };
        Self { lookup }
    }

    /// Name fed to the HMAC of hashed entries
    pub(crate) fn lookup(&self) -> &str {
        &self.lookup
    }

    /// Evaluate a comma-separated host field; a matching `!` entry vetoes the line.
    pub(crate) fn matches_field(&self, field: &str) -> bool {
        let mut matched = false;

        for entry in field.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (negated, pattern) = match entry.strip_prefix('!') {
                Some(pattern) => (true, pattern),
                None => (false, entry),
            };

            if self.matches_pattern(pattern) {
                if negated {
                    return false;
                }
                matched = true;
            }
        }

        matched
    }

    fn matches_pattern(&self, pattern: &str) -> bool {
        if let Some(hashed) = pattern.strip_prefix("|1|") {
            return hashed_matches(hashed, self.lookup());
        }

        let pattern = pattern.to_ascii_lowercase();
        if pattern.contains(['*', '?']) {
            glob_match(&pattern, &self.lookup)
        } else {
            pattern == self.lookup
        }
    }
}

/// `salt|hash` of a `|1|salt|hash` entry, both base64
fn hashed_matches(salt_and_hash: &str, name: &str) -> bool {
    let Some((salt, hash)) = salt_and_hash.split_once('|') else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (
        BASE64_MIME.decode(salt.as_bytes()),
        BASE64_MIME.decode(hash.as_bytes()),
    ) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(&salt) else {
        return false;
    };
    mac.update(name.as_bytes());
    mac.verify_slice(&hash).is_ok()
}

/// `*` matches any run of characters, `?` exactly one.
///
/// Only the most recent `*` is ever retried.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0usize, 0usize);
    let mut last_star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                last_star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match last_star {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    last_star = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
