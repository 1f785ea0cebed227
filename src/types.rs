//! Directory entry types returned by proposal listings

use chrono::{DateTime, Utc};

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;

/// A remote directory entry with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Full `st_mode` as reported by the server, file type bits included
    pub permissions: u32,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl FileEntry {
    /// Build an entry from raw stat fields.
    ///
    /// The directory and symlink flags are derived from the file type bits of
    /// `permissions`.
    pub fn from_stat(name: impl Into<String>, size: u64, mtime: Option<u32>, permissions: u32) -> Self {
        let file_type = permissions & S_IFMT;
        Self {
            name: name.into(),
            size,
            modified: mtime.and_then(|secs| DateTime::from_timestamp(i64::from(secs), 0)),
            permissions,
            is_dir: file_type == S_IFDIR,
            is_symlink: file_type == S_IFLNK,
        }
    }

    /// Permission bits without the file type
    pub fn mode(&self) -> u32 {
        self.permissions & 0o7777
    }

    /// Render the mode the way `ls -l` does, e.g. `drwxr-x---`
    pub fn mode_string(&self) -> String {
        let kind = if self.is_dir {
            'd'
        } else if self.is_symlink {
            'l'
        } else {
            '-'
        };

        let mut out = String::with_capacity(10);
        out.push(kind);
        for shift in [6u32, 3, 0] {
            let bits = (self.permissions >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        out
    }

    /// Format modified date for display
    pub fn formatted_modified(&self) -> String {
        match &self.modified {
            Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            None => "-".to_string(),
        }
    }
}
