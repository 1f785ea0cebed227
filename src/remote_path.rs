//! POSIX path handling for remote paths.
//!
//! SFTP paths are always `/`-separated regardless of the local platform, so
//! these helpers work on strings rather than [`std::path::Path`].

/// Join `segment` onto `base` with exactly one separator between them.
///
/// Trailing separators on `base` and leading separators on `segment` are
/// collapsed, empty and `.` components of `segment` are dropped, and `..` is
/// passed through for the server to resolve.
///
/// ```
/// use illdata::remote_path::join;
///
/// assert_eq!(join("a/b/", "/c"), "a/b/c");
/// assert_eq!(join("/data/exp", "."), "/data/exp");
/// ```
pub fn join(base: &str, segment: &str) -> String {
    let mut joined = if base.is_empty() && segment.starts_with('/') {
        "/".to_string()
    } else {
        trim_trailing(base).to_string()
    };

    for component in segment.split('/') {
        if component.is_empty() || component == "." {
            continue;
        }
        if !joined.is_empty() && !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(component);
    }

    if joined.is_empty() {
        joined.push('.');
    }
    joined
}

/// Resolve a symbolic link target read from a link living in `link_dir`.
///
/// Absolute targets stand on their own; relative targets are relative to the
/// directory containing the link.
pub fn resolve_link_target(link_dir: &str, target: &str) -> String {
    if target.starts_with('/') {
        target.to_string()
    } else {
        join(link_dir, target)
    }
}

fn trim_trailing(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}
