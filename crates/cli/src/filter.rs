//! Path scoping for listings.

use std::path::Path;

/// `path` equals `dir` or lies beneath it. Compared component by component,
/// so `/work/project-old` is not under `/work/project`.
pub fn is_within(path: &str, dir: &str) -> bool {
    !path.is_empty() && !dir.is_empty() && Path::new(path).starts_with(dir)
}

/// Whether `path` is inside any of the hidden directories.
pub fn is_hidden(path: &str, hidden: &[String]) -> bool {
    hidden.iter().any(|dir| is_within(path, dir))
}
