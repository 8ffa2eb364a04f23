//! Path helpers
//!
//! Repository paths are stored absolute. User input may contain `$VAR` or
//! `${VAR}` references which are expanded first; unknown variables are left
//! untouched.

use std::path::{Path, PathBuf};

/// File name of the per-repository settings file
pub const LOCAL_FILE_NAME: &str = ".grony";

/// Expands environment variables and makes the result absolute
pub fn resolve_path(raw: &str) -> std::io::Result<PathBuf> {
    std::path::absolute(expand_vars(raw))
}

/// Location of the `.grony` file for a repository directory
pub fn local_file(repo_dir: &Path) -> PathBuf {
    repo_dir.join(LOCAL_FILE_NAME)
}

/// Expands `$VAR` and `${VAR}` references
pub fn expand_vars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), std::env::var(name)) {
            (false, Ok(value)) => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}
