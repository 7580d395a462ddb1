//! Data directory resolution and path expansion.
//!
//! Lookup order for the data directory:
//!
//! 1. `$TASKLIST_DATA_DIR`
//! 2. `$XDG_DATA_HOME/tasklist`
//! 3. `$HOME/.local/share/tasklist`
//! 4. `./.tasklist` when no home directory is known

use std::path::{Path, PathBuf};

const APP_DIR: &str = "tasklist";

/// Returns the directory holding the database and trace files.
#[must_use]
pub fn data_dir() -> PathBuf {
    resolve_data_dir(|key| std::env::var_os(key).map(PathBuf::from))
}

fn resolve_data_dir(env: impl Fn(&str) -> Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env("TASKLIST_DATA_DIR").filter(|p| !p.as_os_str().is_empty()) {
        return expand_tilde_with(&dir, env("HOME").as_deref());
    }
    if let Some(xdg) = env("XDG_DATA_HOME").filter(|p| p.is_absolute()) {
        return xdg.join(APP_DIR);
    }
    env("HOME").map_or_else(
        || PathBuf::from(".").join(format!(".{APP_DIR}")),
        |home| home.join(".local").join("share").join(APP_DIR),
    )
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a leading `~` (and all paths when `$HOME` is unset) are returned
/// unchanged.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tasklist::infrastructure::expand_tilde;
///
/// assert_eq!(expand_tilde("/var/lib/tasks"), Path::new("/var/lib/tasks"));
/// ```
#[must_use]
pub fn expand_tilde(path: impl AsRef<Path>) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    expand_tilde_with(path.as_ref(), home.as_deref())
}

fn expand_tilde_with(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
