//! Path utilities for phork's history and startup files.

use std::path::{Path, PathBuf};

/// History filename, stored in the home directory.
pub const HISTORY_FILENAME: &str = ".phork_history";

/// Startup file name, looked up in the home directory and the working directory.
pub const RC_FILENAME: &str = ".phorkrc";

/// Get the default history file path.
///
/// Falls back to the current directory when no home directory is known.
pub fn default_history_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(HISTORY_FILENAME))
        .unwrap_or_else(|| PathBuf::from(HISTORY_FILENAME))
}

/// Where startup files are searched for, in order: `$HOME/.phorkrc`, then
/// `./.phorkrc`.
///
/// The working directory entry is skipped when it is the home directory.
pub fn default_rc_search_paths() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let cwd = std::env::current_dir().ok();

    let mut paths = Vec::with_capacity(2);
    if let Some(ref home) = home {
        paths.push(home.join(RC_FILENAME));
    }
    match cwd {
        Some(cwd) if Some(&cwd) != home.as_ref() => paths.push(cwd.join(RC_FILENAME)),
        Some(_) => {}
        None => paths.push(PathBuf::from(RC_FILENAME)),
    }
    paths
}

/// Expands a leading `~` in a path to the user's home directory.
///
/// This handles the common case where shell tilde expansion doesn't occur,
/// such as when using `--history-file=~/path` instead of `--history-file ~/path`.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use phork::paths::expand_tilde;
///
/// let path = PathBuf::from("/tmp/foo");
/// assert_eq!(expand_tilde(&path), path);
/// ```
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if let Ok(stripped) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_history_path_file_name() {
        let path = default_history_path();
        assert_eq!(path.file_name().unwrap(), HISTORY_FILENAME);
    }

    #[test]
    fn test_rc_search_paths_home_first() {
        let paths = default_rc_search_paths();
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p.file_name().unwrap() == RC_FILENAME));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(paths[0], home.join(RC_FILENAME));
        }
    }

    #[test]
    fn test_expand_tilde_with_home() {
        let expanded = expand_tilde("~/scripts/boot.php");
        assert!(!expanded.to_str().unwrap().starts_with('~'));
        assert!(expanded.to_str().unwrap().ends_with("scripts/boot.php"));
    }

    #[test]
    fn test_expand_tilde_other_paths_unchanged() {
        assert_eq!(expand_tilde("/tmp/foo"), PathBuf::from("/tmp/foo"));
        assert_eq!(expand_tilde("./rel"), PathBuf::from("./rel"));
    }
}
