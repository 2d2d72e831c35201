//! Session configuration.
//!
//! [`SessionConfig`] collects everything the front-end needs to start a
//! session. [`RcConfig`] finds the startup files whose code is loaded into
//! the worker before the first prompt.

use std::path::PathBuf;

use tracing::debug;

use crate::inspect::InspectorKind;
use crate::paths::{default_history_path, default_rc_search_paths};

/// Startup (`.phorkrc`) file discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcConfig {
    search_paths: Vec<PathBuf>,
    /// Load every existing file instead of stopping at the first.
    cascade: bool,
    files: Vec<PathBuf>,
}

impl Default for RcConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RcConfig {
    /// Search `$HOME/.phorkrc` then `./.phorkrc`.
    pub fn new() -> Self {
        Self::with_paths(default_rc_search_paths(), false)
    }

    pub fn with_paths(search_paths: Vec<PathBuf>, cascade: bool) -> Self {
        Self {
            search_paths,
            cascade,
            files: Vec::new(),
        }
    }

    pub fn cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    /// Resolve which startup files to load.
    ///
    /// Returns the existing files in search order; without cascading only
    /// the first one found is used.
    pub fn apply(&mut self) -> &[PathBuf] {
        self.files.clear();
        for path in &self.search_paths {
            if !path.is_file() {
                continue;
            }
            debug!(path = %path.display(), "Found startup file");
            self.files.push(path.clone());
            if !self.cascade {
                break;
            }
        }
        &self.files
    }

    /// Files picked by the last [`apply`](Self::apply).
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

/// Everything needed to run an interactive session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prompt text after the `[n] ` counter.
    pub prompt: String,
    /// `None` disables persistent history.
    pub history_path: Option<PathBuf>,
    /// Files required into the scope at startup, after startup files.
    pub requires: Vec<PathBuf>,
    pub inspector: InspectorKind,
    /// PHP binary used for evaluation.
    pub php: PathBuf,
    /// `None` skips startup files entirely.
    pub rc: Option<RcConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            history_path: Some(default_history_path()),
            requires: Vec::new(),
            inspector: InspectorKind::default(),
            php: PathBuf::from("php"),
            rc: Some(RcConfig::new()),
        }
    }
}

impl SessionConfig {
    /// Startup files followed by explicit requires, in load order.
    pub fn startup_files(&mut self) -> Vec<PathBuf> {
        let mut files = match self.rc.as_mut() {
            Some(rc) => rc.apply().to_vec(),
            None => Vec::new(),
        };
        files.extend(self.requires.iter().cloned());
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn rc_dirs() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let home = dir.path().join("home");
        let project = dir.path().join("project");
        fs::create_dir_all(&home).unwrap();
        fs::create_dir_all(&project).unwrap();
        (dir, home.join(".phorkrc"), project.join(".phorkrc"))
    }

    #[test]
    fn test_apply_stops_at_first_existing_file() {
        let (_dir, home_rc, project_rc) = rc_dirs();
        fs::write(&home_rc, "<?php $home = 1;").unwrap();
        fs::write(&project_rc, "<?php $project = 1;").unwrap();

        let mut rc = RcConfig::with_paths(vec![home_rc.clone(), project_rc.clone()], false);
        assert_eq!(rc.apply(), &[home_rc.clone()]);
        assert_eq!(rc.loaded_files(), &[home_rc]);
    }

    #[test]
    fn test_apply_cascades() {
        let (_dir, home_rc, project_rc) = rc_dirs();
        fs::write(&home_rc, "").unwrap();
        fs::write(&project_rc, "").unwrap();

        let mut rc = RcConfig::with_paths(vec![home_rc.clone(), project_rc.clone()], true);
        assert_eq!(rc.apply(), &[home_rc, project_rc]);
    }

    #[test]
    fn test_apply_skips_missing_files() {
        let (_dir, home_rc, project_rc) = rc_dirs();
        fs::write(&project_rc, "").unwrap();

        let mut rc = RcConfig::with_paths(vec![home_rc, project_rc.clone()], false);
        assert_eq!(rc.apply(), &[project_rc]);
    }

    #[test]
    fn test_startup_files_order() {
        let (_dir, home_rc, _project_rc) = rc_dirs();
        fs::write(&home_rc, "").unwrap();

        let mut config = SessionConfig {
            requires: vec![PathBuf::from("boot.php")],
            rc: Some(RcConfig::with_paths(vec![home_rc.clone()], false)),
            ..SessionConfig::default()
        };
        assert_eq!(
            config.startup_files(),
            vec![home_rc, PathBuf::from("boot.php")]
        );

        config.rc = None;
        assert_eq!(config.startup_files(), vec![PathBuf::from("boot.php")]);
    }

    #[test]
    fn test_session_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.php, PathBuf::from("php"));
        assert_eq!(config.inspector, InspectorKind::Dump);
        assert!(config.history_path.is_some());
    }
}
