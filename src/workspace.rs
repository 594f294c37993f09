use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::config::Settings;
use crate::model::{FragmentKind, Scope};

/// Workspace path types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspacePath {
    /// Workspace root: $ZDOT_HOME or $XDG_CONFIG_HOME/zdot
    Root,
    /// Shared scope directory: workspace/shared (version controlled)
    Shared,
    /// Local scope directory: workspace/local (never versioned)
    Local,
    /// One fragment file inside a scope directory
    Fragment(FragmentKind, Scope),
    /// Secrets alias file: workspace/local/secrets.zsh
    Secrets,
    /// Settings file: workspace/zdot.toml
    Settings,
}

/// Workspace - the on-disk home of every fragment file
///
/// The shared directory is the git working tree. The tree lock is handed to
/// every store that writes inside it and to the sync engine.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    tree_lock: Arc<RwLock<()>>,
}

impl Workspace {
    /// Create a Workspace from the environment
    ///
    /// Resolution order:
    /// - $ZDOT_HOME
    /// - $XDG_CONFIG_HOME/zdot
    /// - ~/.config/zdot
    pub fn new() -> Result<Self> {
        Ok(Self::at(Self::get_root_dir()?))
    }

    /// Workspace rooted at an explicit directory
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tree_lock: Arc::new(RwLock::new(())),
        }
    }

    fn get_root_dir() -> Result<PathBuf> {
        if let Some(home) = env::var_os("ZDOT_HOME").filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }

        let base = match env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(xdg) => PathBuf::from(xdg),
            None => directories::BaseDirs::new()
                .context("Could not determine home directory")?
                .home_dir()
                .join(".config"),
        };

        Ok(base.join("zdot"))
    }

    /// Get path for a specific workspace location
    pub fn path(&self, path_type: WorkspacePath) -> PathBuf {
        match path_type {
            WorkspacePath::Root => self.root.clone(),
            WorkspacePath::Shared => self.root.join("shared"),
            WorkspacePath::Local => self.root.join("local"),
            WorkspacePath::Fragment(_, Scope::Secrets) | WorkspacePath::Secrets => {
                self.path(WorkspacePath::Local).join("secrets.zsh")
            }
            WorkspacePath::Fragment(kind, Scope::Shared) => {
                self.path(WorkspacePath::Shared).join(kind.file_name())
            }
            WorkspacePath::Fragment(kind, Scope::Local) => {
                self.path(WorkspacePath::Local).join(kind.file_name())
            }
            WorkspacePath::Settings => self.root.join("zdot.toml"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lock guarding the shared working tree
    pub fn tree_lock(&self) -> Arc<RwLock<()>> {
        Arc::clone(&self.tree_lock)
    }

    /// Create the scope directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [WorkspacePath::Shared, WorkspacePath::Local] {
            let path = self.path(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create directory {:?}", path))?;
        }
        Ok(())
    }

    /// Load settings, falling back to defaults
    pub fn settings(&self) -> Result<Settings> {
        Settings::load(&self.path(WorkspacePath::Settings))
    }

    /// Convert repository identifier to canonical URL
    ///
    /// Handles multiple input formats and normalizes to a canonical form:
    /// - GitHub shorthand: "user/repo" -> "https://github.com/user/repo.git"
    /// - Full URLs: normalized (removes trailing slashes, ensures .git suffix)
    /// - Local paths and scp-style SSH: passed through as-is
    pub fn canonical_url(repository: &str) -> String {
        let is_path = repository.starts_with('/')
            || repository.starts_with('.')
            || repository.starts_with('~');

        let url = if repository.contains("://") || is_path {
            repository.to_string()
        } else if repository.contains('/') && !repository.contains('.') && !repository.contains(':') {
            format!("https://github.com/{}.git", repository)
        } else {
            repository.to_string()
        };

        let url = url.trim_end_matches('/');

        if (url.starts_with("https://") || url.starts_with("http://")) && !url.ends_with(".git") {
            format!("{}.git", url)
        } else {
            url.to_string()
        }
    }
}
