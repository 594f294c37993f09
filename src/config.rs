use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SHELL: &str = "zsh";
const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_LOG_LIMIT: i64 = 10;

/// User settings stored in `zdot.toml` next to the scope directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub shell: String,
    pub remote: String,
    pub log_limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugin_dirs: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            log_limit: DEFAULT_LOG_LIMIT,
            author_name: None,
            author_email: None,
            plugin_dirs: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {:?}", path))
    }

    /// Commit author from settings, when both parts are set.
    pub fn author(&self) -> Option<(String, String)> {
        Some((self.author_name.clone()?, self.author_email.clone()?))
    }

    /// `plugin_dirs` with `~` and environment variables expanded.
    pub fn expanded_plugin_dirs(&self) -> Vec<PathBuf> {
        self.plugin_dirs
            .iter()
            .map(|dir| {
                let raw = dir.to_string_lossy();
                shellexpand::full(&raw)
                    .map(|expanded| PathBuf::from(expanded.into_owned()))
                    .unwrap_or_else(|_| dir.clone())
            })
            .collect()
    }
}
