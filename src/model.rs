//! Entity and status types shared by the store, the sync engine and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Persistence scope of an entity.
///
/// `Shared` lives in the version-controlled directory, `Local` in its
/// unversioned sibling. `Secrets` is a read-only alias view.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Shared,
    Local,
    Secrets,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Shared => "shared",
            Scope::Local => "local",
            Scope::Secrets => "secrets",
        }
    }

    /// Scopes that own mutable fragment files.
    pub fn writable() -> [Scope; 2] {
        [Scope::Shared, Scope::Local]
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(Scope::Shared),
            "local" => Ok(Scope::Local),
            "secrets" => Ok(Scope::Secrets),
            _ => Err(format!("Unknown scope: {}", s)),
        }
    }
}

/// Kind of named entity held by a fragment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Alias,
    Function,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Alias => write!(f, "alias"),
            EntityKind::Function => write!(f, "function"),
        }
    }
}

/// One physical fragment file per (kind, scope) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FragmentKind {
    Aliases,
    Functions,
    Config,
}

impl FragmentKind {
    pub fn file_name(self) -> &'static str {
        match self {
            FragmentKind::Aliases => "aliases.zsh",
            FragmentKind::Functions => "functions.zsh",
            FragmentKind::Config => "config.zsh",
        }
    }

    pub fn all() -> [FragmentKind; 3] {
        [
            FragmentKind::Config,
            FragmentKind::Aliases,
            FragmentKind::Functions,
        ]
    }
}

/// A shell alias: `alias name='command'`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub command: String,
}

impl Alias {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }
}

/// A named shell function; `content` is the body without the braces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellFunction {
    pub name: String,
    pub content: String,
}

impl ShellFunction {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Free-form config blob of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigContent {
    pub content: String,
    pub scope: Scope,
}

/// Plugin catalog entry annotated with registry and install state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    pub description: Option<String>,
    pub repository: Option<String>,
    pub install_command: Option<String>,
    pub enabled: bool,
    pub installed: bool,
}

/// Working tree state of the shared scope repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatus {
    pub branch: String,
    pub clean: bool,
    pub ahead: u32,
    pub behind: u32,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommit {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

const FORBIDDEN_NAME_CHARS: &[char] = &[
    '=', '\'', '"', '`', '$', ';', '&', '|', '<', '>', '(', ')', '{', '}', '\\',
];

/// Validate an alias or function name.
///
/// Names must be non-empty, free of whitespace, `=` and shell
/// metacharacters, and must not start with `-` or `#`.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && !name.starts_with('#')
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_NAME_CHARS.contains(&c));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ll")]
    #[case("..")]
    #[case("~")]
    #[case("git-st")]
    #[case("k8s_ctx")]
    #[case("g.")]
    fn test_validate_name_accepts(#[case] name: &str) {
        assert!(validate_name(name).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("l l")]
    #[case("a=b")]
    #[case("-x")]
    #[case("#c")]
    #[case("x;rm")]
    #[case("tab\tname")]
    #[case("f()")]
    fn test_validate_name_rejects(#[case] name: &str) {
        assert!(matches!(
            validate_name(name),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("shared".parse::<Scope>().unwrap(), Scope::Shared);
        assert_eq!("LOCAL".parse::<Scope>().unwrap(), Scope::Local);
        assert_eq!("secrets".parse::<Scope>().unwrap(), Scope::Secrets);
        assert!("global".parse::<Scope>().is_err());
    }

    #[test]
    fn test_fragment_file_names() {
        assert_eq!(FragmentKind::Aliases.file_name(), "aliases.zsh");
        assert_eq!(FragmentKind::Functions.file_name(), "functions.zsh");
        assert_eq!(FragmentKind::Config.file_name(), "config.zsh");
    }
}
