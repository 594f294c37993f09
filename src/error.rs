//! Error types for the config store and the synchronization engine.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::{EntityKind, Scope};

/// Errors surfaced by every core operation.
///
/// Caller-correctable input errors (`NotFound`, `DuplicateName`, ...) are
/// never retried by the core. Filesystem and git failures carry the
/// operation and path so they can be shown to a user as-is.
#[derive(Debug, Error)]
pub enum Error {
    /// No entity with this name exists in the addressed store.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    /// An entity with this name already exists in the addressed store.
    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },

    /// Mutation attempted against a read-only scope.
    #[error("scope '{0}' is read-only")]
    ReadOnlyScope(Scope),

    /// Name is not a valid shell identifier.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Entity body cannot be encoded without corrupting the file.
    #[error("invalid body for '{name}': {reason}")]
    InvalidBody { name: String, reason: String },

    #[error("no git repository at {}", .0.display())]
    RepositoryNotInitialized(PathBuf),

    #[error("git repository already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("nothing to commit, working tree clean")]
    NothingToCommit,

    #[error("commit message is empty")]
    EmptyMessage,

    /// Pull could not be completed with a fast-forward or a clean merge.
    #[error("merge conflict in: {}", .0.join(", "))]
    MergeConflict(Vec<String>),

    /// Remote refused the push; pull first.
    #[error("push rejected: {0}")]
    Rejected(String),

    /// Current branch has no upstream configured.
    #[error("branch '{0}' has no upstream configured")]
    NoUpstream(String),

    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git {op} failed: {source}")]
    Git {
        op: &'static str,
        #[source]
        source: git2::Error,
    },

    /// Bundle could not be serialized or parsed.
    #[error("invalid bundle {}: {message}", .path.display())]
    Bundle { path: PathBuf, message: String },
}

/// Result type for core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn git(op: &'static str) -> impl FnOnce(git2::Error) -> Self {
        move |source| Error::Git { op, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound {
            kind: EntityKind::Alias,
            name: "ll".into(),
        };
        assert_eq!(err.to_string(), "alias 'll' not found");
    }

    #[test]
    fn test_duplicate_display() {
        let err = Error::DuplicateName {
            kind: EntityKind::Function,
            name: "mkcd".into(),
        };
        assert_eq!(err.to_string(), "function 'mkcd' already exists");
    }

    #[test]
    fn test_read_only_display() {
        let err = Error::ReadOnlyScope(Scope::Secrets);
        assert!(err.to_string().contains("secrets"));
    }

    #[test]
    fn test_io_display_includes_path() {
        let err = Error::io(
            "read",
            Path::new("/tmp/aliases.zsh"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        let msg = err.to_string();
        assert!(msg.contains("failed to read"));
        assert!(msg.contains("/tmp/aliases.zsh"));
    }

    #[test]
    fn test_merge_conflict_lists_paths() {
        let err = Error::MergeConflict(vec!["aliases.zsh".into(), "config.zsh".into()]);
        assert_eq!(err.to_string(), "merge conflict in: aliases.zsh, config.zsh");
    }
}
