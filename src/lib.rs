// Public API
pub mod cli;
pub mod commands;

// Core domain types
pub mod codec;
pub mod config;
pub mod environment;
pub mod error;
pub mod model;
pub mod plugins;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod ui;
pub mod workspace;

// Re-export main types
pub use config::Settings;
pub use environment::{Environment, Shell};
pub use error::{Error, Result};
pub use model::{Alias, ConfigContent, GitCommit, GitStatus, Plugin, Scope, ShellFunction};
pub use store::ConfigStore;
pub use sync::{PullOutcome, PushOutcome, SyncEngine};
pub use transfer::{ExportData, ImportOutcome, ImportReport, MergeStrategy, Resolution};
pub use workspace::{Workspace, WorkspacePath};
