use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::environment::Shell;
use crate::model::Scope;
use crate::transfer::MergeStrategy;

/// zdot - shell configuration manager
///
/// zdot keeps aliases, functions, free-form config and oh-my-zsh plugins in
/// plain shell fragment files. The shared scope is a git repository synced
/// between machines; the local scope stays on this machine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON instead of status lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage aliases
    #[command(subcommand)]
    Alias(AliasAction),

    /// Manage shell functions
    #[command(subcommand, name = "func")]
    Function(FunctionAction),

    /// Show or replace a scope's free-form config
    #[command(subcommand)]
    Config(ConfigAction),

    /// Manage enabled oh-my-zsh plugins
    #[command(subcommand)]
    Plugin(PluginAction),

    /// Version control for the shared scope
    #[command(subcommand)]
    Git(GitAction),

    /// Print the instruction that reloads the running shell
    Reload,

    /// Output the lines that source every fragment (used in shell init)
    Env {
        /// Shell type (defaults to the `shell` setting)
        #[arg(short, long, value_enum)]
        shell: Option<Shell>,
    },

    /// Write a bundle of both scopes to a file
    Export {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Merge a bundle into the current scopes
    Import {
        #[arg(value_name = "PATH")]
        path: String,

        /// What to do with names that already exist
        #[arg(short, long, value_enum, default_value = "ask")]
        strategy: MergeStrategy,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct ScopeArg {
    /// Scope to operate on
    #[arg(long, value_enum, default_value = "shared")]
    pub scope: Scope,
}

/// Where a multi-line body comes from; stdin when neither is given.
#[derive(Args, Debug, Clone)]
pub struct BodyArg {
    /// Body text
    #[arg(long, conflicts_with = "file")]
    pub body: Option<String>,

    /// Read the body from a file
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum AliasAction {
    /// List aliases
    #[command(name = "list", alias = "ls")]
    List(ScopeArg),

    /// Add an alias
    Add {
        name: String,
        command: String,
        #[command(flatten)]
        scope: ScopeArg,
    },

    /// Replace an alias, optionally renaming it
    Update {
        name: String,
        command: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        #[command(flatten)]
        scope: ScopeArg,
    },

    /// Delete an alias
    #[command(name = "rm")]
    Remove {
        name: String,
        #[command(flatten)]
        scope: ScopeArg,
    },

    /// List the read-only secrets aliases
    Secrets,
}

#[derive(Subcommand, Debug)]
pub enum FunctionAction {
    /// List functions
    #[command(name = "list", alias = "ls")]
    List(ScopeArg),

    /// Add a function
    Add {
        name: String,
        #[command(flatten)]
        body: BodyArg,
        #[command(flatten)]
        scope: ScopeArg,
    },

    /// Replace a function, optionally renaming it
    Update {
        name: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        #[command(flatten)]
        body: BodyArg,
        #[command(flatten)]
        scope: ScopeArg,
    },

    /// Delete a function
    #[command(name = "rm")]
    Remove {
        name: String,
        #[command(flatten)]
        scope: ScopeArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print a scope's config
    Show(ScopeArg),

    /// Replace a scope's config
    Set {
        #[command(flatten)]
        body: BodyArg,
        #[command(flatten)]
        scope: ScopeArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum PluginAction {
    /// List enabled plugins
    #[command(name = "list", alias = "ls")]
    List,

    /// List the plugin catalog
    Available,

    /// Enable a plugin
    Add { name: String },

    /// Disable a plugin
    #[command(name = "rm")]
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
pub enum GitAction {
    /// Show working tree status
    Status,

    /// Stage everything and commit
    Commit {
        #[arg(short, long)]
        message: String,
    },

    /// Fetch and integrate the upstream branch
    Pull,

    /// Push the current branch upstream
    Push,

    /// Show recent commits
    Log {
        /// Number of commits (defaults to the `log_limit` setting)
        #[arg(short = 'n', long)]
        limit: Option<i64>,
    },

    /// Show uncommitted changes
    Diff,

    /// Create the repository in the shared scope
    Init,

    /// Point the repository at a remote and track its branch
    Connect {
        /// Git repository URL or GitHub shorthand (user/repo)
        #[arg(value_name = "REPOSITORY")]
        url: String,
    },

    /// Clone a remote into an empty shared scope
    Clone {
        /// Git repository URL or GitHub shorthand (user/repo)
        #[arg(value_name = "REPOSITORY")]
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scope_defaults_to_shared() {
        let cli = Cli::parse_from(["zdot", "alias", "add", "ll", "ls -lah"]);
        match cli.command {
            Commands::Alias(AliasAction::Add { scope, .. }) => assert_eq!(scope.scope, Scope::Shared),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_import_strategy_parses() {
        let cli = Cli::parse_from(["zdot", "--json", "import", "b.toml", "--strategy", "keep"]);
        assert!(cli.json);
        match cli.command {
            Commands::Import { strategy, .. } => assert_eq!(strategy, MergeStrategy::Keep),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
