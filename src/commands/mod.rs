use std::fs;
use std::io::{self, Read};

use anyhow::{Context as _, Result};
use serde::Serialize;

use crate::cli::{BodyArg, Cli, Commands};
use crate::config::Settings;
use crate::environment::Shell;
use crate::plugins::OhMyZshProbe;
use crate::store::ConfigStore;
use crate::sync::SyncEngine;
use crate::{ui, Workspace};

mod alias;
mod config_cmd;
mod env;
mod function;
mod git;
mod plugin;
mod transfer_cmd;

/// Everything a command needs, resolved once per invocation
pub struct Context {
    pub workspace: Workspace,
    pub settings: Settings,
    pub json: bool,
}

impl Context {
    pub fn new(workspace: Workspace, json: bool) -> Result<Self> {
        let settings = workspace.settings()?;
        Ok(Self {
            workspace,
            settings,
            json,
        })
    }

    pub fn store(&self) -> ConfigStore {
        let probe = OhMyZshProbe::from_env(&self.settings.expanded_plugin_dirs());
        ConfigStore::new(&self.workspace, Box::new(probe))
    }

    pub fn engine(&self) -> SyncEngine {
        let engine = SyncEngine::new(&self.workspace).with_remote(&self.settings.remote);
        match self.settings.author() {
            Some((name, email)) => engine.with_author(name, email),
            None => engine,
        }
    }

    pub fn shell(&self) -> Shell {
        Shell::from_name(&self.settings.shell).unwrap_or_else(|| {
            ui::warn(format!(
                "Unknown shell '{}' in settings; defaulting to zsh",
                self.settings.shell
            ));
            Shell::Zsh
        })
    }

    /// Report a finished mutation
    pub fn done(&self, label: &str, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        if self.json {
            ui::json(&Done { message: &message })
        } else {
            ui::success(label, message);
            Ok(())
        }
    }

    /// Print `value` as JSON, or hand it to `human` for status lines
    pub fn output<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            ui::json(value)
        } else {
            human(value);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct Done<'a> {
    message: &'a str,
}

/// Body text from `--body`, `--file` or standard input
pub(crate) fn read_body(arg: &BodyArg) -> Result<String> {
    if let Some(body) = &arg.body {
        return Ok(body.clone());
    }
    if let Some(path) = &arg.file {
        return fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path));
    }

    let mut body = String::new();
    io::stdin()
        .read_to_string(&mut body)
        .context("Failed to read body from standard input")?;
    Ok(body)
}

pub fn execute(cli: Cli) -> Result<()> {
    let ctx = Context::new(Workspace::new()?, cli.json)?;

    match cli.command {
        Commands::Alias(action) => alias::execute(&ctx, action),
        Commands::Function(action) => function::execute(&ctx, action),
        Commands::Config(action) => config_cmd::execute(&ctx, action),
        Commands::Plugin(action) => plugin::execute(&ctx, action),
        Commands::Git(action) => git::execute(&ctx, action),
        Commands::Reload => env::reload(&ctx),
        Commands::Env { shell } => env::execute(&ctx, shell),
        Commands::Export { path } => transfer_cmd::export(&ctx, &path),
        Commands::Import { path, strategy } => transfer_cmd::import(&ctx, &path, strategy),
    }
}
