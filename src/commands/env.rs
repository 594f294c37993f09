use anyhow::Result;
use serde::Serialize;

use super::Context;
use crate::environment::{self, Environment, Shell};

pub fn execute(ctx: &Context, shell: Option<Shell>) -> Result<()> {
    let shell = shell.unwrap_or_else(|| ctx.shell());
    let env = Environment::new_from_workspace(&ctx.workspace);

    ctx.output(&env.files, |_| println!("{}", env.format_for_shell(shell)))
}

#[derive(Serialize)]
struct Reload {
    command: String,
}

/// Print the command that re-sources the rc file, so `eval "$(zdot reload)"` works.
pub fn reload(ctx: &Context) -> Result<()> {
    let reload = Reload {
        command: environment::reload_message(ctx.shell()),
    };
    ctx.output(&reload, |reload| println!("{}", reload.command))
}
