use anyhow::Result;

use super::Context;
use crate::cli::GitAction;
use crate::model::GitStatus;
use crate::sync::{PullOutcome, PushOutcome};
use crate::ui;

pub fn execute(ctx: &Context, action: GitAction) -> Result<()> {
    let engine = ctx.engine();

    match action {
        GitAction::Status => ctx.output(&engine.status()?, print_status),

        GitAction::Commit { message } => {
            let hash = engine.commit(&message)?;
            ctx.done("Committed", format!("{} {message}", short(&hash)))
        }

        GitAction::Pull => {
            let outcome = network(ctx, "Pulling", "shared scope", || engine.pull(), |outcome| {
                match outcome {
                    PullOutcome::UpToDate => "already up to date".to_string(),
                    PullOutcome::FastForward { commits } => format!("fast-forwarded {commits} commit(s)"),
                    PullOutcome::Merged { commit } => format!("merged as {}", short(commit)),
                }
            })?;
            if ctx.json {
                ui::json(&outcome)?;
            }
            Ok(())
        }

        GitAction::Push => {
            let outcome = network(ctx, "Pushing", "shared scope", || engine.push(), |outcome| {
                match outcome {
                    PushOutcome::UpToDate => "nothing to push".to_string(),
                    PushOutcome::Pushed { commits } => format!("pushed {commits} commit(s)"),
                }
            })?;
            if ctx.json {
                ui::json(&outcome)?;
            }
            Ok(())
        }

        GitAction::Log { limit } => {
            let commits = engine.log(limit.unwrap_or(ctx.settings.log_limit))?;
            ctx.output(&commits, |commits| {
                let rows: Vec<Vec<String>> = commits
                    .iter()
                    .map(|commit| {
                        vec![
                            short(&commit.hash).to_string(),
                            commit.date.clone(),
                            commit.author.clone(),
                            commit.message.clone(),
                        ]
                    })
                    .collect();
                ui::table(&rows);
            })
        }

        GitAction::Diff => {
            let patch = engine.diff()?;
            ctx.output(&patch, |patch| print!("{patch}"))
        }

        GitAction::Init => {
            ctx.workspace.ensure_dirs()?;
            let hash = engine.init()?;
            ctx.done(
                "Initialized",
                format!("{} at {}", short(&hash), engine.root().display()),
            )
        }

        GitAction::Connect { url } => {
            network(ctx, "Connecting", &url, || engine.connect(&url), |_| String::new())?;
            ctx.done("Connected", format!("{} -> {url}", ctx.settings.remote))
        }

        GitAction::Clone { url } => {
            network(ctx, "Cloning", &url, || engine.clone_remote(&url), |_| String::new())?;
            ctx.workspace.ensure_dirs()?;
            ctx.done("Cloned", format!("{url} into {}", engine.root().display()))
        }
    }
}

/// Run a remote operation between status lines (quiet for JSON output)
fn network<T>(
    ctx: &Context,
    label: &str,
    what: &str,
    run: impl FnOnce() -> crate::Result<T>,
    describe: impl FnOnce(&T) -> String,
) -> Result<T> {
    if ctx.json {
        return Ok(run()?);
    }
    Ok(ui::remote(label, what, run, describe)?)
}

fn print_status(status: &GitStatus) {
    ui::info(format!("On branch {}", status.branch));
    if status.ahead > 0 || status.behind > 0 {
        ui::info(format!(
            "{} ahead, {} behind upstream",
            status.ahead, status.behind
        ));
    }
    if status.clean {
        ui::success("Clean", "nothing to commit");
        return;
    }
    for path in &status.modified {
        ui::status("Modified", path);
    }
    for path in &status.untracked {
        ui::status("Untracked", path);
    }
}

fn short(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}
