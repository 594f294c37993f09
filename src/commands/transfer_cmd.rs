use std::collections::HashMap;

use anyhow::{Context as _, Result};
use dialoguer::Select;

use super::Context;
use crate::transfer::{
    self, Conflict, EntryRef, ImportOutcome, ImportReport, MergeStrategy, Resolution,
};
use crate::ui;

pub fn export(ctx: &Context, path: &str) -> Result<()> {
    let path = transfer::expand_path(path);
    let message = transfer::export_to(&ctx.store(), &path)?;
    ctx.done("Exported", message)
}

pub fn import(ctx: &Context, path: &str, strategy: MergeStrategy) -> Result<()> {
    let path = transfer::expand_path(path);
    let store = ctx.store();

    let report = match transfer::import_from(&store, &path, strategy)? {
        ImportOutcome::Applied(report) => report,
        ImportOutcome::Pending(pending) => {
            let decisions = if ui::is_interactive() && !ctx.json {
                ask(pending.conflicts())?
            } else {
                ui::warn(format!(
                    "{} conflict(s) left unchanged; rerun with --strategy overwrite or keep",
                    pending.conflicts().len()
                ));
                HashMap::new()
            };
            pending.resolve(&store, &decisions)
        }
    };

    ctx.output(&report, print_report)
}

fn ask(conflicts: &[Conflict]) -> Result<HashMap<EntryRef, Resolution>> {
    let choices = ["Keep existing", "Overwrite with incoming"];
    let mut decisions = HashMap::new();

    for conflict in conflicts {
        ui::conflict(&conflict.entry, &conflict.existing, &conflict.incoming);

        let choice = Select::new()
            .with_prompt(format!("Resolve {}", conflict.entry))
            .items(&choices)
            .default(0)
            .interact()
            .context("Failed to read conflict decision")?;
        let resolution = if choice == 1 {
            Resolution::Overwrite
        } else {
            Resolution::Keep
        };
        decisions.insert(conflict.entry.clone(), resolution);
    }

    Ok(decisions)
}

fn print_report(report: &ImportReport) {
    ui::success("Imported", report.summary());
    for entry in &report.unresolved {
        ui::warn(format!("{entry} kept (no decision)"));
    }
    for failed in &report.failed {
        ui::error(format!("{}: {}", failed.entry, failed.error));
    }
}
