use anyhow::Result;

use super::Context;
use crate::cli::AliasAction;
use crate::model::{Alias, Scope};
use crate::ui;

pub fn execute(ctx: &Context, action: AliasAction) -> Result<()> {
    let store = ctx.store();

    match action {
        AliasAction::List(scope) => list(ctx, store.list_aliases(scope.scope)?),

        AliasAction::Secrets => list(ctx, store.list_secrets_aliases()?),

        AliasAction::Add {
            name,
            command,
            scope,
        } => {
            store.add_alias(scope.scope, &Alias::new(&name, command))?;
            ctx.done("Added", format!("alias {name} ({})", scope.scope))
        }

        AliasAction::Update {
            name,
            command,
            rename,
            scope,
        } => {
            let new_name = rename.unwrap_or_else(|| name.clone());
            store.update_alias(scope.scope, &name, &Alias::new(&new_name, command))?;
            ctx.done("Updated", describe_update(&name, &new_name, scope.scope))
        }

        AliasAction::Remove { name, scope } => {
            store.delete_alias(scope.scope, &name)?;
            ctx.done("Removed", format!("alias {name} ({})", scope.scope))
        }
    }
}

fn list(ctx: &Context, aliases: Vec<Alias>) -> Result<()> {
    ctx.output(&aliases, |aliases| {
        let rows: Vec<[String; 2]> = aliases
            .iter()
            .map(|alias| [alias.name.clone(), alias.command.clone()])
            .collect();
        ui::table(&rows);
    })
}

fn describe_update(old: &str, new: &str, scope: Scope) -> String {
    if old == new {
        format!("alias {new} ({scope})")
    } else {
        format!("alias {old} -> {new} ({scope})")
    }
}
