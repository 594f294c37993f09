use anyhow::Result;

use super::Context;
use crate::cli::PluginAction;
use crate::model::Plugin;
use crate::ui;

pub fn execute(ctx: &Context, action: PluginAction) -> Result<()> {
    let store = ctx.store();
    let registry = store.plugins();

    match action {
        PluginAction::List => print_plugins(ctx, &registry.enabled()?),

        PluginAction::Available => print_plugins(ctx, &registry.list_available()?),

        PluginAction::Add { name } => {
            if registry.add(&name)? {
                if !ctx.json {
                    if let Some(hint) = install_hint(&registry.enabled()?, &name) {
                        ui::warn(hint);
                    }
                }
                ctx.done("Enabled", format!("plugin {name}"))
            } else {
                ctx.done("Unchanged", format!("plugin {name} is already enabled"))
            }
        }

        PluginAction::Remove { name } => {
            if registry.remove(&name)? {
                ctx.done("Disabled", format!("plugin {name}"))
            } else {
                ctx.done("Unchanged", format!("plugin {name} is not enabled"))
            }
        }
    }
}

fn print_plugins(ctx: &Context, plugins: &[Plugin]) -> Result<()> {
    ctx.output(plugins, |plugins| {
        let rows: Vec<[String; 3]> = plugins
            .iter()
            .map(|plugin| {
                let mut flags = Vec::new();
                if plugin.enabled {
                    flags.push("enabled");
                }
                if plugin.installed {
                    flags.push("installed");
                }
                [
                    plugin.name.clone(),
                    flags.join(", "),
                    plugin.description.clone().unwrap_or_default(),
                ]
            })
            .collect();
        ui::table(&rows);
    })
}

/// Install instruction for an enabled plugin that is not on disk
fn install_hint(plugins: &[Plugin], name: &str) -> Option<String> {
    let plugin = plugins.iter().find(|p| p.name == name)?;
    if plugin.installed {
        return None;
    }
    let command = plugin.install_command.as_deref()?;
    Some(format!("{name} is not installed; install it with:\n{command}"))
}
