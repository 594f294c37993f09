use anyhow::Result;

use super::{read_body, Context};
use crate::cli::ConfigAction;

pub fn execute(ctx: &Context, action: ConfigAction) -> Result<()> {
    let store = ctx.store();

    match action {
        ConfigAction::Show(scope) => {
            let config = store.get_config(scope.scope)?;
            ctx.output(&config, |config| print!("{}", config.content))
        }

        ConfigAction::Set { body, scope } => {
            let content = read_body(&body)?;
            store.set_config(scope.scope, &content)?;
            ctx.done(
                "Saved",
                format!("{} config ({} bytes)", scope.scope, content.len()),
            )
        }
    }
}
