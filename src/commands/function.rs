use anyhow::Result;

use super::{read_body, Context};
use crate::cli::{BodyArg, FunctionAction};
use crate::model::ShellFunction;

pub fn execute(ctx: &Context, action: FunctionAction) -> Result<()> {
    let store = ctx.store();

    match action {
        FunctionAction::List(scope) => {
            let functions = store.list_functions(scope.scope)?;
            ctx.output(&functions, |functions| {
                for function in functions {
                    println!("{}() {{", function.name);
                    for line in function.content.lines() {
                        println!("  {line}");
                    }
                    println!("}}");
                }
            })
        }

        FunctionAction::Add { name, body, scope } => {
            let function = ShellFunction::new(&name, content(&body)?);
            store.add_function(scope.scope, &function)?;
            ctx.done("Added", format!("function {name} ({})", scope.scope))
        }

        FunctionAction::Update {
            name,
            rename,
            body,
            scope,
        } => {
            let new_name = rename.unwrap_or_else(|| name.clone());
            let function = ShellFunction::new(&new_name, content(&body)?);
            store.update_function(scope.scope, &name, &function)?;
            ctx.done("Updated", format!("function {new_name} ({})", scope.scope))
        }

        FunctionAction::Remove { name, scope } => {
            store.delete_function(scope.scope, &name)?;
            ctx.done("Removed", format!("function {name} ({})", scope.scope))
        }
    }
}

/// Function bodies are stored without the trailing newline an editor leaves
fn content(body: &BodyArg) -> Result<String> {
    let text = read_body(body)?;
    Ok(text.trim_end_matches(['\n', '\r']).to_string())
}
