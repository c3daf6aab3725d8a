use std::path::Path;

use darts_core::maintenance::{restore_database, validate_restore_source};

use crate::app::AppContext;
use crate::cli::RestoreArgs;
use crate::ui::{badge, print, Badge, UiContext};

pub fn handle_restore(ctx: &AppContext, args: &RestoreArgs) -> anyhow::Result<()> {
    let database = ctx.database()?;
    let source = Path::new(&args.source);
    validate_restore_source(source, database)?;

    let ui = UiContext::from_env(false);
    if !args.no_input {
        if !ui.is_interactive() {
            return Err(anyhow::anyhow!(
                "Restore replaces the current database. Pass --no-input to restore without a prompt."
            ));
        }
        let proceed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Replace the database at {} with {}?",
                database.directory().display(),
                source.display()
            ))
            .default(false)
            .interact()?;
        if !proceed {
            return Err(anyhow::anyhow!("Restore cancelled"));
        }
    }

    restore_database(database, source)?;

    if !ctx.quiet() {
        print(
            &ui,
            &badge(&ui, Badge::Ok, &format!("Restored database from {}", source.display())),
        );
    }
    Ok(())
}
