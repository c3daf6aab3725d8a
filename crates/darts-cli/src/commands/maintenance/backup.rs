use std::path::Path;

use darts_core::maintenance::backup_database;

use crate::app::AppContext;
use crate::cli::BackupArgs;
use crate::ui::{badge, print, Badge, UiContext};

pub fn handle_backup(ctx: &AppContext, args: &BackupArgs) -> anyhow::Result<()> {
    let database = ctx.database()?;
    let ui = UiContext::from_env(false);
    if ui.is_interactive() && !ctx.quiet() {
        let proceed = dialoguer::Confirm::new()
            .with_prompt(format!("Back up database to {}?", args.destination))
            .default(true)
            .interact()?;
        if !proceed {
            return Err(anyhow::anyhow!("Backup cancelled"));
        }
    }

    let target = backup_database(database, Path::new(&args.destination))
        .map_err(|e| anyhow::anyhow!("Backup failed: {}", e))?;

    if !ctx.quiet() {
        print(
            &ui,
            &badge(&ui, Badge::Ok, &format!("Backed up database to {}", target.display())),
        );
    }
    Ok(())
}
