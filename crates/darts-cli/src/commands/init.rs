use std::path::PathBuf;

use darts_core::migration::initialise_database;
use darts_core::{Database, DATABASE_VERSION};

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{default_database_directory, write_config, DartsConfig};
use crate::ui::{badge, hint, kv, print, Badge, UiContext};

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = resolve_config_path()?;
    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}\n\nPass --force to overwrite it.",
            config_path.display()
        ));
    }

    let directory = match args.path.as_deref().or(ctx.cli().database.as_deref()) {
        Some(path) => PathBuf::from(path),
        None => default_database_directory()?,
    };
    let directory = std::path::absolute(&directory).unwrap_or(directory);

    let config = DartsConfig::new(
        directory.clone(),
        args.remote_directory.clone(),
        args.remote_name.clone(),
    );

    let database = Database::open(&directory, config.database_config())?;
    let migrated = initialise_database(&database);
    database.shutdown();
    migrated?;

    write_config(&config_path, &config)?;

    if !ctx.quiet() {
        let ui = UiContext::from_env(false);
        print(&ui, &badge(&ui, Badge::Ok, "Initialized darts database"));
        print(&ui, &kv(&ui, "Database", &directory.display().to_string()));
        print(&ui, &kv(&ui, "Schema version", &DATABASE_VERSION.to_string()));
        print(&ui, &kv(&ui, "Config", &config_path.display().to_string()));
        if config.sync.remote_directory.is_none() {
            print(
                &ui,
                &hint(&ui, "set [sync] remote_directory in the config to enable `darts sync`"),
            );
        }
    }
    Ok(())
}
