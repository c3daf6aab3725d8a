use std::path::PathBuf;
use std::sync::Arc;

use darts_core::sync::remote::DirectoryRemoteStore;
use darts_core::SyncManager;

use crate::app::{missing_remote_message, AppContext};
use crate::cli::SyncArgs;
use crate::ui::{kv, print, Badge, Spinner, UiContext};

pub fn handle_sync(ctx: &AppContext, args: &SyncArgs) -> anyhow::Result<()> {
    let sync_config = ctx.config()?.map(|config| &config.sync);
    let remote_directory = args
        .remote_directory
        .clone()
        .or_else(|| sync_config.and_then(|s| s.remote_directory.clone()))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!(missing_remote_message("directory")))?;
    let remote_name = args
        .remote
        .clone()
        .or_else(|| sync_config.and_then(|s| s.remote_name.clone()))
        .ok_or_else(|| anyhow::anyhow!(missing_remote_message("remote name")))?;

    let database = Arc::clone(ctx.database()?);
    let store = Arc::new(DirectoryRemoteStore::with_config(
        remote_directory,
        database.config().clone(),
    ));
    let manager = SyncManager::new(store, database);

    let ui = UiContext::from_env(false);
    let spinner = Spinner::start(&ui, &format!("Syncing with {}", remote_name), ctx.quiet());
    let outcome = manager
        .do_sync(&remote_name)
        .join()
        .map_err(|_| anyhow::anyhow!("Sync worker panicked"))?;

    match outcome {
        Ok(summary) => {
            spinner.finish(&ui, Badge::Ok, "Sync completed successfully!");
            if !ctx.quiet() {
                print(&ui, &kv(&ui, "Rows pushed", &summary.rows_pushed.to_string()));
                print(&ui, &kv(&ui, "Rows pulled", &summary.rows_pulled.to_string()));
            }
            Ok(())
        }
        Err(failure) => {
            spinner.clear();
            Err(anyhow::anyhow!(failure.to_string()))
        }
    }
}
