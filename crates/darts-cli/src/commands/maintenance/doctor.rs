use chrono::{DateTime, Utc};
use darts_core::entity::sync_audit::SyncAuditEntity;
use darts_core::sanity::run_sanity_check;

use crate::app::{missing_config_message, resolve_config_path, AppContext};

pub fn handle_doctor(ctx: &AppContext) -> anyhow::Result<()> {
    let config_path = resolve_config_path()?;
    let config = ctx.config().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    if config.is_none() && ctx.cli().database.is_none() {
        eprintln!("{}", missing_config_message(&config_path));
        return Err(anyhow::anyhow!("Darts is not initialized"));
    }

    let directory = ctx.database_directory()?;
    let database = ctx.database().map_err(|e| {
        eprintln!("Doctor: FAILED");
        eprintln!("- database: FAILED ({})", directory.display());
        anyhow::anyhow!("Doctor failed: {}", e)
    })?;

    if !database.test_connection() {
        eprintln!("Doctor: FAILED");
        eprintln!("- database: FAILED ({})", directory.display());
        eprintln!("Hint: Restore from a backup with `darts restore`.");
        return Err(anyhow::anyhow!("Doctor failed"));
    }

    let version = database
        .get_database_version()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let issues = run_sanity_check(database).len();
    let remote_name = config.and_then(|c| c.sync.remote_name.as_deref());

    if !ctx.quiet() {
        println!("Doctor: OK");
        match config {
            Some(_) => println!("- config: OK ({})", config_path.display()),
            None => println!("- config: not found ({})", config_path.display()),
        }
        println!("- database: OK ({})", directory.display());
        println!("- schema version: {}", version);
        if issues == 0 {
            println!("- sanity check: OK");
        } else {
            println!("- sanity check: {} issue(s), run `darts check`", issues);
        }
        match remote_name {
            Some(name) => match SyncAuditEntity::last_sync_for(database, name) {
                Some(when) => println!("- last sync with {}: {}", name, format_sync_time(when)),
                None => println!("- last sync with {}: never", name),
            },
            None => println!("- sync: not configured"),
        }
    }

    Ok(())
}

fn format_sync_time(when: DateTime<Utc>) -> String {
    when.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_sync_time() {
        let when = Utc.with_ymd_and_hms(2024, 3, 9, 18, 5, 0).unwrap();
        assert_eq!(format_sync_time(when), "2024-03-09 18:05:00 UTC");
    }
}
