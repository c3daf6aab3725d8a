use darts_core::sanity::{run_sanity_check, SanityCheckResult};

use crate::app::AppContext;
use crate::cli::CheckArgs;
use crate::ui::{badge, hint, print, table, Badge, Column, UiContext};

pub fn handle_check(ctx: &AppContext, args: &CheckArgs) -> anyhow::Result<()> {
    let database = ctx.database()?;
    let ui = UiContext::from_env(args.json);
    let results = run_sanity_check(database);

    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&results_json(&results))?);
        if !results.is_empty() {
            return Err(anyhow::anyhow!("Sanity check found {} issue(s)", results.len()));
        }
        return Ok(());
    }

    if results.is_empty() {
        if !ctx.quiet() {
            print(&ui, &badge(&ui, Badge::Ok, "Sanity check: OK"));
        }
        return Ok(());
    }

    if !ctx.quiet() {
        print(&ui, &badge(&ui, Badge::Warn, "Sanity check found issues"));
        print(&ui, &table(&ui, &columns(), &rows(&results)));
    }

    let mut unresolved = 0;
    for result in &results {
        if result.can_auto_fix() && should_fix(ctx, &ui, args, result)? {
            if result.apply_auto_fix(database) {
                if !ctx.quiet() {
                    print(
                        &ui,
                        &badge(&ui, Badge::Ok, &format!("Fixed: {}", result.description)),
                    );
                }
                continue;
            }
            eprintln!("{}", badge(&ui, Badge::Err, &format!("Fix failed: {}", result.description)));
        }
        unresolved += 1;
    }

    if unresolved > 0 {
        if !ctx.quiet() && !args.fix {
            print(&ui, &hint(&ui, "darts check --fix applies every available fix"));
        }
        return Err(anyhow::anyhow!("Sanity check: {} issue(s) remaining", unresolved));
    }
    Ok(())
}

fn should_fix(
    ctx: &AppContext,
    ui: &UiContext,
    args: &CheckArgs,
    result: &SanityCheckResult,
) -> anyhow::Result<bool> {
    if args.fix {
        return Ok(true);
    }
    if ctx.quiet() || !ui.is_interactive() {
        return Ok(false);
    }
    let proceed = dialoguer::Confirm::new()
        .with_prompt(format!(
            "Apply fix for \"{}\" ({} affected)?",
            result.description,
            result.count()
        ))
        .default(false)
        .interact()?;
    Ok(proceed)
}

fn columns() -> [Column; 3] {
    [
        Column::new("Check"),
        Column::new("Count"),
        Column::new("Auto-fix"),
    ]
}

fn rows(results: &[SanityCheckResult]) -> Vec<Vec<String>> {
    results
        .iter()
        .map(|result| {
            vec![
                result.description.clone(),
                result.count().to_string(),
                if result.can_auto_fix() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect()
}

fn results_json(results: &[SanityCheckResult]) -> serde_json::Value {
    serde_json::Value::Array(
        results
            .iter()
            .map(|result| {
                serde_json::json!({
                    "description": result.description,
                    "count": result.count(),
                    "rows": result.rows,
                    "auto_fix": result.can_auto_fix(),
                })
            })
            .collect(),
    )
}
