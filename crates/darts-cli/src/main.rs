//! Darts CLI - database maintenance and sync for the darts scorer
//!
//! This is the command-line interface for darts-core. It opens the local
//! database, runs sanity checks, backs it up or restores it, and syncs it
//! with a remote.

mod app;
mod cli;
mod commands;
mod config;
mod ui;

use clap::Parser;
use darts_core::VERSION;

use app::AppContext;
use cli::{Cli, Commands};
use commands::{
    handle_backup, handle_check, handle_completions, handle_doctor, handle_init, handle_restore,
    handle_sync,
};
use ui::{print_error, UiContext};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        log::debug!("Command failed: {:?}", err);
        print_error(&UiContext::from_env(false), &format!("{:#}", err), None);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let ctx = AppContext::new(cli);

    match &cli.command {
        Some(Commands::Init(args)) => handle_init(&ctx, args),
        Some(Commands::Check(args)) => handle_check(&ctx, args),
        Some(Commands::Doctor) => handle_doctor(&ctx),
        Some(Commands::Backup(args)) => handle_backup(&ctx, args),
        Some(Commands::Restore(args)) => handle_restore(&ctx, args),
        Some(Commands::Sync(args)) => handle_sync(&ctx, args),
        Some(Commands::Completions(args)) => handle_completions(args.shell),
        None => {
            println!("Darts v{}", VERSION);
            println!("\nRun `darts --help` for usage information.");
            Ok(())
        }
    }
}
