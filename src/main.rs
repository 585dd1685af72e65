mod cli;
mod logging;
mod prompt;
mod reporter;

use std::process;

use clap::Parser;
use cli::Cli;
use colored::*;
use dotenv::dotenv;
use drive_trash_cleaner::config::{self, AppConfig};
use drive_trash_cleaner::credentials::{CredentialStore, RefreshingToken};
use drive_trash_cleaner::drive::HttpDrive;
use drive_trash_cleaner::{
    Cleaner, CleanerOptions, CursorStore, Error, RequestExecutor, RunOutcome, ScanOptions,
};
use reporter::ConsoleReporter;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let _guard = match logging::init_logger(args.logfile.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Cannot open log file: {}", err);
            process::exit(1);
        }
    };

    let mut config = match config::load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            eprintln!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };
    apply_cli_overrides(&mut config, &args);

    if let Err(err) = run(&config, &args) {
        error!("Error: {}", err);
        eprintln!("{} {}", "Error:".red(), err);
        process::exit(1);
    }
}

fn apply_cli_overrides(config: &mut AppConfig, args: &Cli) {
    if let Some(days) = args.days {
        config.retention_days = days;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(path) = &args.ptokenfile {
        config.page_token_file = path.clone();
    }
    if let Some(path) = &args.credfile {
        config.credential_file = path.clone();
    }
}

fn run(config: &AppConfig, args: &Cli) -> anyhow::Result<()> {
    let options = CleanerOptions {
        scan: ScanOptions {
            retention_days: config.retention_days,
            timeout: config.timeout(),
            full_path: args.full_path(),
            my_drive_only: args.mydriveonly,
            require_ownership: config.require_ownership,
        },
        mode: args.delete_mode(),
        run_retries: config.run_retries,
        run_retry_interval: config.run_retry_interval(),
    };
    let store = CursorStore::new(&config.page_token_file);
    let executor = RequestExecutor::new(config.retry_interval());
    let cleaner = Cleaner::new(options, store, executor);

    let credential_store = CredentialStore::new(&config.credential_file);
    let connect = || -> Result<HttpDrive, Error> {
        let tokens = RefreshingToken::authorize(config, credential_store.clone())?;
        Ok(HttpDrive::new(&config.api_base_url, tokens)?)
    };

    let reporter = ConsoleReporter::new(args.quiet, !args.noprogress);
    let outcome = cleaner.run(connect, &reporter, &prompt::confirm_deletion)?;

    match outcome {
        RunOutcome::Completed {
            found,
            all_deleted,
            cursor,
        } => info!(found, all_deleted, "Run complete, cursor at {}", cursor),
        RunOutcome::RetriesExhausted => info!("Run aborted after retries"),
        RunOutcome::TimedOut => info!("Run aborted on backend timeout"),
    }
    Ok(())
}
