use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, level_filters::LevelFilter};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Console logging follows `TRACING_LEVEL` (default `warn`, so the regular output stays
/// readable). With a log file, everything at `info` and above, including each deleted
/// file, is appended there as well.
pub fn init_logger(log_file: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "warn".to_string());
    let filter_layer = EnvFilter::new(filter);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .without_time()
        .with_ansi(true)
        .with_filter(filter_layer);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(dir)?;
            let file_name = path
                .file_name()
                .map(|n| n.to_owned())
                .unwrap_or_else(|| "drive-trash-cleaner.log".into());
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_filter(LevelFilter::INFO);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();

    debug!("Tracing is configured");
    Ok(guard)
}
