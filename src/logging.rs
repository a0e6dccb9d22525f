//! Tracing subscriber setup for the binary

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "PACKAGE_LENS_LOG";

const DEFAULT_FILTER: &str = "package_lens=info";

#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    pub json: bool,
    /// Write to this file instead of stderr
    pub file: Option<&'a Path>,
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the program.
pub fn init(options: LogOptions<'_>) -> anyhow::Result<Option<WorkerGuard>> {
    let (writer, guard) = match options.file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory)?;
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log path {} has no file name", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (fmt::writer::BoxMakeWriter::new(writer), Some(guard))
        }
        None => (fmt::writer::BoxMakeWriter::new(std::io::stderr), None),
    };

    let subscriber = tracing_subscriber::registry().with(filter());

    if options.json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer);
        subscriber.with(json_layer).try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_ansi(options.file.is_none())
            .with_writer(writer);
        subscriber.with(fmt_layer).try_init()?;
    }

    Ok(guard)
}
