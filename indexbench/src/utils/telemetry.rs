use std::{io::IsTerminal as _, path::Path};

use rama::{
    error::{BoxError, ErrorContext as _},
    telemetry::tracing::{
        self,
        metadata::LevelFilter,
        subscriber::{EnvFilter, fmt::writer::BoxMakeWriter},
    },
};

use super::env::network_service_identifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryConfig<'a> {
    /// DEBUG instead of INFO when `RUST_LOG` is not set
    pub verbose: bool,
    pub pretty: bool,
    /// append to this file instead of writing to stderr
    pub output: Option<&'a Path>,
}

impl TelemetryConfig<'_> {
    fn default_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }

    fn use_ansi(&self) -> bool {
        self.output.is_none() && std::io::stderr().is_terminal()
    }

    fn make_writer(&self) -> Result<BoxMakeWriter, BoxError> {
        let Some(path) = self.output else {
            return Ok(BoxMakeWriter::new(std::io::stderr));
        };

        let file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .context("open log file")?;
        Ok(BoxMakeWriter::new(file))
    }
}

/// Install the global tracing subscriber.
///
/// Stdout is left to the reporters, logs go to stderr or the output file.
/// `RUST_LOG` directives take precedence over the default level.
pub fn init_tracing(cfg: TelemetryConfig<'_>) -> Result<(), BoxError> {
    let subscriber = tracing::subscriber::fmt()
        .with_ansi(cfg.use_ansi())
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cfg.default_level().into())
                .from_env_lossy(),
        )
        .with_writer(cfg.make_writer()?);

    if cfg.pretty {
        subscriber.pretty().try_init()?;
    } else {
        subscriber.try_init()?;
    }

    tracing::info!(
        service = network_service_identifier(),
        level = %cfg.default_level(),
        "tracing is set up"
    );
    Ok(())
}
