use std::{path::PathBuf, sync::Arc, time::Duration};

use parking_lot::Mutex;
use rama::{error::BoxError, graceful, telemetry::tracing};

use clap::{Parser, Subcommand};

pub mod client;
pub mod cmd;
pub mod comparator;
pub mod config;
pub mod utils;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// CLI arguments for configuring indexbench behavior.
#[derive(Debug, Clone, Parser)]
#[command(name = "indexbench")]
#[command(bin_name = "indexbench")]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    cmds: CliCommands,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false, global = true)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false, global = true)]
    pub pretty: bool,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "SECONDS", default_value_t = 0., global = true)]
    /// the graceful shutdown timeout (<= 0.0 = no timeout)
    pub graceful: f64,
}

#[derive(Debug, Clone, Subcommand)]
enum CliCommands {
    Run(self::cmd::run::RunCommand),
    Mock(self::cmd::mock::MockCommand),
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    utils::telemetry::init_tracing(utils::telemetry::TelemetryConfig {
        verbose: args.verbose,
        pretty: args.pretty,
        output: args.output.as_deref(),
    })?;

    let base_shutdown_signal = graceful::default_signal();
    if let Err(err) = run_with_args(base_shutdown_signal, args).await {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

/// run an indexbench cmd with the given args
///
/// An error returned by the command initiates the graceful shutdown
/// and is returned once that shutdown is complete.
async fn run_with_args<F>(base_shutdown_signal: F, args: Args) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let graceful_timeout = (args.graceful > 0.).then(|| Duration::from_secs_f64(args.graceful));

    let fatal_error: Arc<Mutex<Option<BoxError>>> = Default::default();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let graceful = graceful::Shutdown::new(new_shutdown_signal(done_rx, base_shutdown_signal));

    graceful.spawn_task_fn({
        let fatal_error = fatal_error.clone();
        async move |guard| {
            let result = match args.cmds {
                CliCommands::Run(run_args) => self::cmd::run::exec(guard, run_args).await,
                CliCommands::Mock(mock_args) => self::cmd::mock::exec(guard, mock_args).await,
            };
            if let Err(err) = result {
                tracing::error!("command exited with an error: {err}");
                *fatal_error.lock() = Some(err);
            }
            drop(done_tx);
        }
    });

    let delay = match graceful_timeout {
        Some(duration) => graceful.shutdown_with_limit(duration).await?,
        None => graceful.shutdown().await,
    };

    tracing::debug!("gracefully shutdown with a delay of: {delay:?}");

    match fatal_error.lock().take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn new_shutdown_signal(
    done_rx: tokio::sync::oneshot::Receiver<()>,
    base_shutdown_signal: impl Future<Output: Send + 'static> + Send + 'static,
) -> impl Future + Send + 'static {
    async move {
        tokio::select! {
            _ = base_shutdown_signal => {
                tracing::debug!("default signal triggered: init graceful shutdown");
            }
            _ = done_rx => {
                tracing::debug!("command is finished, return control");
            }
        }
    }
}
