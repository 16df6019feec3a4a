use std::time::Duration;

use rama::{
    error::BoxError,
    graceful::ShutdownGuard,
    telemetry::tracing,
};

use clap::Args;
use tokio::{
    io::BufReader,
    sync::mpsc::{self, UnboundedReceiver},
};

use crate::{
    comparator::{Event, EventSink, PollingComparator},
    config::{TargetConfig, parse_humantime_str, parse_tick_interval},
};

mod controls;
pub mod reporter;

use self::reporter::*;

#[derive(Debug, Clone, Args)]
/// poll both APIs and compare the latency each of them reports
pub struct RunCommand {
    #[command(flatten)]
    target: TargetConfig,

    /// time between two ticks
    #[arg(
        long,
        value_name = "DURATION",
        value_parser = parse_tick_interval,
        default_value = "5s"
    )]
    interval: Duration,

    /// stop after N completed ticks
    #[arg(long, value_name = "N")]
    ticks: Option<u64>,

    /// stop once this duration elapsed
    #[arg(long, value_name = "DURATION", value_parser = parse_humantime_str)]
    duration: Option<Duration>,

    /// timeout per request (none by default)
    #[arg(long, value_name = "DURATION", value_parser = parse_humantime_str)]
    timeout: Option<Duration>,

    /// report json instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    json: bool,

    /// read go/stop/show/quit commands from stdin
    /// instead of starting immediately
    #[arg(long, default_value_t = false, conflicts_with_all = ["ticks", "duration"])]
    interactive: bool,
}

pub async fn exec(guard: ShutdownGuard, args: RunCommand) -> Result<(), BoxError> {
    let client = crate::client::new_web_client(args.timeout);

    let reporter: Box<dyn Reporter> = if args.json {
        Box::new(JsonlReporter::new())
    } else {
        Box::new(HumanReporter::new())
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let report_handle = guard.spawn_task_fn(|guard| report_worker(guard, reporter, event_rx));

    let comparator = PollingComparator::new(
        guard.clone(),
        client,
        args.target,
        args.interval,
        EventSink::new(event_tx),
    );

    if args.interactive {
        tracing::info!("interactive mode: waiting for go, stop, show or quit on stdin");
        self::controls::run_controls(
            guard.clone(),
            &comparator,
            BufReader::new(tokio::io::stdin()),
        )
        .await?;
    } else {
        run_until_limit(&guard, &comparator, args.ticks, args.duration).await;
    }

    // the report worker exits once all event senders,
    // including those of in-flight ticks, are gone
    drop(comparator);
    if let Err(err) = report_handle.await {
        tracing::debug!("report worker failed to join: {err}");
    }

    Ok(())
}

async fn run_until_limit(
    guard: &ShutdownGuard,
    comparator: &PollingComparator,
    ticks: Option<u64>,
    duration: Option<Duration>,
) {
    let mut completed_ticks = comparator.subscribe_ticks();
    comparator.start();

    let tick_limit = async {
        match ticks {
            Some(limit) => {
                let _ = completed_ticks.wait_for(|completed| *completed >= limit).await;
            }
            None => std::future::pending().await,
        }
    };

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = guard.cancelled() => {
            tracing::info!("shutdown initiated: stop comparator");
        }
        _ = tick_limit => {
            tracing::info!(?ticks, "tick limit reached: stop comparator");
        }
        _ = deadline => {
            tracing::info!(?duration, "duration elapsed: stop comparator");
        }
    }

    comparator.stop();
}

async fn report_worker(
    guard: ShutdownGuard,
    mut reporter: Box<dyn Reporter>,
    mut event_rx: UnboundedReceiver<Event>,
) {
    loop {
        let ev = tokio::select! {
            biased;

            maybe_ev = event_rx.recv() => {
                let Some(ev) = maybe_ev else {
                    tracing::debug!("exit report worker: event senders closed");
                    return;
                };

                ev
            }

            _ = guard.cancelled() => {
                tracing::debug!("exit report worker: guard shutdown");
                return;
            }
        };

        reporter.on_event(&ev);
    }
}
