use std::str::FromStr;

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    telemetry::tracing,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};

use crate::comparator::PollingComparator;

/// Line command controlling a running comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Control {
    Start,
    Stop,
    Show,
    Quit,
}

impl FromStr for Control {
    type Err = BoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed_s = s.trim();
        if trimmed_s.eq_ignore_ascii_case("go") || trimmed_s.eq_ignore_ascii_case("start") {
            Ok(Self::Start)
        } else if trimmed_s.eq_ignore_ascii_case("stop") {
            Ok(Self::Stop)
        } else if trimmed_s.eq_ignore_ascii_case("show") || trimmed_s.eq_ignore_ascii_case("status")
        {
            Ok(Self::Show)
        } else if trimmed_s.eq_ignore_ascii_case("quit") || trimmed_s.eq_ignore_ascii_case("exit") {
            Ok(Self::Quit)
        } else {
            Err(BoxError::from(format!(
                "unknown command '{trimmed_s}', expected one of: go, stop, show, quit"
            )))
        }
    }
}

/// Apply commands read line by line from `input`,
/// until `quit`, end of input or guard shutdown.
///
/// The comparator is always stopped on return.
pub(super) async fn run_controls<R>(
    guard: ShutdownGuard,
    comparator: &PollingComparator,
    input: R,
) -> Result<(), BoxError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        let maybe_line = tokio::select! {
            _ = guard.cancelled() => {
                tracing::debug!("exit controls: guard shutdown");
                break;
            }
            result = lines.next_line() => result.context("read control line")?,
        };

        let Some(line) = maybe_line else {
            tracing::debug!("exit controls: input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse() {
            Ok(Control::Start) => {
                if !comparator.start() {
                    tracing::info!("comparator is already running");
                }
            }
            Ok(Control::Stop) => {
                if !comparator.stop() {
                    tracing::info!("comparator is not running");
                }
            }
            Ok(Control::Show) => comparator.publish_snapshot(),
            Ok(Control::Quit) => {
                tracing::debug!("exit controls: quit");
                break;
            }
            Err(err) => tracing::warn!("ignore control line: {err}"),
        }
    }

    if comparator.is_running() {
        tracing::debug!("stop comparator on exit of controls");
        comparator.stop();
    }
    Ok(())
}
