use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::{BodyExtractExt as _, Request, Response, service::client::HttpClientExt as _},
    rt::Executor,
    service::BoxService,
    telemetry::tracing,
};
use serde::Deserialize;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::config::TargetConfig;

mod events;
mod model;


pub use self::{
    events::{Event, EventSink},
    model::{
        ActionKind, Counts, EndpointVariant, Logs, Rotation, Snapshot, TickReport, TotalRow,
        Totals, VariantTotals,
    },
};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

pub const API_KEY_HEADER: &str = "Api-Key";

/// Periodically sends the same action to both endpoint variants
/// and aggregates the latency each server reports back.
///
/// A tick is spawned per period and is never awaited by the schedule,
/// so a tick which takes longer than the period overlaps with the next one.
/// Overlapping ticks are not synchronised with each other: each state
/// mutation is atomic on its own, but two ticks can pick the same action
/// and the rotation is advanced by whichever finishes last.
#[derive(Clone)]
pub struct PollingComparator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PollingComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingComparator")
            .field("interval", &self.inner.interval)
            .field("target", &self.inner.target)
            .finish_non_exhaustive()
    }
}

struct Inner {
    guard: ShutdownGuard,
    exec: Executor,
    client: BoxService<Request, Response, BoxError>,
    target: TargetConfig,
    interval: Duration,
    events: EventSink,
    completed_ticks: watch::Sender<u64>,
    state: Mutex<ComparatorState>,
}

#[derive(Debug, Default)]
struct ComparatorState {
    running: bool,
    schedule: Option<JoinHandle<()>>,
    rotation: Rotation,
    totals: Totals,
    counts: Counts,
    logs: Logs,
}

impl ComparatorState {
    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.running, &self.logs, &self.totals, &self.counts)
    }
}

#[derive(Debug, Deserialize)]
struct LatencyReport {
    /// server-side processing time in milliseconds
    result: f64,
}

impl PollingComparator {
    /// Create an idle comparator.
    ///
    /// The schedule and all ticks run as graceful tasks of `guard`.
    pub fn new(
        guard: ShutdownGuard,
        client: BoxService<Request, Response, BoxError>,
        target: TargetConfig,
        interval: Duration,
        events: EventSink,
    ) -> Self {
        let (completed_ticks, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                exec: Executor::graceful(guard.clone()),
                guard,
                client,
                target,
                interval: interval.max(MIN_TICK_INTERVAL),
                events,
                completed_ticks,
                state: Mutex::new(ComparatorState::default()),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.lock().snapshot()
    }

    /// Emit the current [`Snapshot`] to the event sink.
    pub fn publish_snapshot(&self) {
        self.inner.events.send(Event::Snapshot(self.snapshot()));
    }

    /// Number of ticks completed since the last start.
    pub fn subscribe_ticks(&self) -> watch::Receiver<u64> {
        self.inner.completed_ticks.subscribe()
    }

    /// Reset all aggregates and schedule a tick every interval.
    ///
    /// Returns `false` without side effects if a schedule is already active.
    pub fn start(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.schedule.is_some() {
                tracing::debug!("comparator already running: ignore start");
                return false;
            }

            *state = ComparatorState {
                running: true,
                ..Default::default()
            };
            self.inner.completed_ticks.send_replace(0);

            let this = self.clone();
            let guard = self.inner.guard.clone();
            state.schedule = Some(self.inner.exec.spawn_task(this.run_schedule(guard)));
        }

        tracing::info!(
            interval = ?self.inner.interval,
            with_index = %self.inner.target.with_index,
            no_index = %self.inner.target.no_index,
            "comparator started",
        );
        self.inner.events.send(Event::Started);
        true
    }

    /// Cancel the schedule.
    ///
    /// Ticks already in flight are not cancelled and still apply their results.
    /// Returns `false` without side effects if no schedule is active.
    pub fn stop(&self) -> bool {
        let snapshot = {
            let mut state = self.inner.state.lock();
            let Some(schedule) = state.schedule.take() else {
                tracing::debug!("comparator not running: ignore stop");
                return false;
            };
            schedule.abort();
            state.running = false;
            state.snapshot()
        };

        tracing::info!("comparator stopped");
        self.inner.events.send(Event::Stopped(snapshot));
        true
    }

    async fn run_schedule(self, guard: ShutdownGuard) {
        let period = self.inner.interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = guard.cancelled() => {
                    tracing::debug!("exit comparator schedule: guard shutdown");
                    return;
                }
            }

            let this = self.clone();
            self.inner.exec.spawn_task(async move {
                this.tick().await;
            });
        }
    }

    /// Measure the current action against both variants,
    /// then count it and move the rotation forward.
    pub(crate) async fn tick(&self) -> TickReport {
        let action = self.inner.state.lock().rotation.current();

        let (with_index_ms, no_index_ms) = tokio::join!(
            self.send_request(EndpointVariant::WithIndex, action),
            self.send_request(EndpointVariant::NoIndex, action),
        );

        let (snapshot, completed) = {
            let mut state = self.inner.state.lock();
            state.counts.increment(action);
            state.rotation.advance();
            (state.snapshot(), state.counts.total())
        };
        self.inner.completed_ticks.send_replace(completed);

        tracing::debug!(
            %action,
            ?with_index_ms,
            ?no_index_ms,
            %completed,
            "comparator tick finished",
        );

        let report = TickReport {
            action,
            with_index_ms,
            no_index_ms,
            snapshot,
        };
        self.inner.events.send(Event::Tick(report.clone()));
        report
    }

    /// Query a single variant for the given action.
    ///
    /// Returns the latency reported by the server,
    /// or `None` if the request failed in any way.
    pub async fn send_request(&self, variant: EndpointVariant, action: ActionKind) -> Option<f64> {
        let url = self.inner.target.request_url(variant, action);
        self.inner
            .state
            .lock()
            .logs
            .set(variant, format!("Send query to {url}"));

        match self.fetch_reported_latency(&url).await {
            Ok(ms) => {
                let mut state = self.inner.state.lock();
                state
                    .logs
                    .set(variant, format!("Send query to {url} [{ms} ms]"));
                state.totals.add(action, variant, ms);
                Some(ms)
            }
            Err(err) => {
                tracing::error!(%variant, url = %url, "error calling {url}: {err}");
                None
            }
        }
    }

    async fn fetch_reported_latency(&self, url: &str) -> Result<f64, BoxError> {
        let report: LatencyReport = self
            .inner
            .client
            .get(url)
            .header(API_KEY_HEADER, self.inner.target.api_key.expose())
            .send()
            .await
            .context("send query")?
            .try_into_json()
            .await
            .context("collect and json-decode latency report")?;
        Ok(report.result)
    }
}
