use crate::comparator::{Snapshot, TickReport};

use super::Reporter;

/// Emits one JSON object per line for every comparator event.
///
/// Values are written as reported, without rounding.
#[derive(Debug, Default)]
pub struct JsonlReporter;

impl JsonlReporter {
    pub fn new() -> Self {
        Self
    }

    pub(super) fn tick_line(report: &TickReport) -> serde_json::Value {
        serde_json::json!({
            "type": "tick",
            "action": report.action,
            "with_index_ms": report.with_index_ms,
            "no_index_ms": report.no_index_ms,
            "snapshot": report.snapshot,
        })
    }

    pub(super) fn snapshot_line(kind: &'static str, snapshot: &Snapshot) -> serde_json::Value {
        serde_json::json!({
            "type": kind,
            "snapshot": snapshot,
        })
    }
}

impl Reporter for JsonlReporter {
    fn on_started(&mut self) {
        println!("{}", serde_json::json!({ "type": "started" }));
    }

    fn on_tick(&mut self, report: &TickReport) {
        println!("{}", Self::tick_line(report));
    }

    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        println!("{}", Self::snapshot_line("snapshot", snapshot));
    }

    fn on_stopped(&mut self, snapshot: &Snapshot) {
        println!("{}", Self::snapshot_line("stopped", snapshot));
    }
}
