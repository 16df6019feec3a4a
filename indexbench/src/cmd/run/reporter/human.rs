use std::fmt::Write as _;

use crate::comparator::{EndpointVariant, Snapshot, TickReport};

use super::Reporter;

/// Prints the log panels and the totals table after every tick.
#[derive(Debug, Default)]
pub struct HumanReporter {
    ticks: u64,
}

impl HumanReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn render_snapshot(snapshot: &Snapshot) -> String {
        let mut out = String::new();

        for variant in EndpointVariant::ALL {
            let _ = writeln!(
                out,
                "{:<10} | {}",
                variant.label(),
                snapshot.logs.get(variant)
            );
        }

        let _ = writeln!(
            out,
            "{:<14} | {:>14} | {:>14} | {:>14}",
            "ACTION", "WITH INDEX", "NO INDEX", "DELTA"
        );
        for row in &snapshot.rows {
            let _ = writeln!(
                out,
                "{:<14} | {:>14} | {:>14} | {:>14}",
                format!("{} ({})", row.action.as_str().to_uppercase(), row.count),
                format_ms(row.with_index_ms),
                format_ms(row.no_index_ms),
                format_ms(row.delta_ms),
            );
        }

        out
    }
}

/// Milliseconds rounded to microsecond precision, for display only.
fn format_ms(ms: f64) -> String {
    format!("{} ms", (ms * 1000.).round() / 1000.)
}

impl Reporter for HumanReporter {
    fn on_started(&mut self) {
        self.ticks = 0;
        println!("started");
    }

    fn on_tick(&mut self, report: &TickReport) {
        self.ticks += 1;
        println!("tick #{} action={}", self.ticks, report.action);
        print!("{}", Self::render_snapshot(&report.snapshot));
    }

    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        print!("{}", Self::render_snapshot(snapshot));
    }

    fn on_stopped(&mut self, snapshot: &Snapshot) {
        println!("stopped after {} tick(s)", self.ticks);
        print!("{}", Self::render_snapshot(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{ActionKind, Logs, TotalRow};

    fn snapshot() -> Snapshot {
        Snapshot {
            running: true,
            logs: Logs {
                with_index: "Send query to http://api.test/with-index/select [42 ms]".to_owned(),
                no_index: "Send query to http://api.test/no-index/select".to_owned(),
            },
            rows: vec![
                TotalRow {
                    action: ActionKind::Select,
                    count: 1,
                    with_index_ms: 42.,
                    no_index_ms: 100.,
                    delta_ms: 58.,
                },
                TotalRow {
                    action: ActionKind::Insert,
                    count: 0,
                    with_index_ms: 0.1 + 0.2,
                    no_index_ms: 0.,
                    delta_ms: -(0.1 + 0.2),
                },
            ],
        }
    }

    #[test]
    fn test_render_snapshot() {
        let out = HumanReporter::render_snapshot(&snapshot());
        let lines: Vec<_> = out.lines().collect();

        assert_eq!(5, lines.len(), "out: {out}");
        assert_eq!(
            "With Index | Send query to http://api.test/with-index/select [42 ms]",
            lines[0]
        );
        assert_eq!(
            "No Index   | Send query to http://api.test/no-index/select",
            lines[1]
        );
        assert!(lines[2].starts_with("ACTION"));

        let select: Vec<_> = lines[3].split('|').map(str::trim).collect();
        assert_eq!(vec!["SELECT (1)", "42 ms", "100 ms", "58 ms"], select);

        let insert: Vec<_> = lines[4].split('|').map(str::trim).collect();
        assert_eq!(vec!["INSERT (0)", "0.3 ms", "0 ms", "-0.3 ms"], insert);
    }
}
