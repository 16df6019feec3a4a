use std::fmt;

use serde::Serialize;

/// One of the two API backends being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointVariant {
    WithIndex,
    NoIndex,
}

impl EndpointVariant {
    pub const ALL: [Self; 2] = [Self::WithIndex, Self::NoIndex];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WithIndex => "with-index",
            Self::NoIndex => "no-index",
        }
    }

    /// Human label, as used for log panel headers.
    pub fn label(self) -> &'static str {
        match self {
            Self::WithIndex => "With Index",
            Self::NoIndex => "No Index",
        }
    }
}

impl fmt::Display for EndpointVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the benchmarked operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Select,
    Insert,
    Update,
}

impl ActionKind {
    /// Fixed rotation order.
    pub const ALL: [Self; 3] = [Self::Select, Self::Insert, Self::Update];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == s)
    }

    fn index(self) -> usize {
        match self {
            Self::Select => 0,
            Self::Insert => 1,
            Self::Update => 2,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round-robin cursor over [`ActionKind::ALL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rotation {
    index: usize,
}

impl Rotation {
    pub fn current(&self) -> ActionKind {
        ActionKind::ALL[self.index]
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % ActionKind::ALL.len();
    }
}

/// Cumulative milliseconds per variant for a single action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VariantTotals {
    pub with_index: f64,
    pub no_index: f64,
}

impl VariantTotals {
    pub fn get(&self, variant: EndpointVariant) -> f64 {
        match variant {
            EndpointVariant::WithIndex => self.with_index,
            EndpointVariant::NoIndex => self.no_index,
        }
    }

    fn get_mut(&mut self, variant: EndpointVariant) -> &mut f64 {
        match variant {
            EndpointVariant::WithIndex => &mut self.with_index,
            EndpointVariant::NoIndex => &mut self.no_index,
        }
    }

    /// no-index minus with-index
    pub fn delta(&self) -> f64 {
        self.no_index - self.with_index
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals([VariantTotals; 3]);

impl Totals {
    pub fn get(&self, action: ActionKind) -> &VariantTotals {
        &self.0[action.index()]
    }

    pub fn add(&mut self, action: ActionKind, variant: EndpointVariant, ms: f64) {
        *self.0[action.index()].get_mut(variant) += ms;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts([u64; 3]);

impl Counts {
    pub fn get(&self, action: ActionKind) -> u64 {
        self.0[action.index()]
    }

    pub fn increment(&mut self, action: ActionKind) {
        self.0[action.index()] += 1;
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

/// Latest status line per variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Logs {
    pub with_index: String,
    pub no_index: String,
}

impl Logs {
    pub fn get(&self, variant: EndpointVariant) -> &str {
        match variant {
            EndpointVariant::WithIndex => &self.with_index,
            EndpointVariant::NoIndex => &self.no_index,
        }
    }

    pub fn set(&mut self, variant: EndpointVariant, line: String) {
        match variant {
            EndpointVariant::WithIndex => self.with_index = line,
            EndpointVariant::NoIndex => self.no_index = line,
        }
    }
}

/// Point-in-time view of the comparator, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub running: bool,
    pub logs: Logs,
    pub rows: Vec<TotalRow>,
}

impl Snapshot {
    pub(super) fn new(running: bool, logs: &Logs, totals: &Totals, counts: &Counts) -> Self {
        let rows = ActionKind::ALL
            .into_iter()
            .map(|action| {
                let totals = totals.get(action);
                TotalRow {
                    action,
                    count: counts.get(action),
                    with_index_ms: totals.get(EndpointVariant::WithIndex),
                    no_index_ms: totals.get(EndpointVariant::NoIndex),
                    delta_ms: totals.delta(),
                }
            })
            .collect();

        Self {
            running,
            logs: logs.clone(),
            rows,
        }
    }

    pub fn row(&self, action: ActionKind) -> Option<&TotalRow> {
        self.rows.iter().find(|row| row.action == action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TotalRow {
    pub action: ActionKind,
    pub count: u64,
    pub with_index_ms: f64,
    pub no_index_ms: f64,
    pub delta_ms: f64,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub action: ActionKind,
    pub with_index_ms: Option<f64>,
    pub no_index_ms: Option<f64>,
    pub snapshot: Snapshot,
}
