use tokio::sync::mpsc::UnboundedSender;

use super::{Snapshot, TickReport};

#[derive(Debug, Clone)]
pub enum Event {
    Started,
    Tick(TickReport),
    /// Current state, published on request.
    Snapshot(Snapshot),
    Stopped(Snapshot),
}

/// Sink for comparator events, the default sink drops them.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<Event>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<Event>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Best-effort send, a closed receiver is not an error.
    #[inline]
    pub fn send(&self, ev: Event) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ev);
        }
    }
}
