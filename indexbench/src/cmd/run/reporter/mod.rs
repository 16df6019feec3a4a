mod human;
mod json;

pub use self::{human::HumanReporter, json::JsonlReporter};

use crate::comparator::{Event, Snapshot, TickReport};

pub trait Reporter: Send + 'static {
    fn on_started(&mut self);
    fn on_tick(&mut self, report: &TickReport);
    fn on_snapshot(&mut self, snapshot: &Snapshot);
    fn on_stopped(&mut self, snapshot: &Snapshot);

    fn on_event(&mut self, ev: &Event) {
        match ev {
            Event::Started => self.on_started(),
            Event::Tick(report) => self.on_tick(report),
            Event::Snapshot(snapshot) => self.on_snapshot(snapshot),
            Event::Stopped(snapshot) => self.on_stopped(snapshot),
        }
    }
}
