use chrono::NaiveDate;
use pscape_core::SimConfig;
use rand::rngs::StdRng;

use crate::clock::SimClock;
use crate::error::SimResult;
use crate::event::{EventKind, EventQueue, Subject};
use crate::record::Recorder;

/// Mutable context lent to every handler during dispatch.
pub struct SimContext<'a> {
    /// Simulation time.
    pub clock: &'a mut SimClock,
    /// Pending events.
    pub queue: &'a mut EventQueue,
    /// The run's random stream.
    pub rng: &'a mut StdRng,
    /// Result sink.
    pub recorder: &'a mut dyn Recorder,
    /// Run configuration.
    pub config: &'a SimConfig,
}

impl SimContext<'_> {
    /// Queue an event.
    pub fn schedule(&mut self, time: NaiveDate, kind: EventKind, subject: Subject) -> SimResult<()> {
        self.queue.schedule(time, kind, subject)
    }

    /// Queue an event `days` from now; dates beyond the calendar are
    /// dropped.
    pub fn schedule_in(&mut self, days: f64, kind: EventKind, subject: Subject) -> SimResult<()> {
        let now = self.clock.now();
        self.queue.schedule_in(now, days, kind, subject)
    }

    /// Current date.
    pub fn now(&self) -> NaiveDate {
        self.clock.now()
    }

    /// Days since the start of the run.
    pub fn epoch_day(&self) -> i64 {
        self.clock.day_of_epoch()
    }
}
