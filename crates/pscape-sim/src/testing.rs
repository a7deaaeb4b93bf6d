use chrono::NaiveDate;
use pscape_core::SimConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::clock::SimClock;
use crate::context::SimContext;
use crate::event::EventQueue;
use crate::record::Tracker;

/// Owns everything a [`SimContext`] borrows, for handler unit tests.
pub(crate) struct Harness {
    pub clock: SimClock,
    pub queue: EventQueue,
    pub rng: StdRng,
    pub tracker: Tracker,
    pub config: SimConfig,
}

impl Harness {
    /// Clock at 2000-01-01 with a 7-day step and an unbounded queue.
    pub fn new() -> Self {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        Self {
            clock: SimClock::new(start, 7),
            queue: EventQueue::new(),
            rng: StdRng::seed_from_u64(7),
            tracker: Tracker::new(0, 0),
            config: SimConfig::default(),
        }
    }

    pub fn ctx(&mut self) -> SimContext<'_> {
        SimContext {
            clock: &mut self.clock,
            queue: &mut self.queue,
            rng: &mut self.rng,
            recorder: &mut self.tracker,
            config: &self.config,
        }
    }
}
