use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use pscape_core::{AnimalId, DiseaseId, HerdsmanId};
use serde::Serialize;
use tracing::trace;

use crate::clock::offset_days;
use crate::error::{SimError, SimResult};

/// What a scheduled event does. Declaration order is the dispatch order for
/// events sharing a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum EventKind {
    /// Refresh per-cell geography for the month.
    GisUpdate,
    /// An animal reaches the end of its lifespan.
    CullOldAge,
    /// An animal becomes able to breed.
    LivFertile,
    /// A pregnant animal gives birth.
    LivBirth,
    /// Households decide on and carry out vaccination.
    Vaccinate,
    /// Spontaneous environmental infection.
    Infection,
    /// A vaccination stops protecting an animal.
    Wearoff,
    /// A herdsman takes one daily step along its path.
    Movement,
    /// Integrate feeding and disease over every occupied cell.
    WorldStep,
    /// Periodic agent behaviour: breeding, culling, move decisions.
    AgentStep,
}

impl EventKind {
    /// Every kind in dispatch order.
    pub const ALL: [Self; 10] = [
        Self::GisUpdate,
        Self::CullOldAge,
        Self::LivFertile,
        Self::LivBirth,
        Self::Vaccinate,
        Self::Infection,
        Self::Wearoff,
        Self::Movement,
        Self::WorldStep,
        Self::AgentStep,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GisUpdate => "gis-update",
            Self::CullOldAge => "cull-old-age",
            Self::LivFertile => "liv-fertile",
            Self::LivBirth => "liv-birth",
            Self::Vaccinate => "vaccinate",
            Self::Infection => "infection",
            Self::Wearoff => "wearoff",
            Self::Movement => "movement",
            Self::WorldStep => "world-step",
            Self::AgentStep => "agent-step",
        };
        f.write_str(name)
    }
}

/// Who an event is about. Subjects are handles, never owners; the handler
/// checks liveness before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subject {
    /// Calendar events with no subject.
    None,
    /// An animal life-cycle event.
    Animal(AnimalId),
    /// A herdsman's movement step.
    Herdsman(HerdsmanId),
    /// Wear-off of one disease's vaccine in one animal.
    Wearoff(DiseaseId, AnimalId),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("-"),
            Self::Animal(id) => write!(f, "{id}"),
            Self::Herdsman(id) => write!(f, "{id}"),
            Self::Wearoff(disease, animal) => write!(f, "{animal}/{disease}"),
        }
    }
}

/// A scheduled event as handed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// When the event fires.
    pub time: NaiveDate,
    /// What it does.
    pub kind: EventKind,
    /// Who it is about.
    pub subject: Subject,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.time, self.kind, self.subject)
    }
}

type Entry = Reverse<(NaiveDate, EventKind, Subject, u64)>;

/// Time-ordered event queue with an optional admission window.
///
/// Ties on date are broken by kind, then subject, then insertion order, so
/// the pop sequence is fully determined by the schedule calls.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Entry>,
    seq: u64,
    lower: Option<NaiveDate>,
    upper: Option<NaiveDate>,
    pending_world_steps: HashSet<(NaiveDate, Subject)>,
}

impl EventQueue {
    /// An unbounded queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that rejects events before `lower` and drops events after
    /// `upper`.
    pub fn with_bounds(lower: NaiveDate, upper: NaiveDate) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
            ..Self::default()
        }
    }

    /// Earliest admissible date.
    pub fn lower_bound(&self) -> Option<NaiveDate> {
        self.lower
    }

    /// Latest date kept.
    pub fn upper_bound(&self) -> Option<NaiveDate> {
        self.upper
    }

    /// Whether `time` lies inside the admission window.
    pub fn is_within_bounds(&self, time: NaiveDate) -> bool {
        self.lower.is_none_or(|lower| time >= lower) && self.upper.is_none_or(|upper| time <= upper)
    }

    /// Add an event.
    ///
    /// Events before the lower bound are a caller defect. Events after the
    /// upper bound are discarded without error. A world step already pending
    /// for the same date and subject is not queued twice.
    pub fn schedule(&mut self, time: NaiveDate, kind: EventKind, subject: Subject) -> SimResult<()> {
        if let Some(lower) = self.lower.filter(|&lower| time < lower) {
            return Err(SimError::EventOutOfBounds {
                time,
                kind,
                subject,
                lower,
            });
        }
        if self.upper.is_some_and(|upper| time > upper) {
            trace!(%time, %kind, %subject, "discarding event past end of run");
            return Ok(());
        }
        if kind == EventKind::WorldStep && !self.pending_world_steps.insert((time, subject)) {
            trace!(%time, "world step already pending");
            return Ok(());
        }
        trace!(%time, %kind, %subject, "scheduled");
        self.heap.push(Reverse((time, kind, subject, self.seq)));
        self.seq += 1;
        Ok(())
    }

    /// Add an event `days` after `from`.
    ///
    /// `days` is a sampled duration, never negative. A date beyond the
    /// calendar is past any upper bound, so the event is discarded.
    pub fn schedule_in(&mut self, from: NaiveDate, days: f64, kind: EventKind, subject: Subject) -> SimResult<()> {
        match offset_days(from, days) {
            Some(time) => self.schedule(time, kind, subject),
            None => {
                trace!(%from, days, %kind, %subject, "discarding event beyond the calendar");
                Ok(())
            }
        }
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<Event> {
        let Reverse((time, kind, subject, _)) = self.heap.pop()?;
        if kind == EventKind::WorldStep {
            self.pending_world_steps.remove(&(time, subject));
        }
        Some(Event {
            time,
            kind,
            subject,
        })
    }

    /// Pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pending events per kind.
    pub fn counts_by_kind(&self) -> BTreeMap<EventKind, usize> {
        let mut counts = BTreeMap::new();
        for Reverse((_, kind, ..)) in &self.heap {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn drain(queue: &mut EventQueue) -> Vec<Event> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn pops_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule(date(2000, 1, 3), EventKind::Infection, Subject::None)
            .unwrap();
        q.schedule(date(2000, 1, 1), EventKind::AgentStep, Subject::None)
            .unwrap();
        q.schedule(date(2000, 1, 2), EventKind::GisUpdate, Subject::None)
            .unwrap();
        let days: Vec<_> = drain(&mut q).iter().map(|e| e.time).collect();
        assert_eq!(days, vec![date(2000, 1, 1), date(2000, 1, 2), date(2000, 1, 3)]);
        assert!(q.pop().is_none());
    }

    #[test]
    fn same_day_ties_break_on_kind() {
        let mut q = EventQueue::new();
        let t = date(2000, 1, 1);
        q.schedule(t, EventKind::AgentStep, Subject::None).unwrap();
        q.schedule(t, EventKind::WorldStep, Subject::None).unwrap();
        q.schedule(t, EventKind::GisUpdate, Subject::None).unwrap();
        q.schedule(t, EventKind::CullOldAge, Subject::Animal(AnimalId(0)))
            .unwrap();
        let kinds: Vec<_> = drain(&mut q).iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::GisUpdate,
                EventKind::CullOldAge,
                EventKind::WorldStep,
                EventKind::AgentStep,
            ]
        );
    }

    #[test]
    fn same_kind_ties_break_on_subject_then_insertion() {
        let mut q = EventQueue::new();
        let t = date(2000, 1, 1);
        q.schedule(t, EventKind::LivFertile, Subject::Animal(AnimalId(5)))
            .unwrap();
        q.schedule(t, EventKind::LivFertile, Subject::Animal(AnimalId(2)))
            .unwrap();
        q.schedule(t, EventKind::LivFertile, Subject::Animal(AnimalId(2)))
            .unwrap();
        let subjects: Vec<_> = drain(&mut q).iter().map(|e| e.subject).collect();
        assert_eq!(
            subjects,
            vec![
                Subject::Animal(AnimalId(2)),
                Subject::Animal(AnimalId(2)),
                Subject::Animal(AnimalId(5)),
            ]
        );
    }

    #[test]
    fn before_lower_bound_is_an_error() {
        let mut q = EventQueue::with_bounds(date(2000, 1, 1), date(2000, 12, 31));
        let err = q
            .schedule(date(1999, 12, 31), EventKind::LivBirth, Subject::Animal(AnimalId(1)))
            .unwrap_err();
        assert!(matches!(err, SimError::EventOutOfBounds { .. }));
        assert!(q.is_empty());
    }

    #[test]
    fn after_upper_bound_is_dropped_silently() {
        let mut q = EventQueue::with_bounds(date(2000, 1, 1), date(2000, 12, 31));
        q.schedule(date(2001, 1, 1), EventKind::CullOldAge, Subject::Animal(AnimalId(1)))
            .unwrap();
        assert!(q.is_empty());
        assert!(q.is_within_bounds(date(2000, 12, 31)));
        assert!(!q.is_within_bounds(date(2001, 1, 1)));
    }

    #[test]
    fn schedule_in_offsets_from_the_given_date() {
        let mut q = EventQueue::with_bounds(date(2000, 1, 1), date(2000, 12, 31));
        q.schedule_in(date(2000, 1, 1), 9.6, EventKind::LivBirth, Subject::Animal(AnimalId(3)))
            .unwrap();
        assert_eq!(q.pop().unwrap().time, date(2000, 1, 11));
    }

    #[test]
    fn schedule_in_beyond_the_calendar_is_dropped() {
        let mut q = EventQueue::with_bounds(date(2000, 1, 1), date(2000, 12, 31));
        q.schedule_in(date(2000, 1, 1), 1e9, EventKind::CullOldAge, Subject::Animal(AnimalId(1)))
            .unwrap();
        let mut unbounded = EventQueue::new();
        unbounded
            .schedule_in(date(2000, 1, 1), 1e9, EventKind::CullOldAge, Subject::Animal(AnimalId(1)))
            .unwrap();
        assert!(q.is_empty());
        assert!(unbounded.is_empty());
    }

    #[test]
    fn duplicate_world_steps_collapse() {
        let mut q = EventQueue::new();
        let t = date(2000, 1, 1);
        q.schedule(t, EventKind::WorldStep, Subject::None).unwrap();
        q.schedule(t, EventKind::WorldStep, Subject::None).unwrap();
        q.schedule(t, EventKind::AgentStep, Subject::None).unwrap();
        q.schedule(t, EventKind::AgentStep, Subject::None).unwrap();
        assert_eq!(q.len(), 3);

        // Once popped, the same world step may be scheduled again.
        let first = q.pop().unwrap();
        assert_eq!(first.kind, EventKind::WorldStep);
        q.schedule(t, EventKind::WorldStep, Subject::None).unwrap();
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn counts_by_kind_tallies_pending() {
        let mut q = EventQueue::new();
        let t = date(2000, 1, 1);
        q.schedule(t, EventKind::Infection, Subject::None).unwrap();
        q.schedule(t + chrono::TimeDelta::days(7), EventKind::Infection, Subject::None)
            .unwrap();
        q.schedule(t, EventKind::GisUpdate, Subject::None).unwrap();
        let counts = q.counts_by_kind();
        assert_eq!(counts[&EventKind::Infection], 2);
        assert_eq!(counts[&EventKind::GisUpdate], 1);
    }

    #[test]
    fn event_display() {
        let e = Event {
            time: date(2000, 1, 15),
            kind: EventKind::Wearoff,
            subject: Subject::Wearoff(DiseaseId(1), AnimalId(42)),
        };
        insta::assert_snapshot!(e.to_string(), @"2000-01-15 wearoff animal#42/disease#1");
    }

    fn arb_event() -> impl Strategy<Value = (i64, usize, u32)> {
        (0i64..60, 0usize..EventKind::ALL.len(), 0u32..8)
    }

    proptest! {
        #[test]
        fn pop_order_is_non_decreasing(events in prop::collection::vec(arb_event(), 0..200)) {
            let start = date(2000, 1, 1);
            let mut q = EventQueue::new();
            for (offset, kind, animal) in &events {
                let subject = Subject::Animal(AnimalId(*animal));
                q.schedule(start + chrono::TimeDelta::days(*offset), EventKind::ALL[*kind], subject)
                    .unwrap();
            }
            let popped = drain(&mut q);
            for pair in popped.windows(2) {
                let a = (pair[0].time, pair[0].kind);
                let b = (pair[1].time, pair[1].kind);
                prop_assert!(a <= b, "{} popped before {}", pair[0], pair[1]);
            }
        }

        #[test]
        fn bounds_are_honoured(offsets in prop::collection::vec(-30i64..60, 1..100)) {
            let lower = date(2000, 1, 1);
            let upper = date(2000, 1, 31);
            let mut q = EventQueue::with_bounds(lower, upper);
            for offset in &offsets {
                let t = lower + chrono::TimeDelta::days(*offset);
                let result = q.schedule(t, EventKind::Infection, Subject::None);
                prop_assert_eq!(result.is_err(), t < lower);
            }
            for event in drain(&mut q) {
                prop_assert!(event.time >= lower && event.time <= upper);
            }
        }
    }
}
