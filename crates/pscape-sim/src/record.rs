use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use pscape_core::{AgentKind, HerdId, Position};
use serde::Serialize;

/// Why an animal left the simulation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// End of lifespan.
    Age,
    /// Health ran out.
    Health,
    /// Killed by the named disease.
    Disease(String),
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Age => f.write_str("age"),
            Self::Health => f.write_str("health"),
            Self::Disease(name) => f.write_str(name),
        }
    }
}

/// State of one herd at an agent step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HerdSnapshot {
    /// Herd observed.
    pub herd: HerdId,
    /// Days since the start of the run.
    pub epoch_day: i64,
    /// Live members.
    pub size: usize,
    /// Mean health of the members.
    pub mean_health: f64,
    /// Mean age of the members in weeks.
    pub mean_age_weeks: f64,
    /// Vaccinated animals per disease, indexed by disease id.
    pub vaccinated: Vec<usize>,
}

/// One occupancy observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occupancy {
    /// Days since the start of the run.
    pub epoch_day: i64,
    /// Cell observed.
    pub position: Position,
    /// Agents in the cell.
    pub count: usize,
    /// Kind of agent counted.
    pub kind: AgentKind,
}

/// Sink for run results.
///
/// The engine only writes. Callers that need the collected data downcast
/// through [`Recorder::as_any`] to the concrete sink they installed.
pub trait Recorder: fmt::Debug {
    /// An animal died.
    fn record_death(&mut self, cause: &DeathCause, epoch_day: i64);

    /// An animal was born.
    fn record_birth(&mut self, epoch_day: i64);

    /// Distance in kilometres a herdsman committed to walking.
    fn record_distance(&mut self, km: f64);

    /// `count` agents of `kind` were seen at `position`.
    fn record_occupancy(&mut self, position: Position, count: usize, kind: AgentKind, epoch_day: i64);

    /// A herd snapshot at an agent step.
    fn record_herd(&mut self, snapshot: HerdSnapshot);

    /// A household's vaccination decision.
    fn record_decision(&mut self, disease: &str, decision: bool, epoch_day: i64);

    /// Support downcasting to the concrete sink.
    fn as_any(&self) -> &dyn Any;
}

/// In-memory recorder.
///
/// Aggregates are kept in full. The per-observation series (occupancy and
/// herd snapshots) are capped at `max_records` each, dropping the oldest
/// entries first; 0 means unlimited.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Tracker {
    /// Initial animals plus births.
    pub total_animals: usize,
    /// Animals born during the run.
    pub births: usize,
    /// Total committed walking distance.
    pub total_distance_km: f64,
    /// Death days keyed by cause.
    pub deaths: BTreeMap<String, Vec<i64>>,
    /// Decisions and their days keyed by disease.
    pub decisions: BTreeMap<String, Vec<(bool, i64)>>,
    /// Occupants summed per cell over the run.
    #[serde(skip)]
    pub occupant_totals: BTreeMap<Position, usize>,
    /// Occupancy observations.
    pub occupancy: Vec<Occupancy>,
    /// Herd snapshots.
    pub herds: Vec<HerdSnapshot>,
    #[serde(skip)]
    max_records: usize,
}

impl Tracker {
    /// Create a tracker for a run that starts with `initial_animals`.
    pub fn new(initial_animals: usize, max_records: usize) -> Self {
        Self {
            total_animals: initial_animals,
            max_records,
            ..Self::default()
        }
    }

    /// Total deaths across all causes.
    pub fn death_count(&self) -> usize {
        self.deaths.values().map(Vec::len).sum()
    }

    /// Deaths from one cause.
    pub fn deaths_by(&self, cause: &DeathCause) -> usize {
        self.deaths.get(&cause.to_string()).map_or(0, Vec::len)
    }

    /// Share of positive decisions per disease.
    pub fn decision_rates(&self) -> BTreeMap<&str, f64> {
        self.decisions
            .iter()
            .filter(|(_, d)| !d.is_empty())
            .map(|(name, d)| {
                let yes = d.iter().filter(|(v, _)| *v).count();
                (name.as_str(), yes as f64 / d.len() as f64)
            })
            .collect()
    }

    /// Mean herd size over the last recorded agent step.
    pub fn final_mean_herd_size(&self) -> Option<f64> {
        let last = self.herds.last()?.epoch_day;
        let sizes: Vec<usize> = self
            .herds
            .iter()
            .rev()
            .take_while(|h| h.epoch_day == last)
            .map(|h| h.size)
            .collect();
        Some(sizes.iter().sum::<usize>() as f64 / sizes.len() as f64)
    }

    /// The cell with the most recorded occupants over the run, earliest in
    /// row-major order on ties.
    pub fn busiest_cell(&self) -> Option<(Position, usize)> {
        self.occupant_totals
            .iter()
            .rev()
            .max_by_key(|(_, total)| **total)
            .map(|(position, total)| (*position, *total))
    }

    fn trim<T>(series: &mut Vec<T>, max: usize) {
        if max > 0 && series.len() > max {
            let drain_count = series.len() - max;
            series.drain(..drain_count);
        }
    }
}

impl Recorder for Tracker {
    fn record_death(&mut self, cause: &DeathCause, epoch_day: i64) {
        self.deaths
            .entry(cause.to_string())
            .or_default()
            .push(epoch_day);
    }

    fn record_birth(&mut self, _epoch_day: i64) {
        self.births += 1;
        self.total_animals += 1;
    }

    fn record_distance(&mut self, km: f64) {
        self.total_distance_km += km;
    }

    fn record_occupancy(&mut self, position: Position, count: usize, kind: AgentKind, epoch_day: i64) {
        *self.occupant_totals.entry(position).or_insert(0) += count;
        self.occupancy.push(Occupancy {
            epoch_day,
            position,
            count,
            kind,
        });
        Self::trim(&mut self.occupancy, self.max_records);
    }

    fn record_herd(&mut self, snapshot: HerdSnapshot) {
        self.herds.push(snapshot);
        Self::trim(&mut self.herds, self.max_records);
    }

    fn record_decision(&mut self, disease: &str, decision: bool, epoch_day: i64) {
        self.decisions
            .entry(disease.to_owned())
            .or_default()
            .push((decision, epoch_day));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
