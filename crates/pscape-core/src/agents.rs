use serde::{Deserialize, Serialize};

use crate::geo::{CellId, CyclicPath, LatLon, Position};
use crate::id::{HerdId, HerdsmanId, HouseholdId};

/// Kind of agent, used when recording occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// A herdsman walking or grazing a herd.
    Herdsman,
    /// A household at its village.
    Household,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Herdsman => write!(f, "herdsman"),
            Self::Household => write!(f, "household"),
        }
    }
}

/// A head of household. Takes vaccination decisions and acts through the
/// herdsmen it manages.
#[derive(Debug, Clone)]
pub struct Household {
    /// Handle of this household.
    pub id: HouseholdId,
    /// Village cell the household lives in.
    pub village: Position,
    /// Herdsmen managed by the household.
    pub herdsmen: Vec<HerdsmanId>,
}

impl Household {
    /// A household in `village` with no herdsmen yet.
    pub fn new(id: HouseholdId, village: Position) -> Self {
        Self {
            id,
            village,
            herdsmen: Vec::new(),
        }
    }
}

/// An in-progress trip along a cyclic path.
#[derive(Debug, Clone)]
pub struct Journey {
    /// Loop being walked.
    pub path: CyclicPath,
    /// Index into the path of the waypoint being walked toward.
    pub step: usize,
    /// Cell id of the waypoint being walked toward.
    pub next_waypoint: CellId,
    /// Continuous position; the grid cell is derived from it.
    pub coords: LatLon,
    /// Offset applied to `coords` per daily movement step.
    pub direction: (f64, f64),
}

impl Journey {
    /// Start a trip at `coords`, heading for the first waypoint after the
    /// origin.
    pub fn start(path: CyclicPath, coords: LatLon) -> Self {
        let (step, next_waypoint) = path.next_step(0);
        Self {
            path,
            step,
            next_waypoint,
            coords,
            direction: (0.0, 0.0),
        }
    }

    /// Advance the target to the waypoint after the current one.
    pub fn advance_waypoint(&mut self) {
        let (step, next) = self.path.next_step(self.step);
        self.step = step;
        self.next_waypoint = next;
    }

    /// Apply one daily step of the direction vector.
    pub fn take_step(&mut self) {
        self.coords = LatLon::new(
            self.coords.lat + self.direction.0,
            self.coords.lon + self.direction.1,
        );
    }
}

/// A herdsman manages one herd and may leave the home village to graze.
#[derive(Debug, Clone)]
pub struct Herdsman {
    /// Handle of this herdsman.
    pub id: HerdsmanId,
    /// Household the herdsman works for.
    pub household: HouseholdId,
    /// Herd the herdsman manages.
    pub herd: HerdId,
    /// Home village cell.
    pub home: Position,
    /// `Some` while the herdsman is moving along a path.
    pub journey: Option<Journey>,
}

impl Herdsman {
    /// A herdsman at home with an empty herd and no journey.
    pub fn new(id: HerdsmanId, household: HouseholdId, herd: HerdId, home: Position) -> Self {
        Self {
            id,
            household,
            herd,
            home,
            journey: None,
        }
    }

    /// Whether a journey is in progress.
    pub fn is_moving(&self) -> bool {
        self.journey.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loop_path() -> CyclicPath {
        CyclicPath::new(vec![CellId(1), CellId(2), CellId(3)]).unwrap()
    }

    #[test]
    fn journey_starts_toward_first_waypoint() {
        let j = Journey::start(loop_path(), LatLon::new(0.0, 0.0));
        assert_eq!(j.step, 1);
        assert_eq!(j.next_waypoint, CellId(2));
    }

    #[test]
    fn journey_wraps_back_to_origin() {
        let mut j = Journey::start(loop_path(), LatLon::new(0.0, 0.0));
        j.advance_waypoint();
        assert_eq!(j.next_waypoint, CellId(3));
        j.advance_waypoint();
        assert_eq!((j.step, j.next_waypoint), (0, CellId(1)));
    }

    #[test]
    fn take_step_applies_direction() {
        let mut j = Journey::start(loop_path(), LatLon::new(1.0, 2.0));
        j.direction = (0.5, -0.25);
        j.take_step();
        j.take_step();
        assert!((j.coords.lat - 2.0).abs() < 1e-12);
        assert!((j.coords.lon - 1.5).abs() < 1e-12);
    }

    #[test]
    fn herdsman_starts_stationary() {
        let h = Herdsman::new(HerdsmanId(0), HouseholdId(0), HerdId(0), Position::new(0, 0));
        assert!(!h.is_moving());
    }
}
