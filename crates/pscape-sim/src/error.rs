use chrono::NaiveDate;
use pscape_core::{AnimalId, CellId, ConfigError, CoreError, DiseaseId, HerdsmanId, Position};

use crate::event::{EventKind, Subject};

/// Alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Fatal simulation errors. Every variant carries the offending value so the
/// message alone locates the defect.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The clock was asked to move backwards.
    #[error("cannot move clock back from {current} to {requested}")]
    TimeOrderViolation {
        /// Date the clock is at.
        current: NaiveDate,
        /// Earlier date that was requested.
        requested: NaiveDate,
    },

    /// An event was scheduled before the queue's lower bound.
    #[error("{kind} for {subject} at {time} is before the queue lower bound {lower}")]
    EventOutOfBounds {
        /// Requested date.
        time: NaiveDate,
        /// Kind of the rejected event.
        kind: EventKind,
        /// Subject of the rejected event.
        subject: Subject,
        /// The queue's lower bound.
        lower: NaiveDate,
    },

    /// A tracked animal has no compartment for a configured disease.
    #[error("{animal} has no compartment for {disease}")]
    ImpossibleCompartmentState {
        /// The animal.
        animal: AnimalId,
        /// The disease it lacks a compartment for.
        disease: DiseaseId,
    },

    /// No handler accepts this kind and subject.
    #[error("no handler for {kind} with subject {subject} at {time}")]
    UnroutableEvent {
        /// Date of the event.
        time: NaiveDate,
        /// Its kind.
        kind: EventKind,
        /// Its subject.
        subject: Subject,
    },

    /// The recorded position of an agent disagrees with the cell residents.
    #[error("{agent} is recorded at {position} but is not a resident there")]
    ResidencyMismatch {
        /// The agent.
        agent: HerdsmanId,
        /// Where the agent was recorded.
        position: Position,
    },

    /// The agent was never placed in the world.
    #[error("{0} has no position in the world")]
    UnplacedAgent(HerdsmanId),

    /// A position outside the grid.
    #[error("no cell at {0}")]
    UnknownCell(Position),

    /// A cell id the grid does not know.
    #[error("{0} is not part of the world grid")]
    UnknownCellId(CellId),

    /// A movement event for an idle herdsman.
    #[error("{0} received a movement event but is not on a journey")]
    NotMoving(HerdsmanId),

    /// A life-cycle event arrived in a state that cannot accept it.
    #[error("{animal} cannot {action} while {state}")]
    InvalidLifecycle {
        /// The animal.
        animal: AnimalId,
        /// What the event tried to do.
        action: &'static str,
        /// The animal's flags at the time.
        state: String,
    },

    /// A date offset left the representable calendar.
    #[error("{days} days from {from} is not a calendar date")]
    DateOutOfRange {
        /// Date the offset started from.
        from: NaiveDate,
        /// Offset in days.
        days: f64,
    },

    /// Two world integrations on the same date.
    #[error("world stepped twice at {0}")]
    RepeatedWorldStep(NaiveDate),

    /// The geography provider has nothing for the month.
    #[error("no geography loaded for {year}-{month:02}")]
    MissingGeography {
        /// Calendar year.
        year: i32,
        /// Calendar month, 1-12.
        month: u32,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A population handle did not resolve.
    #[error(transparent)]
    Population(#[from] CoreError),
}
