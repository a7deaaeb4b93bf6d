//! Core types for PastoralScape: livestock, agents, the population arenas,
//! and run parameters.
//!
//! This crate holds the data model the simulation engine mutates. It knows
//! nothing about time or events; see `pscape-sim` for those.

/// Herdsman and household agents.
pub mod agents;
/// Run parameters loaded from YAML.
pub mod config;
/// Error types used throughout the crate.
pub mod error;
/// Grid positions, geographic coordinates, and grazing paths.
pub mod geo;
/// Typed handles and the arena storage they index.
pub mod id;
/// Animals, herds, and disease compartments.
pub mod livestock;
/// The arenas holding every entity of a run.
pub mod population;

/// Re-export agent types.
pub use agents::{AgentKind, Herdsman, Household, Journey};
/// Re-export configuration types.
pub use config::{DiseaseParams, InfectionModel, SimConfig};
/// Re-export error types.
pub use error::{ConfigError, CoreError, CoreResult};
/// Re-export geographic types.
pub use geo::{CellId, CyclicPath, LatLon, Position};
/// Re-export handle types.
pub use id::{AnimalId, Arena, ArenaId, DiseaseId, HerdId, HerdsmanId, HouseholdId};
/// Re-export livestock types.
pub use livestock::{Animal, Herd, Sex, Sirv};
/// Re-export the population container.
pub use population::Population;
