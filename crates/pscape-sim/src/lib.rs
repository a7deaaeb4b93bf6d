//! Discrete-event engine for PastoralScape.
//!
//! A [`Simulation`] owns a [`pscape_core::Population`], a [`WorldGrid`] of
//! cells, and a time-ordered [`EventQueue`]. Each popped event is routed to
//! a handler that mutates the population and world through a
//! [`SimContext`] and may schedule further events. Geography, vaccination
//! decisions, and result recording sit behind traits so callers can plug in
//! their own data sources and sinks.

/// Simulation clock and calendar arithmetic.
pub mod clock;
/// Mutable context lent to event handlers.
pub mod context;
/// Household vaccination decisions.
pub mod decision;
/// Births, fertility, breeding, feeding, and culling.
pub mod demography;
/// SIRV disease dynamics.
pub mod disease;
/// Error types for the simulation crate.
pub mod error;
/// Event kinds, subjects, and the event queue.
pub mod event;
/// Monthly geographic data sources.
pub mod geography;
/// Herdsman journeys along grazing loops.
pub mod movement;
/// Result sinks.
pub mod record;
/// World, population, and calendar construction.
pub mod setup;
/// Top-level simulation driver.
pub mod simulation;
/// The grid of cells agents live on.
pub mod world;

#[cfg(test)]
pub(crate) mod testing;

/// Re-export of [`clock::SimClock`].
pub use clock::SimClock;
/// Re-export of [`context::SimContext`].
pub use context::SimContext;
/// Re-exports of the decision provider types.
pub use decision::{DecisionProvider, FixedProbabilityDecision};
/// Re-export of [`disease::Disease`].
pub use disease::Disease;
/// Re-exports of [`error::SimError`] and [`error::SimResult`].
pub use error::{SimError, SimResult};
/// Re-exports of [`event::Event`], [`event::EventKind`], [`event::EventQueue`], and [`event::Subject`].
pub use event::{Event, EventKind, EventQueue, Subject};
/// Re-exports of the geography provider types.
pub use geography::{GeographyProvider, StaticGeography};
/// Re-exports of the recorder types.
pub use record::{DeathCause, HerdSnapshot, Occupancy, Recorder, Tracker};
/// Re-export of [`simulation::Simulation`].
pub use simulation::Simulation;
/// Re-exports of [`world::WorldGrid`], [`world::Cell`], and [`world::Terrain`].
pub use world::{Cell, Terrain, WorldGrid};
