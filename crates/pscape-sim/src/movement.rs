//! Herdsmen walking grazing loops, one daily step at a time.

use pscape_core::{AgentKind, HerdsmanId, Journey, Population};
use tracing::trace;

use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::event::{EventKind, Subject};
use crate::world::WorldGrid;

/// Walking speed in kilometres per day.
const DAILY_KM: f64 = 1.0;

/// Point the journey from the agent's current cell centre at its next
/// waypoint, one day's walk per step. Returns the distance in kilometres.
fn aim(world: &WorldGrid, agent: HerdsmanId, journey: &mut Journey) -> SimResult<f64> {
    let from = world.cell(world.position_of(agent)?)?.coords;
    let to = world.cell_by_id(journey.next_waypoint)?.coords;
    // Never overshoot: a trip shorter than a day's walk takes one step.
    let km = from.distance_km(to).max(DAILY_KM);
    journey.direction = ((to.lat - from.lat) / km, (to.lon - from.lon) / km);
    Ok(km)
}

/// Apply one step and move residency if the agent crossed into a new cell.
fn step(world: &mut WorldGrid, agent: HerdsmanId, journey: &mut Journey) -> SimResult<()> {
    journey.take_step();
    let next = world.nearest_cell(journey.coords);
    if next != world.position_of(agent)? {
        world.move_agent(agent, next)?;
    }
    Ok(())
}

fn schedule_tomorrow(agent: HerdsmanId, ctx: &mut SimContext<'_>) -> SimResult<()> {
    let tomorrow = ctx.clock.tomorrow();
    if ctx.queue.is_within_bounds(tomorrow) {
        ctx.schedule(tomorrow, EventKind::Movement, Subject::Herdsman(agent))?;
        ctx.schedule(tomorrow, EventKind::WorldStep, Subject::None)?;
    }
    Ok(())
}

/// Start a journey if the agent is idle and its cell has too little forage.
///
/// Returns whether a journey started.
pub fn decide_move(
    world: &WorldGrid,
    population: &mut Population,
    agent: HerdsmanId,
    ctx: &mut SimContext<'_>,
) -> SimResult<bool> {
    let herdsman = population.herdsman(agent)?;
    if herdsman.is_moving() {
        return Ok(false);
    }
    let here = world.cell(world.position_of(agent)?)?;
    if here.vegetation_capacity >= ctx.config.agents.move_veg_threshold {
        return Ok(false);
    }
    let Some(path) = world.cell(herdsman.home)?.terrain.random_path(ctx.rng) else {
        return Ok(false);
    };

    let mut journey = Journey::start(path.clone(), here.coords);
    let km = aim(world, agent, &mut journey)?;
    ctx.recorder.record_distance(km);
    trace!(%agent, km, target = %journey.next_waypoint, "journey started");
    population.herdsman_mut(agent)?.journey = Some(journey);

    let tomorrow = ctx.clock.tomorrow();
    ctx.schedule(tomorrow, EventKind::Movement, Subject::Herdsman(agent))?;
    ctx.schedule(tomorrow, EventKind::WorldStep, Subject::None)?;
    Ok(true)
}

/// Handle one `Movement` event.
pub fn handle_movement(
    world: &mut WorldGrid,
    population: &mut Population,
    agent: HerdsmanId,
    ctx: &mut SimContext<'_>,
) -> SimResult<()> {
    let herdsman = population.herdsman_mut(agent)?;
    let mut journey = herdsman.journey.take().ok_or(SimError::NotMoving(agent))?;

    let at = world.cell(world.nearest_cell(journey.coords))?.id;
    let keep_going = if at != journey.next_waypoint {
        step(world, agent, &mut journey)?;
        true
    } else if journey.step == 0 {
        trace!(%agent, "journey complete");
        false
    } else {
        journey.advance_waypoint();
        let km = aim(world, agent, &mut journey)?;
        ctx.recorder.record_distance(km);
        step(world, agent, &mut journey)?;
        true
    };

    if keep_going {
        population.herdsman_mut(agent)?.journey = Some(journey);
        schedule_tomorrow(agent, ctx)?;
    }
    let position = world.position_of(agent)?;
    ctx.recorder
        .record_occupancy(position, 1, AgentKind::Herdsman, ctx.clock.day_of_epoch());
    Ok(())
}
