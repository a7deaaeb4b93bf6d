use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use pscape_core::{AgentKind, HerdId, HerdsmanId, HouseholdId, Population, SimConfig, Sirv};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info};

use crate::clock::SimClock;
use crate::context::SimContext;
use crate::decision::{DecisionProvider, FixedProbabilityDecision};
use crate::demography::{cull_old_age, give_birth, herd_step, make_fertile};
use crate::disease::{Disease, wear_off};
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventKind, EventQueue, Subject};
use crate::geography::{GeographyProvider, StaticGeography};
use crate::movement::{decide_move, handle_movement};
use crate::record::{HerdSnapshot, Recorder, Tracker};
use crate::setup::{build_world, initialize_population, schedule_calendar};
use crate::world::{Terrain, WorldGrid};

/// The state every handler borrows through a [`SimContext`].
struct Engine {
    config: SimConfig,
    clock: SimClock,
    queue: EventQueue,
    rng: StdRng,
    recorder: Box<dyn Recorder>,
}

impl Engine {
    fn ctx(&mut self) -> SimContext<'_> {
        SimContext {
            clock: &mut self.clock,
            queue: &mut self.queue,
            rng: &mut self.rng,
            recorder: self.recorder.as_mut(),
            config: &self.config,
        }
    }
}

/// The top-level simulation driver.
///
/// Owns the world, the population, and the event queue, and routes every
/// popped event to its handler until the queue runs dry. Geography,
/// vaccination decisions, and result recording are pluggable; the defaults
/// are [`StaticGeography`], [`FixedProbabilityDecision`], and [`Tracker`].
pub struct Simulation {
    engine: Engine,
    world: WorldGrid,
    population: Population,
    diseases: Vec<Disease>,
    geography: Box<dyn GeographyProvider>,
    decisions: Box<dyn DecisionProvider>,
    dispatched: BTreeMap<EventKind, usize>,
    initialized: bool,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.engine.clock.now())
            .field("pending", &self.engine.queue.len())
            .field("animals", &self.population.live_animals())
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Simulation {
    /// Validate `config` and lay out its world. The population is created
    /// by [`Simulation::init`], so providers can still be swapped before
    /// then.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let world = build_world(&config)?;
        let geography = StaticGeography::new(
            world.cells().map(|c| c.id).collect(),
            config.geography.clone(),
        );
        let decisions = FixedProbabilityDecision::from_config(&config);
        let diseases = Disease::from_config(&config);
        let model = &config.model;
        let clock = SimClock::new(model.start_date, model.time_delta_days);
        let queue = EventQueue::with_bounds(model.start_date, model.end_date);
        let rng = StdRng::seed_from_u64(model.seed);
        let recorder = Box::new(Tracker::new(config.setup.n_animals, model.max_records));
        Ok(Self {
            engine: Engine {
                config,
                clock,
                queue,
                rng,
                recorder,
            },
            world,
            population: Population::new(),
            diseases,
            geography: Box::new(geography),
            decisions: Box::new(decisions),
            dispatched: BTreeMap::new(),
            initialized: false,
        })
    }

    /// Replace the geography source.
    pub fn with_geography(mut self, geography: impl GeographyProvider + 'static) -> Self {
        self.geography = Box::new(geography);
        self
    }

    /// Replace the vaccination decision maker.
    pub fn with_decisions(mut self, decisions: impl DecisionProvider + 'static) -> Self {
        self.decisions = Box::new(decisions);
        self
    }

    /// Replace the result sink.
    pub fn with_recorder(mut self, recorder: impl Recorder + 'static) -> Self {
        self.engine.recorder = Box::new(recorder);
        self
    }

    /// Create the population, load geography for the run window, and queue
    /// the calendar. Called by [`Simulation::run`] if needed; repeated calls
    /// are no-ops.
    pub fn init(&mut self) -> SimResult<()> {
        if self.initialized {
            return Ok(());
        }
        let Engine {
            config, queue, rng, ..
        } = &mut self.engine;
        self.population = initialize_population(config, &mut self.world, rng, queue)?;

        let (start, end) = (config.model.start_date, config.model.end_date);
        self.geography
            .load(start.year(), start.month(), end.year(), end.month())?;
        self.world
            .distribute_alltime_vegetation(self.geography.as_ref());
        schedule_calendar(config, queue)?;

        self.initialized = true;
        debug!(pending = queue.len(), "calendar scheduled");
        Ok(())
    }

    /// Dispatch every event until the queue is empty.
    pub fn run(&mut self) -> SimResult<()> {
        self.init()?;
        let model = &self.engine.config.model;
        info!(
            start = %model.start_date,
            end = %model.end_date,
            seed = model.seed,
            animals = self.population.live_animals(),
            "run started"
        );
        while self.step()?.is_some() {}
        info!(
            events = self.dispatched.values().sum::<usize>(),
            animals = self.population.live_animals(),
            "run finished"
        );
        Ok(())
    }

    /// Pop and dispatch the next event. Returns `None` once the queue is
    /// empty.
    pub fn step(&mut self) -> SimResult<Option<Event>> {
        self.init()?;
        let Some(event) = self.engine.queue.pop() else {
            return Ok(None);
        };
        if let Err(err) = self.dispatch(event) {
            error!(%event, %err, "run aborted");
            return Err(err);
        }
        Ok(Some(event))
    }

    /// Queue an extra event, e.g. a scripted cull.
    pub fn schedule(&mut self, time: NaiveDate, kind: EventKind, subject: Subject) -> SimResult<()> {
        self.engine.queue.schedule(time, kind, subject)
    }

    fn dispatch(&mut self, event: Event) -> SimResult<()> {
        self.engine.clock.advance(event.time)?;
        debug!(%event, "dispatch");
        let mut ctx = self.engine.ctx();
        let population = &mut self.population;

        match (event.kind, event.subject) {
            (EventKind::GisUpdate, Subject::None) => {
                self.world
                    .refresh_geography(event.time, self.geography.as_ref())?;
            }
            (EventKind::CullOldAge, Subject::Animal(id)) => cull_old_age(population, id, &mut ctx)?,
            (EventKind::LivFertile, Subject::Animal(id)) => make_fertile(population, id)?,
            (EventKind::LivBirth, Subject::Animal(id)) => {
                give_birth(population, id, &mut ctx)?;
            }
            (EventKind::Vaccinate, Subject::None) => {
                vaccinate(population, &self.diseases, self.decisions.as_mut(), &mut ctx)?;
            }
            (EventKind::Infection, Subject::None) => {
                for disease in &self.diseases {
                    disease.spontaneous_infection(population, &mut ctx)?;
                }
            }
            (EventKind::Wearoff, Subject::Wearoff(disease, id)) => {
                wear_off(population, disease, id)?;
            }
            (EventKind::Movement, Subject::Herdsman(agent)) => {
                handle_movement(&mut self.world, population, agent, &mut ctx)?;
            }
            (EventKind::WorldStep, Subject::None) => {
                self.world.advance(population, &self.diseases, &mut ctx)?;
            }
            (EventKind::AgentStep, Subject::None) => {
                agent_step(&mut self.world, population, &self.diseases, &mut ctx)?;
            }
            (kind, subject) => {
                return Err(SimError::UnroutableEvent {
                    time: event.time,
                    kind,
                    subject,
                });
            }
        }

        *self.dispatched.entry(event.kind).or_insert(0) += 1;
        Ok(())
    }

    /// Run configuration.
    pub fn config(&self) -> &SimConfig {
        &self.engine.config
    }

    /// Simulation clock.
    pub fn clock(&self) -> &SimClock {
        &self.engine.clock
    }

    /// Pending events.
    pub fn queue(&self) -> &EventQueue {
        &self.engine.queue
    }

    /// Spatial grid.
    pub fn world(&self) -> &WorldGrid {
        &self.world
    }

    /// Animals, herds, and agents.
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Configured diseases in id order.
    pub fn diseases(&self) -> &[Disease] {
        &self.diseases
    }

    /// Events dispatched so far, per kind.
    pub fn dispatched(&self) -> &BTreeMap<EventKind, usize> {
        &self.dispatched
    }

    /// The installed result sink.
    pub fn recorder(&self) -> &dyn Recorder {
        self.engine.recorder.as_ref()
    }

    /// Access the installed recorder as a concrete type.
    pub fn recorder_as<T: Recorder + 'static>(&self) -> Option<&T> {
        self.engine.recorder.as_any().downcast_ref::<T>()
    }

    /// The default recorder, if it was not replaced.
    pub fn tracker(&self) -> Option<&Tracker> {
        self.recorder_as::<Tracker>()
    }

    /// Whether `init` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Every household decides per disease; herds of households that said yes
/// are immunized unless vaccination is disabled for the run.
fn vaccinate(
    population: &mut Population,
    diseases: &[Disease],
    decisions: &mut dyn DecisionProvider,
    ctx: &mut SimContext<'_>,
) -> SimResult<()> {
    let epoch_day = ctx.epoch_day();
    let households: Vec<HouseholdId> = population.households.ids().collect();
    let mut immunized = 0usize;
    for household in households {
        let herds = population
            .household(household)?
            .herdsmen
            .iter()
            .map(|&h| population.herdsman(h).map(|h| h.herd))
            .collect::<Result<Vec<HerdId>, _>>()?;
        for disease in diseases {
            let yes = decisions.decide(household, disease.id, epoch_day, ctx.rng);
            ctx.recorder.record_decision(&disease.name, yes, epoch_day);
            if !yes || ctx.config.model.disable_vaccination {
                continue;
            }
            for &herd in &herds {
                immunized += disease.immunize_herd(population, herd, ctx)?;
            }
        }
    }
    debug!(immunized, "vaccination campaign");
    Ok(())
}

/// Periodic agent behaviour followed by the per-step records.
fn agent_step(
    world: &mut WorldGrid,
    population: &mut Population,
    diseases: &[Disease],
    ctx: &mut SimContext<'_>,
) -> SimResult<()> {
    let epoch_day = ctx.epoch_day();
    let agents: Vec<HerdsmanId> = population.herdsmen.ids().collect();
    for &agent in &agents {
        let herd = population.herdsman(agent)?.herd;
        herd_step(population, herd, ctx)?;
        decide_move(world, population, agent, ctx)?;
    }

    for &agent in &agents {
        let herd = population.herdsman(agent)?.herd;
        let position = world.position_of(agent)?;
        ctx.recorder
            .record_occupancy(position, 1, AgentKind::Herdsman, epoch_day);
        let snapshot = herd_snapshot(population, herd, diseases, ctx.clock, epoch_day)?;
        ctx.recorder.record_herd(snapshot);
    }

    for village in world.villages() {
        let count = match &world.cell(village)?.terrain {
            Terrain::Village { households, .. } => households.len(),
            Terrain::Open => 0,
        };
        if count > 0 {
            ctx.recorder
                .record_occupancy(village, count, AgentKind::Household, epoch_day);
        }
    }
    Ok(())
}

fn herd_snapshot(
    population: &Population,
    herd: HerdId,
    diseases: &[Disease],
    clock: &SimClock,
    epoch_day: i64,
) -> SimResult<HerdSnapshot> {
    let members = population.herd(herd)?.animals();
    let mut vaccinated = vec![0; diseases.len()];
    let (mut health, mut age) = (0.0, 0.0);
    for &id in members {
        let animal = population.animal(id)?;
        health += animal.health;
        age += clock.weeks_since(animal.birth);
        for (slot, disease) in vaccinated.iter_mut().zip(diseases) {
            if animal.disease_state(disease.id) == Some(Sirv::Vaccinated) {
                *slot += 1;
            }
        }
    }
    let size = members.len();
    let mean = |total: f64| if size == 0 { 0.0 } else { total / size as f64 };
    Ok(HerdSnapshot {
        herd,
        epoch_day,
        size,
        mean_health: mean(health),
        mean_age_weeks: mean(age),
        vaccinated,
    })
}
