//! Building the world, the initial population, and the fixed calendar of a
//! run from its configuration.

use pscape_core::{
    CyclicPath, ConfigError, DiseaseId, LatLon, Population, Position, Sex, SimConfig, Sirv,
};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::clock::{enumerate_annual, enumerate_month_starts, enumerate_step_events, most_recent, offset_days};
use crate::demography::sample_days;
use crate::error::{SimError, SimResult};
use crate::event::{EventKind, EventQueue, Subject};
use crate::world::WorldGrid;

/// Lay out the synthetic grid and its villages.
///
/// Every grazing loop starts at its village cell, followed by the configured
/// waypoints.
pub fn build_world(config: &SimConfig) -> SimResult<WorldGrid> {
    let params = &config.world;
    let mut world = WorldGrid::regular(
        params.height,
        params.width,
        LatLon::new(params.origin_lat, params.origin_lon),
        params.cell_degrees,
    )?;

    for village in &params.villages {
        let home = Position::new(village.row, village.col);
        let home_id = world.cell(home)?.id;
        let mut paths = Vec::with_capacity(village.paths.len());
        for waypoints in &village.paths {
            let mut cells = vec![home_id];
            for &(row, col) in waypoints {
                cells.push(world.cell(Position::new(row, col))?.id);
            }
            if let Some(path) = CyclicPath::new(cells) {
                paths.push(path);
            }
        }
        world.set_village(home, paths)?;
    }
    Ok(world)
}

/// Create households, herdsmen, and the initial herds.
///
/// Households are spread round-robin over the villages of `world`, each with
/// one herdsman standing in the village. Lifecycle events for the initial
/// animals go straight onto `queue`.
pub fn initialize_population(
    config: &SimConfig,
    world: &mut WorldGrid,
    rng: &mut StdRng,
    queue: &mut EventQueue,
) -> SimResult<Population> {
    let villages = world.villages();
    if villages.is_empty() {
        return Err(ConfigError::invalid("world.villages", "the world has no villages").into());
    }

    let setup = &config.setup;
    let livestock = &config.livestock;
    let start = config.model.start_date;
    let mut population = Population::new();

    let mut herdsmen = Vec::with_capacity(setup.n_households);
    for (i, &village) in villages.iter().cycle().take(setup.n_households).enumerate() {
        let household = population.add_household(village);
        world.add_household(village, household)?;
        let herdsman = population.add_herdsman(household, village)?;
        world.place_agent(herdsman, village)?;
        herdsmen.push(herdsman);
        debug!(%household, %herdsman, %village, index = i, "household created");
    }
    if herdsmen.is_empty() {
        return Ok(population);
    }

    let diseases: Vec<(DiseaseId, &str)> = config
        .diseases
        .keys()
        .enumerate()
        .map(|(i, name)| (DiseaseId(i as u32), name.as_str()))
        .collect();
    let last_campaign = most_recent(start, &config.agents.vaccination_schedule);

    for _ in 0..setup.n_animals {
        let owner = herdsmen[rng.random_range(0..herdsmen.len())];
        let herd = population.herdsman(owner)?.herd;
        let sex = if rng.random::<f64>() < setup.pct_bull {
            Sex::Male
        } else {
            Sex::Female
        };

        let lifespan = sample_days(rng, livestock.death_mu, livestock.death_sigma);
        let span = (lifespan - setup.min_age - setup.min_remain).max(0.0);
        let age = setup.min_age + rng.random::<f64>() * span;
        let birth = offset_days(start, -age).ok_or(SimError::DateOutOfRange { from: start, days: -age })?;
        let id = population.add_animal(herd, sex, birth, livestock.initial_health)?;

        // Lifespans shorter than min_age still end inside the run.
        let remaining = (lifespan - age).max(1.0);
        queue.schedule_in(start, remaining, EventKind::CullOldAge, Subject::Animal(id))?;

        if sex == Sex::Female {
            if age >= livestock.maturity {
                population.animal_mut(id)?.fertile = true;
            } else {
                queue.schedule_in(start, livestock.maturity - age, EventKind::LivFertile, Subject::Animal(id))?;
            }
        }

        for &(disease, name) in &diseases {
            let pct = setup.pct_vaccinated.get(name).copied().unwrap_or(0.0);
            let mut state = Sirv::Susceptible;
            if rng.random::<f64>() < pct {
                match (config.diseases.get(name).and_then(|d| d.wearoff), last_campaign) {
                    (Some(wearoff), Some(campaign)) => {
                        match offset_days(campaign, sample_days(rng, wearoff.mu, wearoff.sigma)) {
                            Some(ends) if ends <= start => {}
                            Some(ends) => {
                                queue.schedule(ends, EventKind::Wearoff, Subject::Wearoff(disease, id))?;
                                state = Sirv::Vaccinated;
                            }
                            // Protection outlasts the calendar.
                            None => state = Sirv::Vaccinated,
                        }
                    }
                    (Some(_), None) => {}
                    (None, _) => state = Sirv::Vaccinated,
                }
            }
            population.animal_mut(id)?.set_disease_state(disease, state);
        }
    }

    info!(
        households = population.households.len(),
        animals = population.live_animals(),
        villages = villages.len(),
        "population initialized"
    );
    Ok(population)
}

/// Queue the fixed calendar: paired world and agent steps with a
/// spontaneous infection draw at each step, monthly geography updates, and
/// the annual vaccination campaigns.
pub fn schedule_calendar(config: &SimConfig, queue: &mut EventQueue) -> SimResult<()> {
    let model = &config.model;
    let (start, end) = (model.start_date, model.end_date);

    for time in enumerate_step_events(start, end, model.time_delta_days) {
        queue.schedule(time, EventKind::WorldStep, Subject::None)?;
        queue.schedule(time, EventKind::AgentStep, Subject::None)?;
        queue.schedule(time, EventKind::Infection, Subject::None)?;
    }

    queue.schedule(start, EventKind::GisUpdate, Subject::None)?;
    for time in enumerate_month_starts(start, end) {
        queue.schedule(time, EventKind::GisUpdate, Subject::None)?;
    }

    for &(month, day) in &config.agents.vaccination_schedule {
        for time in enumerate_annual(month, day, start, end) {
            queue.schedule(time, EventKind::Vaccinate, Subject::None)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pscape_core::CellId;
    use pscape_core::config::{VillageParams, WorldParams};
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn small_config() -> SimConfig {
        let mut config = SimConfig::default().with_population(4, 200);
        config.world = WorldParams {
            width: 6,
            height: 4,
            villages: vec![
                VillageParams {
                    row: 1,
                    col: 1,
                    paths: vec![vec![(1, 4), (3, 4)]],
                },
                VillageParams {
                    row: 3,
                    col: 0,
                    paths: Vec::new(),
                },
            ],
            ..WorldParams::default()
        };
        config
    }

    fn bounded_queue(config: &SimConfig) -> EventQueue {
        EventQueue::with_bounds(config.model.start_date, config.model.end_date)
    }

    #[test]
    fn village_paths_start_at_the_village() {
        let world = build_world(&small_config()).unwrap();
        assert_eq!(world.villages(), vec![Position::new(1, 1), Position::new(3, 0)]);

        let terrain = &world.cell(Position::new(1, 1)).unwrap().terrain;
        let mut rng = StdRng::seed_from_u64(1);
        let path = terrain.random_path(&mut rng).unwrap();
        // Row-major ids on a 6-wide grid.
        assert_eq!(path.waypoints(), &[CellId(7), CellId(10), CellId(22)]);
        assert!(!world.cell(Position::new(3, 0)).unwrap().terrain.has_paths());
    }

    #[test]
    fn households_round_robin_over_villages() {
        let config = small_config();
        let mut world = build_world(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut queue = bounded_queue(&config);
        let pop = initialize_population(&config, &mut world, &mut rng, &mut queue).unwrap();

        let homes: Vec<Position> = pop.households.iter().map(|(_, h)| h.village).collect();
        assert_eq!(
            homes,
            vec![
                Position::new(1, 1),
                Position::new(3, 0),
                Position::new(1, 1),
                Position::new(3, 0),
            ]
        );
        for (id, herdsman) in pop.herdsmen.iter() {
            assert_eq!(world.position_of(id).unwrap(), herdsman.home);
        }
        assert_eq!(pop.live_animals(), 200);
    }

    #[test]
    fn initial_animals_are_within_age_bounds() {
        let config = small_config();
        let mut world = build_world(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        // Unbounded, so no lifespan falls past the horizon.
        let mut queue = EventQueue::new();
        let pop = initialize_population(&config, &mut world, &mut rng, &mut queue).unwrap();

        let start = config.model.start_date;
        let n_diseases = config.diseases.len();
        for (_, animal) in pop.animals.iter() {
            assert!((start - animal.birth).num_days() >= config.setup.min_age as i64);
            assert_eq!(animal.tracked_diseases().count(), n_diseases);
            if animal.sex == Sex::Male {
                assert!(!animal.fertile);
            }
        }
        // Every animal has exactly one scheduled old-age cull.
        assert_eq!(queue.counts_by_kind()[&EventKind::CullOldAge], 200);
    }

    #[test]
    fn culls_past_the_horizon_are_not_queued() {
        let config = small_config();
        let mut world = build_world(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut queue = bounded_queue(&config);
        initialize_population(&config, &mut world, &mut rng, &mut queue).unwrap();

        let culls: Vec<_> = std::iter::from_fn(|| queue.pop())
            .filter(|e| e.kind == EventKind::CullOldAge)
            .collect();
        assert!(culls.len() < 200);
        assert!(culls.iter().all(|e| e.time <= config.model.end_date));
        let mut subjects: Vec<_> = culls.iter().map(|e| e.subject).collect();
        subjects.sort();
        subjects.dedup();
        assert_eq!(subjects.len(), culls.len());
    }

    #[test]
    fn ages_beyond_the_calendar_are_an_error() {
        let mut config = small_config();
        config.livestock.death_mu = 1e9;
        config.livestock.death_sigma = 0.0;
        let mut world = build_world(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut queue = bounded_queue(&config);
        let err = initialize_population(&config, &mut world, &mut rng, &mut queue).unwrap_err();
        assert!(matches!(err, SimError::DateOutOfRange { .. }));
    }

    #[test]
    fn prevaccinated_animals_get_wearoff_events() {
        let mut config = small_config();
        config.setup.pct_vaccinated = BTreeMap::from([("cbpp".to_owned(), 1.0), ("rvf".to_owned(), 1.0)]);
        // Campaign on Dec 1 1999, a year of protection on average.
        config.agents.vaccination_schedule = vec![(12, 1)];
        let mut world = build_world(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let mut queue = bounded_queue(&config);
        let pop = initialize_population(&config, &mut world, &mut rng, &mut queue).unwrap();

        let (cbpp, rvf) = (DiseaseId(0), DiseaseId(1));
        let mut vaccinated = 0;
        for (_, animal) in pop.animals.iter() {
            // rvf has no wear-off: always vaccinated.
            assert_eq!(animal.disease_state(rvf), Some(Sirv::Vaccinated));
            if animal.disease_state(cbpp) == Some(Sirv::Vaccinated) {
                vaccinated += 1;
            }
        }
        let wearoffs = queue.counts_by_kind().get(&EventKind::Wearoff).copied().unwrap_or(0);
        assert_eq!(wearoffs, vaccinated);
        assert!(vaccinated > 150, "most protection outlasts one month: {vaccinated}");
    }

    #[test]
    fn no_villages_is_a_config_error() {
        let mut config = small_config();
        config.world.villages.clear();
        let mut world = build_world(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = bounded_queue(&config);
        let err = initialize_population(&config, &mut world, &mut rng, &mut queue).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn calendar_counts() {
        let config = SimConfig::default()
            .with_window(date(2000, 1, 1), date(2000, 2, 1))
            .with_step_days(7);
        let mut queue = bounded_queue(&config);
        schedule_calendar(&config, &mut queue).unwrap();

        let counts = queue.counts_by_kind();
        assert_eq!(counts[&EventKind::WorldStep], 5);
        assert_eq!(counts[&EventKind::AgentStep], 5);
        assert_eq!(counts[&EventKind::Infection], 5);
        // Start plus Feb 1.
        assert_eq!(counts[&EventKind::GisUpdate], 2);
        // Default campaign on Mar 1 falls outside the window.
        assert!(!counts.contains_key(&EventKind::Vaccinate));
    }

    #[test]
    fn vaccination_campaigns_each_year() {
        let mut config = SimConfig::default().with_window(date(2000, 1, 1), date(2002, 1, 1));
        config.agents.vaccination_schedule = vec![(3, 1), (9, 15)];
        let mut queue = bounded_queue(&config);
        schedule_calendar(&config, &mut queue).unwrap();
        assert_eq!(queue.counts_by_kind()[&EventKind::Vaccinate], 4);
    }
}
