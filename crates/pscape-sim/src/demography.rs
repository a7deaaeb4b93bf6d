//! Livestock life cycle: maturity, breeding, birth, feeding, and death.

use pscape_core::config::LivestockParams;
use pscape_core::{AnimalId, HerdId, Population, Sex, Sirv};
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::trace;

use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::event::{EventKind, Subject};
use crate::record::DeathCause;

/// Draw a duration in days from `Normal(mu, sigma)`, never negative.
///
/// An unusable distribution (negative or non-finite sigma) yields `mu`.
pub fn sample_days(rng: &mut StdRng, mu: f64, sigma: f64) -> f64 {
    let days = if sigma.is_finite() && sigma >= 0.0 {
        Normal::new(mu, sigma)
            .map(|normal| normal.sample(rng))
            .unwrap_or(mu)
    } else {
        mu
    };
    days.max(0.0)
}

/// An immature or nursing animal becomes fertile.
pub fn make_fertile(population: &mut Population, id: AnimalId) -> SimResult<()> {
    let animal = population.animal_mut(id)?;
    if !animal.active {
        return Ok(());
    }
    if animal.pregnant {
        return Err(SimError::InvalidLifecycle {
            animal: id,
            action: "become fertile",
            state: "pregnant".to_owned(),
        });
    }
    animal.nursing = false;
    animal.fertile = true;
    Ok(())
}

/// The animal conceives and its birth is scheduled one gestation period
/// from now.
pub fn breed(population: &mut Population, id: AnimalId, ctx: &mut SimContext<'_>) -> SimResult<()> {
    population.animal_mut(id)?.conceive();
    let gestation = ctx.config.livestock.gestation_period;
    ctx.schedule_in(gestation, EventKind::LivBirth, Subject::Animal(id))
}

/// A pregnant mother gives birth to one offspring in her herd.
///
/// Returns the newborn, or `None` if the mother died before term.
pub fn give_birth(
    population: &mut Population,
    mother: AnimalId,
    ctx: &mut SimContext<'_>,
) -> SimResult<Option<AnimalId>> {
    let parent = population.animal(mother)?;
    if !parent.active {
        return Ok(None);
    }
    if !parent.pregnant || parent.fertile {
        return Err(SimError::InvalidLifecycle {
            animal: mother,
            action: "give birth",
            state: format!("pregnant={} fertile={}", parent.pregnant, parent.fertile),
        });
    }
    let herd = parent.herd;
    let inherited: Vec<_> = parent.tracked_diseases().collect();
    let config = ctx.config;
    let params = &config.livestock;

    let sex = if ctx.rng.random::<f64>() < params.bull_probability {
        Sex::Male
    } else {
        Sex::Female
    };
    let now = ctx.now();
    let child = population.add_animal(herd, sex, now, params.initial_health)?;
    ctx.recorder.record_birth(ctx.clock.day_of_epoch());

    let newborn = population.animal_mut(child)?;
    for disease in inherited {
        newborn.set_disease_state(disease, Sirv::Susceptible);
    }

    let lifespan = sample_days(ctx.rng, params.death_mu, params.death_sigma);
    ctx.schedule_in(lifespan, EventKind::CullOldAge, Subject::Animal(child))?;
    if sex == Sex::Female {
        ctx.schedule_in(params.maturity, EventKind::LivFertile, Subject::Animal(child))?;
    }

    let parent = population.animal_mut(mother)?;
    parent.pregnant = false;
    parent.nursing = true;
    ctx.schedule_in(params.nursing_period, EventKind::LivFertile, Subject::Animal(mother))?;

    trace!(%mother, %child, "birth");
    Ok(Some(child))
}

/// Seasonal breeding weight for a day of the year.
pub fn breeding_season_scale(day_of_year: u32, params: &LivestockParams) -> f64 {
    let offset = f64::from(day_of_year) - params.breed_date_mu;
    (-(offset * offset) / (2.0 * params.breed_date_sigma * params.breed_date_sigma)).exp()
}

/// Periodic herd maintenance: breed fertile females, then cull animals
/// whose health has run out.
pub fn herd_step(population: &mut Population, herd: HerdId, ctx: &mut SimContext<'_>) -> SimResult<()> {
    let mut males = 0usize;
    let mut females = Vec::new();
    for &id in population.herd(herd)?.animals() {
        let animal = population.animal(id)?;
        match animal.sex {
            Sex::Male => males += 1,
            Sex::Female if animal.can_breed() => females.push((id, animal.health)),
            Sex::Female => {}
        }
    }

    if males > 0 && !females.is_empty() {
        let config = ctx.config;
        let params = &config.livestock;
        let p_breed = males as f64 / (males + females.len()) as f64;
        let threshold = breeding_season_scale(ctx.clock.day_of_year(), params)
            * p_breed
            * params.breed_pscale
            * ctx.clock.step_days() as f64;
        let min_health = params.min_breed_health;
        for (id, health) in females {
            // Short-circuit keeps unhealthy females from consuming a draw.
            if health >= min_health && ctx.rng.random::<f64>() < threshold {
                breed(population, id, ctx)?;
            }
        }
    }

    let starved: Vec<AnimalId> = population
        .herd(herd)?
        .animals()
        .iter()
        .copied()
        .filter(|&id| population.animal(id).is_ok_and(|a| a.health <= 0.0))
        .collect();
    for id in starved {
        ctx.recorder
            .record_death(&DeathCause::Health, ctx.clock.day_of_epoch());
        population.cull(id)?;
    }
    Ok(())
}

/// Distribute `units` of forage over a herd for `dt` days.
pub fn feed_herd(
    population: &mut Population,
    herd: HerdId,
    units: f64,
    dt: f64,
    params: &LivestockParams,
) -> SimResult<()> {
    let members = population.herd(herd)?.animals().to_vec();
    if members.is_empty() {
        return Ok(());
    }
    let need = members.len() as f64 * params.eat * dt;
    let fed = if need > 0.0 { (units / need).min(1.0) } else { 1.0 };
    let delta = params.health_fed * fed * dt - params.health_starve * (1.0 - fed) * dt;
    for id in members {
        population.animal_mut(id)?.adjust_health(delta);
    }
    Ok(())
}

/// End of lifespan. Inactive animals are ignored.
pub fn cull_old_age(population: &mut Population, id: AnimalId, ctx: &mut SimContext<'_>) -> SimResult<()> {
    if !population.is_active(id) {
        return Ok(());
    }
    ctx.recorder
        .record_death(&DeathCause::Age, ctx.clock.day_of_epoch());
    population.cull(id)?;
    Ok(())
}
