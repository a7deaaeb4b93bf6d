//! SIRV compartment dynamics for a single disease.

use std::f64::consts::PI;

use pscape_core::config::{DiseaseParams, InfectionModel};
use pscape_core::{AnimalId, ArenaId, DiseaseId, HerdId, HerdsmanId, Population, SimConfig, Sirv};
use rand::Rng;
use tracing::trace;

use crate::context::SimContext;
use crate::demography::sample_days;
use crate::error::{SimError, SimResult};
use crate::event::{EventKind, Subject};
use crate::record::DeathCause;

/// A configured disease and its transition system.
#[derive(Debug, Clone)]
pub struct Disease {
    /// Position in the sorted disease list.
    pub id: DiseaseId,
    /// Configured name.
    pub name: String,
    /// Rates and infection model.
    pub params: DiseaseParams,
}

/// Transition probabilities for one step, already scaled to its length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRates {
    /// S -> I.
    pub p_si: f64,
    /// I -> R.
    pub p_ir: f64,
    /// I -> death.
    pub p_id: f64,
    /// R -> S.
    pub p_rs: f64,
    /// `None` when V -> S is disabled.
    pub p_vs: Option<f64>,
}

#[derive(Debug, Default)]
struct Compartments {
    s: Vec<AnimalId>,
    i: Vec<AnimalId>,
    r: Vec<AnimalId>,
    v: Vec<AnimalId>,
}

impl Compartments {
    fn population(&self) -> usize {
        self.s.len() + self.i.len() + self.r.len() + self.v.len()
    }
}

impl Disease {
    /// Every configured disease, ids assigned in name order.
    pub fn from_config(config: &SimConfig) -> Vec<Self> {
        config
            .diseases
            .iter()
            .enumerate()
            .map(|(i, (name, params))| Self {
                id: DiseaseId::from_index(i),
                name: name.clone(),
                params: params.clone(),
            })
            .collect()
    }

    /// Rates for a step of `dt` days over a population with `infected` of
    /// `population` animals infected.
    pub fn rates(&self, infected: usize, population: usize, dt: f64, timefactor: f64) -> StepRates {
        let scale = dt / timefactor;
        let pressure = if population > 0 {
            infected as f64 / population as f64
        } else {
            0.0
        };
        let p = &self.params;
        StepRates {
            p_si: p.p_si * pressure * scale,
            p_ir: p.p_ir * scale,
            p_id: p.p_id * scale,
            p_rs: p.p_rs * scale,
            p_vs: (p.p_vs >= 0.0).then_some(p.p_vs * scale),
        }
    }

    fn partition(&self, herds: &[HerdId], population: &Population) -> SimResult<Compartments> {
        let mut parts = Compartments::default();
        for &herd in herds {
            for &id in population.herd(herd)?.animals() {
                let state = population
                    .animal(id)?
                    .disease_state(self.id)
                    .ok_or(SimError::ImpossibleCompartmentState {
                        animal: id,
                        disease: self.id,
                    })?;
                match state {
                    Sirv::Susceptible => parts.s.push(id),
                    Sirv::Infected => parts.i.push(id),
                    Sirv::Recovered => parts.r.push(id),
                    Sirv::Vaccinated => parts.v.push(id),
                }
            }
        }
        Ok(parts)
    }

    /// Advance every animal in `herds` by `dt` days. The herds share one
    /// infection pressure.
    pub fn step(
        &self,
        herds: &[HerdId],
        population: &mut Population,
        dt: f64,
        ctx: &mut SimContext<'_>,
    ) -> SimResult<()> {
        let parts = self.partition(herds, population)?;
        let rates = self.rates(
            parts.i.len(),
            parts.population(),
            dt,
            ctx.config.model.disease_timefactor,
        );

        for &id in &parts.s {
            if ctx.rng.random::<f64>() < rates.p_si {
                population
                    .animal_mut(id)?
                    .set_disease_state(self.id, Sirv::Infected);
            }
        }

        for &id in &parts.i {
            let u = ctx.rng.random::<f64>();
            if u < rates.p_id {
                ctx.recorder.record_death(
                    &DeathCause::Disease(self.name.clone()),
                    ctx.clock.day_of_epoch(),
                );
                population.cull(id)?;
            } else if u < rates.p_id + rates.p_ir {
                population
                    .animal_mut(id)?
                    .set_disease_state(self.id, Sirv::Recovered);
            }
        }

        for &id in &parts.r {
            if ctx.rng.random::<f64>() < rates.p_rs {
                population
                    .animal_mut(id)?
                    .set_disease_state(self.id, Sirv::Susceptible);
            }
        }

        if let Some(p_vs) = rates.p_vs {
            for &id in &parts.v {
                if ctx.rng.random::<f64>() < p_vs {
                    population
                        .animal_mut(id)?
                        .set_disease_state(self.id, Sirv::Susceptible);
                }
            }
        }
        Ok(())
    }

    /// Probability of a spontaneous environmental infection on a day of the
    /// year.
    pub fn spontaneous_probability(&self, day_of_year: u32) -> f64 {
        match self.params.infection {
            InfectionModel::Harmonic {
                constant,
                cos,
                sin,
                m,
            } => {
                let angle = 2.0 * PI * f64::from(day_of_year) / m;
                (constant + cos * angle.cos() + sin * angle.sin()).exp()
            }
            InfectionModel::Uniform { p } => p,
        }
    }

    /// Sample whether a spontaneous infection happens now and, if so,
    /// infect a random animal of a random herdsman's herd.
    ///
    /// Returns the newly infected animal, if any.
    pub fn spontaneous_infection(
        &self,
        population: &mut Population,
        ctx: &mut SimContext<'_>,
    ) -> SimResult<Option<AnimalId>> {
        let p = self.spontaneous_probability(ctx.clock.day_of_year());
        if ctx.rng.random::<f64>() >= p || population.herdsmen.is_empty() {
            return Ok(None);
        }
        let pick = HerdsmanId::from_index(ctx.rng.random_range(0..population.herdsmen.len()));
        let herd = population.herd(population.herdsman(pick)?.herd)?;
        if herd.is_empty() {
            return Ok(None);
        }
        let animal = herd.animals()[ctx.rng.random_range(0..herd.size())];
        population
            .animal_mut(animal)?
            .set_disease_state(self.id, Sirv::Infected);
        trace!(disease = %self.name, %animal, "spontaneous infection");
        Ok(Some(animal))
    }

    /// Vaccinate every susceptible or recovered animal in a herd and schedule
    /// wear-off where the vaccine does not last.
    ///
    /// Returns how many animals changed compartment.
    pub fn immunize_herd(
        &self,
        population: &mut Population,
        herd: HerdId,
        ctx: &mut SimContext<'_>,
    ) -> SimResult<usize> {
        let members = population.herd(herd)?.animals().to_vec();
        let mut vaccinated = 0;
        for id in members {
            if !population.animal_mut(id)?.immunize(self.id) {
                continue;
            }
            vaccinated += 1;
            if let Some(wearoff) = self.params.wearoff {
                let days = sample_days(ctx.rng, wearoff.mu, wearoff.sigma);
                ctx.schedule_in(days, EventKind::Wearoff, Subject::Wearoff(self.id, id))?;
            }
        }
        Ok(vaccinated)
    }
}

/// Vaccine protection ends: a still-vaccinated active animal becomes
/// susceptible. Returns whether the animal changed.
pub fn wear_off(population: &mut Population, disease: DiseaseId, id: AnimalId) -> SimResult<bool> {
    let animal = population.animal_mut(id)?;
    if !animal.active || animal.disease_state(disease) != Some(Sirv::Vaccinated) {
        return Ok(false);
    }
    animal.set_disease_state(disease, Sirv::Susceptible);
    Ok(true)
}
