use std::fmt;

use pscape_core::{DiseaseId, HouseholdId, SimConfig};
use rand::Rng;
use rand::rngs::StdRng;

/// Decides whether a household vaccinates its herds against a disease.
///
/// Providers draw from the simulation's RNG so a run stays reproducible
/// from its seed.
pub trait DecisionProvider: fmt::Debug {
    /// Whether `household` vaccinates against `disease` now.
    fn decide(&mut self, household: HouseholdId, disease: DiseaseId, epoch_day: i64, rng: &mut StdRng) -> bool;
}

/// Every household independently says yes with a fixed per-disease
/// probability.
#[derive(Debug, Clone)]
pub struct FixedProbabilityDecision {
    probabilities: Vec<f64>,
}

impl FixedProbabilityDecision {
    /// Probabilities indexed by disease id.
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self { probabilities }
    }

    /// Take `agents.prob_vaccinate` from the configuration. Diseases without
    /// an entry never vaccinate.
    pub fn from_config(config: &SimConfig) -> Self {
        let probabilities = config
            .diseases
            .keys()
            .map(|name| config.agents.prob_vaccinate.get(name).copied().unwrap_or(0.0))
            .collect();
        Self::new(probabilities)
    }
}

impl DecisionProvider for FixedProbabilityDecision {
    fn decide(&mut self, _household: HouseholdId, disease: DiseaseId, _epoch_day: i64, rng: &mut StdRng) -> bool {
        let p = self.probabilities.get(disease.0 as usize).copied().unwrap_or(0.0);
        rng.random::<f64>() < p
    }
}
