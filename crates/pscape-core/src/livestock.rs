use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::id::{AnimalId, DiseaseId, HerdId, HerdsmanId};

/// Compartment of the SIRV disease model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sirv {
    /// Can catch the disease.
    Susceptible,
    /// Carries the disease.
    Infected,
    /// Recovered and temporarily immune.
    Recovered,
    /// Protected by vaccination.
    Vaccinated,
}

impl fmt::Display for Sirv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Susceptible => write!(f, "S"),
            Self::Infected => write!(f, "I"),
            Self::Recovered => write!(f, "R"),
            Self::Vaccinated => write!(f, "V"),
        }
    }
}

/// Sex of an animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    /// Can breed and give birth.
    Female,
    /// Bull.
    Male,
}

/// A single animal.
///
/// Animals are never removed from their arena. Death clears `active` and
/// drops the animal from its herd; events still referencing it become
/// no-ops.
#[derive(Debug, Clone)]
pub struct Animal {
    /// Handle of this animal.
    pub id: AnimalId,
    /// Sex, fixed at birth.
    pub sex: Sex,
    /// Date of birth.
    pub birth: NaiveDate,
    /// Herd the animal belongs to.
    pub herd: HerdId,
    /// `false` once the animal has died.
    pub active: bool,
    /// Can conceive now.
    pub fertile: bool,
    /// Carrying a calf.
    pub pregnant: bool,
    /// Nursing a newborn; not fertile until weaned.
    pub nursing: bool,
    /// Health scalar, always within `0.0..=1.0`.
    pub health: f64,
    /// Compartment per disease, indexed by [`DiseaseId`].
    diseases: Vec<Option<Sirv>>,
}

impl Animal {
    /// An active animal with no compartments set.
    pub fn new(id: AnimalId, sex: Sex, birth: NaiveDate, herd: HerdId, health: f64) -> Self {
        Self {
            id,
            sex,
            birth,
            herd,
            active: true,
            fertile: false,
            pregnant: false,
            nursing: false,
            health: health.clamp(0.0, 1.0),
            diseases: Vec::new(),
        }
    }

    /// Compartment for `disease`, or `None` if it was never set.
    pub fn disease_state(&self, disease: DiseaseId) -> Option<Sirv> {
        self.diseases.get(disease.0 as usize).copied().flatten()
    }

    /// Set the compartment for `disease`.
    pub fn set_disease_state(&mut self, disease: DiseaseId, state: Sirv) {
        let idx = disease.0 as usize;
        if self.diseases.len() <= idx {
            self.diseases.resize(idx + 1, None);
        }
        self.diseases[idx] = Some(state);
    }

    /// Diseases this animal has an explicit compartment for.
    pub fn tracked_diseases(&self) -> impl Iterator<Item = DiseaseId> + '_ {
        self.diseases
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| DiseaseId(i as u32))
    }

    /// Active fertile female.
    pub fn can_breed(&self) -> bool {
        self.active && self.sex == Sex::Female && self.fertile
    }

    /// Move an S or R animal to V. Returns `true` if the animal changed
    /// compartment; infected animals are too late to vaccinate.
    pub fn immunize(&mut self, disease: DiseaseId) -> bool {
        match self.disease_state(disease) {
            Some(Sirv::Susceptible | Sirv::Recovered) => {
                self.set_disease_state(disease, Sirv::Vaccinated);
                true
            }
            _ => false,
        }
    }

    /// Breeding transition: the animal becomes pregnant.
    pub fn conceive(&mut self) {
        self.pregnant = true;
        self.fertile = false;
        self.nursing = false;
    }

    /// Apply a health delta, clamping to `0.0..=1.0`.
    pub fn adjust_health(&mut self, delta: f64) {
        self.health = (self.health + delta).clamp(0.0, 1.0);
    }
}

/// A collection of animals managed by one herdsman.
#[derive(Debug, Clone)]
pub struct Herd {
    /// Handle of this herd.
    pub id: HerdId,
    /// Herdsman managing the herd.
    pub owner: HerdsmanId,
    animals: Vec<AnimalId>,
}

impl Herd {
    /// An empty herd.
    pub fn new(id: HerdId, owner: HerdsmanId) -> Self {
        Self {
            id,
            owner,
            animals: Vec::new(),
        }
    }

    /// Live members in insertion order.
    pub fn animals(&self) -> &[AnimalId] {
        &self.animals
    }

    /// Number of live members.
    pub fn size(&self) -> usize {
        self.animals.len()
    }

    /// Whether the herd has no live members.
    pub fn is_empty(&self) -> bool {
        self.animals.is_empty()
    }

    /// Append a member.
    pub fn add(&mut self, animal: AnimalId) {
        self.animals.push(animal);
    }

    /// Drop an animal from membership. Returns `false` if it was not a member.
    pub fn remove(&mut self, animal: AnimalId) -> bool {
        match self.animals.iter().position(|a| *a == animal) {
            Some(idx) => {
                self.animals.remove(idx);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn heifer() -> Animal {
        Animal::new(AnimalId(0), Sex::Female, date(2000, 1, 1), HerdId(0), 0.5)
    }

    #[test]
    fn unset_disease_state_is_none() {
        let a = heifer();
        assert_eq!(a.disease_state(DiseaseId(1)), None);
    }

    #[test]
    fn disease_states_are_independent() {
        let mut a = heifer();
        a.set_disease_state(DiseaseId(1), Sirv::Infected);
        a.set_disease_state(DiseaseId(0), Sirv::Susceptible);
        assert_eq!(a.disease_state(DiseaseId(0)), Some(Sirv::Susceptible));
        assert_eq!(a.disease_state(DiseaseId(1)), Some(Sirv::Infected));
        assert_eq!(
            a.tracked_diseases().collect::<Vec<_>>(),
            vec![DiseaseId(0), DiseaseId(1)]
        );
    }

    #[test]
    fn immunize_only_from_s_or_r() {
        let mut a = heifer();
        a.set_disease_state(DiseaseId(0), Sirv::Recovered);
        assert!(a.immunize(DiseaseId(0)));
        assert_eq!(a.disease_state(DiseaseId(0)), Some(Sirv::Vaccinated));

        a.set_disease_state(DiseaseId(0), Sirv::Infected);
        assert!(!a.immunize(DiseaseId(0)));
        assert_eq!(a.disease_state(DiseaseId(0)), Some(Sirv::Infected));
    }

    #[test]
    fn conceive_clears_fertility_and_nursing() {
        let mut a = heifer();
        a.fertile = true;
        a.nursing = true;
        a.conceive();
        assert!(a.pregnant);
        assert!(!a.fertile);
        assert!(!a.nursing);
    }

    #[test]
    fn health_is_clamped() {
        let mut a = heifer();
        a.adjust_health(2.0);
        assert!((a.health - 1.0).abs() < f64::EPSILON);
        a.adjust_health(-5.0);
        assert!(a.health.abs() < f64::EPSILON);
    }

    #[test]
    fn breeding_requires_fertile_female() {
        let mut a = heifer();
        assert!(!a.can_breed());
        a.fertile = true;
        assert!(a.can_breed());
        a.sex = Sex::Male;
        assert!(!a.can_breed());
    }

    #[test]
    fn herd_membership() {
        let mut herd = Herd::new(HerdId(0), HerdsmanId(0));
        herd.add(AnimalId(1));
        herd.add(AnimalId(2));
        assert!(herd.remove(AnimalId(1)));
        assert!(!herd.remove(AnimalId(1)));
        assert_eq!(herd.animals(), &[AnimalId(2)]);
    }
}
