use chrono::NaiveDate;

use crate::agents::{Herdsman, Household};
use crate::error::{CoreError, CoreResult};
use crate::geo::Position;
use crate::id::{AnimalId, Arena, HerdId, HerdsmanId, HouseholdId};
use crate::livestock::{Animal, Herd, Sex};

/// Every agent and animal of a run, stored in arenas keyed by typed handles.
#[derive(Debug, Clone, Default)]
pub struct Population {
    /// Every animal ever born, dead or alive.
    pub animals: Arena<AnimalId, Animal>,
    /// One herd per herdsman.
    pub herds: Arena<HerdId, Herd>,
    /// Herdsmen.
    pub herdsmen: Arena<HerdsmanId, Herdsman>,
    /// Households.
    pub households: Arena<HouseholdId, Household>,
}

impl Population {
    /// An empty population.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a household living in `village`.
    pub fn add_household(&mut self, village: Position) -> HouseholdId {
        self.households
            .insert_with(|id| Household::new(id, village))
    }

    /// Create a herdsman with an empty herd working for `household`.
    pub fn add_herdsman(
        &mut self,
        household: HouseholdId,
        home: Position,
    ) -> CoreResult<HerdsmanId> {
        if self.households.get(household).is_none() {
            return Err(CoreError::HouseholdNotFound(household));
        }
        let herdsman_id = self.herdsmen.next_id();
        let herd = self.herds.insert_with(|id| Herd::new(id, herdsman_id));
        let id = self
            .herdsmen
            .insert_with(|id| Herdsman::new(id, household, herd, home));
        self.households
            .get_mut(household)
            .ok_or(CoreError::HouseholdNotFound(household))?
            .herdsmen
            .push(id);
        Ok(id)
    }

    /// Create an active animal and make it a member of `herd`.
    pub fn add_animal(
        &mut self,
        herd: HerdId,
        sex: Sex,
        birth: NaiveDate,
        health: f64,
    ) -> CoreResult<AnimalId> {
        if self.herds.get(herd).is_none() {
            return Err(CoreError::HerdNotFound(herd));
        }
        let id = self
            .animals
            .insert_with(|id| Animal::new(id, sex, birth, herd, health));
        self.herd_mut(herd)?.add(id);
        Ok(id)
    }

    /// Look up an animal.
    pub fn animal(&self, id: AnimalId) -> CoreResult<&Animal> {
        self.animals.get(id).ok_or(CoreError::AnimalNotFound(id))
    }

    /// Look up an animal for mutation.
    pub fn animal_mut(&mut self, id: AnimalId) -> CoreResult<&mut Animal> {
        self.animals.get_mut(id).ok_or(CoreError::AnimalNotFound(id))
    }

    /// Look up a herd.
    pub fn herd(&self, id: HerdId) -> CoreResult<&Herd> {
        self.herds.get(id).ok_or(CoreError::HerdNotFound(id))
    }

    /// Look up a herd for mutation.
    pub fn herd_mut(&mut self, id: HerdId) -> CoreResult<&mut Herd> {
        self.herds.get_mut(id).ok_or(CoreError::HerdNotFound(id))
    }

    /// Look up a herdsman.
    pub fn herdsman(&self, id: HerdsmanId) -> CoreResult<&Herdsman> {
        self.herdsmen.get(id).ok_or(CoreError::HerdsmanNotFound(id))
    }

    /// Look up a herdsman for mutation.
    pub fn herdsman_mut(&mut self, id: HerdsmanId) -> CoreResult<&mut Herdsman> {
        self.herdsmen
            .get_mut(id)
            .ok_or(CoreError::HerdsmanNotFound(id))
    }

    /// Look up a household.
    pub fn household(&self, id: HouseholdId) -> CoreResult<&Household> {
        self.households
            .get(id)
            .ok_or(CoreError::HouseholdNotFound(id))
    }

    /// O(1) liveness check used to discard stale events.
    pub fn is_active(&self, id: AnimalId) -> bool {
        self.animals.get(id).is_some_and(|a| a.active)
    }

    /// Remove a dead animal from its herd and flag it inactive.
    ///
    /// Culling an already inactive animal is a no-op.
    pub fn cull(&mut self, id: AnimalId) -> CoreResult<()> {
        let animal = self.animal_mut(id)?;
        if !animal.active {
            return Ok(());
        }
        animal.active = false;
        let herd = animal.herd;
        self.herd_mut(herd)?.remove(id);
        Ok(())
    }

    /// Number of live animals across all herds.
    pub fn live_animals(&self) -> usize {
        self.herds.iter().map(|(_, h)| h.size()).sum()
    }
}
