use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// A typed handle into an [`Arena`].
///
/// Handles are plain indices. They stay valid for the whole run because
/// arenas never remove slots; entities that leave the simulation are flagged
/// inactive instead.
pub trait ArenaId: Copy + Eq + Ord + fmt::Debug {
    /// Build a handle from a slot index.
    fn from_index(index: usize) -> Self;

    /// The slot index this handle points at.
    fn index(self) -> usize;
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl ArenaId for $name {
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Handle of a single animal.
    AnimalId,
    "animal"
);
define_id!(
    /// Handle of a herd.
    HerdId,
    "herd"
);
define_id!(
    /// Handle of a herdsman agent.
    HerdsmanId,
    "herdsman"
);
define_id!(
    /// Handle of a head-of-household agent.
    HouseholdId,
    "household"
);
define_id!(
    /// Index of a disease in the configured (sorted) disease list.
    DiseaseId,
    "disease"
);

/// Append-only slot storage that doubles as the id allocator for its
/// entity type.
///
/// The arena is owned by the simulation context, so two simulations never
/// share an id sequence.
#[derive(Debug, Clone)]
pub struct Arena<I, T> {
    slots: Vec<T>,
    _id: PhantomData<I>,
}

impl<I, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            _id: PhantomData,
        }
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and store the value built for it.
    pub fn insert_with(&mut self, build: impl FnOnce(I) -> T) -> I {
        let id = I::from_index(self.slots.len());
        self.slots.push(build(id));
        id
    }

    /// The id the next insertion will receive.
    pub fn next_id(&self) -> I {
        I::from_index(self.slots.len())
    }

    /// Entry behind `id`, if allocated.
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index())
    }

    /// Mutable entry behind `id`, if allocated.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index())
    }

    /// Number of slots ever allocated (live or not).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over `(id, value)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, v)| (I::from_index(i), v))
    }

    /// All allocated ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = I> + use<I, T> {
        (0..self.slots.len()).map(I::from_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_allocates_sequential_ids() {
        let mut arena: Arena<AnimalId, &str> = Arena::new();
        let a = arena.insert_with(|_| "a");
        let b = arena.insert_with(|_| "b");
        assert_eq!(a, AnimalId(0));
        assert_eq!(b, AnimalId(1));
        assert_eq!(arena.next_id(), AnimalId(2));
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn builder_receives_its_own_id() {
        let mut arena: Arena<HerdId, HerdId> = Arena::new();
        let id = arena.insert_with(|id| id);
        assert_eq!(arena.get(id), Some(&id));
    }

    #[test]
    fn separate_arenas_do_not_share_sequences() {
        let mut first: Arena<AnimalId, ()> = Arena::new();
        let mut second: Arena<AnimalId, ()> = Arena::new();
        first.insert_with(|_| ());
        first.insert_with(|_| ());
        assert_eq!(second.insert_with(|_| ()), AnimalId(0));
    }

    #[test]
    fn missing_slot_is_none() {
        let arena: Arena<AnimalId, u8> = Arena::new();
        assert!(arena.get(AnimalId(3)).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn ids_display_with_label() {
        assert_eq!(AnimalId(7).to_string(), "animal#7");
        assert_eq!(HerdsmanId(2).to_string(), "herdsman#2");
    }
}
