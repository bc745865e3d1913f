//! Thread registry paired with a dense location index.
//!
//! `threads` maps each registered id to its last reported slot and color;
//! `index` maps each slot to the thread placed there. A thread is *placed*
//! when `index[entry.location] == id`. When another thread claims its slot it
//! becomes *orphaned*: still registered, no longer resolvable, until its own
//! next move or kill.
//!
//! Invariants kept by every mutation:
//! - every `Some(id)` in `index` names a registered thread whose entry points
//!   back at that slot;
//! - every entry location is inside the core.

use ahash::AHashMap;
use arena_proto::{Color, ThreadId, ThreadMove};
use thiserror::Error;

use crate::memory::slot_index;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadEntry {
    pub location: usize,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Applied {
        spawned: bool,
        displaced: Option<ThreadId>,
    },
    OutOfRange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveBatchOutcome {
    pub applied: usize,
    pub spawned: usize,
    pub displaced: usize,
    pub out_of_range: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("slot {location} names {id}, which is not registered")]
    UnknownOccupant { location: usize, id: ThreadId },
    #[error("slot {location} names {id}, whose entry points at {recorded}")]
    AsymmetricIndex {
        location: usize,
        id: ThreadId,
        recorded: usize,
    },
    #[error("{id} is recorded at {location}, outside a core of {core_size}")]
    EntryOutOfBounds {
        id: ThreadId,
        location: usize,
        core_size: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ThreadRegistry {
    threads: AHashMap<ThreadId, ThreadEntry>,
    index: Vec<Option<ThreadId>>,
}

impl ThreadRegistry {
    pub fn with_core_size(core_size: usize) -> Self {
        Self {
            threads: AHashMap::new(),
            index: vec![None; core_size],
        }
    }

    pub fn core_size(&self) -> usize {
        self.index.len()
    }

    /// Registered threads, orphans included.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Spawns or moves `id`. Its previous slot is cleared only if it still
    /// names `id`; whoever held `location` is displaced.
    pub fn apply_move(&mut self, id: ThreadId, location: i64, color: Color) -> MoveOutcome {
        let Some(slot) = slot_index(location, self.index.len()) else {
            return MoveOutcome::OutOfRange;
        };

        let previous = self.threads.get(&id).map(|entry| entry.location);
        if let Some(previous) = previous {
            self.vacate(previous, &id);
        }

        let displaced = self.index[slot]
            .replace(id.clone())
            .filter(|occupant| *occupant != id);
        self.threads.insert(
            id,
            ThreadEntry {
                location: slot,
                color,
            },
        );

        MoveOutcome::Applied {
            spawned: previous.is_none(),
            displaced,
        }
    }

    /// Removes `id`. Unknown ids are ignored; returns whether an entry existed.
    pub fn apply_kill(&mut self, id: &ThreadId) -> bool {
        match self.threads.remove(id) {
            Some(entry) => {
                self.vacate(entry.location, id);
                true
            }
            None => false,
        }
    }

    pub fn apply_moves<I>(&mut self, moves: I) -> MoveBatchOutcome
    where
        I: IntoIterator<Item = ThreadMove>,
    {
        let mut outcome = MoveBatchOutcome::default();
        for ThreadMove {
            id,
            location,
            color,
        } in moves
        {
            match self.apply_move(id, location, color) {
                MoveOutcome::Applied { spawned, displaced } => {
                    outcome.applied += 1;
                    outcome.spawned += usize::from(spawned);
                    outcome.displaced += usize::from(displaced.is_some());
                }
                MoveOutcome::OutOfRange => outcome.out_of_range += 1,
            }
        }
        outcome
    }

    /// Returns how many of `ids` were registered.
    pub fn apply_kills<'a, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a ThreadId>,
    {
        ids.into_iter().filter(|id| self.apply_kill(id)).count()
    }

    /// Color of the thread placed at `location`, if any.
    pub fn resolve(&self, location: usize) -> Option<&Color> {
        let id = self.index.get(location)?.as_ref()?;
        let entry = self.threads.get(id)?;
        (entry.location == location).then_some(&entry.color)
    }

    pub fn occupant(&self, location: usize) -> Option<&ThreadId> {
        self.index.get(location)?.as_ref()
    }

    pub fn entry(&self, id: &ThreadId) -> Option<&ThreadEntry> {
        self.threads.get(id)
    }

    /// Slot `id` currently occupies; `None` for unknown or orphaned threads.
    pub fn location_of(&self, id: &ThreadId) -> Option<usize> {
        let entry = self.threads.get(id)?;
        (self.occupant(entry.location) == Some(id)).then_some(entry.location)
    }

    pub fn is_orphaned(&self, id: &ThreadId) -> bool {
        self.threads.contains_key(id) && self.location_of(id).is_none()
    }

    pub fn orphan_count(&self) -> usize {
        self.threads
            .keys()
            .filter(|id| self.is_orphaned(id))
            .count()
    }

    /// Placed threads in location order.
    pub fn placed(&self) -> impl Iterator<Item = (&ThreadId, &ThreadEntry)> + '_ {
        self.index.iter().flatten().filter_map(|id| {
            let entry = self.threads.get(id)?;
            Some((id, entry))
        })
    }

    pub fn registered(&self) -> impl Iterator<Item = (&ThreadId, &ThreadEntry)> + '_ {
        self.threads.iter()
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (location, occupant) in self.index.iter().enumerate() {
            let Some(id) = occupant else {
                continue;
            };
            match self.threads.get(id) {
                None => {
                    return Err(InvariantViolation::UnknownOccupant {
                        location,
                        id: id.clone(),
                    })
                }
                Some(entry) if entry.location != location => {
                    return Err(InvariantViolation::AsymmetricIndex {
                        location,
                        id: id.clone(),
                        recorded: entry.location,
                    })
                }
                Some(_) => {}
            }
        }
        for (id, entry) in &self.threads {
            if entry.location >= self.index.len() {
                return Err(InvariantViolation::EntryOutOfBounds {
                    id: id.clone(),
                    location: entry.location,
                    core_size: self.index.len(),
                });
            }
        }
        Ok(())
    }

    fn vacate(&mut self, location: usize, id: &ThreadId) {
        if let Some(slot) = self.index.get_mut(location) {
            if slot.as_ref() == Some(id) {
                *slot = None;
            }
        }
    }
}
