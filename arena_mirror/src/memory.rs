use arena_proto::{CellUpdate, Color};

use crate::color::color_of;

/// Converts a wire location into a slot when it lies inside `[0, core_size)`.
pub fn slot_index(location: i64, core_size: usize) -> Option<usize> {
    usize::try_from(location)
        .ok()
        .filter(|slot| *slot < core_size)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    pub applied: usize,
    pub out_of_range: usize,
}

/// Raw core bytes, sized once by the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryProjection {
    cells: Vec<u8>,
}

impl MemoryProjection {
    pub fn from_snapshot(bytes: Vec<u8>) -> Self {
        Self { cells: bytes }
    }

    /// Replaces the whole projection, resizing the core.
    pub fn initialize(&mut self, bytes: Vec<u8>) {
        self.cells = bytes;
    }

    pub fn core_size(&self) -> usize {
        self.cells.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.cells
    }

    pub fn byte(&self, location: usize) -> Option<u8> {
        self.cells.get(location).copied()
    }

    pub fn cell(&self, location: usize) -> Option<Color> {
        self.byte(location).map(color_of)
    }

    /// Applies updates in order; later writes to the same slot win.
    pub fn apply_cell_diffs(&mut self, updates: &[CellUpdate]) -> DiffOutcome {
        let mut outcome = DiffOutcome::default();
        for update in updates {
            match slot_index(update.location(), self.cells.len()) {
                Some(slot) => {
                    self.cells[slot] = update.value();
                    outcome.applied += 1;
                }
                None => outcome.out_of_range += 1,
            }
        }
        outcome
    }
}
