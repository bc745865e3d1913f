use arena_proto::{Color, ThreadId};

use crate::memory::MemoryProjection;
use crate::threads::ThreadRegistry;

/// Per-render read of the core: thread color over memory color.
///
/// Nothing is cached, so every call reflects the latest mutation of either
/// projection.
#[derive(Debug, Clone, Copy)]
pub struct RenderView<'a> {
    memory: &'a MemoryProjection,
    threads: &'a ThreadRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCell<'a> {
    pub location: usize,
    pub color: Color,
    pub occupant: Option<&'a ThreadId>,
}

impl<'a> RenderView<'a> {
    pub fn new(memory: &'a MemoryProjection, threads: &'a ThreadRegistry) -> Self {
        Self { memory, threads }
    }

    pub fn core_size(&self) -> usize {
        self.memory.core_size()
    }

    pub fn effective_color(&self, location: usize) -> Option<Color> {
        match self.threads.resolve(location) {
            Some(color) => Some(color.clone()),
            None => self.memory.cell(location),
        }
    }

    pub fn resolve_cell(&self, location: usize) -> Option<ResolvedCell<'a>> {
        let color = self.effective_color(location)?;
        let occupant = self
            .threads
            .resolve(location)
            .and_then(|_| self.threads.occupant(location));
        Some(ResolvedCell {
            location,
            color,
            occupant,
        })
    }

    pub fn cells(&self) -> impl Iterator<Item = ResolvedCell<'a>> + '_ {
        (0..self.core_size()).filter_map(move |location| self.resolve_cell(location))
    }
}
