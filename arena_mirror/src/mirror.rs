use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use arena_proto::{Color, InboundMessage, ThreadId};
use tracing::{debug, info, trace, warn};

use crate::events::EventLog;
use crate::memory::MemoryProjection;
use crate::scoreboard::Scoreboard;
use crate::threads::ThreadRegistry;
use crate::view::RenderView;

/// Items applied and dropped while routing one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub dropped: usize,
}

/// Every projection derived from one connection's stream.
///
/// Memory is absent until the first snapshot; cell diffs and thread moves
/// that arrive earlier are dropped.
#[derive(Debug, Clone)]
pub struct CoreMirror {
    memory: Option<MemoryProjection>,
    threads: ThreadRegistry,
    events: EventLog,
    scoreboard: Scoreboard,
}

impl CoreMirror {
    pub fn new(event_log_capacity: usize) -> Self {
        Self {
            memory: None,
            threads: ThreadRegistry::default(),
            events: EventLog::with_capacity(event_log_capacity),
            scoreboard: Scoreboard::default(),
        }
    }

    /// Consumes the mirror and returns it with `message` applied.
    pub fn reduce(mut self, message: InboundMessage) -> Self {
        self.apply(message);
        self
    }

    /// Routes a projection message. Lifecycle messages are ignored here.
    pub fn apply(&mut self, message: InboundMessage) -> ApplyOutcome {
        let rejected = message.rejected();
        let mut outcome = match message {
            InboundMessage::Snapshot(bytes) => self.apply_snapshot(bytes),
            InboundMessage::CellDiffs(batch) => match self.memory.as_mut() {
                Some(memory) => {
                    let diff = memory.apply_cell_diffs(&batch.items);
                    if diff.out_of_range > 0 {
                        trace!(
                            target: "arena_mirror::mirror",
                            dropped = diff.out_of_range,
                            "cell_diffs.out_of_range"
                        );
                    }
                    ApplyOutcome {
                        applied: diff.applied,
                        dropped: diff.out_of_range,
                    }
                }
                None => {
                    debug!(
                        target: "arena_mirror::mirror",
                        count = batch.len(),
                        "cell_diffs.dropped=before_snapshot"
                    );
                    ApplyOutcome {
                        applied: 0,
                        dropped: batch.len(),
                    }
                }
            },
            InboundMessage::ThreadMoves(batch) => {
                if self.memory.is_none() {
                    debug!(
                        target: "arena_mirror::mirror",
                        count = batch.len(),
                        "thread_moves.dropped=before_snapshot"
                    );
                    ApplyOutcome {
                        applied: 0,
                        dropped: batch.len(),
                    }
                } else {
                    let moves = self.threads.apply_moves(batch.items);
                    if moves.displaced > 0 {
                        debug!(
                            target: "arena_mirror::mirror",
                            displaced = moves.displaced,
                            "thread_moves.displaced"
                        );
                    }
                    ApplyOutcome {
                        applied: moves.applied,
                        dropped: moves.out_of_range,
                    }
                }
            }
            InboundMessage::ThreadKills(batch) => {
                let killed = self.threads.apply_kills(&batch.items);
                trace!(
                    target: "arena_mirror::mirror",
                    killed,
                    unknown = batch.len() - killed,
                    "thread_kills.applied"
                );
                ApplyOutcome {
                    applied: killed,
                    dropped: 0,
                }
            }
            InboundMessage::Events(records) => {
                let count = records.len();
                self.events.append(records);
                ApplyOutcome {
                    applied: count,
                    dropped: 0,
                }
            }
            InboundMessage::Scoreboard(batch) => {
                let count = batch.len();
                self.scoreboard.replace(batch.items);
                ApplyOutcome {
                    applied: count,
                    dropped: 0,
                }
            }
            InboundMessage::Connect | InboundMessage::Disconnect => ApplyOutcome::default(),
        };
        outcome.dropped += rejected;
        outcome
    }

    fn apply_snapshot(&mut self, bytes: Vec<u8>) -> ApplyOutcome {
        let core_size = bytes.len();
        if self.threads.core_size() != core_size {
            if !self.threads.is_empty() {
                warn!(
                    target: "arena_mirror::mirror",
                    previous = self.threads.core_size(),
                    core_size,
                    discarded = self.threads.len(),
                    "snapshot.resized_core"
                );
            }
            self.threads = ThreadRegistry::with_core_size(core_size);
        }
        match self.memory.as_mut() {
            Some(memory) => memory.initialize(bytes),
            None => self.memory = Some(MemoryProjection::from_snapshot(bytes)),
        }
        info!(target: "arena_mirror::mirror", core_size, "snapshot.applied");
        ApplyOutcome {
            applied: core_size,
            dropped: 0,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.memory.is_some()
    }

    pub fn core_size(&self) -> usize {
        self.memory.as_ref().map_or(0, MemoryProjection::core_size)
    }

    pub fn memory(&self) -> Option<&MemoryProjection> {
        self.memory.as_ref()
    }

    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn view(&self) -> Option<RenderView<'_>> {
        self.memory
            .as_ref()
            .map(|memory| RenderView::new(memory, &self.threads))
    }

    pub fn effective_color(&self, location: usize) -> Option<Color> {
        self.view()?.effective_color(location)
    }

    pub fn occupant(&self, location: usize) -> Option<&ThreadId> {
        self.threads.resolve(location)?;
        self.threads.occupant(location)
    }

    /// Order-independent fingerprint of the projected state, for comparing
    /// two mirrors fed the same stream.
    pub fn digest(&self) -> u64 {
        let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
        match &self.memory {
            Some(memory) => {
                1u8.hash(&mut hasher);
                memory.bytes().hash(&mut hasher);
            }
            None => 0u8.hash(&mut hasher),
        }
        let mut threads: Vec<_> = self.threads.registered().collect();
        threads.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        threads.hash(&mut hasher);
        for batch in self.events.batches() {
            for line in batch.lines() {
                line.hash(&mut hasher);
            }
            batch.len().hash(&mut hasher);
        }
        self.scoreboard.len().hash(&mut hasher);
        for entry in self.scoreboard.entries() {
            entry.label.hash(&mut hasher);
            entry.color.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl Default for CoreMirror {
    fn default() -> Self {
        Self::new(crate::events::DEFAULT_EVENT_LOG_CAPACITY)
    }
}
