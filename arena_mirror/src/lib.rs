//! Client-side mirror of a remote arena simulator.
//!
//! A [`Session`] owns one connection's projections: core memory, the thread
//! registry with its location index, the recent-events log and the
//! scoreboard. Messages are applied strictly in arrival order; the render
//! view resolves each cell on demand so readers never see stale caches.

pub mod color;
pub mod config;
pub mod events;
pub mod memory;
pub mod mirror;
pub mod scoreboard;
pub mod session;
pub mod threads;
pub mod transport;
pub mod view;

pub use arena_proto::{
    Batch, CellUpdate, Color, EventRecord, InboundMessage, RawEnvelope, ScoreEntry, ThreadId,
    ThreadMove,
};
pub use color::color_of;
pub use config::{load_mirror_config_from_env, ConfigError, MirrorConfig};
pub use events::{EventBatch, EventLog, DEFAULT_EVENT_LOG_CAPACITY};
pub use memory::{DiffOutcome, MemoryProjection};
pub use mirror::{ApplyOutcome, CoreMirror};
pub use scoreboard::Scoreboard;
pub use session::{Channel, ConnectionState, Credential, Session, SessionStatus};
pub use threads::{InvariantViolation, MoveBatchOutcome, MoveOutcome, ThreadEntry, ThreadRegistry};
pub use transport::{ChannelEvent, TcpChannel, TransportEvent, TransportSettings};
pub use view::{RenderView, ResolvedCell};
