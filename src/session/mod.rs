//! Session actors: single-writer state for every tutoring session.
//!
//! Each session is owned by exactly one actor draining a serialized command
//! queue; operations against different sessions proceed fully in parallel
//! with no shared mutable state between them.

mod actor;
mod actor_types;
mod directory;
mod handle;
mod snapshot;

pub use actor::SessionActor;
pub use actor_types::{
    ActorConfig, ActorError, SessionCommand, SessionMetadata, SessionView, CHANNEL_CAPACITY,
    PERSIST_ATTEMPTS, PERSIST_RETRY_BASE,
};
pub use directory::{SessionDirectory, SweepStats};
pub use handle::SessionHandle;
pub use snapshot::SessionSnapshot;
