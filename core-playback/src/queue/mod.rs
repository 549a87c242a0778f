//! # Play Queue
//!
//! Queue ordering ([`state`]) and the orchestrator that plays it
//! ([`orchestrator`]).

pub mod orchestrator;
pub mod state;

pub use orchestrator::{PlaybackOrchestrator, PlaybackStatus, QueueSnapshot};
pub use state::{QueueEntry, QueueState, RepeatMode, TrackEndAction};
