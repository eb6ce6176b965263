//! Replay of recorded explorations.

mod memory;
mod trace;

pub use memory::{MemoryPlayback, DEFAULT_MAX_CONSECUTIVE_SKIPS};
pub use trace::{PlaybackTrace, TraceEntry};
