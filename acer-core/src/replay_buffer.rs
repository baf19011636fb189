//! Replay buffer of trajectory segments.
//!
//! The buffer keeps whole [`Segment`](crate::Segment)s in a ring of fixed capacity.
//! Frames are stored unstacked and stacked again on sampling, see [`stack_frames`].
mod base;
mod config;
pub use base::{stack_frames, ReplayBuffer};
pub use config::ReplayBufferConfig;
