#![warn(missing_docs)]
//! Backend-independent building blocks of the ACER agent.
//!
//! This crate collects everything in actor-critic with experience replay that does not
//! depend on a deep learning backend:
//!
//! * [`RolloutRunner`] steps a vectorized environment ([`VecEnv`]) for a fixed number of
//!   steps with frame stacking and returns a [`Segment`].
//! * [`ReplayBuffer`](replay_buffer::ReplayBuffer) keeps recent segments and re-stacks the
//!   stored frames on sampling, so replayed batches look exactly like on-policy ones.
//! * [`q_retrace`] computes Retrace targets.
//! * [`Scheduler`] gives the learning rate, [`EpisodeStats`] tracks episode returns.
//! * [`Trainer`] runs the on-policy/off-policy training loop for an [`Agent`].
//!
//! Agents themselves live in backend crates, e.g. `acer-candle-agent`.
pub mod env;
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{Agent, Policy, PolicyStep, Step, VecEnv};

mod episode_stats;
pub use episode_stats::EpisodeStats;

mod lr_schedule;
pub use lr_schedule::{LrSchedule, Scheduler};

mod retrace;
pub use retrace::q_retrace;

mod runner;
pub use runner::{FrameStack, RolloutRunner};

mod segment;
pub use segment::{Segment, TrainBatch};

mod space;
pub use space::{ActionSpace, ObservationSpace};

mod trainer;
pub use trainer::{Trainer, TrainerConfig};
