//! Actor-critic with experience replay (ACER) in Rust.
//!
//! The workspace consists of the following crates:
//!
//! * [acer-core](acer_core) provides everything independent of a deep learning backend:
//!   records and recorders, the vectorized environment trait, frame stacking and rollout
//!   collection, the replay buffer, Retrace targets, learning rate schedules and the
//!   training loop.
//! * [acer-candle-agent](acer_candle_agent) implements the agent with
//!   [candle](https://crates.io/crates/candle-core): the policy/value network, the losses
//!   with the trust region, and saving/loading.
//! * [acer-tensorboard](acer_tensorboard) has `TensorboardRecorder` to write training
//!   metrics which can be shown in Tensorboard.
//!
//! See `examples/acer_identity.rs` for training on [`IdentityEnv`](acer_core::env::IdentityEnv).
pub use acer_candle_agent;
pub use acer_core;
pub use acer_tensorboard;
