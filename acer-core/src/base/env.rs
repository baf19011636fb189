//! Vectorized environment.
use super::Step;
use crate::{ActionSpace, ObservationSpace};
use anyhow::Result;
use ndarray::ArrayD;

/// A set of `n_envs` environments stepped in lockstep.
pub trait VecEnv {
    /// Configurations.
    type Config: Clone;

    /// Builds environments with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Number of environments.
    fn n_envs(&self) -> usize;

    /// Observation space of a single environment.
    fn observation_space(&self) -> ObservationSpace;

    /// Action space of a single environment.
    fn action_space(&self) -> ActionSpace;

    /// Resets all environments and returns observations, `[n_envs, obs_shape...]`.
    fn reset(&mut self) -> Result<ArrayD<f32>>;

    /// Performs a step with one action per environment.
    ///
    /// Environments whose episode ended are reset before returning.
    fn step(&mut self, actions: &[i64]) -> Result<Step>;
}
