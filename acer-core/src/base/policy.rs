//! Policy.
use anyhow::Result;
use ndarray::{Array2, ArrayD};

/// Output of [`Policy::step`].
pub struct PolicyStep {
    /// Sampled actions, one per environment.
    pub actions: Vec<i64>,

    /// Action probabilities of the behaviour policy, `[n_envs, n_actions]`.
    pub mus: Array2<f32>,

    /// Recurrent state after the step, `None` for feed-forward policies.
    pub state: Option<ArrayD<f32>>,
}

/// A stochastic policy sampling actions for a vectorized environment.
pub trait Policy {
    /// Recurrent state at the beginning of training.
    fn initial_state(&self) -> Option<ArrayD<f32>>;

    /// Samples actions given stacked observations `[n_envs, stacked_shape...]`.
    ///
    /// `mask[i]` is `true` if the previous step of environment `i` ended an episode.
    fn step(
        &mut self,
        obs: &ArrayD<f32>,
        state: Option<&ArrayD<f32>>,
        mask: &[bool],
    ) -> Result<PolicyStep>;
}
