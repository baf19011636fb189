//! Environment step.
use ndarray::ArrayD;

/// Output of a step of a vectorized environment.
///
/// Environments reset themselves at the end of an episode, so `obs[i]` is the first
/// observation of the next episode when `is_done[i]` is `true`.
pub struct Step {
    /// Observations, `[n_envs, obs_shape...]`.
    pub obs: ArrayD<f32>,

    /// Rewards, one per environment.
    pub reward: Vec<f32>,

    /// Flags denoting the end of episodes, one per environment.
    pub is_done: Vec<bool>,
}

impl Step {
    /// Constructs a [`Step`] object.
    pub fn new(obs: ArrayD<f32>, reward: Vec<f32>, is_done: Vec<bool>) -> Self {
        Self {
            obs,
            reward,
            is_done,
        }
    }

    /// Number of environments.
    #[inline]
    pub fn n_envs(&self) -> usize {
        self.reward.len()
    }
}
