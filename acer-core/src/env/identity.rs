//! Identity environment.
use crate::{ActionSpace, ObservationSpace, Step, VecEnv};
use anyhow::Result;
use log::info;
use ndarray::{Array2, ArrayD};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`IdentityEnv`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct IdentityEnvConfig {
    /// Number of environments.
    pub n_envs: usize,

    /// Number of actions, equal to the size of observations.
    pub dim: usize,

    /// Number of steps of an episode.
    pub ep_length: usize,

    /// Reward when the action equals the target.
    pub reward_match: f32,

    /// Reward otherwise.
    pub reward_mismatch: f32,
}

impl Default for IdentityEnvConfig {
    fn default() -> Self {
        Self {
            n_envs: 1,
            dim: 2,
            ep_length: 1,
            reward_match: 1.0,
            reward_mismatch: -1.0,
        }
    }
}

impl IdentityEnvConfig {
    /// Sets the number of environments.
    pub fn n_envs(mut self, v: usize) -> Self {
        self.n_envs = v;
        self
    }

    /// Sets the number of actions.
    pub fn dim(mut self, v: usize) -> Self {
        self.dim = v;
        self
    }

    /// Sets the length of episodes.
    pub fn ep_length(mut self, v: usize) -> Self {
        self.ep_length = v;
        self
    }

    /// Sets rewards for matching and non-matching actions.
    pub fn rewards(mut self, reward_match: f32, reward_mismatch: f32) -> Self {
        self.reward_match = reward_match;
        self.reward_mismatch = reward_mismatch;
        self
    }

    /// Constructs [`IdentityEnvConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`IdentityEnvConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Environments rewarding the action equal to a hidden target.
///
/// The observation is the one-hot vector of the target, which is redrawn uniformly
/// after every step. Each environment resets itself after `ep_length` steps.
pub struct IdentityEnv {
    config: IdentityEnvConfig,
    rng: StdRng,
    targets: Vec<usize>,
    ep_steps: Vec<usize>,
}

impl IdentityEnv {
    fn draw_targets(&mut self) {
        let dim = self.config.dim;
        let rng = &mut self.rng;
        self.targets.iter_mut().for_each(|t| *t = rng.gen_range(0..dim));
    }

    fn obs(&self) -> ArrayD<f32> {
        let targets = &self.targets;
        Array2::from_shape_fn((self.config.n_envs, self.config.dim), |(e, i)| {
            if targets[e] == i {
                1.0
            } else {
                0.0
            }
        })
        .into_dyn()
    }

    /// Current targets, i.e. the actions rewarded at the next step.
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }
}

impl VecEnv for IdentityEnv {
    type Config = IdentityEnvConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        info!("Build IdentityEnv with {:?}", config);
        Ok(Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed as u64),
            targets: vec![0; config.n_envs],
            ep_steps: vec![0; config.n_envs],
        })
    }

    fn n_envs(&self) -> usize {
        self.config.n_envs
    }

    fn observation_space(&self) -> ObservationSpace {
        ObservationSpace::new(vec![self.config.dim])
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete(self.config.dim)
    }

    fn reset(&mut self) -> Result<ArrayD<f32>> {
        self.ep_steps.iter_mut().for_each(|s| *s = 0);
        self.draw_targets();
        Ok(self.obs())
    }

    fn step(&mut self, actions: &[i64]) -> Result<Step> {
        if actions.len() != self.config.n_envs {
            return Err(crate::error::AcerError::shape_mismatch(
                "actions",
                &[self.config.n_envs],
                &[actions.len()],
            )
            .into());
        }

        let reward = actions
            .iter()
            .zip(self.targets.iter())
            .map(|(&a, &t)| {
                if a == t as i64 {
                    self.config.reward_match
                } else {
                    self.config.reward_mismatch
                }
            })
            .collect();
        let ep_length = self.config.ep_length;
        let is_done = self
            .ep_steps
            .iter_mut()
            .map(|s| {
                *s += 1;
                if *s >= ep_length {
                    *s = 0;
                    true
                } else {
                    false
                }
            })
            .collect();
        self.draw_targets();

        Ok(Step::new(self.obs(), reward, is_done))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_rewards_and_episodes() -> Result<()> {
        let config = IdentityEnvConfig::default().n_envs(3).dim(4).ep_length(2);
        let mut env = IdentityEnv::build(&config, 42)?;
        let obs = env.reset()?;
        assert_eq!(obs.shape(), &[3, 4]);

        let targets = env.targets().to_vec();
        for (e, &t) in targets.iter().enumerate() {
            assert_eq!(obs[[e, t]], 1.0);
            assert_eq!(obs.index_axis(ndarray::Axis(0), e).sum(), 1.0);
        }

        let actions = vec![targets[0] as i64, ((targets[1] + 1) % 4) as i64, targets[2] as i64];
        let step = env.step(&actions)?;
        assert_eq!(step.reward, vec![1.0, -1.0, 1.0]);
        assert_eq!(step.is_done, vec![false; 3]);

        let step = env.step(&[0, 0, 0])?;
        assert_eq!(step.is_done, vec![true; 3]);
        Ok(())
    }

    #[test]
    fn test_serde_identity_env_config() -> Result<()> {
        let config = IdentityEnvConfig::default().n_envs(4).rewards(1.0, 0.0);
        let dir = TempDir::new("identity_env_config")?;
        let path = dir.path().join("identity_env_config.yaml");
        config.save(&path)?;
        assert_eq!(config, IdentityEnvConfig::load(&path)?);
        Ok(())
    }
}
