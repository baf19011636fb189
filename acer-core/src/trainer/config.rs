//! Configuration of [`Trainer`](super::Trainer).
use crate::{error::AcerError, LrSchedule};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Number of environment steps, summed over environments, to train for.
    pub total_timesteps: usize,

    /// Interval of logging in gradient steps on on-policy batches.
    pub log_interval: usize,

    /// Number of steps per environment in a segment.
    pub n_steps: usize,

    /// Number of stacked frames.
    pub nstack: usize,

    /// Mean number of off-policy gradient steps per on-policy one.
    /// Replay is disabled when `0`.
    pub replay_ratio: f64,

    /// Steps per environment in the replay buffer before off-policy steps start.
    pub replay_start: usize,

    /// Capacity of the replay buffer in steps per environment.
    pub buffer_size: usize,

    /// Initial learning rate.
    pub learning_rate: f64,

    /// Learning rate schedule over `total_timesteps`.
    pub lr_schedule: LrSchedule,

    /// Random seed of replay sampling.
    pub seed: u64,

    /// Logging is enabled when `1` or more.
    pub verbose: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            total_timesteps: 0,
            log_interval: 100,
            n_steps: 20,
            nstack: 4,
            replay_ratio: 4.0,
            replay_start: 1000,
            buffer_size: 5000,
            learning_rate: 7e-4,
            lr_schedule: LrSchedule::Linear,
            seed: 0,
            verbose: 0,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of environment steps to train for.
    pub fn total_timesteps(mut self, v: usize) -> Self {
        self.total_timesteps = v;
        self
    }

    /// Sets the interval of logging.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    /// Sets the number of steps per environment in a segment.
    pub fn n_steps(mut self, v: usize) -> Self {
        self.n_steps = v;
        self
    }

    /// Sets the number of stacked frames.
    pub fn nstack(mut self, v: usize) -> Self {
        self.nstack = v;
        self
    }

    /// Sets the replay ratio.
    pub fn replay_ratio(mut self, v: f64) -> Self {
        self.replay_ratio = v;
        self
    }

    /// Sets the number of steps required before replay.
    pub fn replay_start(mut self, v: usize) -> Self {
        self.replay_start = v;
        self
    }

    /// Sets the capacity of the replay buffer.
    pub fn buffer_size(mut self, v: usize) -> Self {
        self.buffer_size = v;
        self
    }

    /// Sets the initial learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        self.learning_rate = v;
        self
    }

    /// Sets the learning rate schedule.
    pub fn lr_schedule(mut self, v: LrSchedule) -> Self {
        self.lr_schedule = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the verbosity.
    pub fn verbose(mut self, v: usize) -> Self {
        self.verbose = v;
        self
    }

    /// Checks the values.
    pub fn validate(&self) -> Result<()> {
        if self.n_steps == 0 || self.nstack == 0 || self.log_interval == 0 {
            return Err(AcerError::InvalidConfig(
                "n_steps, nstack and log_interval must be positive".to_string(),
            )
            .into());
        }
        if !(self.replay_ratio >= 0.0) {
            return Err(AcerError::InvalidConfig(format!(
                "replay_ratio must be non-negative, got {}",
                self.replay_ratio
            ))
            .into());
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .total_timesteps(10000)
            .lr_schedule(LrSchedule::DoubleMiddleDrop)
            .replay_ratio(0.0);

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        assert_eq!(config, TrainerConfig::load(&path)?);
        Ok(())
    }
}
