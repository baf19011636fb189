//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use crate::error::AcerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Capacity in steps per environment.
    pub size: usize,

    /// Number of steps of a segment.
    pub n_steps: usize,

    /// Number of stacked frames.
    pub nstack: usize,

    /// Steps per environment required before sampling.
    pub replay_start: usize,

    /// Random seed for sampling.
    pub seed: u64,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            size: 5000,
            n_steps: 20,
            nstack: 4,
            replay_start: 1000,
            seed: 42,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity in steps per environment.
    pub fn size(mut self, v: usize) -> Self {
        self.size = v;
        self
    }

    /// Sets the number of steps of a segment.
    pub fn n_steps(mut self, v: usize) -> Self {
        self.n_steps = v;
        self
    }

    /// Sets the number of stacked frames.
    pub fn nstack(mut self, v: usize) -> Self {
        self.nstack = v;
        self
    }

    /// Sets the number of steps per environment required before sampling.
    pub fn replay_start(mut self, v: usize) -> Self {
        self.replay_start = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks the values.
    pub fn validate(&self) -> Result<()> {
        if self.n_steps == 0 || self.nstack == 0 {
            return Err(AcerError::InvalidConfig("n_steps and nstack must be positive".into()).into());
        }
        if self.size < self.n_steps {
            return Err(AcerError::InvalidConfig(format!(
                "buffer size ({}) is smaller than n_steps ({})",
                self.size, self.n_steps
            ))
            .into());
        }
        if self.replay_start > self.size {
            return Err(AcerError::InvalidConfig(format!(
                "replay_start ({}) exceeds buffer size ({})",
                self.replay_start, self.size
            ))
            .into());
        }
        Ok(())
    }

    /// Constructs [`ReplayBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ReplayBufferConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
