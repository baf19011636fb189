//! Configuration of ACER agent.
use crate::{opt::OptimizerConfig, util::OutDim, Device};
use acer_core::{error::AcerError, LrSchedule, TrainerConfig};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Acer`](super::Acer).
///
/// `C` is the configuration of the network giving policy logits and action-values,
/// e.g. [`MlpConfig`](crate::mlp::MlpConfig).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AcerConfig<C> {
    /// Configuration of the policy/value network.
    pub net_config: Option<C>,

    /// Discount factor.
    pub gamma: f64,

    /// Number of steps per environment in a segment.
    pub n_steps: usize,

    /// Number of stacked frames.
    pub nstack: usize,

    /// Number of threads. Not used by the CPU backend of candle, kept for configuration files.
    pub num_procs: usize,

    /// Weight of the action-value loss.
    pub q_coef: f64,

    /// Weight of the entropy bonus.
    pub ent_coef: f64,

    /// Threshold of the global norm of gradients, no clipping if `None`.
    pub max_grad_norm: Option<f64>,

    /// Initial learning rate.
    pub learning_rate: f64,

    /// Schedule of the learning rate.
    pub lr_schedule: LrSchedule,

    /// Decay of RMSprop.
    pub rprop_alpha: f64,

    /// Epsilon of RMSprop.
    pub rprop_epsilon: f64,

    /// Capacity of the replay buffer in steps per environment.
    pub buffer_size: usize,

    /// Mean number of off-policy steps per on-policy step. Replay is disabled if `0`.
    pub replay_ratio: f64,

    /// Number of steps per environment in the buffer before off-policy steps start.
    pub replay_start: usize,

    /// Truncation threshold `c` of importance ratios.
    pub correction_term: f64,

    /// If `true`, policy gradients are projected with the trust region.
    pub trust_region: bool,

    /// Decay of the polyak average of parameters.
    pub alpha: f64,

    /// Maximum KL divergence from the averaged policy.
    pub delta: f64,

    /// Verbosity of training logs.
    pub verbose: usize,

    /// Device of the networks.
    pub device: Option<Device>,
}

impl<C> Default for AcerConfig<C> {
    fn default() -> Self {
        Self {
            net_config: None,
            gamma: 0.99,
            n_steps: 20,
            nstack: 4,
            num_procs: 1,
            q_coef: 0.5,
            ent_coef: 0.01,
            max_grad_norm: Some(10.0),
            learning_rate: 7e-4,
            lr_schedule: LrSchedule::Linear,
            rprop_alpha: 0.99,
            rprop_epsilon: 1e-5,
            buffer_size: 5000,
            replay_ratio: 4.0,
            replay_start: 1000,
            correction_term: 10.0,
            trust_region: true,
            alpha: 0.99,
            delta: 1.0,
            verbose: 0,
            device: None,
        }
    }
}

impl<C> AcerConfig<C>
where
    C: OutDim,
{
    /// Sets the configuration of the network.
    pub fn net_config(mut self, v: C) -> Self {
        self.net_config = Some(v);
        self
    }

    /// Sets the output dimension of the network, i.e., the number of actions.
    pub fn out_dim(mut self, v: i64) -> Self {
        if let Some(net_config) = self.net_config.as_mut() {
            net_config.set_out_dim(v);
        }
        self
    }
}

impl<C> AcerConfig<C> {
    /// Discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Number of steps per environment in a segment.
    pub fn n_steps(mut self, v: usize) -> Self {
        self.n_steps = v;
        self
    }

    /// Number of stacked frames.
    pub fn nstack(mut self, v: usize) -> Self {
        self.nstack = v;
        self
    }

    /// Number of threads.
    pub fn num_procs(mut self, v: usize) -> Self {
        self.num_procs = v;
        self
    }

    /// Weight of the action-value loss.
    pub fn q_coef(mut self, v: f64) -> Self {
        self.q_coef = v;
        self
    }

    /// Weight of the entropy bonus.
    pub fn ent_coef(mut self, v: f64) -> Self {
        self.ent_coef = v;
        self
    }

    /// Gradient clipping.
    pub fn max_grad_norm(mut self, v: Option<f64>) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Initial learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        self.learning_rate = v;
        self
    }

    /// Learning rate schedule.
    pub fn lr_schedule(mut self, v: LrSchedule) -> Self {
        self.lr_schedule = v;
        self
    }

    /// Parameters of RMSprop.
    pub fn rprop(mut self, alpha: f64, epsilon: f64) -> Self {
        self.rprop_alpha = alpha;
        self.rprop_epsilon = epsilon;
        self
    }

    /// Capacity of the replay buffer.
    pub fn buffer_size(mut self, v: usize) -> Self {
        self.buffer_size = v;
        self
    }

    /// Replay ratio.
    pub fn replay_ratio(mut self, v: f64) -> Self {
        self.replay_ratio = v;
        self
    }

    /// Steps in the buffer before replay starts.
    pub fn replay_start(mut self, v: usize) -> Self {
        self.replay_start = v;
        self
    }

    /// Truncation threshold of importance ratios.
    pub fn correction_term(mut self, v: f64) -> Self {
        self.correction_term = v;
        self
    }

    /// Enables or disables the trust region.
    pub fn trust_region(mut self, v: bool) -> Self {
        self.trust_region = v;
        self
    }

    /// Decay of the polyak average.
    pub fn alpha(mut self, v: f64) -> Self {
        self.alpha = v;
        self
    }

    /// KL constraint of the trust region.
    pub fn delta(mut self, v: f64) -> Self {
        self.delta = v;
        self
    }

    /// Verbosity.
    pub fn verbose(mut self, v: usize) -> Self {
        self.verbose = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Checks values of the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.n_steps == 0 || self.nstack == 0 {
            return invalid(format!(
                "n_steps ({}) and nstack ({}) must be positive",
                self.n_steps, self.nstack
            ));
        }
        if !(0.0..1.0).contains(&self.alpha) {
            return invalid(format!("alpha ({}) must be in [0, 1)", self.alpha));
        }
        if self.replay_ratio < 0.0 {
            return invalid(format!("replay_ratio ({}) is negative", self.replay_ratio));
        }
        if self.replay_ratio > 0.0 {
            if self.buffer_size < self.n_steps {
                return invalid(format!(
                    "buffer_size ({}) is smaller than n_steps ({})",
                    self.buffer_size, self.n_steps
                ));
            }
            if self.replay_start > self.buffer_size {
                return invalid(format!(
                    "replay_start ({}) exceeds buffer_size ({})",
                    self.replay_start, self.buffer_size
                ));
            }
        }
        Ok(())
    }

    /// Configuration of RMSprop with the initial learning rate.
    pub fn opt_config(&self) -> OptimizerConfig {
        OptimizerConfig::RmsProp {
            lr: self.learning_rate,
            alpha: self.rprop_alpha,
            eps: self.rprop_epsilon,
        }
    }

    /// Configuration of the training loop.
    pub fn trainer_config(
        &self,
        total_timesteps: usize,
        seed: u64,
        log_interval: usize,
    ) -> TrainerConfig {
        TrainerConfig::default()
            .total_timesteps(total_timesteps)
            .log_interval(log_interval)
            .n_steps(self.n_steps)
            .nstack(self.nstack)
            .replay_ratio(self.replay_ratio)
            .replay_start(self.replay_start)
            .buffer_size(self.buffer_size)
            .learning_rate(self.learning_rate)
            .lr_schedule(self.lr_schedule)
            .seed(seed)
            .verbose(self.verbose)
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(AcerError::InvalidConfig(msg).into())
}

impl<C> AcerConfig<C>
where
    C: Serialize + for<'de> Deserialize<'de>,
{
    /// Constructs [`AcerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of ACER agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`AcerConfig`] to YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of ACER agent into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::MlpConfig;
    use tempdir::TempDir;

    #[test]
    fn test_serde_acer_config() -> Result<()> {
        let config = AcerConfig::default()
            .net_config(MlpConfig::new(8, vec![64, 64], 2))
            .out_dim(3)
            .n_steps(5)
            .trust_region(false)
            .max_grad_norm(None)
            .num_procs(2)
            .rprop(0.9, 1e-6)
            .device(Device::Cpu);
        assert_eq!(
            config.opt_config(),
            OptimizerConfig::RmsProp {
                lr: 7e-4,
                alpha: 0.9,
                eps: 1e-6
            }
        );

        let dir = TempDir::new("acer_config")?;
        let path = dir.path().join("acer_config.yaml");
        config.save(&path)?;
        let config_ = AcerConfig::<MlpConfig>::load(&path)?;
        assert_eq!(config, config_);
        assert_eq!(config_.net_config.unwrap().get_out_dim(), 3);
        Ok(())
    }

    #[test]
    fn test_validate() {
        let config = AcerConfig::<MlpConfig>::default();
        assert!(config.validate().is_ok());
        assert!(config.clone().alpha(1.0).validate().is_err());
        assert!(config.clone().n_steps(0).validate().is_err());
        assert!(config.clone().replay_start(6000).validate().is_err());
        assert!(config.replay_ratio(0.0).replay_start(6000).validate().is_ok());
    }
}
