//! ACER agent implemented with candle.
use super::{
    config::AcerConfig,
    loss::{obs_tensor, probs, AcerLoss, AcerStats, LossConfig},
    model::AcerModel,
};
use crate::{
    model::SubModel1,
    util::{arrayd_to_tensor, clip_grad_norm, global_norm, tensor_to_arrayd, OutDim},
    Device,
};
use acer_core::{
    error::AcerError, record::AggregateRecorder, record::Record, ActionSpace, Agent,
    ObservationSpace, Policy, PolicyStep, TrainBatch, Trainer, VecEnv,
};
use anyhow::{Context, Result};
use candle_core::{Tensor, Var, D};
use candle_nn::VarMap;
use itertools::Itertools;
use log::{info, trace};
use ndarray::{Array2, ArrayD, Ix2};
use rand::{
    distributions::{Distribution, WeightedIndex},
    rngs::SmallRng,
    SeedableRng,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize)]
struct SavedParam {
    name: String,
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[derive(Debug, Deserialize, Serialize)]
struct SavedAcer<C> {
    config: AcerConfig<C>,
    observation_space: ObservationSpace,
    action_space: ActionSpace,
    n_envs: usize,
    params: Vec<SavedParam>,
    polyak_params: Vec<SavedParam>,
}

/// Variables of a [`VarMap`] sorted by name.
fn sorted_vars(varmap: &VarMap) -> Result<Vec<(String, Var)>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(data
        .iter()
        .map(|(name, var)| (name.clone(), var.clone()))
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .collect())
}

fn export_params(varmap: &VarMap) -> Result<Vec<SavedParam>> {
    sorted_vars(varmap)?
        .into_iter()
        .map(|(name, var)| {
            Ok(SavedParam {
                name,
                shape: var.dims().to_vec(),
                data: var.as_tensor().flatten_all()?.to_vec1::<f32>()?,
            })
        })
        .collect()
}

/// Assigns parameter values by position in the name order.
fn import_params(varmap: &VarMap, params: Vec<SavedParam>) -> Result<()> {
    let vars = sorted_vars(varmap)?;
    if vars.len() != params.len() {
        return Err(
            AcerError::shape_mismatch("number of parameters", &[vars.len()], &[params.len()])
                .into(),
        );
    }
    for ((name, var), param) in vars.into_iter().zip(params.into_iter()) {
        if var.dims() != &param.shape[..] {
            return Err(AcerError::shape_mismatch(&name, var.dims(), &param.shape).into());
        }
        let t = Tensor::from_vec(param.data, param.shape, var.device())?;
        var.set(&t)?;
    }
    Ok(())
}

/// Actor-critic with experience replay.
///
/// The policy samples actions from the softmax of the network's logits. Every gradient
/// step follows [`AcerLoss`]; the averaged network is updated after each step.
///
/// ```no_run
/// # use anyhow::Result;
/// use acer_candle_agent::{acer::{Acer, AcerConfig}, mlp::{Mlp, MlpConfig}};
/// use acer_core::{env::{IdentityEnv, IdentityEnvConfig}, record::AggregateRecorder,
///     record::NullRecorder, VecEnv};
///
/// # fn main() -> Result<()> {
/// let env = IdentityEnv::build(&IdentityEnvConfig::default().n_envs(4), 0)?;
/// let config = AcerConfig::default()
///     .net_config(MlpConfig::new(2, vec![32], 2))
///     .n_steps(5)
///     .nstack(1);
/// let mut agent = Acer::<Mlp>::build(config, env.observation_space(), env.action_space(), 4)?;
/// let mut recorder: Box<dyn AggregateRecorder> = Box::new(NullRecorder::new());
/// agent.learn(env, 10_000, Some(42), 100, &mut recorder)?;
/// # Ok(())
/// # }
/// ```
pub struct Acer<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    config: AcerConfig<P::Config>,
    observation_space: ObservationSpace,
    action_space: ActionSpace,
    n_envs: usize,
    model: AcerModel<P>,
    loss_config: LossConfig,
    rng: SmallRng,
    n_opts: usize,
}

impl<P> Acer<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs the agent for `n_envs` environments with the given spaces.
    ///
    /// The output dimension of the network is set to the number of actions.
    pub fn build(
        config: AcerConfig<P::Config>,
        observation_space: ObservationSpace,
        action_space: ActionSpace,
        n_envs: usize,
    ) -> Result<Self> {
        config.validate()?;
        if n_envs == 0 {
            return Err(AcerError::InvalidConfig("n_envs must be positive".into()).into());
        }
        let mut net_config = config
            .net_config
            .clone()
            .context("net_config is not set")?;
        net_config.set_out_dim(action_space.n() as _);
        let device = config.device.unwrap_or_default().to_candle()?;
        let model = AcerModel::build(net_config, config.opt_config(), device)?;
        let loss_config = LossConfig {
            gamma: config.gamma as f32,
            q_coef: config.q_coef,
            ent_coef: config.ent_coef,
            correction_term: config.correction_term,
            delta: config.delta,
        };
        info!(
            "Build ACER agent, n_envs = {}, observation = {:?}, actions = {:?}",
            n_envs, observation_space.shape, action_space
        );

        Ok(Self {
            config,
            observation_space,
            action_space,
            n_envs,
            model,
            loss_config,
            rng: SmallRng::seed_from_u64(0),
            n_opts: 0,
        })
    }

    /// Configuration of the agent.
    pub fn config(&self) -> &AcerConfig<P::Config> {
        &self.config
    }

    /// The network and its averaged copy.
    pub fn model(&self) -> &AcerModel<P> {
        &self.model
    }

    /// Number of gradient steps done so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Trains the agent for `total_timesteps` environment steps.
    ///
    /// `seed` seeds the action sampler, the replay buffer and the replay ratio sampler.
    pub fn learn<E: VecEnv>(
        &mut self,
        env: E,
        total_timesteps: usize,
        seed: Option<u64>,
        log_interval: usize,
        recorder: &mut Box<dyn AggregateRecorder>,
    ) -> Result<&mut Self> {
        if env.n_envs() != self.n_envs {
            return Err(AcerError::shape_mismatch("n_envs", &[self.n_envs], &[env.n_envs()]).into());
        }
        if env.observation_space() != self.observation_space {
            return Err(AcerError::shape_mismatch(
                "observation space",
                &self.observation_space.shape,
                &env.observation_space().shape,
            )
            .into());
        }
        if env.action_space() != self.action_space {
            return Err(AcerError::shape_mismatch(
                "action space",
                &[self.action_space.n()],
                &[env.action_space().n()],
            )
            .into());
        }
        if let Some(seed) = seed {
            self.rng = SmallRng::seed_from_u64(seed);
        }

        let config = self
            .config
            .trainer_config(total_timesteps, seed.unwrap_or(0), log_interval);
        let mut trainer = Trainer::build(config)?;
        trainer.train(env, self, recorder)?;
        Ok(self)
    }

    fn probs(&self, obs: &ArrayD<f32>) -> Result<Tensor> {
        // A single observation is given a batch axis
        let stacked_shape = self.observation_space.stacked_shape(self.config.nstack);
        let add_batch_dim = obs.shape() == &stacked_shape[..];
        let obs = arrayd_to_tensor::<f32, f32>(obs, add_batch_dim)?;
        let (logits, _) = self.model.forward(&obs)?;
        probs(&logits)
    }

    /// Returns action probabilities given stacked observations.
    ///
    /// `state` and `mask` are for recurrent policies and ignored by feed-forward networks.
    pub fn action_probability(
        &self,
        obs: &ArrayD<f32>,
        _state: Option<&ArrayD<f32>>,
        _mask: Option<&[bool]>,
    ) -> Result<Array2<f32>> {
        let probs = self.probs(obs)?;
        Ok(tensor_to_arrayd::<f32>(&probs, false)?.into_dimensionality::<Ix2>()?)
    }

    /// Returns actions and the recurrent state given stacked observations.
    ///
    /// If `deterministic` is `true`, the most probable actions are taken.
    pub fn predict(
        &mut self,
        obs: &ArrayD<f32>,
        state: Option<&ArrayD<f32>>,
        mask: Option<&[bool]>,
        deterministic: bool,
    ) -> Result<(Vec<i64>, Option<ArrayD<f32>>)> {
        let actions = if deterministic {
            let probs = self.probs(obs)?;
            probs
                .argmax(D::Minus1)?
                .to_vec1::<u32>()?
                .into_iter()
                .map(|a| a as i64)
                .collect()
        } else {
            let probs = self.action_probability(obs, state, mask)?;
            self.sample(&probs)?
        };
        Ok((actions, state.cloned()))
    }

    fn sample(&mut self, probs: &Array2<f32>) -> Result<Vec<i64>> {
        let rng = &mut self.rng;
        probs
            .outer_iter()
            .map(|p| -> Result<i64> {
                Ok(WeightedIndex::<f32>::new(p.iter())?.sample(rng) as i64)
            })
            .collect()
    }

    /// Performs a gradient step with the given learning rate.
    pub fn train_step(&mut self, batch: &TrainBatch, lr: f64) -> Result<AcerStats> {
        let obs = obs_tensor(batch, self.model.device())?;
        let (logits, q_all) = self.model.forward(&obs)?;
        let f_all = probs(&logits)?;
        let loss = AcerLoss::new(&f_all, &q_all, batch, &self.loss_config)?;
        let vars = self.model.vars();

        let (mut grads, trust_region) = if self.config.trust_region {
            let (logits_polyak, _) = self.model.forward_polyak(&obs)?;
            let f_polyak = probs(&logits_polyak)?;
            let (grads, stats) =
                loss.trust_region_grads(&f_polyak, batch, &self.loss_config, &vars)?;
            (grads, Some(stats))
        } else {
            (loss.grads()?, None)
        };

        let norm_grads = match self.config.max_grad_norm {
            Some(max_norm) => clip_grad_norm(&mut grads, &vars, max_norm)?,
            None => global_norm(&grads, &vars)?,
        };
        self.model.step(&grads, lr)?;
        self.model.update_polyak(self.config.alpha)?;
        self.n_opts += 1;

        let stats = AcerStats {
            norm_grads,
            trust_region,
            ..loss.stats()?
        };
        trace!("n_opts = {}, {:?}", self.n_opts, stats);
        Ok(stats)
    }

    /// Saves hyperparameters, spaces and parameters into a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let saved = SavedAcer {
            config: self.config.clone(),
            observation_space: self.observation_space.clone(),
            action_space: self.action_space,
            n_envs: self.n_envs,
            params: export_params(self.model.varmap())?,
            polyak_params: export_params(self.model.polyak_varmap())?,
        };
        let file = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(file, &saved)?;
        info!("Save ACER agent to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads an agent saved with [`Acer::save`].
    ///
    /// The agent is rebuilt from the saved configuration, on `device` if given.
    /// Optimizer state is not restored.
    pub fn load(path: impl AsRef<Path>, device: Option<Device>) -> Result<Self> {
        let file = BufReader::new(File::open(&path)?);
        let mut saved: SavedAcer<P::Config> = bincode::deserialize_from(file)?;
        if let Some(device) = device {
            saved.config.device = Some(device);
        }
        let agent = Self::build(
            saved.config,
            saved.observation_space,
            saved.action_space,
            saved.n_envs,
        )?;
        import_params(agent.model.varmap(), saved.params)?;
        import_params(agent.model.polyak_varmap(), saved.polyak_params)?;
        info!("Load ACER agent from {:?}", path.as_ref());
        Ok(agent)
    }
}

impl<P> Policy for Acer<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn initial_state(&self) -> Option<ArrayD<f32>> {
        None
    }

    fn step(
        &mut self,
        obs: &ArrayD<f32>,
        state: Option<&ArrayD<f32>>,
        mask: &[bool],
    ) -> Result<PolicyStep> {
        let mus = self.action_probability(obs, state, Some(mask))?;
        let actions = self.sample(&mus)?;
        Ok(PolicyStep {
            actions,
            mus,
            state: state.cloned(),
        })
    }
}

impl<P> Agent for Acer<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn opt_with_record(&mut self, batch: &TrainBatch, lr: f64) -> Result<Record> {
        Ok(self.train_step(batch, lr)?.to_record())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};
    use acer_core::{
        env::{IdentityEnv, IdentityEnvConfig},
        RolloutRunner,
    };
    use tempdir::TempDir;

    fn agent(n_envs: usize, trust_region: bool) -> Result<Acer<Mlp>> {
        let config = AcerConfig::default()
            .net_config(MlpConfig::new(2, vec![16], 0))
            .n_steps(4)
            .nstack(1)
            .trust_region(trust_region)
            .alpha(0.9)
            .device(Device::Cpu);
        Acer::build(
            config,
            ObservationSpace::new(vec![2]),
            ActionSpace::Discrete(2),
            n_envs,
        )
    }

    fn batch(agent: &mut Acer<Mlp>, n_envs: usize) -> Result<TrainBatch> {
        let env = IdentityEnv::build(&IdentityEnvConfig::default().n_envs(n_envs), 0)?;
        let mut runner = RolloutRunner::new(env, &*agent, 4, 1)?;
        TrainBatch::from_segment(&runner.run(agent)?)
    }

    fn values(varmap: &VarMap) -> Result<Vec<Vec<f32>>> {
        Ok(export_params(varmap)?.into_iter().map(|p| p.data).collect())
    }

    #[test]
    fn test_polyak_after_step() -> Result<()> {
        for &trust_region in [true, false].iter() {
            let mut agent = agent(2, trust_region)?;
            let batch = batch(&mut agent, 2)?;
            let live_0 = values(agent.model().varmap())?;
            let shadow_0 = values(agent.model().polyak_varmap())?;
            assert_eq!(live_0, shadow_0);

            let stats = agent.train_step(&batch, 1e-2)?;
            assert_eq!(stats.trust_region.is_some(), trust_region);
            let live_1 = values(agent.model().varmap())?;
            let shadow_1 = values(agent.model().polyak_varmap())?;
            assert_ne!(live_0, live_1);

            for ((s0, l1), s1) in shadow_0.iter().zip(live_1.iter()).zip(shadow_1.iter()) {
                for ((s0, l1), s1) in s0.iter().zip(l1.iter()).zip(s1.iter()) {
                    assert!((0.9 * s0 + 0.1 * l1 - s1).abs() < 1e-5);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_record_keys() -> Result<()> {
        let mut agent = agent(2, true)?;
        let batch = batch(&mut agent, 2)?;
        let record = agent.opt_with_record(&batch, 1e-3)?;
        for key in [
            "loss",
            "loss_q",
            "entropy",
            "loss_policy",
            "loss_f",
            "loss_bc",
            "explained_variance",
            "norm_grads",
            "norm_grads_q",
            "norm_grads_policy",
            "avg_norm_grads_f",
            "avg_norm_k",
            "avg_norm_g",
            "avg_norm_k_dot_g",
            "avg_norm_adj",
        ]
        .iter()
        {
            assert!(record.get_scalar(key).is_ok(), "{}", key);
        }
        assert_eq!(agent.n_opts(), 1);
        Ok(())
    }

    #[test]
    fn test_predict() -> Result<()> {
        let mut agent = agent(3, false)?;
        let obs = ArrayD::from_shape_vec(vec![3, 2], vec![1f32, 0., 0., 1., 1., 0.])?;

        let probs = agent.action_probability(&obs, None, None)?;
        assert_eq!(probs.dim(), (3, 2));
        for row in probs.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }

        let (actions, state) = agent.predict(&obs, None, None, false)?;
        assert_eq!(actions.len(), 3);
        assert!(actions.iter().all(|&a| a == 0 || a == 1));
        assert!(state.is_none());

        // A single observation
        let obs = ArrayD::from_shape_vec(vec![2], vec![0f32, 1.])?;
        let (actions, _) = agent.predict(&obs, None, None, true)?;
        assert_eq!(actions.len(), 1);
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let mut agent = agent(2, true)?;
        let batch = batch(&mut agent, 2)?;
        agent.train_step(&batch, 1e-2)?;

        let dir = TempDir::new("acer")?;
        let path = dir.path().join("acer.bin");
        agent.save(&path)?;
        let agent_ = Acer::<Mlp>::load(&path, Some(Device::Cpu))?;

        assert_eq!(agent.config(), agent_.config());
        assert_eq!(
            values(agent.model().varmap())?,
            values(agent_.model().varmap())?
        );
        assert_eq!(
            values(agent.model().polyak_varmap())?,
            values(agent_.model().polyak_varmap())?
        );
        let probs = agent.action_probability(&batch.obs, None, None)?;
        let probs_ = agent_.action_probability(&batch.obs, None, None)?;
        assert_eq!(probs, probs_);
        Ok(())
    }

    #[test]
    fn test_load_shape_mismatch() -> Result<()> {
        let agent = agent(2, false)?;
        let dir = TempDir::new("acer")?;
        let path = dir.path().join("acer.bin");
        agent.save(&path)?;

        let other = Acer::<Mlp>::build(
            AcerConfig::default().net_config(MlpConfig::new(2, vec![8], 0)),
            ObservationSpace::new(vec![2]),
            ActionSpace::Discrete(2),
            2,
        )?;
        let params = export_params(agent.model().varmap())?;
        assert!(import_params(other.model().varmap(), params).is_err());
        Ok(())
    }
}
