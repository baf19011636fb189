//! Training loop.
mod config;
use crate::{
    error::AcerError,
    record::{AggregateRecorder, RecordValue::Scalar},
    replay_buffer::{ReplayBuffer, ReplayBufferConfig},
    Agent, EpisodeStats, RolloutRunner, Scheduler, TrainBatch, VecEnv,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use std::time::SystemTime;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs the training loop of an [`Agent`].
///
/// Every iteration collects a segment of `n_steps` steps in every environment and
///
/// 1. feeds its rewards to [`EpisodeStats`],
/// 2. stores it in the replay buffer when `replay_ratio > 0`,
/// 3. does one gradient step on it (the on-policy step),
/// 4. records metrics every `log_interval` iterations when `verbose >= 1`,
/// 5. draws `k ~ Poisson(replay_ratio)` once the buffer holds `replay_start` steps and
///    does `k` gradient steps on segments sampled from the buffer.
///
/// The learning rate of all gradient steps in an iteration is given by the schedule at
/// the number of environment steps done before the iteration.
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|actions|B[VecEnv]
///     B -->|Step|C[RolloutRunner]
///     C -->|Segment|D[ReplayBuffer]
///     C -->|TrainBatch|A
///     D -->|TrainBatch|A
/// ```
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn replay_buffer(&self) -> Result<Option<ReplayBuffer>> {
        if self.config.replay_ratio > 0.0 {
            let config = ReplayBufferConfig::default()
                .size(self.config.buffer_size)
                .n_steps(self.config.n_steps)
                .nstack(self.config.nstack)
                .replay_start(self.config.replay_start)
                .seed(self.config.seed);
            Ok(Some(ReplayBuffer::build(&config)?))
        } else {
            Ok(None)
        }
    }

    /// Trains the agent on the environment.
    pub fn train<E, A>(
        &mut self,
        env: E,
        agent: &mut A,
        recorder: &mut Box<dyn AggregateRecorder>,
    ) -> Result<()>
    where
        E: VecEnv,
        A: Agent,
    {
        let config = &self.config;
        let mut buffer = self.replay_buffer()?;
        let mut runner = RolloutRunner::new(env, agent, config.n_steps, config.nstack)?;
        let n_batch = runner.batch_size();
        let mut episode_stats = EpisodeStats::new(runner.n_envs());
        let scheduler = Scheduler::new(
            config.learning_rate,
            config.total_timesteps,
            config.lr_schedule,
        );
        let mut rng = StdRng::seed_from_u64(config.seed);
        let poisson = match buffer {
            Some(_) => Some(Poisson::new(config.replay_ratio).map_err(|e| {
                AcerError::InvalidConfig(format!("replay_ratio {}: {}", config.replay_ratio, e))
            })?),
            None => None,
        };
        let timer = SystemTime::now();
        info!("Start training for {} timesteps", config.total_timesteps);

        for steps in (0..config.total_timesteps).step_by(n_batch) {
            let segment = runner.run(agent)?;
            episode_stats.feed(&segment.rewards, &segment.dones);
            if let Some(buffer) = buffer.as_mut() {
                buffer.put(&segment)?;
            }

            // On-policy step
            let lr = scheduler.value_steps(steps);
            let mut record = agent.opt_with_record(&TrainBatch::from_segment(&segment)?, lr)?;

            if config.verbose >= 1 && (steps / n_batch) % config.log_interval == 0 {
                let elapsed = timer.elapsed()?.as_secs_f32().max(f32::EPSILON);
                let fps = (steps as f32 / elapsed).floor();
                record.insert("total_timesteps", Scalar(steps as f32));
                record.insert("fps", Scalar(fps));
                record.insert("mean_episode_length", Scalar(episode_stats.mean_length()));
                record.insert("mean_episode_reward", Scalar(episode_stats.mean_reward()));
                info!(
                    "total_timesteps = {}, fps = {}, mean_episode_length = {:.2}, mean_episode_reward = {:.3}",
                    steps,
                    fps,
                    episode_stats.mean_length(),
                    episode_stats.mean_reward(),
                );
                recorder.store(record);
                recorder.flush(steps as _);
            }

            // Off-policy steps
            if let (Some(buffer), Some(poisson)) = (buffer.as_mut(), poisson.as_ref()) {
                if buffer.has_atleast(config.replay_start) {
                    let n = poisson.sample(&mut rng) as usize;
                    debug!("{} off-policy steps", n);
                    for _ in 0..n {
                        let mut segment = buffer.get()?;
                        segment.states = agent.initial_state();
                        agent.opt(&TrainBatch::from_segment(&segment)?, lr)?;
                    }
                }
            }
        }

        info!("Finished training");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        env::{IdentityEnv, IdentityEnvConfig},
        record::{BufferedRecorder, NullRecorder, Record},
        runner::test::RandomPolicy,
        Policy, PolicyStep,
    };
    use ndarray::ArrayD;
    use std::{cell::RefCell, rc::Rc};

    /// Random policy remembering the gradient steps it was asked for.
    struct MockAgent {
        policy: RandomPolicy,
        lrs: Vec<f64>,
        batch_sizes: Vec<usize>,
    }

    impl Policy for MockAgent {
        fn initial_state(&self) -> Option<ArrayD<f32>> {
            None
        }

        fn step(
            &mut self,
            obs: &ArrayD<f32>,
            state: Option<&ArrayD<f32>>,
            mask: &[bool],
        ) -> Result<PolicyStep> {
            self.policy.step(obs, state, mask)
        }
    }

    impl Agent for MockAgent {
        fn opt_with_record(&mut self, batch: &TrainBatch, lr: f64) -> Result<Record> {
            self.lrs.push(lr);
            self.batch_sizes.push(batch.len());
            Ok(Record::from_scalar("loss", 0.0))
        }
    }

    fn mock_agent() -> MockAgent {
        MockAgent {
            policy: RandomPolicy::new(2, 3),
            lrs: vec![],
            batch_sizes: vec![],
        }
    }

    fn env(n_envs: usize) -> Result<IdentityEnv> {
        IdentityEnv::build(&IdentityEnvConfig::default().n_envs(n_envs), 0)
    }

    #[test]
    fn test_on_policy_only() -> Result<()> {
        let config = TrainerConfig::default()
            .total_timesteps(100)
            .n_steps(5)
            .nstack(1)
            .replay_ratio(0.0)
            .learning_rate(1.0);
        let mut agent = mock_agent();
        let mut recorder: Box<dyn AggregateRecorder> = Box::new(NullRecorder::new());
        Trainer::build(config)?.train(env(2)?, &mut agent, &mut recorder)?;

        // 100 steps in batches of 10
        assert_eq!(agent.lrs.len(), 10);
        assert!(agent.batch_sizes.iter().all(|&n| n == 10));
        assert_eq!(agent.lrs[0], 1.0);
        assert!((agent.lrs[9] - 0.1).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_replay_starts_after_warmup() -> Result<()> {
        let config = TrainerConfig::default()
            .total_timesteps(400)
            .n_steps(5)
            .nstack(2)
            .replay_ratio(4.0)
            .replay_start(50)
            .buffer_size(100)
            .lr_schedule(crate::LrSchedule::Constant);
        let mut agent = mock_agent();
        let mut recorder: Box<dyn AggregateRecorder> = Box::new(NullRecorder::new());
        Trainer::build(config)?.train(env(2)?, &mut agent, &mut recorder)?;

        // 40 iterations. The buffer holds 50 steps per environment after 10 of them,
        // so only on-policy steps happen before.
        assert!(agent.lrs.len() > 40);
        assert!(agent.batch_sizes.iter().all(|&n| n == 10));
        Ok(())
    }

    #[test]
    fn test_logging() -> Result<()> {
        struct Shared(Rc<RefCell<BufferedRecorder>>);

        impl AggregateRecorder for Shared {
            fn store(&mut self, record: Record) {
                self.0.borrow_mut().store(record)
            }

            fn flush(&mut self, step: i64) {
                self.0.borrow_mut().flush(step)
            }
        }

        let config = TrainerConfig::default()
            .total_timesteps(100)
            .n_steps(5)
            .nstack(1)
            .replay_ratio(0.0)
            .log_interval(2)
            .verbose(1);
        let buffered = Rc::new(RefCell::new(BufferedRecorder::new()));
        let mut recorder: Box<dyn AggregateRecorder> = Box::new(Shared(buffered.clone()));
        let mut agent = mock_agent();
        Trainer::build(config)?.train(env(2)?, &mut agent, &mut recorder)?;

        let buffered = buffered.borrow();
        assert_eq!(buffered.len(), 5);
        let last = buffered.iter().last().unwrap();
        assert_eq!(last.get_scalar("total_timesteps")?, 80.0);
        assert!(last.get_scalar("loss").is_ok());
        assert!(last.get_scalar("mean_episode_length")? > 0.0);
        Ok(())
    }
}
