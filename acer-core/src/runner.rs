//! Rollout collection.
mod frame_stack;
use crate::{error::AcerError, Policy, Segment, VecEnv};
use anyhow::Result;
pub use frame_stack::FrameStack;
use log::trace;
use ndarray::{stack, Array2, Array3, ArrayD, ArrayView, Axis, IxDyn};

/// Steps a vectorized environment with a policy and collects [`Segment`]s.
pub struct RolloutRunner<E: VecEnv> {
    env: E,
    n_envs: usize,
    n_steps: usize,
    n_actions: usize,
    frame_stack: FrameStack,
    states: Option<ArrayD<f32>>,
    dones: Vec<bool>,
}

fn stack_time<'a>(xs: impl Iterator<Item = ArrayView<'a, f32, IxDyn>>) -> Result<ArrayD<f32>> {
    let xs = xs.collect::<Vec<_>>();
    Ok(stack(Axis(1), &xs)?)
}

impl<E: VecEnv> RolloutRunner<E> {
    /// Resets the environment and constructs the runner.
    pub fn new<P: Policy>(mut env: E, policy: &P, n_steps: usize, nstack: usize) -> Result<Self> {
        if n_steps == 0 || nstack == 0 {
            return Err(AcerError::InvalidConfig(format!(
                "n_steps ({}) and nstack ({}) must be positive",
                n_steps, nstack
            ))
            .into());
        }

        let n_envs = env.n_envs();
        let obs_space = env.observation_space();
        let mut frame_stack = FrameStack::new(n_envs, &obs_space, nstack);
        let obs = env.reset()?;
        frame_stack.update(&obs, None)?;

        Ok(Self {
            n_actions: env.action_space().n(),
            env,
            n_envs,
            n_steps,
            frame_stack,
            states: policy.initial_state(),
            dones: vec![false; n_envs],
        })
    }

    /// Runs `n_steps` steps in every environment.
    pub fn run<P: Policy>(&mut self, policy: &mut P) -> Result<Segment> {
        let mut enc_obs = self.frame_stack.frames();
        let mut obs = Vec::with_capacity(self.n_steps + 1);
        let mut actions = Vec::with_capacity(self.n_steps);
        let mut mus = Vec::with_capacity(self.n_steps);
        let mut rewards = Vec::with_capacity(self.n_steps);
        let mut masks = Vec::with_capacity(self.n_steps + 1);
        let states = self.states.clone();

        for _ in 0..self.n_steps {
            let stacked = self.frame_stack.stacked().clone();
            let out = policy.step(&stacked, self.states.as_ref(), &self.dones)?;
            let expected = [self.n_envs, self.n_actions];
            if out.actions.len() != self.n_envs || out.mus.shape() != &expected[..] {
                return Err(AcerError::shape_mismatch(
                    "policy output",
                    &expected,
                    out.mus.shape(),
                )
                .into());
            }

            let step = self.env.step(&out.actions)?;
            trace!("rewards = {:?}, dones = {:?}", step.reward, step.is_done);

            obs.push(stacked);
            actions.push(out.actions);
            mus.push(out.mus);
            masks.push(std::mem::replace(&mut self.dones, step.is_done.clone()));
            self.states = out.state;
            self.frame_stack.update(&step.obs, Some(&step.is_done))?;
            enc_obs.push(step.obs);
            rewards.push(step.reward);
        }
        obs.push(self.frame_stack.stacked().clone());
        masks.push(self.dones.clone());

        let (n_envs, n_steps, n_actions) = (self.n_envs, self.n_steps, self.n_actions);
        let masks = Array2::from_shape_fn((n_envs, n_steps + 1), |(e, t)| masks[t][e]);
        let segment = Segment {
            enc_obs: stack_time(enc_obs.iter().map(|x| x.view()))?,
            obs: stack_time(obs.iter().map(|x| x.view()))?,
            actions: Array2::from_shape_fn((n_envs, n_steps), |(e, t)| actions[t][e]),
            rewards: Array2::from_shape_fn((n_envs, n_steps), |(e, t)| rewards[t][e]),
            mus: Array3::from_shape_fn((n_envs, n_steps, n_actions), |(e, t, a)| mus[t][[e, a]]),
            dones: Array2::from_shape_fn((n_envs, n_steps), |(e, t)| masks[[e, t + 1]]),
            masks,
            states,
        };

        Ok(segment)
    }

    /// Number of environments.
    pub fn n_envs(&self) -> usize {
        self.n_envs
    }

    /// Number of steps per environment in a segment.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of transitions in a segment.
    pub fn batch_size(&self) -> usize {
        self.n_envs * self.n_steps
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }
}
