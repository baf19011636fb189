//! Ring buffer of segments.
use super::ReplayBufferConfig;
use crate::{error::AcerError, Segment};
use anyhow::Result;
use log::debug;
use ndarray::{stack, Array2, Array3, ArrayD, ArrayView2, ArrayViewD, Axis, IxDyn, Slice};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A segment without stacked observations.
struct Slot {
    enc_obs: ArrayD<f32>,
    actions: Array2<i64>,
    rewards: Array2<f32>,
    mus: Array3<f32>,
    dones: Array2<bool>,
    masks: Array2<bool>,
}

/// Stacks encoded frames `[n_envs, nstack + n_steps, obs_shape...]` into observations
/// `[n_envs, n_steps + 1, stacked_shape...]`.
///
/// `dones` is `[n_envs, n_steps]`. A frame is dropped (left zero) in every stacked
/// observation following an episode end after it, as the frame stack of the rollout
/// runner does.
pub fn stack_frames(
    enc_obs: ArrayViewD<f32>,
    dones: ArrayView2<bool>,
    nstack: usize,
) -> Result<ArrayD<f32>> {
    let shape = enc_obs.shape();
    if shape.len() < 3 || shape[1] < nstack {
        return Err(AcerError::shape_mismatch("encoded observations", &[0, nstack, 0], shape).into());
    }
    let (n_envs, n_steps) = (shape[0], shape[1] - nstack);
    if dones.shape() != &[n_envs, n_steps][..] {
        return Err(AcerError::shape_mismatch("dones", &[n_envs, n_steps], dones.shape()).into());
    }

    let c = shape[shape.len() - 1];
    let mut out_shape = vec![n_envs, n_steps + 1];
    out_shape.extend_from_slice(&shape[2..]);
    let last_ix = out_shape.len() - 1;
    out_shape[last_ix] *= nstack;
    let mut obs = ArrayD::zeros(IxDyn(&out_shape));

    for e in 0..n_envs {
        let frames = enc_obs.index_axis(Axis(0), e);
        let mut env_obs = obs.index_axis_mut(Axis(0), e);
        for t in 0..=n_steps {
            let mut cell = env_obs.index_axis_mut(Axis(0), t);
            let last = Axis(cell.ndim() - 1);
            // j frames back from the newest one
            for j in 0..nstack {
                if (t.saturating_sub(j)..t).any(|s| dones[[e, s]]) {
                    break;
                }
                let slot = nstack - 1 - j;
                cell.slice_axis_mut(last, Slice::from(slot * c..(slot + 1) * c))
                    .assign(&frames.index_axis(Axis(0), nstack - 1 + t - j));
            }
        }
    }

    Ok(obs)
}

/// Replay buffer of trajectory segments.
///
/// Capacity is given in steps per environment and held as `size / n_steps` segments.
/// The oldest segment is overwritten when the buffer is full.
pub struct ReplayBuffer {
    n_steps: usize,
    nstack: usize,
    n_slots: usize,
    replay_start: usize,
    n_envs: Option<usize>,
    next_idx: usize,
    slots: Vec<Slot>,
    rng: StdRng,
}

impl ReplayBuffer {
    /// Constructs an empty buffer.
    pub fn build(config: &ReplayBufferConfig) -> Result<Self> {
        config.validate()?;
        let n_slots = config.size / config.n_steps;
        debug!("Build replay buffer with {} segments", n_slots);

        Ok(Self {
            n_steps: config.n_steps,
            nstack: config.nstack,
            n_slots,
            replay_start: config.replay_start,
            n_envs: None,
            next_idx: 0,
            slots: Vec::with_capacity(n_slots),
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Stores a segment, evicting the oldest one if the buffer is full.
    pub fn put(&mut self, segment: &Segment) -> Result<()> {
        segment.validate()?;
        let n_envs = *self.n_envs.get_or_insert(segment.n_envs());
        if segment.n_envs() != n_envs || segment.n_steps() != self.n_steps {
            return Err(AcerError::shape_mismatch(
                "segment",
                &[n_envs, self.n_steps],
                &[segment.n_envs(), segment.n_steps()],
            )
            .into());
        }
        if segment.enc_obs.shape()[1] != self.nstack + self.n_steps {
            return Err(AcerError::shape_mismatch(
                "encoded observations",
                &[n_envs, self.nstack + self.n_steps],
                &segment.enc_obs.shape()[..2],
            )
            .into());
        }

        let slot = Slot {
            enc_obs: segment.enc_obs.clone(),
            actions: segment.actions.clone(),
            rewards: segment.rewards.clone(),
            mus: segment.mus.clone(),
            dones: segment.dones.clone(),
            masks: segment.masks.clone(),
        };
        if self.slots.len() < self.n_slots {
            self.slots.push(slot);
        } else {
            self.slots[self.next_idx] = slot;
        }
        self.next_idx = (self.next_idx + 1) % self.n_slots;

        Ok(())
    }

    /// Samples a segment.
    ///
    /// The row of each environment is taken from an independently drawn stored segment.
    /// Fails unless [`ReplayBuffer::has_atleast`] holds for `replay_start`.
    pub fn get(&mut self) -> Result<Segment> {
        let required = self.replay_start.max(1);
        if !self.has_atleast(required) {
            return Err(AcerError::BufferUnderfilled {
                required,
                available: self.len(),
            }
            .into());
        }

        let n_envs = self.n_envs.unwrap_or(0);
        let n = self.slots.len();
        let ixs = (0..n_envs)
            .map(|_| self.rng.gen_range(0..n))
            .collect::<Vec<_>>();
        let slots = ixs.iter().map(|&i| &self.slots[i]).collect::<Vec<_>>();

        let enc_obs = stack(
            Axis(0),
            &slots
                .iter()
                .enumerate()
                .map(|(e, s)| s.enc_obs.index_axis(Axis(0), e))
                .collect::<Vec<_>>(),
        )?;
        let mus = stack(
            Axis(0),
            &slots
                .iter()
                .enumerate()
                .map(|(e, s)| s.mus.index_axis(Axis(0), e))
                .collect::<Vec<_>>(),
        )?;
        let rewards = Array2::from_shape_fn((n_envs, self.n_steps), |(e, t)| {
            slots[e].rewards[[e, t]]
        });
        let actions = Array2::from_shape_fn((n_envs, self.n_steps), |(e, t)| {
            slots[e].actions[[e, t]]
        });
        let dones = Array2::from_shape_fn((n_envs, self.n_steps), |(e, t)| slots[e].dones[[e, t]]);
        let masks = Array2::from_shape_fn((n_envs, self.n_steps + 1), |(e, t)| {
            slots[e].masks[[e, t]]
        });
        let obs = stack_frames(enc_obs.view(), dones.view(), self.nstack)?;

        Ok(Segment {
            enc_obs,
            obs,
            actions,
            rewards,
            mus,
            dones,
            masks,
            states: None,
        })
    }

    /// Returns `true` if at least `n` steps per environment are stored.
    pub fn has_atleast(&self, n: usize) -> bool {
        self.len() >= n
    }

    /// Steps per environment stored.
    pub fn len(&self) -> usize {
        self.slots.len() * self.n_steps
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Capacity in steps per environment.
    pub fn capacity(&self) -> usize {
        self.n_slots * self.n_steps
    }
}
