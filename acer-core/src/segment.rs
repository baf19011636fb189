//! Trajectory segments and training batches.
use crate::error::AcerError;
use anyhow::Result;
use ndarray::{Array2, Array3, ArrayD, Axis, IxDyn};

/// `n_steps` steps of `n_envs` environments.
///
/// Every array is laid out `[n_envs, time, ...]`.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Unstacked frames, `[n_envs, nstack + n_steps, obs_shape...]`.
    ///
    /// The first `nstack` frames are the frames in the stack at the beginning of the
    /// segment, oldest first.
    pub enc_obs: ArrayD<f32>,

    /// Stacked observations, `[n_envs, n_steps + 1, stacked_shape...]`.
    pub obs: ArrayD<f32>,

    /// Actions, `[n_envs, n_steps]`.
    pub actions: Array2<i64>,

    /// Rewards, `[n_envs, n_steps]`.
    pub rewards: Array2<f32>,

    /// Action probabilities of the behaviour policy, `[n_envs, n_steps, n_actions]`.
    pub mus: Array3<f32>,

    /// Episode ends returned by the environment steps, `[n_envs, n_steps]`.
    pub dones: Array2<bool>,

    /// Episode ends preceding each observation, `[n_envs, n_steps + 1]`.
    ///
    /// `masks[.., 1..]` equals `dones`.
    pub masks: Array2<bool>,

    /// Recurrent state at the beginning of the segment.
    pub states: Option<ArrayD<f32>>,
}

impl Segment {
    /// Number of environments.
    pub fn n_envs(&self) -> usize {
        self.actions.nrows()
    }

    /// Number of steps.
    pub fn n_steps(&self) -> usize {
        self.actions.ncols()
    }

    /// Number of actions.
    pub fn n_actions(&self) -> usize {
        self.mus.shape()[2]
    }

    /// Checks that the arrays have consistent shapes.
    pub fn validate(&self) -> Result<()> {
        let (n_envs, n_steps) = (self.n_envs(), self.n_steps());
        let check = |what: &str, expected: &[usize], actual: &[usize]| -> Result<()> {
            if expected != actual {
                return Err(AcerError::shape_mismatch(what, expected, actual).into());
            }
            Ok(())
        };

        check("rewards", &[n_envs, n_steps], self.rewards.shape())?;
        check("dones", &[n_envs, n_steps], self.dones.shape())?;
        check("masks", &[n_envs, n_steps + 1], self.masks.shape())?;
        check(
            "mus",
            &[n_envs, n_steps, self.n_actions()],
            self.mus.shape(),
        )?;
        check(
            "obs",
            &[n_envs, n_steps + 1],
            &self.obs.shape()[..2.min(self.obs.ndim())],
        )?;
        if self.enc_obs.ndim() < 2 || self.enc_obs.shape()[0] != n_envs {
            return Err(AcerError::shape_mismatch(
                "enc_obs",
                &[n_envs],
                &self.enc_obs.shape()[..1.min(self.enc_obs.ndim())],
            )
            .into());
        }
        Ok(())
    }
}

/// A [`Segment`] flattened for a gradient step.
///
/// The leading axes `[n_envs, time]` are merged env-major, i.e. row `e * len + t`
/// holds step `t` of environment `e`.
#[derive(Debug, Clone)]
pub struct TrainBatch {
    /// Number of environments.
    pub n_envs: usize,

    /// Number of steps per environment.
    pub n_steps: usize,

    /// Stacked observations, `[n_envs * (n_steps + 1), stacked_shape...]`.
    pub obs: ArrayD<f32>,

    /// Actions, `[n_envs * n_steps]`.
    pub actions: Vec<i64>,

    /// Rewards, `[n_envs * n_steps]`.
    pub rewards: Vec<f32>,

    /// Episode ends as `0.0`/`1.0`, `[n_envs * n_steps]`.
    pub dones: Vec<f32>,

    /// Behaviour policy, `[n_envs * n_steps, n_actions]`.
    pub mus: Array2<f32>,

    /// Episode ends preceding each observation, `[n_envs * (n_steps + 1)]`.
    pub masks: Vec<f32>,

    /// Recurrent state at the beginning of the segment.
    pub states: Option<ArrayD<f32>>,
}

fn merge_leading_axes<A: Clone>(a: &ArrayD<A>) -> Result<ArrayD<A>> {
    let mut shape = vec![a.shape()[0] * a.shape()[1]];
    shape.extend_from_slice(&a.shape()[2..]);
    Ok(a.as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(&shape))?)
}

fn as_f32(flags: &Array2<bool>) -> Vec<f32> {
    flags.iter().map(|&d| if d { 1.0 } else { 0.0 }).collect()
}

impl TrainBatch {
    /// Flattens a segment.
    pub fn from_segment(segment: &Segment) -> Result<Self> {
        segment.validate()?;
        let n_actions = segment.n_actions();
        let mus = segment.mus.as_standard_layout().into_owned();
        let n_rows = mus.len_of(Axis(0)) * mus.len_of(Axis(1));

        Ok(Self {
            n_envs: segment.n_envs(),
            n_steps: segment.n_steps(),
            obs: merge_leading_axes(&segment.obs)?,
            actions: segment.actions.iter().copied().collect(),
            rewards: segment.rewards.iter().copied().collect(),
            dones: as_f32(&segment.dones),
            mus: mus.into_shape((n_rows, n_actions))?,
            masks: as_f32(&segment.masks),
            states: segment.states.clone(),
        })
    }

    /// Number of transitions, `n_envs * n_steps`.
    pub fn len(&self) -> usize {
        self.n_envs * self.n_steps
    }

    /// Returns `true` if the batch has no transitions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::Array;

    fn segment(n_envs: usize, n_steps: usize) -> Segment {
        Segment {
            enc_obs: ArrayD::zeros(IxDyn(&[n_envs, n_steps + 1, 2])),
            obs: Array::from_shape_fn(IxDyn(&[n_envs, n_steps + 1, 2]), |ix| {
                (ix[0] * 100 + ix[1] * 10 + ix[2]) as f32
            }),
            actions: Array2::from_shape_fn((n_envs, n_steps), |(e, t)| (e * 10 + t) as i64),
            rewards: Array2::zeros((n_envs, n_steps)),
            mus: Array3::from_elem((n_envs, n_steps, 2), 0.5),
            dones: Array2::from_shape_fn((n_envs, n_steps), |(_, t)| t == 1),
            masks: Array2::from_shape_fn((n_envs, n_steps + 1), |(_, t)| t == 2),
            states: None,
        }
    }

    #[test]
    fn test_env_major_flattening() -> Result<()> {
        let batch = TrainBatch::from_segment(&segment(2, 3))?;

        assert_eq!(batch.len(), 6);
        assert_eq!(batch.actions, vec![0, 1, 2, 10, 11, 12]);
        assert_eq!(batch.dones, vec![0., 1., 0., 0., 1., 0.]);
        assert_eq!(batch.obs.shape(), &[8, 2]);
        // Row 5 is the second step of the second environment
        assert_eq!(batch.obs[[5, 1]], 111.0);
        assert_eq!(batch.mus.shape(), &[6, 2]);
        Ok(())
    }

    #[test]
    fn test_inconsistent_segment() {
        let mut s = segment(2, 3);
        s.rewards = Array2::zeros((2, 4));
        assert!(TrainBatch::from_segment(&s).is_err());
    }
}
