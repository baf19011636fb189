//! Frame stacking.
use crate::{error::AcerError, ObservationSpace};
use anyhow::Result;
use ndarray::{ArrayD, Axis, IxDyn, Slice};

/// Keeps the last `nstack` frames of every environment, concatenated along the
/// channel (last) axis, newest last.
pub struct FrameStack {
    nstack: usize,
    n_channels: usize,
    frame_shape: Vec<usize>,

    /// `[n_envs, stacked_shape...]`.
    stack: ArrayD<f32>,
}

impl FrameStack {
    /// Creates a stack filled with zeros.
    pub fn new(n_envs: usize, obs_space: &ObservationSpace, nstack: usize) -> Self {
        let mut shape = vec![n_envs];
        shape.extend(obs_space.stacked_shape(nstack));
        let mut frame_shape = vec![n_envs];
        frame_shape.extend_from_slice(&obs_space.shape);

        Self {
            nstack,
            n_channels: obs_space.n_channels(),
            frame_shape,
            stack: ArrayD::zeros(IxDyn(&shape)),
        }
    }

    /// Pushes frames `[n_envs, obs_shape...]` into the stack.
    ///
    /// The whole stack of environment `i` is zeroed before pushing if `dones[i]` is `true`.
    pub fn update(&mut self, obs: &ArrayD<f32>, dones: Option<&[bool]>) -> Result<()> {
        if obs.shape() != self.frame_shape.as_slice() {
            return Err(AcerError::shape_mismatch("frame", &self.frame_shape, obs.shape()).into());
        }

        if let Some(dones) = dones {
            for (i, &done) in dones.iter().enumerate() {
                if done {
                    self.stack.index_axis_mut(Axis(0), i).fill(0.0);
                }
            }
        }

        let c = self.n_channels;
        let total = c * self.nstack;
        let last = Axis(self.stack.ndim() - 1);
        let tail = self.stack.slice_axis(last, Slice::from(c..)).to_owned();
        self.stack
            .slice_axis_mut(last, Slice::from(..total - c))
            .assign(&tail);
        self.stack
            .slice_axis_mut(last, Slice::from(total - c..))
            .assign(obs);

        Ok(())
    }

    /// Stacked observations, `[n_envs, stacked_shape...]`.
    pub fn stacked(&self) -> &ArrayD<f32> {
        &self.stack
    }

    /// The frames in the stack, oldest first, each `[n_envs, obs_shape...]`.
    pub fn frames(&self) -> Vec<ArrayD<f32>> {
        let c = self.n_channels;
        let last = Axis(self.stack.ndim() - 1);
        (0..self.nstack)
            .map(|k| {
                self.stack
                    .slice_axis(last, Slice::from(k * c..(k + 1) * c))
                    .to_owned()
            })
            .collect()
    }

    /// Number of stacked frames.
    pub fn nstack(&self) -> usize {
        self.nstack
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_shift_and_reset_on_done() -> Result<()> {
        // 2 envs, frames of 2 channels, 3 frames
        let space = ObservationSpace::new(vec![2]);
        let mut fs = FrameStack::new(2, &space, 3);

        fs.update(&array![[1., 1.], [2., 2.]].into_dyn(), None)?;
        fs.update(&array![[3., 3.], [4., 4.]].into_dyn(), Some(&[false, false]))?;
        assert_eq!(
            fs.stacked(),
            &array![[0., 0., 1., 1., 3., 3.], [0., 0., 2., 2., 4., 4.]].into_dyn()
        );

        fs.update(&array![[5., 5.], [6., 6.]].into_dyn(), Some(&[false, true]))?;
        assert_eq!(
            fs.stacked(),
            &array![[1., 1., 3., 3., 5., 5.], [0., 0., 0., 0., 6., 6.]].into_dyn()
        );

        let frames = fs.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2], array![[5., 5.], [6., 6.]].into_dyn());
        Ok(())
    }

    #[test]
    fn test_wrong_frame_shape() {
        let space = ObservationSpace::new(vec![2]);
        let mut fs = FrameStack::new(2, &space, 3);
        assert!(fs.update(&array![[1., 1., 1.]].into_dyn(), None).is_err());
    }
}
