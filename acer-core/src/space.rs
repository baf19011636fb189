//! Observation and action spaces.
use serde::{Deserialize, Serialize};

/// A box observation space.
///
/// The last axis of `shape` is the channel axis, along which frames are stacked.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ObservationSpace {
    /// Shape of a single observation of a single environment.
    pub shape: Vec<usize>,
}

impl ObservationSpace {
    /// Constructs a space with the given shape.
    pub fn new(shape: Vec<usize>) -> Self {
        Self { shape }
    }

    /// Number of channels of a single frame.
    pub fn n_channels(&self) -> usize {
        *self.shape.last().unwrap_or(&1)
    }

    /// Shape of an observation stacked `nstack` times along the channel axis.
    pub fn stacked_shape(&self, nstack: usize) -> Vec<usize> {
        let mut shape = self.shape.clone();
        match shape.last_mut() {
            Some(c) => *c *= nstack,
            None => shape.push(nstack),
        }
        shape
    }
}

/// Action space. Only discrete actions are supported.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub enum ActionSpace {
    /// `n` discrete actions, `0..n`.
    Discrete(usize),
}

impl ActionSpace {
    /// Number of actions.
    pub fn n(&self) -> usize {
        match self {
            Self::Discrete(n) => *n,
        }
    }
}
