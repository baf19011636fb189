//! Learning rate schedules.
use serde::{Deserialize, Serialize};

/// Shape of the learning rate over training progress `p` in `[0, 1]`.
///
/// The learning rate is the initial one multiplied by [`LrSchedule::multiplier`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub enum LrSchedule {
    /// `1`.
    Constant,

    /// `1 - p`.
    Linear,

    /// `1 - 2p`, floored at `0.125`.
    DoubleLinearCon,

    /// `1 - p` until `p = 0.25`, then `0.075`.
    MiddleDrop,

    /// `1 - p` until `p = 0.25`, then `0.075`, then `0.125` after `p = 0.75`.
    DoubleMiddleDrop,
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self::Linear
    }
}

impl LrSchedule {
    /// Multiplier of the initial learning rate at progress `p`.
    pub fn multiplier(&self, p: f64) -> f64 {
        match self {
            Self::Constant => 1.0,
            Self::Linear => 1.0 - p,
            Self::DoubleLinearCon => {
                let eps = 0.125;
                if 1.0 - 2.0 * p < eps {
                    eps
                } else {
                    1.0 - 2.0 * p
                }
            }
            Self::MiddleDrop => {
                if 1.0 - p < 0.75 {
                    0.075
                } else {
                    1.0 - p
                }
            }
            Self::DoubleMiddleDrop => {
                if 1.0 - p < 0.25 {
                    0.125
                } else if 1.0 - p < 0.75 {
                    0.075
                } else {
                    1.0 - p
                }
            }
        }
    }
}

/// Learning rate scheduler over `n_values` steps.
#[derive(Debug, Clone)]
pub struct Scheduler {
    initial: f64,
    n_values: usize,
    schedule: LrSchedule,
}

impl Scheduler {
    /// Constructs a scheduler.
    pub fn new(initial: f64, n_values: usize, schedule: LrSchedule) -> Self {
        Self {
            initial,
            n_values,
            schedule,
        }
    }

    /// Returns the value after `steps` steps.
    pub fn value_steps(&self, steps: usize) -> f64 {
        let p = steps as f64 / self.n_values.max(1) as f64;
        self.initial * self.schedule.multiplier(p)
    }
}
