//! Agent.
use super::Policy;
use crate::{record::Record, TrainBatch};
use anyhow::Result;

/// A trainable policy.
pub trait Agent: Policy {
    /// Performs a gradient step on a batch with the given learning rate and
    /// returns training metrics.
    fn opt_with_record(&mut self, batch: &TrainBatch, lr: f64) -> Result<Record>;

    /// Performs a gradient step, discarding metrics.
    fn opt(&mut self, batch: &TrainBatch, lr: f64) -> Result<()> {
        self.opt_with_record(batch, lr).map(|_| ())
    }
}
