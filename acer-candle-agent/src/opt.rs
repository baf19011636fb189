//! Optimizers.
use anyhow::Result;
use candle_core::{backprop::GradStore, Var};
use candle_nn::Optimizer as _;
use candle_optimisers::rmsprop::{ParamsRMSprop, RMSprop};
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training neural networks in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// RMSprop optimizer.
    RmsProp {
        /// Learning rate.
        lr: f64,
        /// Decay of the running average of squared gradients.
        #[serde(default = "default_alpha")]
        alpha: f64,
        /// Term added to the denominator.
        #[serde(default = "default_eps")]
        eps: f64,
    },
}

fn default_alpha() -> f64 {
    0.99
}

fn default_eps() -> f64 {
    1e-5
}

impl OptimizerConfig {
    /// Constructs an optimizer of the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::RmsProp { lr, alpha, eps } => {
                let params = ParamsRMSprop {
                    lr: *lr,
                    alpha: *alpha,
                    eps: *eps,
                    ..ParamsRMSprop::default()
                };
                let opt = RMSprop::new(vars, params)?;
                Ok(Optimizer::RmsProp(opt))
            }
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::RmsProp {
            lr: 7e-4,
            alpha: default_alpha(),
            eps: default_eps(),
        }
    }
}

/// Optimizers.
pub enum Optimizer {
    /// RMSprop optimizer.
    RmsProp(RMSprop),
}

impl Optimizer {
    /// Updates variables with the given gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::RmsProp(opt) => Ok(opt.step(grads)?),
        }
    }

    /// Sets the learning rate used by subsequent steps.
    pub fn set_learning_rate(&mut self, lr: f64) {
        match self {
            Self::RmsProp(opt) => opt.set_learning_rate(lr),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_rmsprop_learning_rate() -> Result<()> {
        let var = Var::new(&[1f32, -1f32], &Device::Cpu)?;
        let mut opt = OptimizerConfig::default().build(vec![var.clone()])?;

        // Zero learning rate leaves the variable untouched.
        opt.set_learning_rate(0.0);
        let grads = var.as_tensor().sqr()?.sum_all()?.backward()?;
        opt.step(&grads)?;
        assert_eq!(var.as_tensor().to_vec1::<f32>()?, vec![1.0, -1.0]);

        // A positive learning rate moves the variable against the gradient.
        opt.set_learning_rate(1e-2);
        let grads = var.as_tensor().sqr()?.sum_all()?.backward()?;
        opt.step(&grads)?;
        let v = var.as_tensor().to_vec1::<f32>()?;
        assert!(v[0] < 1.0 && v[0] > 0.0);
        assert!(v[1] > -1.0 && v[1] < 0.0);

        Ok(())
    }
}
