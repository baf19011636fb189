//! Multilayer perceptron with a policy head and an action-value head.
mod base;
mod config;
pub use base::Mlp;
pub use config::MlpConfig;
