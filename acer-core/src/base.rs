//! Core interfaces.
mod agent;
mod env;
mod policy;
mod step;
pub use agent::Agent;
pub use env::VecEnv;
pub use policy::{Policy, PolicyStep};
pub use step::Step;
