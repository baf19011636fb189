//! Environments.
mod identity;
pub use identity::{IdentityEnv, IdentityEnvConfig};
