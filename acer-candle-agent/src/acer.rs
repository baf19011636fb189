//! Actor-critic with experience replay (ACER) agent.
mod base;
mod config;
mod loss;
mod model;
pub use base::Acer;
pub use config::AcerConfig;
pub use loss::{AcerStats, TrustRegionStats};
pub use model::AcerModel;
