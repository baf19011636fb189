//! Key-value records of training metrics.
//!
//! Every gradient step of an agent returns a [`Record`], and the
//! [`Trainer`](crate::Trainer) adds rollout statistics such as `fps` and
//! `mean_episode_reward` before handing it to an [`AggregateRecorder`].
//!
//! ```rust
//! use acer_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.5);
//! record.insert("explained_variance", RecordValue::Scalar(0.1));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
//! ```
//!
//! Recorders:
//!
//! * [`NullRecorder`] discards everything.
//! * [`BufferedRecorder`] keeps records in memory, mostly for tests.
//! * [`RecordStorage`] aggregates stored scalars (min, max, mean, median) and is used by
//!   recorders writing to external sinks, e.g. `TensorboardRecorder` in `acer-tensorboard`.
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
