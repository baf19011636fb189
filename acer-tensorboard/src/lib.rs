//! Writes training metrics of ACER to TensorBoard event files.
use acer_core::record::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// As an [`AggregateRecorder`], scalars stored between two flushes are summarized by
/// [`RecordStorage`] and written at the step given to [`AggregateRecorder::flush`].
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    ignore_unsupported_value: bool,
    storage: RecordStorage,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "total_timesteps".to_string(),
            ignore_unsupported_value: true,
            storage: RecordStorage::new(),
        }
    }

    /// Construct a [`TensorboardRecorder`] warning about values that can't be written.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            ignore_unsupported_value: false,
            ..Self::new(logdir)
        }
    }

    fn write_at(&mut self, record: &Record, step: usize) {
        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                _ => {
                    if !self.ignore_unsupported_value {
                        warn!("Unsupported value: {:?}", (k, v));
                    }
                }
            }
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord at the step given by its
    /// `total_timesteps` value.
    ///
    /// Only [`RecordValue::Scalar`] is written. Records without the step are skipped.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Record without {} is skipped", self.step_key);
                return;
            }
        };
        self.write_at(&record, step);
    }
}

impl AggregateRecorder for TensorboardRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let record = self.storage.aggregate();
        self.write_at(&record, step.max(0) as usize);
        self.writer.flush();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;
    use tempdir::TempDir;

    #[test]
    fn test_flush_writes_event_file() -> Result<()> {
        let dir = TempDir::new("acer_tensorboard")?;
        {
            let mut recorder = TensorboardRecorder::new_with_check_unsupported_value(dir.path());
            recorder.store(Record::from_slice(&[(
                "env",
                RecordValue::String("identity".to_string()),
            )]));
            for loss in [0.5f32, 0.3] {
                recorder.store(Record::from_scalar("loss", loss));
            }
            recorder.flush(100);
            recorder.write(Record::from_slice(&[
                ("total_timesteps", RecordValue::Scalar(200.0)),
                ("fps", RecordValue::Scalar(1000.0)),
            ]));
        }
        assert!(std::fs::read_dir(dir.path())?.count() > 0);
        Ok(())
    }
}
