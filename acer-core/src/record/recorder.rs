use super::Record;

/// Writes a record to an output destination.
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);
}

/// A recorder storing records and writing values aggregated over them.
pub trait AggregateRecorder {
    /// Stores a record.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records, then clears them.
    ///
    /// `step` is the x-axis value of the written values, typically the number of
    /// environment steps done so far.
    fn flush(&mut self, step: i64);
}
