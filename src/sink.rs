//! An in-memory `ColumnSink` that materializes flushed ranges per handle.
//! Used by the test suite and by embedding callers that post-process whole
//! columns in memory.

use std::collections::BTreeMap;

use crate::error::SiloError;
use crate::traits::{ColumnHandle, ColumnSink};

/// Collects `write_range` calls, keyed by handle and start row. Later writes
/// to the same start row replace earlier ones.
#[derive(Debug, Default)]
pub struct MemorySink {
    ranges: BTreeMap<ColumnHandle, BTreeMap<u64, Vec<f64>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The column's values in row order, concatenated across writes.
    pub fn column(&self, handle: ColumnHandle) -> Vec<f64> {
        self.ranges
            .get(&handle)
            .map(|writes| writes.values().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Number of `write_range` calls received for the handle.
    pub fn write_count(&self, handle: ColumnHandle) -> usize {
        self.ranges.get(&handle).map_or(0, |w| w.len())
    }
}

impl ColumnSink for MemorySink {
    fn write_range(
        &mut self,
        handle: ColumnHandle,
        start: u64,
        rows: usize,
        values: &[f64],
    ) -> Result<(), SiloError> {
        if rows > 0 && values.len() % rows != 0 {
            return Err(SiloError::Sink(format!(
                "range of {} values is not a whole number of {} rows",
                values.len(),
                rows
            )));
        }
        self.ranges
            .entry(handle)
            .or_default()
            .insert(start, values.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_concatenate_in_row_order() {
        let mut sink = MemorySink::new();
        sink.write_range(0, 2, 2, &[3.0, 4.0]).unwrap();
        sink.write_range(0, 0, 2, &[1.0, 2.0]).unwrap();
        assert_eq!(sink.column(0), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(sink.write_count(0), 2);
        assert!(sink.column(1).is_empty());
    }

    #[test]
    fn ragged_range_is_rejected() {
        let mut sink = MemorySink::new();
        assert!(sink.write_range(0, 0, 2, &[1.0, 2.0, 3.0]).is_err());
    }
}
