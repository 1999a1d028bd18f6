//! This module defines the traits at the seams of the decode engine: the
//! columnar output sink and the opaque record conditions. Both are implemented
//! by collaborators outside this core.

use crate::error::SiloError;

/// Opaque per-column address in the output sink. The `ColumnTable` assigns one
/// to every column definition at construction time.
pub type ColumnHandle = usize;

/// **CONTRACT:** A write-only columnar store addressed by a per-column handle
/// and a contiguous row range.
///
/// `values` is row-major: `rows * span` samples, where `span` is the column's
/// vector width as registered with the sink. The engine only calls this at
/// flush points and at the final drain; calls for one handle arrive in
/// strictly increasing `start` order.
pub trait ColumnSink {
    fn write_range(
        &mut self,
        handle: ColumnHandle,
        start: u64,
        rows: usize,
        values: &[f64],
    ) -> Result<(), SiloError>;
}

/// **CONTRACT:** An opaque predicate over `(record_kind, column, value)`
/// triples, evaluated incrementally as values stream in.
///
/// The engine feeds every decoded unit of a record to the condition (the
/// record-id unit arrives as column 1 with the kind as its value), queries
/// `matched` at the record boundary, and resets the evaluator when a new
/// record begins.
pub trait RecordCondition {
    /// Feed one decoded value. `column` is the 1-based position within the
    /// record; -1 marks an invalidated cursor and may be ignored.
    fn observe(&mut self, record_kind: i32, column: i32, value: f64);

    /// The per-record matched state accumulated since the last reset.
    fn matched(&self) -> bool;

    /// Begin evaluating a new record of the given kind.
    fn reset(&mut self, record_kind: i32);
}
