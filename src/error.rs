// In: src/error.rs

//! This module defines the single, unified error type for the entire silo library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiloError {
    // =========================================================================
    // === Decode errors (fatal unless sloppy mode recovers them locally)
    // =========================================================================
    /// A high-resolution value's second half did not classify as expected.
    #[error("desynchronized high-resolution pair at line {line}, column {column}")]
    Desynchronized { line: u64, column: i32 },

    /// The classifier could not categorize a byte pair.
    #[error("unknown unit tag {tag:#04x} at line {line}")]
    UnknownUnit { tag: u8, line: u64 },

    /// Columns sharing a record kind disagree on their position counters.
    #[error("columns of record kind {record_kind} out of sync at line {line} (variable '{name}')")]
    SyncViolation {
        record_kind: i32,
        line: u64,
        name: String,
    },

    /// Columns disagree on position counters after switching inputs.
    #[error("input #{input} left variable '{name}' out of sync with its record kind")]
    CrossInputSync { input: usize, name: String },

    // =========================================================================
    // === Configuration & internal errors
    // =========================================================================
    #[error("invalid column configuration: {0}")]
    InvalidColumnConfig(String),

    #[error("value {0} is not representable as a storage unit")]
    Unrepresentable(f64),

    #[error("internal logic error (this is a bug): {0}")]
    Internal(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error raised by the output sink while writing a flushed range.
    #[error("sink write failed: {0}")]
    Sink(String),
}
