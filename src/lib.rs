//! This file is the root of the `silo` Rust crate.
//!
//! `silo` decodes datalogger final-storage streams (binary byte pairs or
//! delimited text) and accumulates the decoded values into columnar sample
//! buffers that flush to a pluggable `ColumnSink`. The decode path supports
//! record filtering and start/stop windowing, following variables, derived
//! time columns, and a listing mode that formats records as text instead of
//! accumulating them.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod codec;
pub mod columns;
pub mod conditions;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod sink;
pub mod traits;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use columns::{ColumnDef, ColumnTable, TimeComponentSpec, TimeSpec};
pub use conditions::{ColumnCompare, CompareOp, ConditionSet};
pub use config::{DecodeConfig, InputFormat, Preview, TextDelimiter};
pub use error::SiloError;
pub use session::{Conditions, DecodeSession, DecodeSummary};
pub use sink::MemorySink;
pub use traits::{ColumnHandle, ColumnSink, RecordCondition};
