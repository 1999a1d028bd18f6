//! Column bindings and their sample accumulators.

mod accumulator;
mod table;

pub use accumulator::{SampleBuffer, MAX_SAMPLES};
pub use table::{
    hour_minutes_to_seconds, ColumnDef, ColumnTable, TimeComponentSpec, TimeSpec,
};
