//! Pure, stateless codecs for the two input shapes: binary final-storage
//! byte pairs and delimited text lines.

pub mod text;
pub mod unit;
