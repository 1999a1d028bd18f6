// In: src/config.rs

//! The single source of truth for decode-session configuration.
//!
//! This module defines the unified `DecodeConfig` struct, which is designed to
//! be created once at the application boundary (e.g., from a CLI parser or a
//! JSON document) and then handed to `DecodeSession::new`. Centralizing the
//! settings here keeps the decode loop free of flag plumbing.

use serde::{Deserialize, Serialize};

//==================================================================================
// I. Core Configuration Enums
//==================================================================================

/// The physical shape of the input stream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// **Default:** binary final-storage byte pairs.
    #[default]
    Binary,

    /// Line-oriented delimited text records.
    Text(TextDelimiter),
}

/// Token delimiter for text-mode inputs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextDelimiter {
    #[default]
    Comma,
    /// Any run of spaces or tabs separates tokens.
    Whitespace,
    Tab,
}

/// Listing mode: format decoded records as text lines instead of accumulating
/// them. Used as a drop-in replacement for the vendor's own split utility.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Preview {
    /// **Default:** decode into column buffers; no listing.
    #[default]
    Off,

    /// List the first `n` records, then terminate the session.
    Lines(u64),

    /// List every record in the session.
    All,
}

impl Preview {
    /// True when any listing mode is active (accumulation is disabled).
    pub fn is_on(&self) -> bool {
        !matches!(self, Preview::Off)
    }

    /// True while `line` (1-based) is still within the listing budget.
    pub fn wants_line(&self, line: u64) -> bool {
        match self {
            Preview::Off => false,
            Preview::Lines(n) => line <= *n,
            Preview::All => true,
        }
    }
}

//==================================================================================
// II. The Unified DecodeConfig
//==================================================================================

/// The single, unified configuration for one decode session.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct DecodeConfig {
    /// The physical input format (binary final storage or delimited text).
    #[serde(default)]
    pub format: InputFormat,

    /// If true, structural errors in the input (desynchronization, unknown
    /// units, sync violations) are diagnosed and locally corrected instead of
    /// aborting the session.
    #[serde(default)]
    pub sloppy: bool,

    /// If true, the stream carries no record-kind column. The kind is taken
    /// from the first column definition (0 in preview mode) and, in text mode,
    /// the first token of each line is treated as the first data value.
    #[serde(default)]
    pub fake_record_kind: bool,

    /// Number of leading lines to skip in each text input.
    #[serde(default)]
    pub skip_lines: usize,

    /// Listing mode; `Off` for normal decoding into column buffers.
    #[serde(default)]
    pub preview: Preview,

    /// Decimal places used when formatting preview values.
    #[serde(default = "default_decimal_places")]
    pub decimal_places: usize,

    /// 1-based columns to include in preview lines. `None` prints all columns.
    #[serde(default)]
    pub preview_columns: Option<Vec<usize>>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            format: InputFormat::default(),
            sloppy: false,
            fake_record_kind: false,
            skip_lines: 0,
            preview: Preview::default(),
            decimal_places: default_decimal_places(),
            preview_columns: None,
        }
    }
}

/// Helper for `serde` to provide a default for `decimal_places`.
fn default_decimal_places() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = DecodeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: DecodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.format, InputFormat::Binary);
        assert!(!back.sloppy);
        assert_eq!(back.preview, Preview::Off);
        assert_eq!(back.decimal_places, 10);
    }

    #[test]
    fn preview_budget() {
        assert!(Preview::All.wants_line(1_000_000));
        assert!(Preview::Lines(3).wants_line(3));
        assert!(!Preview::Lines(3).wants_line(4));
        assert!(!Preview::Off.wants_line(1));
    }
}
