//! The decode session: the stateful loop that walks one or more inputs,
//! classifies units, routes values into the column table, and applies the
//! record-boundary pipeline (filter, start/stop windowing, back-fill, sync
//! check, rollback, derived-time finalization, flushing).
//!
//! The session is a coordinator. Pure unit decoding lives in `codec`, all
//! per-column bookkeeping lives in `columns::ColumnTable`; what remains here
//! is the cursor state machine and the boundary ordering.

use std::io::{Read, Write};

use log::{info, warn};

use crate::codec::text::{tokenize, NO_VALUE};
use crate::codec::unit::{
    classify, decode_high_resolution, decode_low_resolution, record_kind, UnitKind,
};
use crate::columns::ColumnTable;
use crate::conditions::ConditionSet;
use crate::config::{DecodeConfig, InputFormat, Preview};
use crate::error::SiloError;
use crate::session::feed::{ByteFeed, TextFeed};
use crate::traits::{ColumnSink, RecordCondition};

//==================================================================================
// 1. Session-level condition wiring
//==================================================================================

/// Filter and windowing conditions for one session.
///
/// The filter set gates record retention; the optional start condition latches
/// retention on once it first matches, and the optional stop condition ends
/// the session at the record that matches it (that record excluded).
#[derive(Default)]
pub struct Conditions {
    pub filter: ConditionSet,
    pub start: Option<Box<dyn RecordCondition>>,
    pub stop: Option<Box<dyn RecordCondition>>,
}

impl Conditions {
    /// No filtering, no window: every record is retained.
    pub fn none() -> Self {
        Self::default()
    }

    fn observe(&mut self, record_kind: i32, column: i32, value: f64) {
        self.filter.observe(record_kind, column, value);
        if let Some(start) = self.start.as_mut() {
            start.observe(record_kind, column, value);
        }
        if let Some(stop) = self.stop.as_mut() {
            stop.observe(record_kind, column, value);
        }
    }

    fn reset(&mut self, record_kind: i32) {
        self.filter.reset(record_kind);
        if let Some(start) = self.start.as_mut() {
            start.reset(record_kind);
        }
        if let Some(stop) = self.stop.as_mut() {
            stop.reset(record_kind);
        }
    }
}

//==================================================================================
// 2. The session
//==================================================================================

/// Totals reported when a session finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Records fully observed (boundary reached).
    pub records: u64,
    /// Records retained after filtering and windowing.
    pub records_kept: u64,
    /// Filler units skipped across all inputs.
    pub filler_units: u64,
}

pub struct DecodeSession {
    table: ColumnTable,
    conditions: Conditions,
    config: DecodeConfig,

    /// Kind of the record currently being assembled; `None` before the first
    /// record start of an input.
    record_kind: Option<i32>,
    /// 1-based unit cursor within the record (1 is the record id unit);
    /// -1 after losing the column position in sloppy mode.
    cursor: i32,
    /// 1-based count of records begun; doubles as the diagnostic line number.
    line: u64,
    terminated: bool,

    start_latched: bool,
    stop_hit: bool,

    filler_run: u64,
    filler_total: u64,
    records_seen: u64,
    records_kept: u64,

    /// The listing line being assembled for the current record, when active.
    preview_line: Option<String>,
}

impl DecodeSession {
    pub fn new(table: ColumnTable, conditions: Conditions, config: DecodeConfig) -> Self {
        Self {
            table,
            conditions,
            config,
            record_kind: None,
            cursor: 0,
            line: 0,
            terminated: false,
            start_latched: false,
            stop_hit: false,
            filler_run: 0,
            filler_total: 0,
            records_seen: 0,
            records_kept: 0,
            preview_line: None,
        }
    }

    /// Decode all inputs in order into `sink`. Preview lines, when listing is
    /// enabled, are written to `out`; nothing is written there otherwise.
    pub fn run(
        &mut self,
        inputs: &mut [&mut dyn Read],
        sink: &mut dyn ColumnSink,
        out: &mut dyn Write,
    ) -> Result<DecodeSummary, SiloError> {
        for (index, input) in inputs.iter_mut().enumerate() {
            if self.terminated {
                break;
            }
            if index > 0 && !self.previewing() {
                self.table.resync_between_inputs(index, self.config.sloppy)?;
            }
            match self.config.format {
                InputFormat::Binary => self.decode_binary(&mut **input, sink, out)?,
                InputFormat::Text(_) => self.decode_text(&mut **input, sink, out)?,
            }
            if !self.terminated {
                // End of input closes the pending record like a boundary.
                self.finalize_pending(true, sink, out)?;
                self.record_kind = None;
                self.cursor = 0;
                if self.stop_hit {
                    self.terminated = true;
                }
            }
        }
        if !self.previewing() {
            self.table.drain_all(sink)?;
        }
        let summary = DecodeSummary {
            records: self.records_seen,
            records_kept: self.records_kept,
            filler_units: self.filler_total,
        };
        info!(
            "session done: {} records seen, {} kept, {} filler units",
            summary.records, summary.records_kept, summary.filler_units
        );
        Ok(summary)
    }

    /// Records for which a following variable had no captured value when its
    /// followed kind came around.
    pub fn missed_follow(&self, handle: usize) -> u64 {
        self.table.missed_follow(handle)
    }

    fn previewing(&self) -> bool {
        self.config.preview.is_on()
    }

    /// The record kind used when the stream carries none.
    fn synthetic_kind(&self) -> i32 {
        if self.previewing() {
            0
        } else {
            self.table.default_record_kind().unwrap_or(0)
        }
    }

    //==============================================================================
    // 2.1 Binary decode loop
    //==============================================================================

    fn decode_binary(
        &mut self,
        input: &mut dyn Read,
        sink: &mut dyn ColumnSink,
        out: &mut dyn Write,
    ) -> Result<(), SiloError> {
        let mut feed = ByteFeed::new(input);
        loop {
            if self.terminated {
                return Ok(());
            }
            if !feed.ensure(2)? {
                if feed.available() == 1 {
                    warn!("line {}: dropping trailing odd byte at end of input", self.line);
                }
                self.end_filler_run();
                return Ok(());
            }
            let pair = feed.peek_pair(0);
            let kind = classify(pair);
            if kind != UnitKind::Filler {
                self.end_filler_run();
            }
            match kind {
                UnitKind::Value => {
                    feed.consume(2);
                    self.handle_value(decode_low_resolution(pair));
                }
                UnitKind::FourByteFirst => {
                    let complete =
                        feed.ensure(4)? && classify(feed.peek_pair(2)) == UnitKind::FourByteSecond;
                    if complete {
                        let second = feed.peek_pair(2);
                        feed.consume(4);
                        self.handle_value(decode_high_resolution(pair, second));
                    } else if self.config.sloppy {
                        warn!(
                            "line {}: lost synchronization in high-resolution pair, skipping one byte",
                            self.line
                        );
                        feed.consume(1);
                    } else {
                        return Err(SiloError::Desynchronized {
                            line: self.line,
                            column: self.cursor,
                        });
                    }
                }
                UnitKind::RecordStart => {
                    feed.consume(2);
                    let id = if self.config.fake_record_kind {
                        self.synthetic_kind()
                    } else {
                        record_kind(pair)
                    };
                    let at_line_start = self.cursor == 1;
                    self.begin_record(id, id as f64, at_line_start, sink, out)?;
                }
                UnitKind::Filler => {
                    feed.consume(2);
                    if self.filler_run == 0 {
                        info!("line {}: found filler word", self.line);
                    }
                    self.filler_run += 1;
                    self.filler_total += 1;
                }
                UnitKind::FourByteSecond | UnitKind::Unknown => {
                    if !self.config.sloppy {
                        return Err(SiloError::UnknownUnit {
                            tag: pair[0],
                            line: self.line,
                        });
                    }
                    warn!(
                        "line {}: unknown unit tag {:#04x}, skipping one byte",
                        self.line, pair[0]
                    );
                    feed.consume(1);
                    self.cursor = -1;
                }
            }
        }
    }

    /// Handle one decoded value unit: advance the cursor, feed conditions and
    /// (outside preview) the column table.
    fn handle_value(&mut self, value: f64) {
        let at_record_start = self.cursor == 1;
        let positioned = self.cursor > 0;
        if positioned {
            self.cursor += 1;
        }
        let column = if positioned { self.cursor } else { -1 };
        let kind = self.record_kind.unwrap_or(-1);
        if positioned {
            self.preview_push(column, value);
        }
        self.conditions.observe(kind, column, value);
        if positioned && !self.previewing() {
            self.table.route_value(kind, column, value, at_record_start);
        }
    }

    //==============================================================================
    // 2.2 Text decode loop
    //==============================================================================

    fn decode_text(
        &mut self,
        input: &mut dyn Read,
        sink: &mut dyn ColumnSink,
        out: &mut dyn Write,
    ) -> Result<(), SiloError> {
        let delimiter = match self.config.format {
            InputFormat::Text(d) => d,
            InputFormat::Binary => {
                return Err(SiloError::Internal(
                    "text decode invoked on a binary session".into(),
                ))
            }
        };
        let mut feed = TextFeed::new(input);
        feed.skip_lines(self.config.skip_lines)?;

        while let Some(raw_line) = feed.next_line()? {
            if self.terminated {
                return Ok(());
            }
            let tokens = tokenize(&raw_line, delimiter);
            if tokens.is_empty() {
                continue;
            }
            let id = if self.config.fake_record_kind {
                self.synthetic_kind()
            } else {
                tokens[0] as i32
            };
            // Conditions see the first token itself, not the (possibly
            // synthetic) kind derived from it.
            self.begin_record(id, tokens[0], true, sink, out)?;
            if self.terminated {
                return Ok(());
            }

            // Without a record-kind column the first token is re-read as data:
            // begin_record left the cursor at 0, so column 1 maps to token 0.
            let mut at_record_start = true;
            while (self.cursor as usize) < tokens.len() {
                self.cursor += 1;
                let column = self.cursor;
                let raw = tokens[(column - 1) as usize];
                let value = if raw == NO_VALUE {
                    self.table.fill_value_for(id, column).unwrap_or(NO_VALUE)
                } else {
                    raw
                };
                self.preview_push(column, value);
                self.conditions.observe(id, column, value);
                if !self.previewing() {
                    self.table.route_value(id, column, value, at_record_start);
                }
                at_record_start = false;
            }
        }
        Ok(())
    }

    //==============================================================================
    // 2.3 Record boundaries
    //==============================================================================

    /// Close the pending record (if any) and establish a new one of `kind`.
    /// `id_value` is what the conditions observe at the id column: the kind
    /// for binary streams, the raw first token for text lines.
    fn begin_record(
        &mut self,
        kind: i32,
        id_value: f64,
        at_line_start: bool,
        sink: &mut dyn ColumnSink,
        out: &mut dyn Write,
    ) -> Result<(), SiloError> {
        self.finalize_pending(at_line_start, sink, out)?;
        if self.stop_hit {
            self.terminated = true;
            return Ok(());
        }
        self.record_kind = Some(kind);
        self.line += 1;
        self.conditions.reset(kind);
        // In fake text mode the cursor starts at 0 so the first token is read
        // again as the first data value.
        self.cursor = if self.config.fake_record_kind
            && matches!(self.config.format, InputFormat::Text(_))
        {
            0
        } else {
            1
        };

        if self.previewing() {
            if !self.config.preview.wants_line(self.line) {
                if matches!(self.config.preview, Preview::Lines(_)) {
                    self.terminated = true;
                }
                return Ok(());
            }
            let mut assembled = String::new();
            if self.preview_column_selected(1) {
                assembled.push_str(&format!("{} ", kind));
            }
            self.preview_line = Some(assembled);
        }
        self.conditions.observe(kind, self.cursor, id_value);
        Ok(())
    }

    /// The record-boundary pipeline, in order: start latch and stop
    /// re-evaluation, preview emission, back-fill (sloppy), sync check,
    /// retention or rollback, per-record flag reset, derived-time
    /// finalization, buffer flushing.
    fn finalize_pending(
        &mut self,
        at_line_start: bool,
        sink: &mut dyn ColumnSink,
        out: &mut dyn Write,
    ) -> Result<(), SiloError> {
        let finished = self.record_kind;
        if finished.is_some() {
            self.start_latched = match &self.conditions.start {
                Some(start) => self.start_latched || start.matched(),
                None => true,
            };
            self.stop_hit = self
                .conditions
                .stop
                .as_ref()
                .map_or(false, |stop| stop.matched());
        }
        let retained =
            self.conditions.filter.all_matched() && self.start_latched && !self.stop_hit;

        if let Some(line) = self.preview_line.take() {
            if retained {
                writeln!(out, "{}", line.trim_end())?;
            }
        }

        if let Some(kind) = finished {
            self.records_seen += 1;
            if !self.previewing() {
                if self.config.sloppy {
                    self.table.backfill_missing(kind, self.line);
                }
                self.table.check_sync(kind, self.line)?;
                if retained {
                    self.records_kept += 1;
                } else {
                    self.table.rollback_record(kind);
                }
            }
        }
        self.table.reset_record_flags();
        if at_line_start {
            self.table.finalize_time_columns();
        }
        if !self.previewing() {
            self.table.flush_full(sink)?;
        }
        Ok(())
    }

    //==============================================================================
    // 2.4 Diagnostics and listing helpers
    //==============================================================================

    /// Coalesce the filler diagnostic when a run of filler units ends.
    fn end_filler_run(&mut self) {
        if self.filler_run > 1 {
            info!("previous message repeated {} times", self.filler_run - 1);
        }
        self.filler_run = 0;
    }

    fn preview_column_selected(&self, column: i32) -> bool {
        match &self.config.preview_columns {
            None => true,
            Some(columns) => columns.contains(&(column as usize)),
        }
    }

    fn preview_push(&mut self, column: i32, value: f64) {
        if self.preview_line.is_none() || !self.preview_column_selected(column) {
            return;
        }
        let places = self.config.decimal_places;
        if let Some(line) = self.preview_line.as_mut() {
            line.push_str(&format!("{value:.places$} "));
        }
    }
}
