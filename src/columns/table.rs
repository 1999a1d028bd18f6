//! The column binding table: ordered column definitions bound to sample
//! accumulators, and the routing of decoded `(record_kind, column, value)`
//! triples into them.
//!
//! Columns live in an arena and are addressed by their stable index, which
//! doubles as the sink handle. All record-boundary sweeps (back-fill, sync
//! check, rollback, derived-time finalization, flushing) are methods here so
//! the decode loop stays a pure coordinator.

use log::warn;

use crate::columns::accumulator::SampleBuffer;
use crate::error::SiloError;
use crate::traits::{ColumnHandle, ColumnSink};

//==================================================================================
// 1. Column definitions
//==================================================================================

/// Marks a column as a derived-time column synthesized from `components`
/// contributing sources instead of decoded directly.
#[derive(Debug, Clone)]
pub struct TimeSpec {
    /// Number of time components that must arrive before one time value is
    /// complete.
    pub components: u32,
}

/// Marks a column as contributing to a derived-time column.
#[derive(Debug, Clone)]
pub struct TimeComponentSpec {
    /// Name of the derived-time column receiving the contribution.
    pub target: String,
    pub offset: f64,
    pub multiplier: f64,
    /// The source value is an HHMM clock reading; convert to seconds before
    /// applying offset and multiplier.
    pub hour_minute: bool,
}

/// One column definition, as delivered by the external format-file parser.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    /// The record kind (array id) this column belongs to.
    pub record_kind: i32,
    /// 1-based position within the record; position 1 is the record id unit.
    pub position: i32,
    /// Vector width; scalar columns have span 1.
    pub span: usize,
    /// Stored when a slot has no data.
    pub fill_value: f64,
    /// A following variable: captured under `record_kind`, written out when a
    /// record of this kind is next observed.
    pub follow_kind: Option<i32>,
    pub time: Option<TimeSpec>,
    pub time_component: Option<TimeComponentSpec>,
}

impl ColumnDef {
    /// A plain scalar column bound to `(record_kind, position)`.
    pub fn scalar(name: &str, record_kind: i32, position: i32, fill_value: f64) -> Self {
        Self {
            name: name.to_string(),
            record_kind,
            position,
            span: 1,
            fill_value,
            follow_kind: None,
            time: None,
            time_component: None,
        }
    }
}

/// Convert an HHMM clock reading (e.g. 1345) to seconds since midnight.
pub fn hour_minutes_to_seconds(value: f64) -> f64 {
    let hours = (value / 100.0).trunc();
    let minutes = value - hours * 100.0;
    hours * 3600.0 + minutes * 60.0
}

//==================================================================================
// 2. Bound columns (definition + runtime state)
//==================================================================================

#[derive(Debug)]
struct TimeState {
    acc: f64,
    received: u32,
}

#[derive(Debug)]
struct FollowState {
    pending: Vec<f64>,
    have_pending: bool,
    missed: u64,
}

/// A column definition bound to its accumulator and per-record state.
#[derive(Debug)]
pub struct BoundColumn {
    def: ColumnDef,
    buffer: SampleBuffer,
    got_value: bool,
    time: Option<TimeState>,
    follow: Option<FollowState>,
    /// Resolved arena index of the derived-time column this one feeds.
    time_target: Option<usize>,
}

impl BoundColumn {
    /// True for columns synchronized by the per-record invariant: bound
    /// directly to their record kind, neither following nor time-derived.
    fn is_plain(&self) -> bool {
        self.def.follow_kind.is_none() && self.def.time.is_none()
    }
}

//==================================================================================
// 3. The table
//==================================================================================

/// The ordered collection of bound columns for one decode session.
pub struct ColumnTable {
    columns: Vec<BoundColumn>,
}

impl ColumnTable {
    /// Bind the given definitions, resolving derived-time targets by name.
    pub fn new(defs: Vec<ColumnDef>) -> Result<Self, SiloError> {
        let mut columns: Vec<BoundColumn> = Vec::with_capacity(defs.len());
        for def in defs {
            if def.span == 0 {
                return Err(SiloError::InvalidColumnConfig(format!(
                    "column '{}' has span 0",
                    def.name
                )));
            }
            if def.time.is_some() && def.span != 1 {
                return Err(SiloError::InvalidColumnConfig(format!(
                    "derived-time column '{}' must have span 1",
                    def.name
                )));
            }
            let time = def.time.as_ref().map(|_| TimeState {
                acc: 0.0,
                received: 0,
            });
            let follow = def.follow_kind.map(|_| FollowState {
                pending: vec![def.fill_value; def.span],
                have_pending: false,
                missed: 0,
            });
            columns.push(BoundColumn {
                buffer: SampleBuffer::new(def.span),
                got_value: false,
                time,
                follow,
                time_target: None,
                def,
            });
        }

        // Resolve time-component targets after all names are known.
        for idx in 0..columns.len() {
            if let Some(tc) = columns[idx].def.time_component.clone() {
                let target = columns
                    .iter()
                    .position(|c| c.def.name == tc.target && c.def.time.is_some())
                    .ok_or_else(|| {
                        SiloError::InvalidColumnConfig(format!(
                            "column '{}' feeds unknown time column '{}'",
                            columns[idx].def.name, tc.target
                        ))
                    })?;
                columns[idx].time_target = Some(target);
            }
        }
        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Record kind of the first definition; used when the stream carries none.
    pub fn default_record_kind(&self) -> Option<i32> {
        self.columns.first().map(|c| c.def.record_kind)
    }

    pub fn name(&self, handle: ColumnHandle) -> &str {
        &self.columns[handle].def.name
    }

    pub fn lifetime(&self, handle: ColumnHandle) -> u64 {
        self.columns[handle].buffer.lifetime()
    }

    pub fn buffer_fill(&self, handle: ColumnHandle) -> usize {
        self.columns[handle].buffer.fill()
    }

    /// Records for which a follow emission found no captured value.
    pub fn missed_follow(&self, handle: ColumnHandle) -> u64 {
        self.columns[handle].follow.as_ref().map_or(0, |f| f.missed)
    }

    /// Fill value of the column owning `(record_kind, column)`, if any.
    pub fn fill_value_for(&self, record_kind: i32, column: i32) -> Option<f64> {
        self.columns
            .iter()
            .find(|c| {
                c.def.record_kind == record_kind
                    && column >= c.def.position
                    && column < c.def.position + c.def.span as i32
            })
            .map(|c| c.def.fill_value)
    }

    //==============================================================================
    // 3.1 Value routing
    //==============================================================================

    /// Route one decoded value into every eligible column.
    ///
    /// `at_record_start` is true for the first value unit of a record; it
    /// gates follow emission and derived-time triggering.
    pub fn route_value(&mut self, record_kind: i32, column: i32, value: f64, at_record_start: bool) {
        // Contributions into derived-time columns are gathered first because
        // they cross column boundaries within the arena.
        let mut time_contributions: Vec<(usize, f64)> = Vec::new();

        for col in self.columns.iter_mut() {
            let def = &col.def;
            let direct = def.record_kind == record_kind
                && column >= def.position
                && column < def.position + def.span as i32;
            let follow_emission =
                def.follow_kind == Some(record_kind) && at_record_start && def.record_kind != record_kind;
            if !direct && !follow_emission {
                continue;
            }
            // Derived-time columns advance at record boundaries, not here.
            if def.time.is_some() {
                continue;
            }

            if def.follow_kind.is_none() {
                // Direct (possibly vector) match.
                let component = (column - def.position) as usize;
                col.buffer.put(component, value, def.fill_value);
                if column == def.position + def.span as i32 - 1 {
                    col.buffer.commit_row();
                    col.got_value = true;
                    if let (Some(tc), Some(target)) = (&def.time_component, col.time_target) {
                        time_contributions.push((target, time_contribution(tc, value)));
                    }
                }
            } else if direct {
                // Follow capture: hold the value until the followed kind appears.
                let component = (column - def.position) as usize;
                if let Some(follow) = col.follow.as_mut() {
                    follow.pending[component] = value;
                    follow.have_pending = true;
                }
                col.got_value = true;
            } else {
                // Follow emission on the record-start unit of the followed kind.
                if let Some(follow) = col.follow.as_mut() {
                    if follow.have_pending {
                        for (j, pending) in follow.pending.iter().enumerate() {
                            col.buffer.put(j, *pending, def.fill_value);
                        }
                        col.buffer.commit_row();
                        col.got_value = true;
                        if follow.missed > 0 {
                            warn!(
                                "no data for following variable '{}' on {} records",
                                def.name, follow.missed
                            );
                            follow.missed = 0;
                        }
                        // The held value also feeds its own time component on
                        // the followed kind's record.
                        if let (Some(tc), Some(target)) = (&def.time_component, col.time_target) {
                            time_contributions.push((target, time_contribution(tc, follow.pending[0])));
                        }
                    } else {
                        follow.missed += 1;
                    }
                }
            }
        }

        for (target, contribution) in time_contributions {
            let col = &mut self.columns[target];
            if let Some(time) = col.time.as_mut() {
                if time.received == 0 {
                    time.acc = 0.0;
                }
                time.acc += contribution;
                time.received += 1;
            }
        }
    }

    //==============================================================================
    // 3.2 Record-boundary sweeps
    //==============================================================================

    /// Sloppy-mode back-fill: every plain column of the record kind that got
    /// no value this record commits a row of its fill value.
    pub fn backfill_missing(&mut self, record_kind: i32, line: u64) {
        for col in self.columns.iter_mut() {
            if col.is_plain() && col.def.record_kind == record_kind && !col.got_value {
                col.buffer.backfill_row(col.def.fill_value);
                col.got_value = true;
                warn!(
                    "line {}: filling missing value of variable '{}' with its fill value",
                    line, col.def.name
                );
            }
        }
    }

    /// The cross-column synchronization invariant: every plain column of the
    /// record kind must agree on `lifetime` and `fill` at the boundary.
    pub fn check_sync(&self, record_kind: i32, line: u64) -> Result<(), SiloError> {
        let mut expected: Option<(u64, usize)> = None;
        for col in self.columns.iter() {
            if !col.is_plain() || col.def.record_kind != record_kind {
                continue;
            }
            let counters = (col.buffer.lifetime(), col.buffer.fill());
            match expected {
                None => expected = Some(counters),
                Some(e) if e == counters => {}
                Some(_) => {
                    return Err(SiloError::SyncViolation {
                        record_kind,
                        line,
                        name: col.def.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Roll back the rejected record: one row off every column that received
    /// a value this record and is owned by, or follows, the record kind.
    pub fn rollback_record(&mut self, record_kind: i32) {
        for col in self.columns.iter_mut() {
            let owned = col.def.follow_kind.is_none() && col.def.record_kind == record_kind;
            let following = col.def.follow_kind == Some(record_kind);
            if col.got_value && (owned || following) {
                col.buffer.rollback_row();
            }
        }
    }

    /// Reset every column's got-a-value-this-record flag.
    pub fn reset_record_flags(&mut self) {
        for col in self.columns.iter_mut() {
            col.got_value = false;
        }
    }

    /// Finalize derived-time columns whose component count is complete: push
    /// the accumulator as one committed row and reset the component counter.
    pub fn finalize_time_columns(&mut self) {
        for col in self.columns.iter_mut() {
            let expected = match &col.def.time {
                Some(spec) => spec.components,
                None => continue,
            };
            if let Some(time) = col.time.as_mut() {
                if expected > 0 && time.received == expected {
                    col.buffer.put(0, time.acc, col.def.fill_value);
                    col.buffer.commit_row();
                    col.got_value = true;
                    time.received = 0;
                }
            }
        }
    }

    /// Flush every column whose buffer reached capacity. Partial time
    /// components of a flushed time column are discarded.
    pub fn flush_full(&mut self, sink: &mut dyn ColumnSink) -> Result<(), SiloError> {
        for (handle, col) in self.columns.iter_mut().enumerate() {
            if !col.buffer.is_full() {
                continue;
            }
            let (start, rows, values) = col.buffer.drain();
            sink.write_range(handle, start, rows, &values)?;
            if let Some(time) = col.time.as_mut() {
                time.received = 0;
                time.acc = 0.0;
            }
        }
        Ok(())
    }

    /// Final drain: write every non-empty buffer window to the sink.
    pub fn drain_all(&mut self, sink: &mut dyn ColumnSink) -> Result<(), SiloError> {
        for (handle, col) in self.columns.iter_mut().enumerate() {
            if col.buffer.fill() == 0 {
                continue;
            }
            let (start, rows, values) = col.buffer.drain();
            sink.write_range(handle, start, rows, &values)?;
        }
        Ok(())
    }

    //==============================================================================
    // 3.3 Cross-input synchronization
    //==============================================================================

    /// Verify (or, in sloppy mode, force) counter agreement across all
    /// columns when switching to the next input of a session.
    pub fn resync_between_inputs(&mut self, input: usize, sloppy: bool) -> Result<(), SiloError> {
        let max_lifetime = self
            .columns
            .iter()
            .map(|c| c.buffer.lifetime())
            .max()
            .unwrap_or(0);
        let max_fill = self
            .columns
            .iter()
            .map(|c| c.buffer.fill())
            .max()
            .unwrap_or(0);
        for col in self.columns.iter_mut() {
            if col.buffer.lifetime() == max_lifetime && col.buffer.fill() == max_fill {
                continue;
            }
            if !sloppy {
                return Err(SiloError::CrossInputSync {
                    input,
                    name: col.def.name.clone(),
                });
            }
            warn!(
                "variable '{}' out of sync after input #{}, forced forward because of sloppy mode",
                col.def.name, input
            );
            col.buffer
                .force_counters(max_lifetime, max_fill, col.def.fill_value);
        }
        Ok(())
    }
}

fn time_contribution(tc: &TimeComponentSpec, raw: f64) -> f64 {
    let value = if tc.hour_minute {
        hour_minutes_to_seconds(raw)
    } else {
        raw
    };
    (value - tc.offset) * tc.multiplier
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn table_with(defs: Vec<ColumnDef>) -> ColumnTable {
        ColumnTable::new(defs).unwrap()
    }

    #[test]
    fn direct_scalar_routing_commits_on_match() {
        let mut table = table_with(vec![ColumnDef::scalar("t_air", 101, 2, -99.0)]);
        table.route_value(101, 2, 21.5, false);
        assert_eq!(table.lifetime(0), 1);
        assert_eq!(table.buffer_fill(0), 1);

        // Wrong kind or column leaves the accumulator alone.
        table.route_value(102, 2, 1.0, false);
        table.route_value(101, 3, 1.0, false);
        assert_eq!(table.lifetime(0), 1);
    }

    #[test]
    fn vector_column_commits_on_last_component() {
        let mut table = table_with(vec![ColumnDef {
            span: 3,
            ..ColumnDef::scalar("wind", 101, 2, -99.0)
        }]);
        table.route_value(101, 2, 1.0, false);
        table.route_value(101, 3, 2.0, false);
        assert_eq!(table.lifetime(0), 0, "row must not commit mid-span");
        table.route_value(101, 4, 3.0, false);
        assert_eq!(table.lifetime(0), 1);
    }

    #[test]
    fn hour_minute_conversion() {
        assert_eq!(hour_minutes_to_seconds(1345.0), 49500.0);
        assert_eq!(hour_minutes_to_seconds(0.0), 0.0);
        assert_eq!(hour_minutes_to_seconds(30.0), 1800.0);
    }

    #[test]
    fn derived_time_combines_components() {
        let mut table = table_with(vec![
            ColumnDef {
                time: Some(TimeSpec { components: 2 }),
                ..ColumnDef::scalar("time", 101, 0, -99.0)
            },
            ColumnDef {
                time_component: Some(TimeComponentSpec {
                    target: "time".into(),
                    offset: 0.0,
                    multiplier: 3600.0,
                    hour_minute: false,
                }),
                ..ColumnDef::scalar("hour", 101, 2, -99.0)
            },
            ColumnDef {
                time_component: Some(TimeComponentSpec {
                    target: "time".into(),
                    offset: 0.0,
                    multiplier: 60.0,
                    hour_minute: false,
                }),
                ..ColumnDef::scalar("minute", 101, 3, -99.0)
            },
        ]);
        table.route_value(101, 2, 13.0, false);
        table.route_value(101, 3, 45.0, false);
        table.reset_record_flags();
        table.finalize_time_columns();
        assert_eq!(table.lifetime(0), 1);

        let mut sink = MemorySink::new();
        table.drain_all(&mut sink).unwrap();
        assert_eq!(sink.column(0), vec![13.0 * 3600.0 + 45.0 * 60.0]);
    }

    #[test]
    fn incomplete_time_component_count_does_not_finalize() {
        let mut table = table_with(vec![
            ColumnDef {
                time: Some(TimeSpec { components: 2 }),
                ..ColumnDef::scalar("time", 101, 0, -99.0)
            },
            ColumnDef {
                time_component: Some(TimeComponentSpec {
                    target: "time".into(),
                    offset: 0.0,
                    multiplier: 3600.0,
                    hour_minute: false,
                }),
                ..ColumnDef::scalar("hour", 101, 2, -99.0)
            },
        ]);
        table.route_value(101, 2, 13.0, false);
        table.finalize_time_columns();
        assert_eq!(table.lifetime(0), 0);
    }

    #[test]
    fn follow_capture_then_emission() {
        let mut table = table_with(vec![ColumnDef {
            follow_kind: Some(202),
            ..ColumnDef::scalar("battery", 101, 2, -99.0)
        }]);
        // Capture under kind 101.
        table.route_value(101, 2, 7.0, false);
        assert_eq!(table.lifetime(0), 0, "capture must not advance counters");

        // Emission on the record-start unit of kind 202.
        table.route_value(202, 2, 0.0, true);
        assert_eq!(table.lifetime(0), 1);

        let mut sink = MemorySink::new();
        table.drain_all(&mut sink).unwrap();
        assert_eq!(sink.column(0), vec![7.0]);
    }

    #[test]
    fn follow_without_capture_counts_missed() {
        let mut table = table_with(vec![ColumnDef {
            follow_kind: Some(202),
            ..ColumnDef::scalar("battery", 101, 2, -99.0)
        }]);
        table.route_value(202, 2, 0.0, true);
        table.route_value(202, 2, 0.0, true);
        assert_eq!(table.missed_follow(0), 2);
        assert_eq!(table.lifetime(0), 0);

        // A later capture resolves the gap for subsequent emissions only.
        table.route_value(101, 2, 7.0, false);
        table.route_value(202, 2, 0.0, true);
        assert_eq!(table.missed_follow(0), 0);
        assert_eq!(table.lifetime(0), 1);
    }

    #[test]
    fn follow_holds_last_value_across_emissions() {
        let mut table = table_with(vec![ColumnDef {
            follow_kind: Some(202),
            ..ColumnDef::scalar("battery", 101, 2, -99.0)
        }]);
        table.route_value(101, 2, 7.0, false);
        table.route_value(202, 2, 0.0, true);
        table.route_value(202, 2, 0.0, true);
        let mut sink = MemorySink::new();
        table.drain_all(&mut sink).unwrap();
        assert_eq!(sink.column(0), vec![7.0, 7.0]);
    }

    #[test]
    fn sync_check_flags_lagging_column() {
        let mut table = table_with(vec![
            ColumnDef::scalar("a", 101, 2, -99.0),
            ColumnDef::scalar("b", 101, 3, -99.0),
        ]);
        table.route_value(101, 2, 1.0, false);
        assert!(table.check_sync(101, 1).is_err());

        table.backfill_missing(101, 1);
        assert!(table.check_sync(101, 1).is_ok());
        assert_eq!(table.lifetime(1), 1);
    }

    #[test]
    fn rollback_only_touches_columns_with_values() {
        let mut table = table_with(vec![
            ColumnDef::scalar("a", 101, 2, -99.0),
            ColumnDef::scalar("b", 102, 2, -99.0),
        ]);
        table.route_value(101, 2, 1.0, false);
        table.route_value(102, 2, 2.0, false);
        table.rollback_record(101);
        assert_eq!(table.lifetime(0), 0);
        assert_eq!(table.lifetime(1), 1, "other record kinds keep their rows");
    }

    #[test]
    fn resync_between_inputs_forces_when_sloppy() {
        let mut table = table_with(vec![
            ColumnDef::scalar("a", 101, 2, -99.0),
            ColumnDef::scalar("b", 101, 3, -99.0),
        ]);
        table.route_value(101, 2, 1.0, false);
        assert!(table.resync_between_inputs(1, false).is_err());
        table.resync_between_inputs(1, true).unwrap();
        assert_eq!(table.lifetime(1), 1);
        assert_eq!(table.buffer_fill(1), 1);
    }

    #[test]
    fn unresolved_time_target_is_a_config_error() {
        let result = ColumnTable::new(vec![ColumnDef {
            time_component: Some(TimeComponentSpec {
                target: "missing".into(),
                offset: 0.0,
                multiplier: 1.0,
                hour_minute: false,
            }),
            ..ColumnDef::scalar("hour", 101, 2, -99.0)
        }]);
        assert!(matches!(result, Err(SiloError::InvalidColumnConfig(_))));
    }
}
