//! Condition plumbing for record-level windowing.
//!
//! The condition-expression grammar itself lives outside this core; the
//! engine only consumes `RecordCondition` objects. This module provides the
//! AND-combined filter set and one concrete predicate, `ColumnCompare`,
//! sufficient for embedding callers and for exercising the windowing logic.

use serde::{Deserialize, Serialize};

use crate::traits::RecordCondition;

//==================================================================================
// 1. The AND-combined filter set
//==================================================================================

/// Zero or more conditions combined by logical AND. An empty set matches
/// every record.
#[derive(Default)]
pub struct ConditionSet {
    conditions: Vec<Box<dyn RecordCondition>>,
}

impl ConditionSet {
    pub fn new(conditions: Vec<Box<dyn RecordCondition>>) -> Self {
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn observe(&mut self, record_kind: i32, column: i32, value: f64) {
        for cond in self.conditions.iter_mut() {
            cond.observe(record_kind, column, value);
        }
    }

    pub fn all_matched(&self) -> bool {
        self.conditions.iter().all(|c| c.matched())
    }

    pub fn reset(&mut self, record_kind: i32) {
        for cond in self.conditions.iter_mut() {
            cond.reset(record_kind);
        }
    }
}

//==================================================================================
// 2. A concrete predicate
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

/// Compares one column of one record kind against a constant. The record-id
/// unit arrives as column 1 with the kind as its value, so a condition on
/// column 1 selects record kinds.
///
/// Records of *other* kinds match vacuously, so a filter pinned to one kind
/// does not suppress the rest of the stream.
#[derive(Debug, Clone)]
pub struct ColumnCompare {
    record_kind: i32,
    column: i32,
    op: CompareOp,
    target: f64,
    matched: bool,
}

impl ColumnCompare {
    pub fn new(record_kind: i32, column: i32, op: CompareOp, target: f64) -> Self {
        Self {
            record_kind,
            column,
            op,
            target,
            matched: false,
        }
    }
}

impl RecordCondition for ColumnCompare {
    fn observe(&mut self, record_kind: i32, column: i32, value: f64) {
        if record_kind == self.record_kind && column == self.column {
            self.matched = self.op.holds(value, self.target);
        }
    }

    fn matched(&self) -> bool {
        self.matched
    }

    fn reset(&mut self, record_kind: i32) {
        // Vacuously true for records this condition does not address.
        self.matched = record_kind != self.record_kind;
    }
}
