//! The bounded, transactional per-column sample accumulator.
//!
//! `SampleBuffer` replaces raw two-counter bookkeeping with named operations:
//! values are staged with `put`, made permanent with `commit_row`, and a
//! record rejection undoes exactly one committed row with `rollback_row`.
//! Flushing hands the unflushed window to the sink and advances the origin.

/// Capacity of one column buffer, in rows.
pub const MAX_SAMPLES: usize = 1024;

/// A bounded buffer of `span`-wide sample rows with three position counters:
/// `lifetime` (samples ever committed), `fill` (rows currently unflushed) and
/// `origin` (the lifetime count at the last flush, i.e. the sink row offset
/// of the unflushed window).
#[derive(Debug)]
pub struct SampleBuffer {
    values: Vec<f64>,
    span: usize,
    fill: usize,
    lifetime: u64,
    origin: u64,
}

impl SampleBuffer {
    pub fn new(span: usize) -> Self {
        debug_assert!(span >= 1);
        Self {
            values: Vec::new(),
            span,
            fill: 0,
            lifetime: 0,
            origin: 0,
        }
    }

    pub fn span(&self) -> usize {
        self.span
    }

    /// Rows currently unflushed.
    pub fn fill(&self) -> usize {
        self.fill
    }

    /// Samples ever committed over the lifetime of the session.
    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    /// Sink row offset of the unflushed window.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    pub fn is_full(&self) -> bool {
        self.fill == MAX_SAMPLES
    }

    /// Stage one component of the current (uncommitted) row. Components that
    /// were never `put` before the row commits keep `fill_value`.
    pub fn put(&mut self, component: usize, value: f64, fill_value: f64) {
        debug_assert!(component < self.span);
        let needed = self.fill * self.span + component + 1;
        if self.values.len() < needed {
            self.values.resize(needed, fill_value);
        }
        self.values[self.fill * self.span + component] = value;
    }

    /// Commit the staged row, advancing `fill` and `lifetime`.
    pub fn commit_row(&mut self) {
        let end = (self.fill + 1) * self.span;
        if self.values.len() < end {
            // A partially staged row commits as-is; absent components were
            // already defaulted by `put`, a fully absent tail defaults to 0
            // and is the caller's responsibility to avoid.
            self.values.resize(end, 0.0);
        }
        self.fill += 1;
        self.lifetime += 1;
    }

    /// Stage and commit a whole row of `fill_value` (sloppy-mode back-fill).
    pub fn backfill_row(&mut self, fill_value: f64) {
        for component in 0..self.span {
            self.put(component, fill_value, fill_value);
        }
        self.commit_row();
    }

    /// Undo the most recent `commit_row`. Only valid while the row is still
    /// unflushed, which holds at every record boundary by construction.
    pub fn rollback_row(&mut self) {
        debug_assert!(self.fill > 0, "rollback without a committed row");
        if self.fill > 0 {
            self.fill -= 1;
            self.lifetime -= 1;
            self.values.truncate(self.fill * self.span);
        }
    }

    /// Hand over the unflushed window `[origin, origin + fill)` and reset it.
    /// Returns `(origin, rows, values)`; `values` is row-major.
    pub fn drain(&mut self) -> (u64, usize, Vec<f64>) {
        let end = self.fill * self.span;
        if self.values.len() < end {
            self.values.resize(end, 0.0);
        }
        let out = std::mem::take(&mut self.values);
        let start = self.origin;
        let rows = self.fill;
        self.origin += self.fill as u64;
        self.fill = 0;
        (start, rows, out)
    }

    /// Force the counters to the given values (cross-input resynchronization
    /// in sloppy mode). The staged window is padded with `fill_value`.
    pub fn force_counters(&mut self, lifetime: u64, fill: usize, fill_value: f64) {
        while self.fill < fill {
            self.backfill_row(fill_value);
        }
        self.fill = fill;
        self.lifetime = lifetime;
        self.values.truncate(self.fill * self.span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_advances_both_counters() {
        let mut buf = SampleBuffer::new(1);
        buf.put(0, 1.5, 0.0);
        buf.commit_row();
        buf.put(0, 2.5, 0.0);
        buf.commit_row();
        assert_eq!(buf.fill(), 2);
        assert_eq!(buf.lifetime(), 2);
        assert_eq!(buf.origin(), 0);
    }

    #[test]
    fn rollback_is_the_inverse_of_commit() {
        let mut buf = SampleBuffer::new(2);
        buf.put(0, 1.0, 0.0);
        buf.put(1, 2.0, 0.0);
        buf.commit_row();
        buf.rollback_row();
        assert_eq!(buf.fill(), 0);
        assert_eq!(buf.lifetime(), 0);

        buf.put(0, 3.0, 0.0);
        buf.put(1, 4.0, 0.0);
        buf.commit_row();
        let (start, rows, values) = buf.drain();
        assert_eq!((start, rows), (0, 1));
        assert_eq!(values, vec![3.0, 4.0]);
    }

    #[test]
    fn drain_advances_origin_and_resets_fill() {
        let mut buf = SampleBuffer::new(1);
        for i in 0..3 {
            buf.put(0, i as f64, 0.0);
            buf.commit_row();
        }
        let (start, rows, values) = buf.drain();
        assert_eq!((start, rows), (0, 3));
        assert_eq!(values, vec![0.0, 1.0, 2.0]);

        buf.put(0, 9.0, 0.0);
        buf.commit_row();
        let (start, rows, values) = buf.drain();
        assert_eq!((start, rows), (3, 1));
        assert_eq!(values, vec![9.0]);
        assert_eq!(buf.lifetime(), 4);
    }

    #[test]
    fn missing_vector_components_default_to_fill_value() {
        let mut buf = SampleBuffer::new(3);
        buf.put(2, 7.0, -99.0);
        buf.commit_row();
        let (_, _, values) = buf.drain();
        assert_eq!(values, vec![-99.0, -99.0, 7.0]);
    }

    #[test]
    fn fills_to_capacity() {
        let mut buf = SampleBuffer::new(1);
        for i in 0..MAX_SAMPLES {
            assert!(!buf.is_full());
            buf.put(0, i as f64, 0.0);
            buf.commit_row();
        }
        assert!(buf.is_full());
    }

    #[test]
    fn force_counters_pads_with_fill_value() {
        let mut buf = SampleBuffer::new(1);
        buf.force_counters(5, 2, -99.0);
        assert_eq!(buf.lifetime(), 5);
        assert_eq!(buf.fill(), 2);
        let (_, rows, values) = buf.drain();
        assert_eq!(rows, 2);
        assert_eq!(values, vec![-99.0, -99.0]);
    }
}
