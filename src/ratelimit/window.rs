//! Sliding window bookkeeping for a single (credential, dimension) pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three ceilings tracked per credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Request count over the short window
    Requests,
    /// Unit volume per minute
    UnitsPerMinute,
    /// Unit volume per day
    UnitsPerDay,
}

impl Dimension {
    /// All dimensions, in evaluation order.
    pub const ALL: [Dimension; 3] = [
        Dimension::Requests,
        Dimension::UnitsPerMinute,
        Dimension::UnitsPerDay,
    ];

    /// Suffix used when building the store key for this dimension.
    pub fn key_suffix(&self) -> &'static str {
        match self {
            Dimension::Requests => "rpm",
            Dimension::UnitsPerMinute => "tpm",
            Dimension::UnitsPerDay => "tpd",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_suffix())
    }
}

/// Result of evaluating one dimension at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DimensionStatus {
    /// Occupancy is below the maximum
    Admissible,
    /// Occupancy reached the maximum; the oldest event clears in `wait_secs`
    Saturated { wait_secs: f64 },
}

impl DimensionStatus {
    pub fn is_admissible(&self) -> bool {
        matches!(self, DimensionStatus::Admissible)
    }
}

/// Event timestamps for one window, kept in ascending order.
///
/// Expiry is lazy: records are pruned when evaluated, and a record whose
/// time-to-live has elapsed reads as empty.
#[derive(Debug, Clone, Default)]
pub struct WindowRecord {
    timestamps: Vec<f64>,
    expires_at: Option<f64>,
}

impl WindowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp `<= now - window_secs`, and everything if the
    /// record's time-to-live has elapsed.
    pub fn prune(&mut self, now: f64, window_secs: f64) {
        if self.is_expired(now) {
            self.timestamps.clear();
            self.expires_at = None;
            return;
        }

        let cutoff = now - window_secs;
        let stale = self.timestamps.partition_point(|t| *t <= cutoff);
        self.timestamps.drain(..stale);
    }

    /// Number of timestamps currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The oldest timestamp still held.
    pub fn earliest(&self) -> Option<f64> {
        self.timestamps.first().copied()
    }

    /// Count of timestamps inside the window without mutating the record.
    pub fn occupancy(&self, now: f64, window_secs: f64) -> usize {
        if self.is_expired(now) {
            return 0;
        }
        let cutoff = now - window_secs;
        self.timestamps.len() - self.timestamps.partition_point(|t| *t <= cutoff)
    }

    /// Record one event at `now` and refresh the time-to-live.
    pub fn record(&mut self, now: f64, window_secs: f64) {
        let pos = self.timestamps.partition_point(|t| *t <= now);
        self.timestamps.insert(pos, now);
        let expires_at = now + window_secs;
        self.expires_at = Some(self.expires_at.map_or(expires_at, |at| at.max(expires_at)));
    }

    fn is_expired(&self, now: f64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Prune `record` and decide whether one more event fits under `max`.
pub fn evaluate(record: &mut WindowRecord, max: u64, window_secs: f64, now: f64) -> DimensionStatus {
    record.prune(now, window_secs);

    if (record.len() as u64) < max {
        return DimensionStatus::Admissible;
    }

    // An empty saturated record only happens with a zero maximum; retry
    // immediately instead of stalling.
    let wait_secs = record
        .earliest()
        .map(|earliest| (earliest + window_secs - now).max(0.0))
        .unwrap_or(0.0);

    DimensionStatus::Saturated { wait_secs }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(times: &[f64], window_secs: f64) -> WindowRecord {
        let mut record = WindowRecord::new();
        for t in times {
            record.record(*t, window_secs);
        }
        record
    }

    #[test]
    fn test_dimension_key_suffix() {
        assert_eq!(Dimension::Requests.key_suffix(), "rpm");
        assert_eq!(Dimension::UnitsPerMinute.key_suffix(), "tpm");
        assert_eq!(Dimension::UnitsPerDay.key_suffix(), "tpd");
    }

    #[test]
    fn test_prune_removes_boundary_timestamp() {
        let mut record = record_at(&[100.0, 105.0, 109.0], 10.0);

        // 100.0 <= 110.0 - 10.0 so it is expired
        record.prune(110.0, 10.0);
        assert_eq!(record.len(), 2);
        assert_eq!(record.earliest(), Some(105.0));
    }

    #[test]
    fn test_record_keeps_order() {
        let mut record = WindowRecord::new();
        record.record(5.0, 60.0);
        record.record(3.0, 60.0);
        record.record(4.0, 60.0);

        assert_eq!(record.earliest(), Some(3.0));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_expired_record_reads_empty() {
        let record = record_at(&[100.0], 10.0);

        assert_eq!(record.occupancy(105.0, 10.0), 1);
        assert_eq!(record.occupancy(110.0, 10.0), 0);
    }

    #[test]
    fn test_evaluate_admissible_below_max() {
        let mut record = record_at(&[100.0], 10.0);
        assert_eq!(evaluate(&mut record, 2, 10.0, 101.0), DimensionStatus::Admissible);
    }

    #[test]
    fn test_evaluate_saturated_wait() {
        let mut record = record_at(&[100.0, 102.0], 10.0);

        let status = evaluate(&mut record, 2, 10.0, 103.0);
        assert_eq!(status, DimensionStatus::Saturated { wait_secs: 7.0 });
    }

    #[test]
    fn test_evaluate_zero_max_waits_zero() {
        let mut record = WindowRecord::new();
        let status = evaluate(&mut record, 0, 10.0, 50.0);
        assert_eq!(status, DimensionStatus::Saturated { wait_secs: 0.0 });
    }

    #[test]
    fn test_evaluate_uses_earliest_remaining() {
        let mut record = record_at(&[90.0, 95.0, 99.0], 10.0);

        // 90.0 is pruned, so 95.0 decides the wait
        let status = evaluate(&mut record, 2, 10.0, 100.0);
        assert_eq!(status, DimensionStatus::Saturated { wait_secs: 5.0 });
    }
}
