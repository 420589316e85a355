//! Iterator statistics

use std::ops::AddAssign;

/// Counters observed by one row iterator
///
/// The iterator only counts; aggregation across iterators is the caller's
/// business (`+=` merges two snapshots).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IteratorStats {
    /// Physical key-value pairs visited
    pub keys_scanned: u64,
    /// Versions passed over: newer than the read time, or older than the
    /// version that decided their cell
    pub versions_skipped: u64,
    /// Document keys resolved
    pub rows_scanned: u64,
    /// Document keys resolved to "not found" and passed over
    pub rows_skipped: u64,
    /// Rows handed to the caller
    pub rows_produced: u64,
    /// Seeks issued on the physical cursor
    pub seeks: u64,
}

impl AddAssign for IteratorStats {
    fn add_assign(&mut self, other: Self) {
        self.keys_scanned += other.keys_scanned;
        self.versions_skipped += other.versions_skipped;
        self.rows_scanned += other.rows_scanned;
        self.rows_skipped += other.rows_skipped;
        self.rows_produced += other.rows_produced;
        self.seeks += other.seeks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut total = IteratorStats::default();
        let one = IteratorStats {
            keys_scanned: 5,
            rows_produced: 2,
            seeks: 1,
            ..Default::default()
        };
        total += one;
        total += one;
        assert_eq!(total.keys_scanned, 10);
        assert_eq!(total.rows_produced, 4);
        assert_eq!(total.seeks, 2);
        assert_eq!(total.rows_skipped, 0);
    }
}
