//! Hybrid logical timestamp
//!
//! A `HybridTime` is both the MVCC version stamp of every physical write and
//! the snapshot horizon of a read.
//!
//! ## Layout
//!
//! The value is a single `u64`: physical microseconds since Unix epoch in the
//! high 52 bits and a logical counter in the low 12 bits. Ordering the raw
//! `u64` therefore orders by physical time first, then by logical counter.
//!
//! ```
//! use docrow_core::HybridTime;
//!
//! let t = HybridTime::from_micros_and_logical(100, 3);
//! assert_eq!(t.physical_micros(), 100);
//! assert_eq!(t.logical(), 3);
//! assert!(HybridTime::from_micros(100) < t);
//! ```

use std::time::Duration;

/// Number of low bits reserved for the logical counter
pub const LOGICAL_BITS: u32 = 12;

const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// Hybrid logical timestamp
///
/// ## Invariants
///
/// - Totally ordered by its raw `u64` representation
/// - `HybridTime::MAX` reads the latest version of everything
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HybridTime(u64);

impl HybridTime {
    /// Smallest representable time
    pub const MIN: HybridTime = HybridTime(0);

    /// Largest representable time; the default read horizon
    pub const MAX: HybridTime = HybridTime(u64::MAX);

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a hybrid time from physical microseconds with logical counter 0
    ///
    /// Saturates at `MAX` when the microseconds do not fit the physical bits.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self::from_micros_and_logical(micros, 0)
    }

    /// Create a hybrid time from physical microseconds and a logical counter
    ///
    /// The logical counter is truncated to its 12 bits.
    #[inline]
    pub const fn from_micros_and_logical(micros: u64, logical: u64) -> Self {
        if micros > (u64::MAX >> LOGICAL_BITS) {
            return HybridTime::MAX;
        }
        HybridTime((micros << LOGICAL_BITS) | (logical & LOGICAL_MASK))
    }

    /// Create from the raw encoded representation
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        HybridTime(raw)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Raw encoded representation
    #[inline]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Physical component in microseconds
    #[inline]
    pub const fn physical_micros(&self) -> u64 {
        self.0 >> LOGICAL_BITS
    }

    /// Logical counter component
    #[inline]
    pub const fn logical(&self) -> u64 {
        self.0 & LOGICAL_MASK
    }

    /// Add a duration to the physical component
    ///
    /// Saturates at `HybridTime::MAX` on overflow. The logical counter is kept.
    pub fn saturating_add(&self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        match self.physical_micros().checked_add(micros) {
            Some(physical) if physical <= (u64::MAX >> LOGICAL_BITS) => {
                HybridTime::from_micros_and_logical(physical, self.logical())
            }
            _ => HybridTime::MAX,
        }
    }
}

impl Default for HybridTime {
    fn default() -> Self {
        HybridTime::MAX
    }
}

impl std::fmt::Display for HybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == HybridTime::MAX {
            return write!(f, "HT<max>");
        }
        write!(f, "HT{{ physical: {} logical: {} }}", self.physical_micros(), self.logical())
    }
}

impl From<u64> for HybridTime {
    /// Create from raw encoded representation
    fn from(raw: u64) -> Self {
        HybridTime::from_raw(raw)
    }
}

impl From<HybridTime> for u64 {
    fn from(ht: HybridTime) -> Self {
        ht.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_roundtrip() {
        let ht = HybridTime::from_micros_and_logical(1_000_000, 42);
        assert_eq!(ht.physical_micros(), 1_000_000);
        assert_eq!(ht.logical(), 42);
        assert_eq!(HybridTime::from_raw(ht.as_raw()), ht);
    }

    #[test]
    fn test_logical_is_truncated() {
        let ht = HybridTime::from_micros_and_logical(7, LOGICAL_MASK + 1);
        assert_eq!(ht.logical(), 0);
        assert_eq!(ht.physical_micros(), 7);
    }

    #[test]
    fn test_ordering_physical_then_logical() {
        let a = HybridTime::from_micros_and_logical(10, 5);
        let b = HybridTime::from_micros_and_logical(11, 0);
        let c = HybridTime::from_micros_and_logical(10, 6);
        assert!(a < b);
        assert!(a < c);
        assert!(c < b);
        assert!(b < HybridTime::MAX);
        assert!(HybridTime::MIN < a);
    }

    #[test]
    fn test_saturating_add() {
        let ht = HybridTime::from_micros_and_logical(100, 1);
        let later = ht.saturating_add(Duration::from_micros(10));
        assert_eq!(later.physical_micros(), 110);
        assert_eq!(later.logical(), 1);

        assert_eq!(HybridTime::MAX.saturating_add(Duration::from_secs(1)), HybridTime::MAX);
        assert_eq!(
            HybridTime::from_micros(1).saturating_add(Duration::MAX),
            HybridTime::MAX
        );
    }

    #[test]
    fn test_from_micros_saturates() {
        assert_eq!(HybridTime::from_micros(u64::MAX), HybridTime::MAX);
    }

    #[test]
    fn test_default_is_max() {
        assert_eq!(HybridTime::default(), HybridTime::MAX);
    }

    #[test]
    fn test_display() {
        assert_eq!(HybridTime::MAX.to_string(), "HT<max>");
        assert_eq!(
            HybridTime::from_micros_and_logical(5, 2).to_string(),
            "HT{ physical: 5 logical: 2 }"
        );
    }
}
