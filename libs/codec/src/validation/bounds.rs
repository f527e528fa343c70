//! Alignment and plausibility bounds
//!
//! Cursor alignment for ucdr fields, and the plausibility window used to
//! sanity-check decoded readings.

use serde::{Deserialize, Serialize};

/// Round `offset` up to the next multiple of `alignment`
///
/// Alignments of 0 and 1 leave the offset unchanged.
pub fn align_offset(offset: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return offset;
    }
    offset.div_ceil(alignment) * alignment
}

/// Inclusive window of physically plausible floating-point readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibleRange {
    pub min: f64,
    pub max: f64,
}

impl PlausibleRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// NaN is never plausible
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for PlausibleRange {
    fn default() -> Self {
        Self::new(-1000.0, 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_offset() {
        assert_eq!(align_offset(0, 4), 0);
        assert_eq!(align_offset(1, 4), 4);
        assert_eq!(align_offset(4, 4), 4);
        assert_eq!(align_offset(5, 8), 8);
        assert_eq!(align_offset(7, 2), 8);
        assert_eq!(align_offset(7, 1), 7);
    }

    #[test]
    fn test_plausible_range() {
        let range = PlausibleRange::default();
        assert!(range.contains(25.5));
        assert!(range.contains(-1000.0));
        assert!(!range.contains(1000.5));
        assert!(!range.contains(f64::NAN));
    }
}
