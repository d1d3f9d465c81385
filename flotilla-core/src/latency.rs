//! Latency histogram used by the consumer worker (ยง4.4, ยง9).

use hdrhistogram::Histogram;

use crate::model::LatencyStats;

/// Histogram range, in milliseconds, shared by every consumer (ยง4.4).
pub const MAX_RECORDABLE_LATENCY_MS: u64 = 300_000;
const SIGNIFICANT_FIGURES: u8 = 5;

/// Thin wrapper around an `hdrhistogram::Histogram<u64>` that applies the
/// clamping rules the harness mandates: negative deltas (clock skew between
/// sender and receiver) are recorded as zero, and anything above the
/// recordable ceiling saturates at the ceiling instead of being dropped or
/// erroring out.
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        // low=1, high=MAX_RECORDABLE_LATENCY_MS, sigfig=5 satisfy hdrhistogram's
        // constructor invariants (low >= 1, high >= 2*low, sigfig in 0..=5) for
        // every value MAX_RECORDABLE_LATENCY_MS can take; this can't fail.
        let histogram = match Histogram::new_with_bounds(1, MAX_RECORDABLE_LATENCY_MS, SIGNIFICANT_FIGURES) {
            Ok(histogram) => histogram,
            Err(_) => unreachable!("hardcoded histogram bounds are always valid"),
        };
        Self { histogram }
    }

    /// Records one `(now_ns - then_ns) / 1_000_000` latency sample, in
    /// milliseconds. Negative values clamp to 0; values above
    /// [`MAX_RECORDABLE_LATENCY_MS`] saturate at the ceiling.
    pub fn record_ms(&mut self, latency_ms: i64) {
        let clamped = latency_ms.clamp(0, MAX_RECORDABLE_LATENCY_MS as i64) as u64;
        // A clamped value is always within [0, MAX_RECORDABLE_LATENCY_MS] and
        // therefore always accepted by a histogram built with those bounds,
        // except for the floor of the range itself (hdrhistogram's minimum
        // trackable value is 1, so a true zero is recorded as 1).
        let recordable = clamped.max(1);
        let _ = self.histogram.record(recordable);
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    pub fn stats(&self) -> LatencyStats {
        LatencyStats {
            min: self.histogram.min() as i64,
            q1: self.histogram.value_at_quantile(0.25) as i64,
            q2: self.histogram.value_at_quantile(0.50) as i64,
            q3: self.histogram.value_at_quantile(0.75) as i64,
            max: self.histogram.max() as i64,
            mean: self.histogram.mean(),
            std_dev: self.histogram.stdev(),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_are_monotonic_and_mean_is_within_range() {
        let mut histogram = LatencyHistogram::new();
        for ms in [1, 5, 5, 10, 20, 50, 100] {
            histogram.record_ms(ms);
        }
        let stats = histogram.stats();
        assert!(stats.min <= stats.q1);
        assert!(stats.q1 <= stats.q2);
        assert!(stats.q2 <= stats.q3);
        assert!(stats.q3 <= stats.max);
        assert!(stats.mean >= stats.min as f64);
        assert!(stats.mean <= stats.max as f64);
    }

    #[test]
    fn negative_latency_clamps_to_the_floor() {
        let mut histogram = LatencyHistogram::new();
        histogram.record_ms(-50);
        assert_eq!(histogram.stats().min, 1);
    }

    #[test]
    fn latency_above_ceiling_saturates() {
        let mut histogram = LatencyHistogram::new();
        histogram.record_ms(10_000_000);
        let stats = histogram.stats();
        assert!(stats.max <= MAX_RECORDABLE_LATENCY_MS as i64);
    }

    #[test]
    fn empty_histogram_reports_zero_length() {
        let histogram = LatencyHistogram::new();
        assert!(histogram.is_empty());
        assert_eq!(histogram.len(), 0);
    }

    proptest::proptest! {
        #[test]
        fn any_i64_sample_stays_within_recordable_bounds(latency_ms: i64) {
            let mut histogram = LatencyHistogram::new();
            histogram.record_ms(latency_ms);
            let stats = histogram.stats();
            proptest::prop_assert!(stats.min >= 1);
            proptest::prop_assert!(stats.max <= MAX_RECORDABLE_LATENCY_MS as i64);
        }
    }
}
