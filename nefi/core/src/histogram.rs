//! Fixed-bucket latency histogram shared by the aggregator.
//!
//! Bucket boundaries are nanoseconds; the scheme trades percentile accuracy
//! (bounded by the ~2.5x ratio between adjacent boundaries) for O(1)
//! observation and O(|buckets|) flush cost (spec §9, "Percentile accuracy").

use serde::{Deserialize, Serialize};

/// Upper boundaries of each bucket, in nanoseconds. A sample falls into the
/// smallest bucket whose boundary is >= the sample; anything larger than
/// the last boundary goes into the overflow bucket (index `BOUNDARIES.len()`).
pub const BOUNDARIES: [u64; 12] = [
    1_000_000,
    5_000_000,
    10_000_000,
    25_000_000,
    50_000_000,
    100_000_000,
    250_000_000,
    500_000_000,
    1_000_000_000,
    2_500_000_000,
    5_000_000_000,
    10_000_000_000,
];

/// Number of buckets including the overflow bucket.
pub const NUM_BUCKETS: usize = BOUNDARIES.len() + 1;

/// A per-service latency histogram plus the auxiliary counters the
/// aggregator needs to emit traffic/rate points alongside percentiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    pub bucket_counts: [u64; NUM_BUCKETS],
    pub sum_ns: u128,
    pub call_count: u64,
    pub error_count: u64,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub namespace: Option<String>,
    pub last_observed: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            bucket_counts: [0; NUM_BUCKETS],
            sum_ns: 0,
            call_count: 0,
            error_count: 0,
            bytes_sent: 0,
            bytes_recv: 0,
            namespace: None,
            last_observed: None,
        }
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a latency sample: finds the smallest boundary `b_i >= x` and
    /// increments bucket `i`, or the overflow bucket if none qualifies.
    pub fn observe_latency(&mut self, sample_ns: u64) {
        let idx = BOUNDARIES
            .iter()
            .position(|&boundary| sample_ns <= boundary)
            .unwrap_or(BOUNDARIES.len());
        self.bucket_counts[idx] += 1;
        self.sum_ns += sample_ns as u128;
    }

    pub fn total_observations(&self) -> u64 {
        self.bucket_counts.iter().sum()
    }

    /// Lower/upper bounds of bucket `idx`, where bucket 0's lower bound is 0
    /// and the overflow bucket's upper bound is `2 * last boundary`.
    fn bucket_bounds(idx: usize) -> (f64, f64) {
        let lower = if idx == 0 {
            0.0
        } else {
            BOUNDARIES[idx - 1] as f64
        };
        let upper = if idx < BOUNDARIES.len() {
            BOUNDARIES[idx] as f64
        } else {
            *BOUNDARIES.last().unwrap() as f64 * 2.0
        };
        (lower, upper)
    }

    /// Estimates the `q`-quantile (`q` in `(0, 1]`) by walking buckets in
    /// order and linearly interpolating within the bucket that first
    /// reaches the target cumulative count.
    pub fn percentile(&self, q: f64) -> f64 {
        let total = self.total_observations();
        if total == 0 {
            return 0.0;
        }
        let target = q * total as f64;
        let mut cumulative: u64 = 0;
        for (idx, &count) in self.bucket_counts.iter().enumerate() {
            let prev_cumulative = cumulative;
            cumulative += count;
            if (cumulative as f64) >= target {
                let (lower, upper) = Self::bucket_bounds(idx);
                if count == 0 {
                    return lower;
                }
                let fraction = (target - prev_cumulative as f64) / count as f64;
                return lower + fraction * (upper - lower);
            }
        }
        // Unreachable when total > 0, but fall back to the top of the
        // overflow bucket rather than panicking on float rounding.
        Self::bucket_bounds(BOUNDARIES.len()).1
    }

    pub fn error_rate(&self) -> f64 {
        if self.call_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.call_count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_buckets_equals_total_observations() {
        let mut h = Histogram::new();
        for sample in [2_000_000u64, 4_000_000, 8_000_000, 15_000_000, 40_000_000] {
            h.observe_latency(sample);
        }
        assert_eq!(h.total_observations(), 5);
    }

    #[test]
    fn overflow_bucket_catches_samples_past_last_boundary() {
        let mut h = Histogram::new();
        h.observe_latency(50_000_000_000);
        assert_eq!(h.bucket_counts[BOUNDARIES.len()], 1);
    }

    #[test]
    fn percentile_is_monotonic_in_q() {
        let mut h = Histogram::new();
        for sample in [2_000_000u64, 4_000_000, 8_000_000, 15_000_000, 40_000_000, 90_000_000] {
            h.observe_latency(sample);
        }
        let p50 = h.percentile(0.50);
        let p95 = h.percentile(0.95);
        let p99 = h.percentile(0.99);
        assert!(p50 <= p95);
        assert!(p95 <= p99);
    }

    #[test]
    fn percentile_bounded_by_min_and_twice_max() {
        let samples = [2_000_000u64, 4_000_000, 8_000_000, 15_000_000, 40_000_000, 90_000_000];
        let mut h = Histogram::new();
        for s in samples {
            h.observe_latency(s);
        }
        let min = *samples.iter().min().unwrap() as f64;
        let max = *samples.iter().max().unwrap() as f64;
        for q in [0.1, 0.5, 0.9, 0.99, 1.0] {
            let p = h.percentile(q);
            assert!(p >= 0.0, "percentile below zero for q={q}");
            assert!(p <= max * 2.0, "percentile {p} exceeds 2x max for q={q}");
            let _ = min;
        }
    }

    #[test]
    fn scenario_a_histogram_percentile() {
        let mut h = Histogram::new();
        for sample in [
            2_000_000u64,
            4_000_000,
            8_000_000,
            15_000_000,
            40_000_000,
            90_000_000,
            200_000_000,
            400_000_000,
            900_000_000,
            3_000_000_000,
        ] {
            h.observe_latency(sample);
        }
        h.call_count = 10;
        let p50 = h.percentile(0.50);
        let p95 = h.percentile(0.95);
        let p99 = h.percentile(0.99);
        assert!((4e7..=6e7).contains(&p50), "p50={p50}");
        assert!((3.5e9..=4e9).contains(&p95), "p95={p95}");
        assert!((4.5e9..=5e9).contains(&p99), "p99={p99}");
        assert_eq!(h.error_rate(), 0.0);
    }
}
