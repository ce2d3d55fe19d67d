// queryscope/src/workers/timing.rs
//
// Timing fingerprints over the interarrival intervals of one repeated query
// text. Scheduled searches repeat on a fixed period and land on clock ticks;
// a person re-running a search does neither.
//
//   entropy        Shannon-style entropy of a fixed-bucket histogram
//   consistency    share of intervals within ±band of the mean interval
//   clockness      1 − mean distance to the nearest clock tick (period-relative)
//
// Too little data yields sentinels, never errors:
//   entropy 0.0 and consistency 1.0 with < 2 intervals, clockness −1.0 with 0.

use crate::config::{EntropyConfig, TimingConfig};

pub const CLOCKNESS_NO_DATA: f64 = -1.0;

/// Consecutive differences of ascending times.
pub fn intervals(sorted_times: &[f64]) -> Vec<f64> {
    sorted_times.windows(2).map(|w| w[1] - w[0]).collect()
}

pub fn entropy(intervals: &[f64], cfg: &EntropyConfig) -> f64 {
    if intervals.len() < 2 || cfg.buckets == 0 || cfg.range_secs <= 0.0 {
        return 0.0;
    }
    let width = cfg.range_secs / cfg.buckets as f64;
    let mut counts = vec![0usize; cfg.buckets];
    let mut total = 0usize;
    for &v in intervals {
        if !(0.0..cfg.range_secs).contains(&v) {
            continue;
        }
        let bucket = ((v / width) as usize).min(cfg.buckets - 1);
        counts[bucket] += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let h: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * (p + cfg.epsilon).ln()
        })
        .sum();
    // The epsilon nudges a single full bucket slightly below zero.
    h.max(0.0)
}

pub fn consistency(intervals: &[f64], cfg: &TimingConfig) -> f64 {
    if intervals.len() < 2 {
        return 1.0;
    }
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if mean == 0.0 {
        // Every interval is zero, hence equal to the mean.
        return 1.0;
    }
    let (lo, hi) = (1.0 - cfg.consistency_band, 1.0 + cfg.consistency_band);
    let close = intervals
        .iter()
        .map(|v| v / mean)
        .filter(|&s| s > lo && s < hi)
        .count();
    close as f64 / intervals.len() as f64
}

pub fn clockness(intervals: &[f64], cfg: &TimingConfig) -> f64 {
    if intervals.is_empty() {
        return CLOCKNESS_NO_DATA;
    }
    let period = cfg.clock_period_secs;
    if period <= 0.0 {
        return CLOCKNESS_NO_DATA;
    }
    let mean_distance = intervals
        .iter()
        .map(|v| {
            let r = v.rem_euclid(period);
            r.min(period - r) / period
        })
        .sum::<f64>()
        / intervals.len() as f64;
    1.0 - mean_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t() -> TimingConfig { TimingConfig::default() }
    fn e() -> EntropyConfig { EntropyConfig::default() }

    #[test]
    fn sentinels_with_little_data() {
        assert_eq!(entropy(&[], &e()), 0.0);
        assert_eq!(entropy(&[12.0], &e()), 0.0);
        assert_eq!(consistency(&[], &t()), 1.0);
        assert_eq!(consistency(&[5.0], &t()), 1.0);
        assert_eq!(clockness(&[], &t()), -1.0);
        assert_eq!(clockness(&[30.0], &t()), 1.0);
    }

    #[test]
    fn every_thirty_seconds_is_clocked_and_consistent() {
        let iv = intervals(&[0.0, 30.0, 60.0, 90.0, 120.0]);
        assert_eq!(iv, vec![30.0; 4]);
        assert!((clockness(&iv, &t()) - 1.0).abs() < 1e-12);
        assert_eq!(consistency(&iv, &t()), 1.0);
        assert_eq!(entropy(&iv, &e()), 0.0);
    }

    #[test]
    fn half_tick_offsets_score_half() {
        // 15s is as far from a 30s tick as it gets.
        assert!((clockness(&[15.0, 45.0], &t()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn consistency_counts_values_near_mean() {
        // mean = 100; 95 and 105 inside (0.9, 1.1), 50 and 150 outside
        let c = consistency(&[95.0, 105.0, 50.0, 150.0], &t());
        assert!((c - 0.5).abs() < 1e-12);
        assert_eq!(consistency(&[0.0, 0.0, 0.0], &t()), 1.0);
    }

    #[test]
    fn entropy_grows_with_spread() {
        let two = entropy(&[10.0, 500.0], &e());
        let four = entropy(&[10.0, 500.0, 5_000.0, 50_000.0], &e());
        assert!(two > 0.6 && two < 0.7, "{two}");
        assert!(four > two);
        // Out-of-range intervals are ignored.
        assert_eq!(entropy(&[2_000_000.0, 3_000_000.0], &e()), 0.0);
    }

    proptest! {
        #[test]
        fn scores_stay_in_bounds(raw in prop::collection::vec(0.0f64..2_000_000.0, 0..40)) {
            let mut times = raw.clone();
            times.sort_by(f64::total_cmp);
            let iv = intervals(&times);

            let c = consistency(&iv, &t());
            prop_assert!((0.0..=1.0).contains(&c));
            prop_assert!(entropy(&iv, &e()) >= 0.0);
            let k = clockness(&iv, &t());
            prop_assert!((-1.0..=1.0).contains(&k));
            if iv.is_empty() {
                prop_assert_eq!(k, -1.0);
            }
            if iv.len() < 2 {
                prop_assert_eq!(c, 1.0);
                prop_assert_eq!(entropy(&iv, &e()), 0.0);
            }
        }
    }
}
