//! Volume partitioning: quantile bins with an equal-width fallback.

use super::stats::quantile_sorted;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which partition produced the bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinningMethod {
    /// Equal-population bins at volume quantiles (collapsed edges removed).
    Quantile,
    /// Equal-width buckets over `[min, max]` volume.
    EqualWidth,
}

impl std::fmt::Display for BinningMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinningMethod::Quantile => write!(f, "quantile"),
            BinningMethod::EqualWidth => write!(f, "equal_width"),
        }
    }
}

/// A partition of a volume series into contiguous intervals.
#[derive(Debug, Clone)]
pub(crate) struct Partition {
    pub method: BinningMethod,
    /// Strictly increasing edges; interval `i` is `(edges[i], edges[i + 1]]`,
    /// except the first which also contains `edges[0]`.
    pub edges: Vec<f64>,
    /// Interval index for every input value, in input order.
    pub assignments: Vec<usize>,
}

impl Partition {
    pub fn interval_count(&self) -> usize {
        self.edges.len() - 1
    }
}

/// Partition `volumes` into at most `bin_count` intervals.
///
/// Quantile edges are tried first; if collapsing duplicate edges leaves no
/// interval at all, equal-width buckets are used instead.
pub(crate) fn partition(volumes: &[f64], bin_count: usize) -> Partition {
    debug_assert!(bin_count > 0);
    debug_assert!(!volumes.is_empty());

    let (method, edges) = match quantile_edges(volumes, bin_count) {
        Some(edges) => (BinningMethod::Quantile, edges),
        None => (
            BinningMethod::EqualWidth,
            equal_width_edges(volumes, bin_count),
        ),
    };

    let assignments = volumes.iter().map(|v| locate(*v, &edges)).collect();

    Partition {
        method,
        edges,
        assignments,
    }
}

/// Quantile edges at `k / bin_count`, with equal edges collapsed.
///
/// Returns `None` when fewer than two distinct edges survive.
fn quantile_edges(volumes: &[f64], bin_count: usize) -> Option<Vec<f64>> {
    let mut sorted = volumes.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut edges: Vec<f64> = (0..=bin_count)
        .map(|k| quantile_sorted(&sorted, k as f64 / bin_count as f64))
        .collect();
    edges.dedup_by(|next, kept| *next <= *kept);

    if edges.len() < 2 {
        None
    } else {
        Some(edges)
    }
}

/// `bin_count` equal-width edges spanning the volume range.
///
/// A zero-width range is widened by 0.1% on each side so that every value
/// falls into a single bucket.
fn equal_width_edges(volumes: &[f64], bin_count: usize) -> Vec<f64> {
    let mut lo = volumes.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = volumes.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if hi <= lo {
        let pad = if lo == 0.0 { 0.001 } else { lo.abs() * 0.001 };
        lo -= pad;
        hi += pad;
    }

    let width = (hi - lo) / bin_count as f64;
    let mut edges: Vec<f64> = (0..=bin_count).map(|k| lo + width * k as f64).collect();
    // Pin the last edge so accumulated rounding never excludes the maximum.
    edges[bin_count] = hi;
    edges
}

/// Interval index for `value`: first `i` with `value <= edges[i + 1]`.
fn locate(value: f64, edges: &[f64]) -> usize {
    let last = edges.len() - 2;
    edges
        .partition_point(|e| *e < value)
        .saturating_sub(1)
        .min(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_partition_balances_distinct_values() {
        let volumes: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let p = partition(&volumes, 4);
        assert_eq!(p.method, BinningMethod::Quantile);
        assert_eq!(p.interval_count(), 4);

        let mut counts = [0usize; 4];
        for &a in &p.assignments {
            counts[a] += 1;
        }
        assert_eq!(counts, [25, 25, 25, 25]);
    }

    #[test]
    fn minimum_joins_first_interval() {
        let volumes = [1.0, 2.0, 3.0, 4.0];
        let p = partition(&volumes, 2);
        assert_eq!(p.assignments[0], 0);
        assert_eq!(p.assignments[3], 1);
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        // Heavily skewed: most volumes identical.
        let mut volumes = vec![1.0; 90];
        volumes.extend((1..=10).map(|v| 100.0 * v as f64));
        let p = partition(&volumes, 10);
        assert_eq!(p.method, BinningMethod::Quantile);
        assert!(p.interval_count() < 10);
        assert!(p.edges.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn identical_volumes_fall_back_to_equal_width() {
        let volumes = vec![500.0; 200];
        let p = partition(&volumes, 40);
        assert_eq!(p.method, BinningMethod::EqualWidth);
        assert_eq!(p.interval_count(), 40);
        let first = p.assignments[0];
        assert!(p.assignments.iter().all(|a| *a == first));
    }

    #[test]
    fn equal_width_covers_extremes() {
        let edges = equal_width_edges(&[10.0, 20.0, 30.0], 4);
        assert_eq!(edges.len(), 5);
        assert_eq!(locate(10.0, &edges), 0);
        assert_eq!(locate(30.0, &edges), 3);
        assert_eq!(locate(17.5, &edges), 1);
    }

    #[test]
    fn single_interval_when_bin_count_is_one() {
        let volumes: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let p = partition(&volumes, 1);
        assert_eq!(p.interval_count(), 1);
        assert!(p.assignments.iter().all(|a| *a == 0));
    }
}
