//! Small robust-statistics helpers shared by the color mapper and the
//! correlation engine.

use std::collections::HashMap;

/// Returns the most frequent value of a multiset.
///
/// Only values that occur at least twice qualify. When several values share
/// the highest count, the smallest one wins. Returns `None` for an empty
/// input or when no value repeats.
///
/// ```
/// # use rating_viz::stats::mode;
/// assert_eq!(mode(&[3.0, 1.0, 3.0, 2.0]), Some(3.0));
/// assert_eq!(mode(&[1.0, 2.0, 3.0]), None);
/// ```
#[must_use]
pub fn mode(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values.iter().filter(|v| !v.is_nan()) {
        // -0.0 and 0.0 count as the same value
        let key = if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        counts.entry(key).or_insert((v, 0)).1 += 1;
    }

    counts
        .into_values()
        .filter(|&(_, count)| count > 1)
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.total_cmp(va)))
        .map(|(v, _)| v)
}

/// Median of the values; the mean of the two middle values for even counts.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// The "typical" value of a multiset: its mode, or its median when no value
/// repeats.
#[must_use]
pub fn mode_or_median(values: &[f64]) -> Option<f64> {
    mode(values).or_else(|| median(values))
}

/// Ranks starting at 1, ties receiving the average of the ranks they span.
#[must_use]
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end (0-based) share ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Minimum and maximum ignoring NaN.
#[must_use]
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_picks_most_frequent() {
        assert_eq!(mode(&[5.0, 8.0, 8.0, 5.0, 8.0]), Some(8.0));
    }

    #[test]
    fn test_mode_tie_prefers_smallest() {
        assert_eq!(mode(&[-10.0, -10.0, -30.0, -30.0, -5.0]), Some(-30.0));
        assert_eq!(mode(&[4.0, 4.0, 2.0, 2.0]), Some(2.0));
    }

    #[test]
    fn test_mode_requires_repeat() {
        assert_eq!(mode(&[1.0, 2.0, 3.0]), None);
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mode_or_median_falls_back() {
        assert_eq!(mode_or_median(&[10.0, 30.0, 20.0]), Some(20.0));
        assert_eq!(mode_or_median(&[10.0, 30.0, 30.0]), Some(30.0));
    }

    #[test]
    fn test_average_ranks_with_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_min_max_skips_nan() {
        assert_eq!(min_max(&[f64::NAN, 2.0, -1.0]), Some((-1.0, 2.0)));
        assert_eq!(min_max(&[]), None);
    }
}
