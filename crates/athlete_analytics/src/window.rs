//! Ordered per-group windowed computations.
//!
//! Both the recovery classifier (rolling HRV statistics per athlete, ordered
//! by sample date) and the metrics aggregator (trailing rows per athlete, in
//! arrival order) are expressed with the helpers here: group row indices by a
//! key, optionally order each group, then slide a bounded window over it.

use std::collections::BTreeMap;

/// Group row indices by `key`, keeping input order inside each group.
/// Groups come out sorted by key.
pub fn group_indices<'a, T, K, F>(rows: &'a [T], key: F) -> BTreeMap<K, Vec<usize>>
where
    K: Ord,
    F: Fn(&'a T) -> K,
{
    let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        groups.entry(key(row)).or_default().push(idx);
    }
    groups
}

/// Group row indices by `key` and order each group by `order`.
/// The sort is stable: rows with equal order keep their input order.
pub fn group_sorted_indices<'a, T, K, O, F, G>(
    rows: &'a [T],
    key: F,
    order: G,
) -> BTreeMap<K, Vec<usize>>
where
    K: Ord,
    O: Ord,
    F: Fn(&'a T) -> K,
    G: Fn(&T) -> O,
{
    let mut groups = group_indices(rows, key);
    for indices in groups.values_mut() {
        indices.sort_by_key(|&i| order(&rows[i]));
    }
    groups
}

/// The last `n` items of a slice (all of them when shorter).
pub fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Apply `f` to each trailing window of at most `size` observations ending
/// at (and including) every position.
///
/// Null observations occupy a slot in the window but are not passed to `f`.
/// A window with fewer than `min_periods` non-null observations yields `None`.
pub fn rolling<R, F>(values: &[Option<f64>], size: usize, min_periods: usize, f: F) -> Vec<Option<R>>
where
    F: Fn(&[f64]) -> Option<R>,
{
    let mut out = Vec::with_capacity(values.len());
    let mut buf = Vec::with_capacity(size);
    for end in 0..values.len() {
        buf.clear();
        let start = (end + 1).saturating_sub(size);
        buf.extend(values[start..=end].iter().flatten().copied());
        if buf.is_empty() || buf.len() < min_periods {
            out.push(None);
        } else {
            out.push(f(&buf));
        }
    }
    out
}

/// Mean and sample standard deviation of a window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); `None` for a single value.
    pub std_dev: Option<f64>,
}

impl WindowStats {
    pub fn of(values: &[f64]) -> Option<Self> {
        let count = values.len();
        if count == 0 {
            return None;
        }
        let mean = mean(values)?;
        let std_dev = (count > 1).then(|| {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });
        Some(Self {
            count,
            mean,
            std_dev,
        })
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_indices_keeps_input_order() {
        let rows = ["b1", "a1", "b2", "a2"];
        let groups = group_indices(&rows, |r| r.chars().next().unwrap());
        assert_eq!(groups[&'a'], vec![1, 3]);
        assert_eq!(groups[&'b'], vec![0, 2]);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!['a', 'b']);
    }

    #[test]
    fn group_sorted_indices_is_stable() {
        let rows = [("a", 3, "x"), ("a", 1, "y"), ("a", 3, "z"), ("b", 0, "w")];
        let groups = group_sorted_indices(&rows, |r| r.0, |r| r.1);
        assert_eq!(groups["a"], vec![1, 0, 2]);
        assert_eq!(groups["b"], vec![3]);
    }

    #[test]
    fn tail_handles_short_slices() {
        assert_eq!(tail(&[1, 2, 3], 7), &[1, 2, 3]);
        assert_eq!(tail(&[1, 2, 3, 4, 5, 6, 7, 8, 9], 7), &[3, 4, 5, 6, 7, 8, 9]);
        assert!(tail::<i32>(&[], 7).is_empty());
    }

    #[test]
    fn rolling_respects_min_periods_and_window() {
        let values: Vec<Option<f64>> = (1..=5).map(|v| Some(v as f64)).collect();
        let sums = rolling(&values, 3, 2, |w| Some(w.iter().sum::<f64>()));
        assert_eq!(sums, vec![None, Some(3.0), Some(6.0), Some(9.0), Some(12.0)]);
    }

    #[test]
    fn rolling_counts_nulls_as_slots() {
        let values = [Some(1.0), None, Some(3.0), Some(5.0)];
        let counts = rolling(&values, 3, 2, |w| Some(w.len()));
        // window ending at index 2 holds [1, null, 3] -> two observations
        assert_eq!(counts, vec![None, None, Some(2), Some(2)]);
    }

    #[test]
    fn window_stats_uses_sample_std_dev() {
        let stats = WindowStats::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev.unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(WindowStats::of(&[3.0]).unwrap().std_dev, None);
        assert!(WindowStats::of(&[]).is_none());
    }
}
