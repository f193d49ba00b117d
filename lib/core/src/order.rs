//! Deterministic ordering of scored items.
//!
//! Scores that differ by no more than `epsilon` are treated as a tie and the
//! tied items are ordered by ascending insertion sequence. Sorting on the raw
//! epsilon comparison would not be a total order, so items are first sorted
//! strictly and then split into runs. A run holds every item within `epsilon`
//! of the run's first (best) score and is re-sorted by sequence. Measuring
//! against the run head rather than the previous neighbour keeps a run from
//! spanning more than `epsilon`.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrder {
    /// Higher score first (similarities)
    Descending,
    /// Lower score first (distances, fused scores)
    Ascending,
}

impl ScoreOrder {
    #[inline]
    fn cmp(self, a: f32, b: f32) -> Ordering {
        match self {
            ScoreOrder::Descending => b.total_cmp(&a),
            ScoreOrder::Ascending => a.total_cmp(&b),
        }
    }

    /// Whether `score` is no worse than `boundary` once the tie band is applied
    #[inline]
    fn within(self, score: f32, boundary: f32, epsilon: f32) -> bool {
        match self {
            ScoreOrder::Descending => boundary - score <= epsilon,
            ScoreOrder::Ascending => score - boundary <= epsilon,
        }
    }
}

pub fn sort_with_ties<T, S, Q>(items: &mut [T], order: ScoreOrder, epsilon: f32, score: S, sequence: Q)
where
    S: Fn(&T) -> f32,
    Q: Fn(&T) -> u64,
{
    items.sort_by(|a, b| {
        order
            .cmp(score(a), score(b))
            .then_with(|| sequence(a).cmp(&sequence(b)))
    });

    let mut start = 0;
    while start < items.len() {
        let head = score(&items[start]);
        let mut end = start + 1;
        while end < items.len() && (head - score(&items[end])).abs() <= epsilon {
            end += 1;
        }
        if end - start > 1 {
            items[start..end].sort_by_key(|item| sequence(item));
        }
        start = end;
    }
}

/// Best `k` items in tie-aware order.
///
/// Large inputs are partitioned around the k-th score first; everything inside
/// the tie band of that boundary survives the cut. The run holding the k-th
/// item starts at or above the boundary, so the kept prefix always contains
/// it whole and both paths return the same items.
pub fn top_k_with_ties<T, S, Q>(
    mut items: Vec<T>,
    k: usize,
    order: ScoreOrder,
    epsilon: f32,
    score: S,
    sequence: Q,
) -> Vec<T>
where
    S: Fn(&T) -> f32,
    Q: Fn(&T) -> u64,
{
    if k == 0 {
        return Vec::new();
    }

    if items.len() > k.saturating_mul(4) {
        items.select_nth_unstable_by(k - 1, |a, b| order.cmp(score(a), score(b)));
        let boundary = score(&items[k - 1]);
        items.retain(|item| order.within(score(item), boundary, epsilon));
    }

    sort_with_ties(&mut items, order, epsilon, &score, &sequence);
    items.truncate(k);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descending_with_ties_by_sequence() {
        let mut items = vec![(0.5f32, 3u64), (0.9, 2), (0.5 + 1e-7, 1), (0.1, 0)];
        sort_with_ties(&mut items, ScoreOrder::Descending, 1e-6, |i| i.0, |i| i.1);
        let seqs: Vec<u64> = items.iter().map(|i| i.1).collect();
        assert_eq!(seqs, vec![2, 1, 3, 0]);
    }

    #[test]
    fn test_ascending() {
        let mut items = vec![(0.3f32, 0u64), (0.1, 1), (0.2, 2)];
        sort_with_ties(&mut items, ScoreOrder::Ascending, 1e-6, |i| i.0, |i| i.1);
        let seqs: Vec<u64> = items.iter().map(|i| i.1).collect();
        assert_eq!(seqs, vec![1, 2, 0]);
    }

    #[test]
    fn test_top_k_partition_keeps_tie_order() {
        // Twenty identical scores: the partitioned path must still return the
        // lowest sequences.
        let items: Vec<(f32, u64)> = (0..20u64).rev().map(|s| (0.7f32, s)).collect();
        let top = top_k_with_ties(items, 3, ScoreOrder::Descending, 1e-6, |i| i.0, |i| i.1);
        let seqs: Vec<u64> = top.iter().map(|i| i.1).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_tie_band_is_measured_from_run_head() {
        let mut items = vec![(1.0f32, 5u64), (1.0 - 0.9e-6, 3), (1.0 - 1.8e-6, 0), (0.1, 1), (0.1, 2)];
        sort_with_ties(&mut items, ScoreOrder::Descending, 1e-6, |i| i.0, |i| i.1);
        let seqs: Vec<u64> = items.iter().map(|i| i.1).collect();
        // 0 is more than epsilon below 1.0 and may not jump ahead of it
        assert_eq!(seqs, vec![3, 5, 0, 1, 2]);
    }

    #[test]
    fn test_top_k_is_stable_across_k() {
        let items = vec![(1.0f32, 5u64), (1.0 - 0.9e-6, 3), (1.0 - 1.8e-6, 0), (0.1, 1), (0.1, 2)];
        let full = top_k_with_ties(items.clone(), 5, ScoreOrder::Descending, 1e-6, |i| i.0, |i| i.1);
        for k in 1..=5 {
            let top = top_k_with_ties(items.clone(), k, ScoreOrder::Descending, 1e-6, |i| i.0, |i| i.1);
            assert_eq!(top, full[..k].to_vec(), "k = {k}");
        }
    }

    #[test]
    fn test_partition_path_matches_full_sort() {
        // Chains of near-equal scores, long enough to take the partition path for small k
        let items: Vec<(f32, u64)> = (0..60u64)
            .map(|s| (1.0 - (s % 7) as f32 * 0.6e-6, 59 - s))
            .collect();
        let mut sorted = items.clone();
        sort_with_ties(&mut sorted, ScoreOrder::Descending, 1e-6, |i| i.0, |i| i.1);
        for k in [1, 2, 5, 10] {
            let top = top_k_with_ties(items.clone(), k, ScoreOrder::Descending, 1e-6, |i| i.0, |i| i.1);
            assert_eq!(top, sorted[..k].to_vec(), "k = {k}");
        }
    }

    #[test]
    fn test_top_k_zero() {
        let top = top_k_with_ties(vec![(1.0f32, 0u64)], 0, ScoreOrder::Descending, 1e-6, |i| i.0, |i| i.1);
        assert!(top.is_empty());
    }
}
