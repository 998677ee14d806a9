//! Exact scoring, ranking, and position-error measurement.
//!
//! The whole point of this system is to detect weight vectors that explain a
//! ranking up to a numeric gap, so score comparisons can never be allowed to
//! lose the very cancellation effects they are hunting. All comparisons
//! happen in a scaled-integer (i128 fixed-point) domain:
//!
//! ```text
//! fixed(x)    = round(x · 2^40)                  (one factor, scale 2^40)
//! score(i, w) = Σ_j fixed(w_j) · fixed(v_ij)     (product, scale 2^80)
//! ```
//!
//! Sums and differences of scores are exact in i128; the only rounding is the
//! initial quantization at 2^-40 ≈ 9e-13 per factor, orders of magnitude
//! below the smallest gap the search ever uses (1e-4 by default). Attribute
//! magnitudes up to ~1e7 and dimensions up to 64 stay far from i128 overflow.
//!
//! Ranking follows the published-list convention: sort descending by score,
//! then collapse near-ties (difference < gap/2) into shared ranks by scanning
//! backward through sorted order.

use crate::types::{GivenRanking, Tuple, WeightVector};

/// Fixed-point scale exponent for one factor.
const SCALE_BITS: u32 = 40;

/// Convert one f64 factor to fixed point at scale 2^40.
#[inline]
fn to_fixed(x: f64) -> i128 {
    (x * (1u64 << SCALE_BITS) as f64).round() as i128
}

/// Exact scorer over a fixed tuple slice.
///
/// Attributes are quantized once at construction; every subsequent score is
/// pure integer arithmetic.
pub struct RankingScorer {
    /// Fixed-point attribute matrix, `[n][d]`, scale 2^40.
    values: Vec<Vec<i128>>,
    /// Tie-collapse threshold gap/2, at score scale 2^80.
    half_gap: i128,
}

impl RankingScorer {
    pub fn new(tuples: &[Tuple], gap: f64) -> Self {
        let values = tuples
            .iter()
            .map(|t| t.attributes.iter().map(|&v| to_fixed(v)).collect())
            .collect();
        // gap at score scale: fixed(gap) · 2^40, halved exactly in i128.
        let half_gap = (to_fixed(gap) << SCALE_BITS) / 2;
        Self { values, half_gap }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Exact score of tuple `i` under `weights`, at scale 2^80.
    pub fn score(&self, i: usize, weights: &WeightVector) -> i128 {
        self.values[i]
            .iter()
            .zip(weights.iter())
            .map(|(&v, &w)| v * to_fixed(w))
            .sum()
    }

    /// Exact dot product of an arbitrary coefficient vector with `weights`,
    /// at scale 2^80. Used by the arrangement tree to re-verify recorded
    /// inequalities at a reported optimum.
    pub fn dot(&self, coeffs: &[f64], weights: &WeightVector) -> i128 {
        coeffs
            .iter()
            .zip(weights.iter())
            .map(|(&c, &w)| to_fixed(c) * to_fixed(w))
            .sum()
    }

    /// A raw threshold at score scale 2^80 for an f64 margin, for callers
    /// that compare [`RankingScorer::dot`] results against the gap.
    pub fn fixed_margin(margin: f64) -> i128 {
        to_fixed(margin) << SCALE_BITS
    }

    /// Bring a score (or score difference) back from scale 2^80 into
    /// attribute units, for reporting and for objectives measured in score
    /// space. Comparisons must stay in the fixed domain; this is for output.
    pub fn unscale(score: i128) -> f64 {
        score as f64 / (1u128 << (2 * SCALE_BITS)) as f64
    }

    /// Rank all tuples under `weights` and emit 1-based ranks for the first
    /// `k` target positions.
    ///
    /// The returned vector has one entry per tuple; entries at indices ≥ k
    /// are 0 (not computed). Ties within gap/2 share a rank: after the
    /// descending sort, each tuple's rank is its sorted position minus the
    /// length of the contiguous run of predecessors within gap/2 of it.
    pub fn rank(&self, weights: &WeightVector, k: usize) -> Vec<u32> {
        let n = self.values.len();
        let mut ranking = vec![0u32; n];

        let scores: Vec<i128> = (0..n).map(|i| self.score(i, weights)).collect();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| scores[b].cmp(&scores[a]).then(a.cmp(&b)));

        let mut emitted = 0;
        for (pos, &idx) in order.iter().enumerate() {
            if idx >= k {
                continue;
            }
            let mut rank = pos as u32 + 1;
            let score = scores[idx];
            for j in (0..pos).rev() {
                if scores[order[j]] - score < self.half_gap {
                    rank -= 1;
                } else {
                    break;
                }
            }
            ranking[idx] = rank;
            emitted += 1;
            if emitted == k {
                break;
            }
        }
        ranking
    }

    /// Total absolute position error of `computed` against `given` over the
    /// first `k` target positions.
    pub fn error(computed: &[u32], given: &GivenRanking, k: usize) -> u32 {
        computed
            .iter()
            .zip(given.iter())
            .take(k)
            .map(|(&c, &g)| c.abs_diff(g))
            .sum()
    }

    /// Rank under `weights` and measure against `given` in one call.
    pub fn position_error(&self, weights: &WeightVector, given: &GivenRanking, k: usize) -> u32 {
        let ranking = self.rank(weights, k);
        Self::error(&ranking, given, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuples(rows: &[&[f64]]) -> Vec<Tuple> {
        rows.iter()
            .enumerate()
            .map(|(index, attrs)| Tuple {
                id: format!("t{index}"),
                index,
                attributes: attrs.to_vec(),
            })
            .collect()
    }

    #[test]
    fn test_score_is_exact_on_representable_inputs() {
        let ts = tuples(&[&[0.5, 0.25]]);
        let scorer = RankingScorer::new(&ts, 1e-4);
        // 0.5·0.5 + 0.25·0.5 = 0.375 exactly, at scale 2^80.
        let expected = (3i128) << (80 - 3);
        assert_eq!(scorer.score(0, &vec![0.5, 0.5]), expected);
    }

    #[test]
    fn test_end_to_end_attribute_one_only() {
        // Scored under (1, 0), ranking follows attribute 1 descending.
        let ts = tuples(&[&[1.0, 5.0], &[2.0, 4.0], &[3.0, 3.0], &[4.0, 2.0]]);
        let scorer = RankingScorer::new(&ts, 1e-4);
        let ranking = scorer.rank(&vec![1.0, 0.0], 4);
        assert_eq!(ranking, vec![4, 3, 2, 1]);
        let given = vec![4, 3, 2, 1];
        assert_eq!(RankingScorer::error(&ranking, &given, 4), 0);
    }

    #[test]
    fn test_end_to_end_attribute_two_only() {
        // Under (0, 1) the same tuples rank by attribute 2 descending.
        let ts = tuples(&[&[1.0, 5.0], &[2.0, 4.0], &[3.0, 3.0], &[4.0, 2.0]]);
        let scorer = RankingScorer::new(&ts, 1e-4);
        let ranking = scorer.rank(&vec![0.0, 1.0], 4);
        assert_eq!(ranking, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rank_only_fills_topk_positions() {
        let ts = tuples(&[&[1.0], &[3.0], &[2.0]]);
        let scorer = RankingScorer::new(&ts, 1e-4);
        let ranking = scorer.rank(&vec![1.0], 2);
        assert_eq!(ranking[0], 3);
        assert_eq!(ranking[1], 1);
        assert_eq!(ranking[2], 0, "index past k must stay unset");
    }

    #[test]
    fn test_near_ties_share_rank() {
        // Scores 1.0, 1.0 + gap/4, 2.0: the first two are inside gap/2.
        let gap = 1e-4;
        let ts = tuples(&[&[1.0], &[1.0 + gap / 4.0], &[2.0]]);
        let scorer = RankingScorer::new(&ts, gap);
        let ranking = scorer.rank(&vec![1.0], 3);
        assert_eq!(ranking[2], 1);
        assert_eq!(ranking[1], 2);
        assert_eq!(ranking[0], 2, "near-tie must collapse to the same rank");
    }

    #[test]
    fn test_separation_at_gap_keeps_distinct_ranks() {
        let gap = 1e-4;
        let ts = tuples(&[&[1.0], &[1.0 + gap], &[2.0]]);
        let scorer = RankingScorer::new(&ts, gap);
        let ranking = scorer.rank(&vec![1.0], 3);
        assert_eq!(ranking, vec![3, 2, 1]);
    }

    #[test]
    fn test_position_error_counts_displacement() {
        let ts = tuples(&[&[4.0], &[3.0], &[2.0], &[1.0]]);
        let scorer = RankingScorer::new(&ts, 1e-4);
        // Given ranking is reversed: each of the top 2 positions is off by
        // |1-4| and |2-3|.
        let given = vec![4, 3, 2, 1];
        assert_eq!(scorer.position_error(&vec![1.0], &given, 2), 4);
    }
}
