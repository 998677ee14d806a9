//! Hyper-rectangular regions of weight space and their error bounds.
//!
//! A cell is an axis-aligned box (center ± size/2 per dimension). Because a
//! linear function over a box takes its extrema at corners, evaluating a
//! hyperplane at the 2^d corners tells us whether the inequality holds
//! everywhere, nowhere, or only somewhere in the cell — without solving
//! anything.
//!
//! `bounds` turns those cell-invariant orderings into an interval of
//! achievable ranks per target position and accumulates a lower/upper bound
//! on the total top-k position error for *any* weight inside the cell. The
//! grid search orders candidate cells by these bounds; the descent loop
//! restricts the oracle to the winning cell.

use crate::dominance::{Dominance, DominanceIndex};
use crate::types::{GivenRanking, WeightVector};

/// Relationship between a hyperplane inequality `coeffs · w ≥ 0` and a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellSign {
    /// The inequality holds at every point of the cell.
    AlwaysTrue,
    /// The inequality fails at every point of the cell.
    AlwaysFalse,
    /// The hyperplane crosses the cell.
    Mixed,
}

/// Axis-aligned hyper-rectangle with cached error bounds.
#[derive(Debug, Clone)]
pub struct Cell {
    center: WeightVector,
    size: f64,
    /// Cached (lower, upper) bound on achievable top-k error, set by `bounds`.
    cached: Option<(u32, u32)>,
}

impl Cell {
    pub fn new(center: WeightVector, size: f64) -> Self {
        Self {
            center,
            size,
            cached: None,
        }
    }

    pub fn center(&self) -> &WeightVector {
        &self.center
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn dim(&self) -> usize {
        self.center.len()
    }

    /// Bounds computed by the last call to [`Cell::bounds`], if any.
    pub fn cached_bounds(&self) -> Option<(u32, u32)> {
        self.cached
    }

    /// The 2^d corner points of the cell, in deterministic order.
    ///
    /// Built by doubling one dimension at a time; for each dimension the
    /// plus face comes before the minus face, so corner 0 is all-plus and
    /// the last corner is all-minus.
    pub fn corners(&self) -> Vec<WeightVector> {
        let half = self.size / 2.0;
        let mut corners = vec![
            vec![self.center[0] + half],
            vec![self.center[0] - half],
        ];
        for dim in 1..self.dim() {
            let mut next = Vec::with_capacity(corners.len() * 2);
            for corner in &corners {
                let mut plus = corner.clone();
                plus.push(self.center[dim] + half);
                next.push(plus);
            }
            for corner in &corners {
                let mut minus = corner.clone();
                minus.push(self.center[dim] - half);
                next.push(minus);
            }
            corners = next;
        }
        corners
    }

    /// Classify the inequality `coeffs · w ≥ 0` against this cell.
    ///
    /// Linearity means checking corners suffices; the scan short-circuits as
    /// soon as both signs have been seen.
    pub fn sign(&self, coeffs: &[f64]) -> CellSign {
        Self::sign_over(&self.corners(), coeffs)
    }

    fn sign_over(corners: &[WeightVector], coeffs: &[f64]) -> CellSign {
        let mut holds = false;
        let mut fails = false;
        for corner in corners {
            let value: f64 = coeffs.iter().zip(corner.iter()).map(|(c, w)| c * w).sum();
            if value >= 0.0 {
                holds = true;
            } else {
                fails = true;
            }
            if holds && fails {
                return CellSign::Mixed;
            }
        }
        if holds {
            CellSign::AlwaysTrue
        } else {
            CellSign::AlwaysFalse
        }
    }

    /// Compute (lower, upper) bounds on the achievable top-k position error
    /// for any weight inside the cell, and cache them.
    ///
    /// For each target position i < k, every other tuple is resolved to
    /// "always above" or "always below" when possible — by dominance first,
    /// then by the hyperplane sign over this cell — leaving an achievable
    /// rank interval `[dominators + 1, n − dominatees]`. The target rank's
    /// distance to that interval feeds the bounds:
    /// - target below the interval: both bounds grow (by the near and far
    ///   edge distances respectively);
    /// - target above the interval: symmetric;
    /// - target inside the interval (including exactly on an edge): only the
    ///   upper bound grows, by the larger distance to an edge. The on-edge
    ///   case intentionally contributes nothing to the lower bound.
    ///
    /// Cost O(k·n·d·2^d); result cached on the cell.
    pub fn bounds(
        &mut self,
        dominance: &DominanceIndex<'_>,
        given: &GivenRanking,
        k: usize,
    ) -> (u32, u32) {
        if let Some(cached) = self.cached {
            return cached;
        }

        let n = dominance.len();
        let corners = self.corners();
        let mut lower: i64 = 0;
        let mut upper: i64 = 0;

        for i in 0..k {
            let mut dominators = 0i64;
            let mut dominatees = 0i64;
            for j in 0..n {
                if i == j {
                    continue;
                }
                match dominance.classify(i, j) {
                    Dominance::Dominates => dominatees += 1,
                    Dominance::Dominated => dominators += 1,
                    Dominance::Contested => {
                        match Self::sign_over(&corners, &dominance.hyperplane(i, j)) {
                            CellSign::AlwaysTrue => dominatees += 1,
                            CellSign::AlwaysFalse => dominators += 1,
                            CellSign::Mixed => {}
                        }
                    }
                }
            }

            let high = dominators + 1;
            let low = n as i64 - dominatees;
            let target = given[i] as i64;

            if target < high {
                lower += high - target;
                upper += low - target;
            } else if target > low {
                lower += target - low;
                upper += target - high;
            } else {
                upper += (target - high).max(low - target);
            }
        }

        let result = (lower as u32, upper as u32);
        self.cached = Some(result);
        result
    }

    /// Subdivide into `divisor^d` equal sub-cells and return their centers,
    /// in deterministic order (earlier dimensions vary fastest).
    pub fn divide(&self, divisor: usize) -> Vec<WeightVector> {
        let step = self.size / divisor as f64;
        let start = |dim: usize| self.center[dim] - self.size / 2.0;

        let mut centers: Vec<WeightVector> = (0..divisor)
            .map(|i| vec![start(0) + (2 * i + 1) as f64 * step / 2.0])
            .collect();
        for dim in 1..self.dim() {
            let mut next = Vec::with_capacity(centers.len() * divisor);
            for i in 0..divisor {
                let coord = start(dim) + (2 * i + 1) as f64 * step / 2.0;
                for center in &centers {
                    let mut extended = center.clone();
                    extended.push(coord);
                    next.push(extended);
                }
            }
            centers = next;
        }
        centers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::RankingScorer;
    use crate::types::Tuple;
    use rand::prelude::*;

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
    fn test_corners_deterministic_order() {
        let cell = Cell::new(vec![0.5, 0.5], 0.2);
        let corners = cell.corners();
        assert_eq!(corners.len(), 4);
        assert_eq!(corners[0], vec![0.6, 0.6], "first corner is all-plus");
        assert_eq!(corners[1], vec![0.4, 0.6]);
        assert_eq!(corners[2], vec![0.6, 0.4]);
        assert_eq!(corners[3], vec![0.4, 0.4], "last corner is all-minus");
    }

    #[test]
    fn test_sign_classification() {
        let cell = Cell::new(vec![0.5, 0.5], 0.2);
        // w0 + w1 ≥ 0 holds at every corner.
        assert_eq!(cell.sign(&[1.0, 1.0]), CellSign::AlwaysTrue);
        // −w0 − w1 ≥ 0 fails at every corner.
        assert_eq!(cell.sign(&[-1.0, -1.0]), CellSign::AlwaysFalse);
        // w0 − w1 ≥ 0 depends on the corner.
        assert_eq!(cell.sign(&[1.0, -1.0]), CellSign::Mixed);
    }

    #[test]
    fn test_divide_grid() {
        let cell = Cell::new(vec![0.5, 0.5], 1.0);
        let centers = cell.divide(2);
        assert_eq!(centers.len(), 4);
        assert_eq!(centers[0], vec![0.25, 0.25]);
        assert_eq!(centers[1], vec![0.75, 0.25], "first dimension varies fastest");
        assert_eq!(centers[2], vec![0.25, 0.75]);
        assert_eq!(centers[3], vec![0.75, 0.75]);
    }

    #[test]
    fn test_bounds_ordering_and_cap() {
        let ts = tuples(&[
            &[1.0, 5.0],
            &[2.0, 4.0],
            &[3.0, 3.0],
            &[4.0, 2.0],
        ]);
        let dominance = DominanceIndex::new(&ts, 1e-4);
        let given = vec![4, 3, 2, 1];
        let k = 3;
        let mut cell = Cell::new(vec![0.5, 0.5], 0.5);
        let (lower, upper) = cell.bounds(&dominance, &given, k);
        assert!(lower <= upper, "lower bound may not exceed upper bound");
        assert!(upper <= (ts.len() * k) as u32, "upper bound capped at n·k");
        assert_eq!(cell.cached_bounds(), Some((lower, upper)));
    }

    #[test]
    fn test_bounds_zero_when_cell_fixes_matching_order() {
        // Attribute 1 dominates the ordering near w = (1, 0); the given
        // ranking matches that order, so a cell at the attribute-1 corner
        // must admit error 0 in both bounds.
        let ts = tuples(&[&[4.0, 2.0], &[3.0, 3.0], &[2.0, 4.0], &[1.0, 5.0]]);
        let dominance = DominanceIndex::new(&ts, 1e-4);
        let given = vec![1, 2, 3, 4];
        let mut cell = Cell::new(vec![0.9, 0.1], 0.1);
        let (lower, upper) = cell.bounds(&dominance, &given, 4);
        assert_eq!((lower, upper), (0, 0));
    }

    #[test]
    fn test_interior_point_error_within_bounds() {
        // The brute-force error at random interior points of a cell must lie
        // inside the cell's bound interval. A tiny gap keeps tie collapse
        // out of play for points that merely graze a resolved hyperplane.
        let ts = tuples(&[
            &[0.9, 0.1, 0.3],
            &[0.2, 0.8, 0.5],
            &[0.6, 0.6, 0.1],
            &[0.4, 0.3, 0.9],
            &[0.7, 0.5, 0.4],
            &[0.1, 0.9, 0.8],
        ]);
        let gap = 1e-9;
        let dominance = DominanceIndex::new(&ts, gap);
        let scorer = RankingScorer::new(&ts, gap);
        let given = vec![2, 1, 4, 3, 6, 5];
        let k = 4;

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            // Cells overlapping the simplex neighborhood, away from the
            // origin so dominance gaps survive the weight sum.
            let center: Vec<f64> = (0..3).map(|_| rng.gen_range(0.2..0.6)).collect();
            let size = rng.gen_range(0.05..0.2);
            let mut cell = Cell::new(center.clone(), size);
            let (lower, upper) = cell.bounds(&dominance, &given, k);

            for _ in 0..10 {
                let point: Vec<f64> = center
                    .iter()
                    .map(|c| c + (rng.gen::<f64>() - 0.5) * size)
                    .collect();
                let error = scorer.position_error(&point, &given, k);
                assert!(
                    error >= lower && error <= upper,
                    "interior error {error} outside [{lower}, {upper}] for cell {center:?} size {size}"
                );
            }
        }
    }

    #[test]
    fn test_edge_target_contributes_upper_only() {
        // One contested pair and k = 1: the achievable interval is [1, 2]
        // and the target rank sits exactly on the low edge. The preserved
        // policy adds only to the upper bound.
        let ts = tuples(&[&[1.0, 2.0], &[2.0, 1.0]]);
        let dominance = DominanceIndex::new(&ts, 1e-4);
        let given = vec![2, 1];
        let mut cell = Cell::new(vec![0.5, 0.5], 0.5);
        let (lower, upper) = cell.bounds(&dominance, &given, 1);
        assert_eq!(lower, 0, "edge target must not raise the lower bound");
        assert_eq!(upper, 1);
    }
}
