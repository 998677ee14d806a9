//! Grid search over cells to seed local refinement.
//!
//! Divides the unit hypercube into a uniform grid of cells, throws away
//! cells that cannot touch the weight simplex (their coordinate-sum range
//! misses Σw = 1), bounds the rest, and picks the most promising one by the
//! sum of its bounds. This is the cheap warm start: no oracle call is made,
//! only O(k·n·d·2^d) arithmetic per surviving cell.
//!
//! Survivor cells are bounded on rayon worker threads; the min-reduction
//! tie-breaks on grid position, so the parallel result is identical to a
//! sequential scan.

use rayon::prelude::*;

use crate::cell::Cell;
use crate::dominance::DominanceIndex;
use crate::types::{GivenRanking, WeightVector};

/// Grid-based selector for the most promising region of weight space.
pub struct CellFinder<'a> {
    dominance: &'a DominanceIndex<'a>,
    given: &'a GivenRanking,
}

impl<'a> CellFinder<'a> {
    pub fn new(dominance: &'a DominanceIndex<'a>, given: &'a GivenRanking) -> Self {
        Self { dominance, given }
    }

    /// Find the center of the grid cell with the smallest (lower + upper)
    /// bound sum. Ties go to the earliest grid position.
    ///
    /// `cell_size` is the grid pitch; the divisor is `round(1 / cell_size)`.
    /// Falls back to the hypercube center if no grid cell both touches the
    /// simplex and beats the trivial bound.
    pub fn find(&self, k: usize, cell_size: f64) -> WeightVector {
        let dim = self
            .dominance
            .tuples()
            .first()
            .map(|t| t.dim())
            .unwrap_or(0);
        if dim == 0 {
            return Vec::new();
        }
        let n = self.dominance.len();

        let unit = Cell::new(vec![0.5; dim], 1.0);
        let divisor = (1.0 / cell_size).round().max(1.0) as usize;
        let centers = unit.divide(divisor);

        let half = cell_size / 2.0;
        let candidates: Vec<(usize, WeightVector)> = centers
            .into_iter()
            .enumerate()
            .filter(|(_, center)| {
                let sum: f64 = center.iter().sum();
                let sum_upper = sum + half * dim as f64;
                let sum_lower = sum - half * dim as f64;
                // Keep only cells whose sum range can reach Σw = 1.
                sum_upper >= 1.0 && sum_lower <= 1.0
            })
            .collect();

        let best = candidates
            .into_par_iter()
            .map(|(position, center)| {
                let mut cell = Cell::new(center, cell_size);
                let (lower, upper) = cell.bounds(self.dominance, self.given, k);
                (lower as u64 + upper as u64, position, cell)
            })
            .min_by_key(|&(total, position, _)| (total, position));

        match best {
            // The trivial bound 2·n·k is what an unbounded cell would score;
            // anything at or above it is no better than the hypercube center.
            Some((total, _, cell)) if total < 2 * (n * k) as u64 => cell.center().clone(),
            _ => unit.center().clone(),
        }
    }
}
