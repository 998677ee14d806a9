//! Pairwise attribute-wise dominance classification.
//!
//! A pair of tuples whose order is the same for *every* nonnegative weight
//! vector never needs a hyperplane: if tuple i beats tuple j by at least the
//! numeric gap on every attribute, any weighted sum puts i above j. Only the
//! remaining CONTESTED pairs contribute inequalities to cell bounds and
//! oracle requests, which is what keeps the arrangement tree small on
//! real data.
//!
//! The gap is the same numeric slack used everywhere else in the search; a
//! pair that differs by less than the gap on some attribute stays contested
//! even if the raw signs agree.

use crate::types::Tuple;

/// How tuple i relates to tuple j under every weight vector at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    /// i exceeds j by at least the gap on every attribute.
    Dominates,
    /// j exceeds i by at least the gap on every attribute.
    Dominated,
    /// Order depends on the chosen weights.
    Contested,
}

/// Dominance classifier over a fixed tuple slice and gap.
pub struct DominanceIndex<'a> {
    tuples: &'a [Tuple],
    gap: f64,
}

impl<'a> DominanceIndex<'a> {
    pub fn new(tuples: &'a [Tuple], gap: f64) -> Self {
        Self { tuples, gap }
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn gap(&self) -> f64 {
        self.gap
    }

    pub fn tuples(&self) -> &'a [Tuple] {
        self.tuples
    }

    /// Classify the ordered pair (i, j).
    pub fn classify(&self, i: usize, j: usize) -> Dominance {
        let a = &self.tuples[i].attributes;
        let b = &self.tuples[j].attributes;

        let mut dominates = true;
        let mut dominated = true;
        for (x, y) in a.iter().zip(b.iter()) {
            if x - y < self.gap {
                dominates = false;
            }
            if y - x < self.gap {
                dominated = false;
            }
            if !dominates && !dominated {
                return Dominance::Contested;
            }
        }
        if dominates {
            Dominance::Dominates
        } else if dominated {
            Dominance::Dominated
        } else {
            Dominance::Contested
        }
    }

    /// Hyperplane coefficients for the pair (i, j): the attribute-wise
    /// difference i − j. `coeffs · w > 0` means i scores above j at w.
    pub fn hyperplane(&self, i: usize, j: usize) -> Vec<f64> {
        self.tuples[i]
            .attributes
            .iter()
            .zip(self.tuples[j].attributes.iter())
            .map(|(x, y)| x - y)
            .collect()
    }

    /// Contested pairs (i, j) with i in the top-k target block and j any
    /// other tuple. These are the pairs a position-error oracle needs a
    /// discrete order decision for.
    pub fn contested_pairs(&self, k: usize) -> Vec<(usize, usize)> {
        let n = self.tuples.len();
        let mut pairs = Vec::new();
        for i in 0..k.min(n) {
            for j in 0..n {
                if i != j && self.classify(i, j) == Dominance::Contested {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Contested hyperplanes for the arrangement tree: pairs (i, j) with
    /// i < k and j > i, one hyperplane per pair, in deterministic order.
    pub fn contested_hyperplanes(&self, k: usize) -> Vec<((usize, usize), Vec<f64>)> {
        let n = self.tuples.len();
        let mut planes = Vec::new();
        for i in 0..k.min(n) {
            for j in (i + 1)..n {
                if self.classify(i, j) == Dominance::Contested {
                    planes.push(((i, j), self.hyperplane(i, j)));
                }
            }
        }
        planes
    }
}
