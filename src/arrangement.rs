//! Hyperplane-arrangement branch-and-bound over the weight simplex.
//!
//! Every contested pair from the top-k block contributes one hyperplane.
//! Inserting the hyperplanes one by one partitions the simplex into convex
//! regions in which the order of every contested pair is fixed; solving each
//! leaf region once and taking the minimum yields the exact global optimum.
//! The construction follows the arrangement-tree approach of Asudeh et al.,
//! "Designing Fair Ranking Schemes" (SIGMOD 2019), adapted to position-error
//! minimization.
//!
//! Structure choices, deliberate:
//! - hyperplane coefficient vectors live once in an arena; a node stores a
//!   parent link plus the (hyperplane, side) edge label, so a region's
//!   constraint set is the path to the root — splitting copies nothing
//! - construction is an explicit worklist over the current leaf set, no
//!   language-level recursion, so the deadline can be checked between
//!   oracle calls and memory stays proportional to the tree
//! - leaves are evaluated on rayon workers and merged by min-reduction;
//!   the only shared record is the global best, folded deterministically
//!
//! A leaf whose reported optimum fails the exact re-check of its own path
//! constraints (the oracle solved the leaf's constraint set, but an
//! ancestor inequality collapsed at the boundary) is a "fake leaf": counted
//! and excluded from the global minimum.

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::dominance::DominanceIndex;
use crate::error::{RankexError, Result};
use crate::oracle::{HalfSpace, Objective, Oracle, OracleRequest, Side};
use crate::score::RankingScorer;
use crate::types::{GivenRanking, WeightVector};

/// Counters surfaced after a tree run.
#[derive(Debug, Clone, Default)]
pub struct TreeStats {
    /// Oracle programs issued (probes plus leaf solves).
    pub programs: usize,
    /// Nodes materialized, root included.
    pub nodes: usize,
    /// Leaves at evaluation time.
    pub leaves: usize,
    /// Leaves excluded by the exact re-check.
    pub fake_leaves: usize,
    /// Hyperplanes actually inserted before the deadline.
    pub hyperplanes_inserted: usize,
    /// Contested hyperplanes available.
    pub hyperplanes_total: usize,
    /// Cumulative wall time spent inside oracle calls.
    pub solver_time: Duration,
}

/// Result of an exact tree search.
#[derive(Debug, Clone)]
pub struct TreeOutcome {
    pub weights: Option<WeightVector>,
    /// Induced ranks for the top-k target positions under the best weights.
    pub ranking: Vec<u32>,
    pub error: u32,
    pub stats: TreeStats,
}

/// Tree node: a convex region defined by the path from the root.
struct Node {
    /// Parent id plus the (hyperplane id, side) taken to get here.
    /// `None` for the root, whose region is the full simplex.
    parent: Option<(usize, usize, Side)>,
    children: Option<(usize, usize)>,
}

/// Exact branch-and-bound search over a pluggable oracle.
pub struct ArrangementTree<'a, O: Oracle> {
    oracle: &'a O,
    dominance: &'a DominanceIndex<'a>,
    scorer: &'a RankingScorer,
    given: &'a GivenRanking,
    k: usize,
    hyperplanes: Vec<Vec<f64>>,
    nodes: Vec<Node>,
    leaves: Vec<usize>,
}

/// Per-leaf evaluation result, folded into the global best afterwards.
struct LeafResult {
    error: u32,
    weights: Option<WeightVector>,
    fake: bool,
    solver_time: Duration,
}

impl<'a, O: Oracle + Sync> ArrangementTree<'a, O> {
    pub fn new(
        oracle: &'a O,
        dominance: &'a DominanceIndex<'a>,
        scorer: &'a RankingScorer,
        given: &'a GivenRanking,
        k: usize,
    ) -> Self {
        Self {
            oracle,
            dominance,
            scorer,
            given,
            k,
            hyperplanes: Vec::new(),
            nodes: vec![Node {
                parent: None,
                children: None,
            }],
            leaves: vec![0],
        }
    }

    /// Constraint set of a node: the half-spaces along its root path.
    fn region(&self, node: usize) -> Vec<HalfSpace> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some((parent, hyperplane, side)) = self.nodes[current].parent {
            path.push((hyperplane, side));
            current = parent;
        }
        path.reverse();
        path.into_iter()
            .map(|(hyperplane, side)| HalfSpace {
                coeffs: self.hyperplanes[hyperplane].clone(),
                side,
            })
            .collect()
    }

    /// Constraint sets of all current leaves, root-to-leaf order. Exposed so
    /// callers (and the partition property test) can inspect the final
    /// decomposition of the simplex.
    pub fn leaf_regions(&self) -> Vec<Vec<HalfSpace>> {
        self.leaves.iter().map(|&leaf| self.region(leaf)).collect()
    }

    /// Feasibility probe: is `region` + the extra half-space non-empty?
    fn probe(
        &self,
        region: &[HalfSpace],
        extra: HalfSpace,
        stats: &mut TreeStats,
    ) -> Result<bool> {
        let dim = self.dominance.tuples()[0].dim();
        let mut request = OracleRequest::new(Objective::MinPositionError, dim, self.k);
        request.halfspaces = region.to_vec();
        request.halfspaces.push(extra);

        let clock = Instant::now();
        let response = self.oracle.solve(&request)?;
        stats.solver_time += clock.elapsed();
        stats.programs += 1;
        Ok(response.is_feasible())
    }

    /// Build the arrangement and solve every leaf. `budget` caps the
    /// construction phase; when it expires the tree built so far is
    /// evaluated as-is, so the answer degrades to the best leaf optimum
    /// found rather than disappearing.
    pub fn solve(&mut self, budget: Option<Duration>) -> Result<TreeOutcome> {
        let start = Instant::now();
        let mut stats = TreeStats::default();

        let planes = self.dominance.contested_hyperplanes(self.k);
        stats.hyperplanes_total = planes.len();

        for ((_, _), coeffs) in planes {
            // Cooperative deadline, checked between oracle calls only.
            if let Some(limit) = budget {
                if start.elapsed() > limit {
                    break;
                }
            }

            let hyperplane = self.hyperplanes.len();
            self.hyperplanes.push(coeffs.clone());

            // Snapshot: children created while inserting this hyperplane
            // already carry it and must not be probed against it again.
            let current = self.leaves.clone();
            for leaf in current {
                let region = self.region(leaf);
                let win = self.probe(&region, HalfSpace::win(coeffs.clone()), &mut stats)?;
                let lose = self.probe(&region, HalfSpace::lose(coeffs.clone()), &mut stats)?;

                match (win, lose) {
                    (true, true) => self.split(leaf, hyperplane),
                    (true, false) | (false, true) => {
                        // One-sided for this region: the hyperplane cannot
                        // change any order inside it. No split recorded.
                    }
                    (false, false) => {
                        return Err(RankexError::RegionContradiction {
                            node: leaf,
                            hyperplane,
                        });
                    }
                }
            }
            stats.hyperplanes_inserted += 1;
        }

        stats.nodes = self.nodes.len();
        stats.leaves = self.leaves.len();

        // Solve every leaf for its regional optimum, in parallel. Results
        // are folded in leaf order, so ties go to the earliest leaf and the
        // outcome matches a sequential run.
        let leaves = self.leaves.clone();
        let this: &Self = self;
        let results: Result<Vec<LeafResult>> = leaves
            .par_iter()
            .map(|&leaf| this.evaluate_leaf(leaf))
            .collect();
        let results = results?;

        let n = self.dominance.len();
        let sentinel = (n * self.k) as u32;
        let mut best_error = sentinel;
        let mut best_weights: Option<WeightVector> = None;
        for result in &results {
            stats.programs += 1;
            stats.solver_time += result.solver_time;
            if result.fake {
                stats.fake_leaves += 1;
                continue;
            }
            if result.error < best_error {
                best_error = result.error;
                best_weights = result.weights.clone();
            }
        }

        let ranking = match &best_weights {
            Some(w) => self.scorer.rank(w, self.k),
            None => Vec::new(),
        };
        Ok(TreeOutcome {
            weights: best_weights,
            ranking,
            error: best_error,
            stats,
        })
    }

    /// Turn a leaf into an internal node with one child per side.
    fn split(&mut self, leaf: usize, hyperplane: usize) {
        debug_assert!(
            self.nodes[leaf].children.is_none(),
            "split target already has children"
        );
        let win_child = self.nodes.len();
        self.nodes.push(Node {
            parent: Some((leaf, hyperplane, Side::Win)),
            children: None,
        });
        let lose_child = self.nodes.len();
        self.nodes.push(Node {
            parent: Some((leaf, hyperplane, Side::Lose)),
            children: None,
        });
        self.nodes[leaf].children = Some((win_child, lose_child));

        let position = self
            .leaves
            .iter()
            .position(|&l| l == leaf)
            .expect("split target must be a current leaf");
        self.leaves.remove(position);
        self.leaves.push(win_child);
        self.leaves.push(lose_child);
    }

    /// Solve one leaf region and re-verify the answer exactly.
    fn evaluate_leaf(&self, leaf: usize) -> Result<LeafResult> {
        let dim = self.dominance.tuples()[0].dim();
        let n = self.dominance.len();
        let sentinel = (n * self.k) as u32;

        let mut request = OracleRequest::new(Objective::MinPositionError, dim, self.k);
        request.halfspaces = self.region(leaf);

        let clock = Instant::now();
        let response = self.oracle.solve(&request)?;
        let solver_time = clock.elapsed();

        let Some(weights) = response.weights else {
            // Infeasible or timed out empty-handed: the leaf contributes
            // the sentinel and never beats a real optimum.
            return Ok(LeafResult {
                error: sentinel,
                weights: None,
                fake: false,
                solver_time,
            });
        };

        let error = self.scorer.position_error(&weights, self.given, self.k);

        // Exact re-check of every recorded inequality at the reported
        // optimum, in the fixed-point domain, against the same margin used
        // when the inequality was recorded.
        let margin = RankingScorer::fixed_margin(self.dominance.gap());
        let mut current = leaf;
        let mut fake = false;
        while let Some((parent, hyperplane, side)) = self.nodes[current].parent {
            let value = self.scorer.dot(&self.hyperplanes[hyperplane], &weights);
            let holds = match side {
                Side::Win => value >= margin,
                Side::Lose => value <= -margin,
            };
            if !holds {
                fake = true;
                break;
            }
            current = parent;
        }

        Ok(LeafResult {
            error,
            weights: Some(weights),
            fake,
            solver_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::sampling::SamplingOracle;
    use crate::oracle::{OracleResponse, OracleStatus};
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

    /// Four tuples, five distinct contested hyperplanes for k = 2.
    fn crossing_instance() -> (Vec<Tuple>, Vec<u32>) {
        let ts = tuples(&[&[5.0, 1.0], &[1.0, 4.0], &[3.0, 3.0], &[2.0, 2.0]]);
        // Target generated by w = (0.6, 0.4): scores 3.4, 2.2, 3.0, 2.0.
        let given = vec![1, 3, 2, 4];
        (ts, given)
    }

    #[test]
    fn test_exact_search_reaches_zero_error() {
        let (ts, given) = crossing_instance();
        let gap = 1e-3;
        let dominance = DominanceIndex::new(&ts, gap);
        let scorer = RankingScorer::new(&ts, gap);
        let oracle = SamplingOracle::new(&ts, &given, gap);
        let k = 2;

        let mut tree = ArrangementTree::new(&oracle, &dominance, &scorer, &given, k);
        let outcome = tree.solve(None).unwrap();

        assert_eq!(outcome.error, 0, "generated ranking must be explainable");
        let w = outcome.weights.unwrap();
        let induced = scorer.rank(&w, k);
        assert_eq!(&induced[..k], &given[..k]);
        assert_eq!(
            outcome.stats.hyperplanes_inserted,
            outcome.stats.hyperplanes_total
        );
        assert!(outcome.stats.leaves >= 2);
        assert_eq!(outcome.stats.nodes, tree.nodes.len());
    }

    #[test]
    fn test_leaf_regions_partition_the_simplex() {
        let (ts, given) = crossing_instance();
        let gap = 1e-3;
        let dominance = DominanceIndex::new(&ts, gap);
        let scorer = RankingScorer::new(&ts, gap);
        let oracle = SamplingOracle::new(&ts, &given, gap);
        let k = 2;

        let mut tree = ArrangementTree::new(&oracle, &dominance, &scorer, &given, k);
        tree.solve(None).unwrap();
        let regions = tree.leaf_regions();
        let planes = dominance.contested_hyperplanes(k);

        let mut rng = StdRng::seed_from_u64(11);
        let mut checked = 0;
        for _ in 0..200 {
            let t: f64 = rng.gen();
            let w = vec![t, 1.0 - t];
            // Skip boundary-degenerate points: anything within twice the
            // margin of some hyperplane belongs to no open region.
            let degenerate = planes.iter().any(|(_, coeffs)| {
                (coeffs[0] * w[0] + coeffs[1] * w[1]).abs() <= 2.0 * gap
            });
            if degenerate {
                continue;
            }
            checked += 1;
            let containing = regions
                .iter()
                .filter(|region| {
                    region.iter().all(|half_space| {
                        let value: f64 = half_space
                            .coeffs
                            .iter()
                            .zip(w.iter())
                            .map(|(c, x)| c * x)
                            .sum();
                        match half_space.side {
                            Side::Win => value >= gap,
                            Side::Lose => value <= -gap,
                        }
                    })
                })
                .count();
            assert_eq!(
                containing, 1,
                "point {w:?} lies in {containing} leaf regions"
            );
        }
        assert!(checked > 100, "degeneracy filter rejected too many points");
    }

    #[test]
    fn test_deadline_falls_back_to_partial_tree() {
        let (ts, given) = crossing_instance();
        let gap = 1e-3;
        let dominance = DominanceIndex::new(&ts, gap);
        let scorer = RankingScorer::new(&ts, gap);
        let oracle = SamplingOracle::new(&ts, &given, gap);
        let k = 2;

        let mut tree = ArrangementTree::new(&oracle, &dominance, &scorer, &given, k);
        // Zero budget: construction halts almost immediately, but the
        // leaves built so far still cover the simplex and are solved, so
        // the best optimum found so far is reported rather than nothing.
        let outcome = tree.solve(Some(Duration::ZERO)).unwrap();
        assert!(outcome.stats.hyperplanes_inserted < outcome.stats.hyperplanes_total);
        assert!(outcome.weights.is_some(), "leaf solves must still happen");
        assert_eq!(outcome.error, 0, "the partial cover still admits the optimum");
    }

    /// Backend that always reports the same point, regardless of region.
    /// Lets the fake-leaf re-check be exercised deterministically: the
    /// point sits on every hyperplane, so both children of any split accept
    /// it during probing but reject it under the exact margin re-check.
    struct FixedOracle {
        weights: WeightVector,
    }

    impl Oracle for FixedOracle {
        fn solve(&self, _request: &OracleRequest) -> crate::error::Result<OracleResponse> {
            Ok(OracleResponse {
                status: OracleStatus::Optimal,
                weights: Some(self.weights.clone()),
                objective: Some(0.0),
            })
        }
    }

    #[test]
    fn test_fake_leaves_are_counted_and_excluded() {
        // Two contested tuples, one hyperplane w0 − w1. The fixed point
        // (0.5, 0.5) lies exactly on it: both probes report feasible, the
        // tree splits, and both leaf optima fail the exact re-check.
        let ts = tuples(&[&[2.0, 1.0], &[1.0, 2.0]]);
        let given = vec![1, 2];
        let gap = 1e-3;
        let dominance = DominanceIndex::new(&ts, gap);
        let scorer = RankingScorer::new(&ts, gap);
        let oracle = FixedOracle {
            weights: vec![0.5, 0.5],
        };
        let k = 2;

        let mut tree = ArrangementTree::new(&oracle, &dominance, &scorer, &given, k);
        let outcome = tree.solve(None).unwrap();

        assert_eq!(outcome.stats.leaves, 2);
        assert_eq!(outcome.stats.fake_leaves, 2);
        assert!(
            outcome.weights.is_none(),
            "fake leaves must not reach the global best"
        );
        assert_eq!(outcome.error, (ts.len() * k) as u32);
    }

    /// Backend that proves every region empty. A split can then never be
    /// justified, and the root contradiction must surface as an error.
    struct InfeasibleOracle;

    impl Oracle for InfeasibleOracle {
        fn solve(&self, _request: &OracleRequest) -> crate::error::Result<OracleResponse> {
            Ok(OracleResponse::infeasible())
        }
    }

    #[test]
    fn test_contradictory_probes_are_fatal() {
        let ts = tuples(&[&[2.0, 1.0], &[1.0, 2.0]]);
        let given = vec![1, 2];
        let gap = 1e-3;
        let dominance = DominanceIndex::new(&ts, gap);
        let scorer = RankingScorer::new(&ts, gap);
        let oracle = InfeasibleOracle;

        let mut tree = ArrangementTree::new(&oracle, &dominance, &scorer, &given, 2);
        let err = tree.solve(None).unwrap_err();
        assert!(matches!(err, RankexError::RegionContradiction { .. }));
    }
}
