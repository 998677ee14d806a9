//! Built-in oracle backend: deterministic simplex sweep plus seeded random
//! refinement.
//!
//! The restricted problem shape makes sampling a serious backend rather
//! than a toy: the feasible set is a low-dimensional slice of the weight
//! simplex cut by linear constraints, and the position-error objective is
//! integer-valued and piecewise constant, so it is exactly evaluable at any
//! point through [`RankingScorer`] — no relaxation gap, no rounding. The
//! search is three-phase:
//!
//! 1. a deterministic lattice sweep of the simplex (all compositions of the
//!    resolution into d parts), sized to a candidate cap;
//! 2. seeded uniform-normalized random draws over the whole simplex;
//! 3. shrinking-radius jitter around the incumbent.
//!
//! Box-shaped regions (descent cells) additionally get an alternating
//! projection seed, so a cell that intersects the simplex is never missed
//! just because the lattice pitch is coarser than the cell.
//!
//! Known limitation, by construction: feasibility is certified only by
//! exhibiting a feasible sample, so a region thinner than the lattice pitch
//! and the random budget can be misreported as infeasible. The margins this
//! crate generates are fat relative to the default budgets.

use std::time::Instant;

use rand::prelude::*;

use crate::error::{RankexError, Result};
use crate::oracle::{
    Constraint, Objective, Oracle, OracleRequest, OracleResponse, OracleStatus, Side,
};
use crate::score::RankingScorer;
use crate::types::{GivenRanking, Tuple, WeightVector};

/// Default cap on deterministic lattice candidates.
const DEFAULT_LATTICE_CAP: usize = 4096;
/// Default random-draw budget (split between global and refinement phases).
const DEFAULT_SAMPLES: usize = 2048;
/// Deadline checks happen every this many evaluations.
const DEADLINE_STRIDE: usize = 64;

/// Sampling-based [`Oracle`] over a fixed problem instance.
pub struct SamplingOracle<'a> {
    tuples: &'a [Tuple],
    given: &'a GivenRanking,
    scorer: RankingScorer,
    gap: f64,
    std_dev: Vec<f64>,
    lattice_cap: usize,
    samples: usize,
    seed: u64,
}

impl<'a> SamplingOracle<'a> {
    pub fn new(tuples: &'a [Tuple], given: &'a GivenRanking, gap: f64) -> Self {
        let std_dev = standard_deviation(tuples);
        Self {
            tuples,
            given,
            scorer: RankingScorer::new(tuples, gap),
            gap,
            std_dev,
            lattice_cap: DEFAULT_LATTICE_CAP,
            samples: DEFAULT_SAMPLES,
            seed: 0x5eed_cafe,
        }
    }

    /// Override the candidate budgets (lattice cap, random draws).
    pub fn with_budget(mut self, lattice_cap: usize, samples: usize) -> Self {
        self.lattice_cap = lattice_cap.max(1);
        self.samples = samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Exact objective value at a point, in the request's objective.
    fn evaluate(&self, request: &OracleRequest, weights: &WeightVector) -> f64 {
        match request.objective {
            Objective::MinPositionError => {
                self.scorer.position_error(weights, self.given, request.k) as f64
            }
            Objective::MinScoreViolation => {
                let n = self.tuples.len();
                let scores: Vec<i128> =
                    (0..n).map(|i| self.scorer.score(i, weights)).collect();
                let mut violation = 0.0;
                for i in 0..request.k.min(n) {
                    for j in (i + 1)..n {
                        let diff = RankingScorer::unscale(scores[i] - scores[j]);
                        if self.given[i] < self.given[j] {
                            violation += (self.gap - diff).max(0.0);
                        } else if self.given[i] == self.given[j] {
                            violation += diff.abs();
                        }
                    }
                }
                violation
            }
        }
    }

    /// Whether a simplex point satisfies every constraint of the request.
    fn feasible(&self, request: &OracleRequest, w: &WeightVector) -> bool {
        if w.iter().any(|&x| x < 0.0) {
            return false;
        }
        for half_space in &request.halfspaces {
            let value: f64 = half_space
                .coeffs
                .iter()
                .zip(w.iter())
                .map(|(c, x)| c * x)
                .sum();
            let ok = match half_space.side {
                Side::Win => value >= self.gap,
                Side::Lose => value <= -self.gap,
            };
            if !ok {
                return false;
            }
        }
        for constraint in &request.constraints {
            let ok = match constraint {
                Constraint::RawMin { attribute, value } => w[*attribute] >= *value,
                Constraint::RawMax { attribute, value } => w[*attribute] <= *value,
                Constraint::StdMin { attribute, value } => {
                    let total: f64 = self
                        .std_dev
                        .iter()
                        .zip(w.iter())
                        .map(|(s, x)| s * x)
                        .sum();
                    self.std_dev[*attribute] / value * w[*attribute] >= total
                }
                Constraint::StdMax { attribute, value } => {
                    let total: f64 = self
                        .std_dev
                        .iter()
                        .zip(w.iter())
                        .map(|(s, x)| s * x)
                        .sum();
                    self.std_dev[*attribute] / value * w[*attribute] <= total
                }
                Constraint::Linear { coeffs, value } => {
                    let total: f64 =
                        coeffs.iter().zip(w.iter()).map(|(c, x)| c * x).sum();
                    total <= *value
                }
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

impl Oracle for SamplingOracle<'_> {
    fn solve(&self, request: &OracleRequest) -> Result<OracleResponse> {
        let dim = request.dim;
        if dim == 0 || self.tuples.first().map(|t| t.dim()) != Some(dim) {
            return Err(RankexError::OracleBackend(format!(
                "request dimension {dim} does not match the problem instance"
            )));
        }

        let start = Instant::now();
        let mut best: Option<(f64, WeightVector)> = None;
        let mut evaluated = 0usize;
        let mut timed_out = false;

        // Closure returns true when the search should stop (optimum hit or
        // deadline passed).
        let mut consider = |w: WeightVector,
                            best: &mut Option<(f64, WeightVector)>,
                            timed_out: &mut bool| {
            evaluated += 1;
            if evaluated % DEADLINE_STRIDE == 0 {
                if let Some(budget) = request.timeout {
                    if start.elapsed() > budget {
                        *timed_out = true;
                        return true;
                    }
                }
            }
            if !self.feasible(request, &w) {
                return false;
            }
            let objective = self.evaluate(request, &w);
            let improved = match best {
                Some((incumbent, _)) => objective < *incumbent,
                None => true,
            };
            if improved {
                let optimal = objective == 0.0;
                *best = Some((objective, w));
                return optimal;
            }
            false
        };

        'search: {
            // Phase 0: alternating-projection seed for box regions.
            if let Some(seeded) = box_projection_seed(dim, &request.constraints) {
                if consider(seeded, &mut best, &mut timed_out) {
                    break 'search;
                }
            }

            // Phase 1: deterministic lattice sweep.
            let resolution = lattice_resolution(dim, self.lattice_cap);
            for point in simplex_lattice(dim, resolution) {
                if consider(point, &mut best, &mut timed_out) {
                    break 'search;
                }
            }

            // Phase 2: seeded random draws over the whole simplex.
            let mut rng = StdRng::seed_from_u64(self.seed);
            for _ in 0..self.samples / 2 {
                let mut w: WeightVector = (0..dim).map(|_| rng.gen::<f64>()).collect();
                let sum: f64 = w.iter().sum();
                if sum <= 0.0 {
                    continue;
                }
                w.iter_mut().for_each(|x| *x /= sum);
                if consider(w, &mut best, &mut timed_out) {
                    break 'search;
                }
            }

            // Phase 3: shrinking-radius jitter around the incumbent.
            let rounds: usize = 4;
            let per_round = (self.samples / 2) / rounds;
            for round in 0..rounds {
                let Some((_, center)) = best.clone() else { break };
                let radius = 0.25 / (1u32 << round) as f64;
                for _ in 0..per_round {
                    let mut w: WeightVector = center
                        .iter()
                        .map(|c| (c + (rng.gen::<f64>() - 0.5) * radius).max(0.0))
                        .collect();
                    let sum: f64 = w.iter().sum();
                    if sum <= 0.0 {
                        continue;
                    }
                    w.iter_mut().for_each(|x| *x /= sum);
                    if consider(w, &mut best, &mut timed_out) {
                        break 'search;
                    }
                }
            }
        }

        let response = match (timed_out, best) {
            (true, Some((objective, weights))) => OracleResponse {
                status: OracleStatus::TimeoutWithIncumbent,
                weights: Some(weights),
                objective: Some(objective),
            },
            (true, None) => OracleResponse {
                status: OracleStatus::TimeoutNoSolution,
                weights: None,
                objective: None,
            },
            (false, Some((objective, weights))) => OracleResponse {
                status: OracleStatus::Optimal,
                weights: Some(weights),
                objective: Some(objective),
            },
            (false, None) => OracleResponse::infeasible(),
        };
        Ok(response)
    }
}

/// Population standard deviation per attribute, for standardized-weight
/// constraints.
fn standard_deviation(tuples: &[Tuple]) -> Vec<f64> {
    if tuples.is_empty() {
        return Vec::new();
    }
    let n = tuples.len() as f64;
    let dim = tuples[0].dim();
    (0..dim)
        .map(|a| {
            let mean: f64 = tuples.iter().map(|t| t.attributes[a]).sum::<f64>() / n;
            let variance: f64 = tuples
                .iter()
                .map(|t| {
                    let d = t.attributes[a] - mean;
                    d * d
                })
                .sum::<f64>()
                / n;
            variance.sqrt()
        })
        .collect()
}

/// Largest lattice resolution whose candidate count stays under `cap`.
///
/// The simplex lattice at resolution L has C(L+d−1, d−1) points.
fn lattice_resolution(dim: usize, cap: usize) -> usize {
    let mut resolution = 1usize;
    while resolution < 8192 && lattice_count(dim, resolution + 1) <= cap as u128 {
        resolution += 1;
    }
    resolution
}

fn lattice_count(dim: usize, resolution: usize) -> u128 {
    // C(resolution + dim - 1, dim - 1), saturating.
    let mut count: u128 = 1;
    for i in 0..(dim - 1) {
        count = count.saturating_mul((resolution + i + 1) as u128);
        count /= (i + 1) as u128;
    }
    count
}

/// All points of the simplex lattice at the given resolution: weight vectors
/// `counts / resolution` over all compositions of `resolution` into `dim`
/// parts. Iterative odometer, earlier dimensions vary fastest.
fn simplex_lattice(dim: usize, resolution: usize) -> Vec<WeightVector> {
    let mut points = Vec::new();
    let scale = resolution as f64;

    if dim == 1 {
        return vec![vec![1.0]];
    }

    let mut digits = vec![0usize; dim - 1];
    loop {
        let used: usize = digits.iter().sum();
        let mut point: WeightVector =
            digits.iter().map(|&c| c as f64 / scale).collect();
        point.push((resolution - used) as f64 / scale);
        points.push(point);

        // Advance to the next digit vector with sum ≤ resolution.
        let mut i = 0;
        loop {
            if i == digits.len() {
                return points;
            }
            digits[i] += 1;
            if digits.iter().sum::<usize>() <= resolution {
                break;
            }
            digits[i] = 0;
            i += 1;
        }
    }
}

/// Alternating projection onto (box from raw bounds) ∩ (simplex hyperplane).
///
/// Returns a candidate point when the raw-bound box plausibly intersects the
/// simplex; the caller still runs the full feasibility check.
fn box_projection_seed(dim: usize, constraints: &[Constraint]) -> Option<WeightVector> {
    let mut lo = vec![0.0f64; dim];
    let mut hi = vec![1.0f64; dim];
    let mut has_box = false;
    for constraint in constraints {
        match constraint {
            Constraint::RawMin { attribute, value } => {
                lo[*attribute] = lo[*attribute].max(*value);
                has_box = true;
            }
            Constraint::RawMax { attribute, value } => {
                hi[*attribute] = hi[*attribute].min(*value);
                has_box = true;
            }
            _ => {}
        }
    }
    if !has_box {
        return None;
    }
    if lo.iter().zip(hi.iter()).any(|(l, h)| l > h) {
        return None;
    }

    let mut w: WeightVector = lo
        .iter()
        .zip(hi.iter())
        .map(|(l, h)| (l + h) / 2.0)
        .collect();
    for _ in 0..200 {
        let shift = (1.0 - w.iter().sum::<f64>()) / dim as f64;
        for x in w.iter_mut() {
            *x += shift;
        }
        for (x, (l, h)) in w.iter_mut().zip(lo.iter().zip(hi.iter())) {
            *x = x.clamp(*l, *h);
        }
    }
    if (w.iter().sum::<f64>() - 1.0).abs() <= 1e-9 {
        Some(w)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::HalfSpace;

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
    fn test_lattice_covers_simplex() {
        let points = simplex_lattice(3, 4);
        assert_eq!(points.len(), lattice_count(3, 4) as usize);
        for p in &points {
            let sum: f64 = p.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "lattice point off simplex: {p:?}");
            assert!(p.iter().all(|&x| x >= 0.0));
        }
        // Vertices are present.
        assert!(points.iter().any(|p| p[0] == 1.0));
        assert!(points.iter().any(|p| p[2] == 1.0));
    }

    #[test]
    fn test_lattice_resolution_respects_cap() {
        let resolution = lattice_resolution(3, 4096);
        assert!(lattice_count(3, resolution) <= 4096);
        assert!(lattice_count(3, resolution + 1) > 4096);
    }

    #[test]
    fn test_solves_separable_instance_to_zero() {
        // Ranking by attribute 1 descending; any attribute-1-heavy weight
        // explains it exactly, so the oracle must reach objective 0.
        let ts = tuples(&[&[4.0, 2.0], &[3.0, 3.0], &[2.0, 4.0], &[1.0, 5.0]]);
        let given = vec![1, 2, 3, 4];
        let oracle = SamplingOracle::new(&ts, &given, 1e-4);
        let request = OracleRequest::new(Objective::MinPositionError, 2, 4);
        let response = oracle.solve(&request).unwrap();
        assert_eq!(response.status, OracleStatus::Optimal);
        assert_eq!(response.objective, Some(0.0));
        let w = response.weights.unwrap();
        assert!(w[0] > w[1], "explaining weights must favor attribute 1: {w:?}");
    }

    #[test]
    fn test_reports_infeasible_on_contradictory_box() {
        let ts = tuples(&[&[4.0, 2.0], &[1.0, 5.0]]);
        let given = vec![1, 2];
        let oracle = SamplingOracle::new(&ts, &given, 1e-4);
        let mut request = OracleRequest::new(Objective::MinPositionError, 2, 2);
        request.constraints = vec![
            Constraint::RawMin {
                attribute: 0,
                value: 0.8,
            },
            Constraint::RawMin {
                attribute: 1,
                value: 0.8,
            },
        ];
        let response = oracle.solve(&request).unwrap();
        assert_eq!(response.status, OracleStatus::Infeasible);
        assert!(response.weights.is_none());
    }

    #[test]
    fn test_respects_halfspace_margins() {
        let ts = tuples(&[&[4.0, 2.0], &[3.0, 3.0], &[2.0, 4.0], &[1.0, 5.0]]);
        let given = vec![1, 2, 3, 4];
        let gap = 1e-3;
        let oracle = SamplingOracle::new(&ts, &given, gap);
        let mut request = OracleRequest::new(Objective::MinPositionError, 2, 4);
        // Force the attribute-2 side: tuple 3 must beat tuple 0.
        request.halfspaces = vec![HalfSpace::win(vec![-3.0, 3.0])];
        let response = oracle.solve(&request).unwrap();
        let w = response.weights.expect("halfspace region is fat, must be feasible");
        let value = -3.0 * w[0] + 3.0 * w[1];
        assert!(value >= gap, "returned point violates the win margin");
        assert!(
            response.objective.unwrap() > 0.0,
            "forced misordering cannot reach error 0"
        );
    }

    #[test]
    fn test_cell_restriction_finds_interior_point() {
        // A box far from any lattice-friendly coordinates; the projection
        // seed must still land inside.
        let ts = tuples(&[&[4.0, 2.0, 1.0], &[1.0, 5.0, 2.0], &[2.0, 1.0, 6.0]]);
        let given = vec![1, 2, 3];
        let oracle = SamplingOracle::new(&ts, &given, 1e-4).with_budget(64, 64);
        let mut request = OracleRequest::new(Objective::MinPositionError, 3, 3);
        request.constraints = crate::oracle::cell_constraints(&[0.3137, 0.4423, 0.244], 0.01);
        let response = oracle.solve(&request).unwrap();
        assert!(
            response.is_feasible(),
            "tiny interior cell must be reachable via projection seeding"
        );
        let w = response.weights.unwrap();
        assert!((w[0] - 0.3137).abs() <= 0.005 + 1e-9);
    }

    #[test]
    fn test_deterministic_under_fixed_seed() {
        let ts = tuples(&[&[4.0, 2.0], &[3.0, 3.0], &[2.0, 4.0], &[1.0, 5.0]]);
        let given = vec![2, 1, 3, 4];
        let oracle = SamplingOracle::new(&ts, &given, 1e-4).with_seed(99);
        let request = OracleRequest::new(Objective::MinPositionError, 2, 4);
        let a = oracle.solve(&request).unwrap();
        let b = oracle.solve(&request).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.objective, b.objective);
    }

    #[test]
    fn test_score_violation_objective_zero_when_order_matches() {
        let ts = tuples(&[&[4.0, 2.0], &[3.0, 3.0], &[2.0, 4.0], &[1.0, 5.0]]);
        let given = vec![1, 2, 3, 4];
        let oracle = SamplingOracle::new(&ts, &given, 1e-4);
        let request = OracleRequest::new(Objective::MinScoreViolation, 2, 4);
        let response = oracle.solve(&request).unwrap();
        assert_eq!(response.status, OracleStatus::Optimal);
        // At w = (1, 0) every ordered pair is separated by ≥ 1 ≫ gap.
        assert_eq!(response.objective, Some(0.0));
    }
}
