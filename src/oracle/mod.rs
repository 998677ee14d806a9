//! The constrained-optimization seam.
//!
//! Every search strategy in this crate — descent, grid seeding, the
//! arrangement tree — drives the same interface: submit a convex region plus
//! an objective, get back a status and maybe a weight vector. The solve
//! itself is pluggable; search code never names a backend. The built-in
//! [`sampling::SamplingOracle`] exploits the restricted shape of this
//! problem (low-dimensional simplex, linear constraints, integer-valued
//! objective); an LP/MILP adapter can be dropped in behind the same trait.
//!
//! Infeasibility and timeouts are response *statuses*, not errors: both are
//! expected, recoverable outcomes during tree construction and refinement.
//! `Err` is reserved for backend failure.

pub mod sampling;

pub use sampling::SamplingOracle;

use std::time::Duration;

use crate::error::Result;
use crate::types::WeightVector;

/// What the oracle minimizes over the requested region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Total absolute position error over the top-k target positions.
    MinPositionError,
    /// Total pairwise score violation against the given order (the
    /// soft-margin relaxation used for ordinal-regression seeding).
    MinScoreViolation,
}

/// Which side of a hyperplane a region keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// `coeffs · w ≥ ε`: the first tuple of the pair wins.
    Win,
    /// `coeffs · w ≤ −ε`: the first tuple of the pair loses.
    Lose,
}

/// One half-space constraint with the gap-sized margin baked into its
/// operator. The concrete ε is the oracle's configured gap.
#[derive(Debug, Clone)]
pub struct HalfSpace {
    pub coeffs: Vec<f64>,
    pub side: Side,
}

impl HalfSpace {
    pub fn win(coeffs: Vec<f64>) -> Self {
        Self {
            coeffs,
            side: Side::Win,
        }
    }

    pub fn lose(coeffs: Vec<f64>) -> Self {
        Self {
            coeffs,
            side: Side::Lose,
        }
    }
}

/// A user-supplied restriction layered onto a request.
///
/// `StdMin`/`StdMax` bound the *standardized* weight share of an attribute:
/// the constraint is on `std_dev[a]·w[a] / Σ_i std_dev[i]·w[i]`, expressed
/// linearly as `std_dev[a]/v · w[a] ≷ Σ_i std_dev[i]·w[i]` so it survives the
/// sum-to-one renormalization of displayed standardized weights.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// `w[attribute] ≥ value`.
    RawMin { attribute: usize, value: f64 },
    /// `w[attribute] ≤ value`.
    RawMax { attribute: usize, value: f64 },
    /// Standardized share of `attribute` at least `value`.
    StdMin { attribute: usize, value: f64 },
    /// Standardized share of `attribute` at most `value`.
    StdMax { attribute: usize, value: f64 },
    /// `Σ coeffs[i]·w[i] ≤ value`.
    Linear { coeffs: Vec<f64>, value: f64 },
}

/// Convert a cell into raw per-attribute bounds.
///
/// Bounds that fall outside the open interval (0, 1) are skipped; the
/// simplex constraints already enforce them.
pub fn cell_constraints(center: &[f64], size: f64) -> Vec<Constraint> {
    let half = size / 2.0;
    let mut constraints = Vec::new();
    for (attribute, &c) in center.iter().enumerate() {
        if c - half > 0.0 {
            constraints.push(Constraint::RawMin {
                attribute,
                value: c - half,
            });
        }
        if c + half < 1.0 {
            constraints.push(Constraint::RawMax {
                attribute,
                value: c + half,
            });
        }
    }
    constraints
}

/// A full problem submission: objective, region, and discrete structure.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub objective: Objective,
    /// Weight-space dimension d.
    pub dim: usize,
    /// k in top-k.
    pub k: usize,
    /// Contested pairs (i, j) whose order needs a discrete decision. MILP
    /// backends turn each into an indicator variable; backends that search
    /// the region directly may ignore the list.
    pub contested: Vec<(usize, usize)>,
    /// Half-space constraints with gap margins (arrangement-tree regions).
    pub halfspaces: Vec<HalfSpace>,
    /// User constraints (cell bounds, attribute restrictions).
    pub constraints: Vec<Constraint>,
    /// Wall-clock budget for this call. `None` means run to optimality.
    pub timeout: Option<Duration>,
}

impl OracleRequest {
    pub fn new(objective: Objective, dim: usize, k: usize) -> Self {
        Self {
            objective,
            dim,
            k,
            contested: Vec::new(),
            halfspaces: Vec::new(),
            constraints: Vec::new(),
            timeout: None,
        }
    }
}

/// Solve outcome. Timeouts are first-class: a backend that ran out of time
/// reports whether it still holds a feasible incumbent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleStatus {
    Optimal,
    Infeasible,
    TimeoutWithIncumbent,
    TimeoutNoSolution,
}

#[derive(Debug, Clone)]
pub struct OracleResponse {
    pub status: OracleStatus,
    pub weights: Option<WeightVector>,
    pub objective: Option<f64>,
}

impl OracleResponse {
    pub fn infeasible() -> Self {
        Self {
            status: OracleStatus::Infeasible,
            weights: None,
            objective: None,
        }
    }

    /// Whether this response certifies the region non-empty.
    pub fn is_feasible(&self) -> bool {
        self.weights.is_some()
    }
}

/// An exact constrained-optimization backend.
///
/// `Err` is reserved for unrecoverable backend failure; every expected
/// outcome, including infeasibility and timeout, travels in the response.
pub trait Oracle {
    fn solve(&self, request: &OracleRequest) -> Result<OracleResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_constraints_skip_outside_unit_interval() {
        // Center (0.1, 0.9), size 0.4: the lower bound of attribute 0 and
        // the upper bound of attribute 1 fall outside (0, 1) and are
        // dropped; the simplex already enforces them.
        let constraints = cell_constraints(&[0.1, 0.9], 0.4);
        assert_eq!(constraints.len(), 2);
        assert!(matches!(
            constraints[0],
            Constraint::RawMax { attribute: 0, value } if (value - 0.3).abs() < 1e-12
        ));
        assert!(matches!(
            constraints[1],
            Constraint::RawMin { attribute: 1, value } if (value - 0.7).abs() < 1e-12
        ));
    }

    #[test]
    fn test_cell_constraints_interior_cell_bounds_both_sides() {
        let constraints = cell_constraints(&[0.5, 0.5], 0.2);
        assert_eq!(constraints.len(), 4, "interior cell bounds every side");
    }
}
