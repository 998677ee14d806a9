//! Local refinement around a candidate optimum (symbolic gradient descent).
//!
//! Classical gradient descent cannot move through a piecewise-constant
//! integer objective, so the descent step is replaced by an exact solve: the
//! oracle is asked for the optimum restricted to a small cell around the
//! current point, and the cell is recentred on whatever it returns. The
//! error sequence is non-increasing by construction — a worse answer is
//! never adopted.
//!
//! Two budget modes, mirroring how the search is run in practice:
//! - **step budget**: stop at the first non-improving solve (or when the
//!   step cap is hit) and report the incumbent;
//! - **wall clock**: a non-improving solve doubles the cell (the local
//!   optimum has been exhausted) until the cell covers the whole cube or
//!   the clock runs out.
//!
//! All deadline arithmetic is `Instant`/`Duration`; the remaining budget is
//! threaded into each oracle call, and the deadline is only ever checked
//! between calls — an in-flight solve is never interrupted.

use std::time::{Duration, Instant};

use crate::dominance::DominanceIndex;
use crate::error::Result;
use crate::oracle::{cell_constraints, Constraint, Objective, Oracle, OracleRequest};
use crate::score::RankingScorer;
use crate::types::{GivenRanking, WeightVector};

/// Phase of the refinement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescentState {
    /// No oracle call issued yet.
    Seeded,
    /// At least one improving step taken.
    Improving,
    /// Reached error 0.
    Converged,
    /// Stopped without reaching 0: step budget, clock, or cell at full size.
    Stalled,
}

/// How long the refinement may run.
#[derive(Debug, Clone, Copy)]
pub enum DescentBudget {
    /// Stop at the first non-improving solve, or after this many improving
    /// steps, whichever comes first.
    Steps(usize),
    /// Keep growing the cell on non-improvement until the clock runs out or
    /// the cell covers the unit cube.
    WallClock(Duration),
}

/// Result of a refinement run.
#[derive(Debug, Clone)]
pub struct DescentOutcome {
    pub weights: Option<WeightVector>,
    /// Induced ranks for the top-k target positions under the incumbent.
    pub ranking: Vec<u32>,
    pub error: u32,
    /// Improving steps taken.
    pub steps: usize,
    pub state: DescentState,
    /// Times the oracle's reported objective disagreed with the exact
    /// re-measurement at its own weights. Diagnostic only; the exact value
    /// always wins.
    pub inconsistencies: usize,
}

/// Sym-GD driver over a pluggable oracle.
pub struct SymbolicDescent<'a, O: Oracle> {
    oracle: &'a O,
    dominance: &'a DominanceIndex<'a>,
    scorer: &'a RankingScorer,
    given: &'a GivenRanking,
    k: usize,
    budget: DescentBudget,
    user_constraints: Vec<Constraint>,
}

impl<'a, O: Oracle> SymbolicDescent<'a, O> {
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
            budget: DescentBudget::Steps(64),
            user_constraints: Vec::new(),
        }
    }

    pub fn with_budget(mut self, budget: DescentBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Extra constraints carried on every oracle request.
    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.user_constraints = constraints;
        self
    }

    /// Refine from `seed_center` with an initial cell of `cell_size`.
    ///
    /// The reported error is monotonically non-increasing across iterations
    /// and never exceeds the trivial seed error n·k. An infeasible cell is
    /// treated as the sentinel error n·k, which triggers the growth branch
    /// under a wall-clock budget.
    pub fn run(&self, seed_center: &WeightVector, cell_size: f64) -> Result<DescentOutcome> {
        let start = Instant::now();
        let dim = seed_center.len();
        let n = self.dominance.len();
        let sentinel = (n * self.k) as u32;
        let contested = self.dominance.contested_pairs(self.k);

        let mut incumbent_error = sentinel;
        let mut incumbent: Option<WeightVector> = None;
        // Seeded until the first solve, Improving while steps land; only
        // Converged and Stalled can be the final state.
        let state: DescentState;
        let mut steps = 0usize;
        let mut inconsistencies = 0usize;
        let mut center = seed_center.clone();
        let mut size = cell_size;

        loop {
            // Deadline check between oracle calls only.
            let remaining = match self.budget {
                DescentBudget::WallClock(budget) => {
                    let elapsed = start.elapsed();
                    if elapsed >= budget {
                        state = DescentState::Stalled;
                        break;
                    }
                    Some(budget - elapsed)
                }
                DescentBudget::Steps(_) => None,
            };

            let mut request = OracleRequest::new(Objective::MinPositionError, dim, self.k);
            request.contested = contested.clone();
            request.constraints = cell_constraints(&center, size);
            request.constraints.extend(self.user_constraints.iter().cloned());
            request.timeout = remaining;

            let response = self.oracle.solve(&request)?;
            let (error, weights) = match &response.weights {
                Some(w) => {
                    let exact = self.scorer.position_error(w, self.given, self.k);
                    if let Some(reported) = response.objective {
                        if reported.round() as u32 != exact {
                            inconsistencies += 1;
                        }
                    }
                    (exact, Some(w.clone()))
                }
                // Infeasible cell or timeout without a point: sentinel.
                None => (sentinel, None),
            };

            if error == 0 {
                incumbent_error = 0;
                incumbent = weights;
                state = DescentState::Converged;
                break;
            }

            if error >= incumbent_error {
                match self.budget {
                    DescentBudget::Steps(_) => {
                        state = DescentState::Stalled;
                        break;
                    }
                    DescentBudget::WallClock(budget) => {
                        if start.elapsed() >= budget {
                            state = DescentState::Stalled;
                            break;
                        }
                        if size >= 1.0 {
                            state = DescentState::Stalled;
                            break;
                        }
                        size *= 2.0;
                        if let Some(w) = &incumbent {
                            center = w.clone();
                        }
                    }
                }
            } else {
                incumbent_error = error;
                incumbent = weights;
                steps += 1;
                if let DescentBudget::Steps(max_steps) = self.budget {
                    if steps >= max_steps {
                        state = DescentState::Stalled;
                        break;
                    }
                }
                // Recentre on the new incumbent at unchanged size.
                center = incumbent.clone().expect("improving step always has weights");
            }
        }

        let ranking = match &incumbent {
            Some(w) => self.scorer.rank(w, self.k),
            None => Vec::new(),
        };
        Ok(DescentOutcome {
            weights: incumbent,
            ranking,
            error: incumbent_error,
            steps,
            state,
            inconsistencies,
        })
    }
}
