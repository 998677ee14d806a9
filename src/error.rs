//! Error taxonomy for the weight-space search.
//!
//! Only two kinds of condition are errors here:
//! - degenerate input, rejected at construction before any search begins, and
//! - failures that leave the search without a meaningful answer
//!   (a contradictory region split, a broken oracle backend).
//!
//! Infeasible regions and oracle timeouts are *statuses* on
//! [`crate::oracle::OracleResponse`], recovered locally inside the descent and
//! tree control flow. Numerical inconsistencies between an oracle's answer and
//! the exact re-check are counted and surfaced as diagnostics, never raised.

use thiserror::Error;

/// Errors that can escape the search machinery to the caller.
#[derive(Debug, Error)]
pub enum RankexError {
    /// Input that cannot support a search: empty relation, zero attributes,
    /// k larger than the relation, a ranking of the wrong length, or a row
    /// with the wrong arity.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Both sides of a hyperplane were reported infeasible inside a region
    /// that was itself verified feasible. The arrangement tree cannot
    /// continue past this; it contradicts the parent region's feasibility.
    #[error(
        "region contradiction: both sides of hyperplane {hyperplane} infeasible \
         inside a feasible region (node {node})"
    )]
    RegionContradiction { node: usize, hyperplane: usize },

    /// An oracle backend failed in a way that is not expressible as a
    /// response status (process death, license error, malformed model).
    #[error("oracle backend failure: {0}")]
    OracleBackend(String),
}

pub type Result<T> = std::result::Result<T, RankexError>;

impl RankexError {
    /// Shorthand used by the constructors that validate input shape.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        RankexError::DegenerateInput(msg.into())
    }
}
