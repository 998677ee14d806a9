//! rankex - explain an observed ranking by searching attribute-weight space
//!
//! Given a relation of scored tuples and a target top-k ranking, rankex
//! finds a nonnegative, sum-to-one weight vector whose linear score order
//! best matches the target, minimizing total absolute position error.
//!
//! # Architecture
//!
//! ```text
//! Relation + Ranking → Dominance → Cell Bounds → Grid Seed → Sym-GD ─┐
//!        ↓                 ↓            ↓             ↓              ↓
//!     validate         contested    achievable    CellFinder     Oracle calls
//!     fail-fast        pairs only   rank interval  warm start        ↓
//!                                                          Arrangement Tree
//!                                                          (exact optimum)
//! ```
//!
//! Two search modes share one oracle seam:
//! - **Sym-GD** ([`descent`]): cheap, local — grid-seeded cells recentred on
//!   each oracle answer until the error stops improving
//! - **Arrangement tree** ([`arrangement`]): exact, global — partitions the
//!   weight simplex by every contested hyperplane and solves each region
//!
//! # Numerical discipline
//!
//! Score comparisons never touch native floating point: scoring, tie
//! collapse, and inequality re-checks run in a scaled-integer (i128) domain
//! ([`score`]), because the system's whole purpose includes detecting
//! floating-point cancellation near ties.

pub mod arrangement;
pub mod cell;
pub mod config;
pub mod descent;
pub mod dominance;
pub mod error;
pub mod grid;
pub mod oracle;
pub mod sampler;
pub mod score;
pub mod types;

// Re-export core types
pub use arrangement::{ArrangementTree, TreeOutcome, TreeStats};
pub use cell::{Cell, CellSign};
pub use config::SearchConfig;
pub use descent::{DescentBudget, DescentOutcome, DescentState, SymbolicDescent};
pub use dominance::{Dominance, DominanceIndex};
pub use error::{RankexError, Result};
pub use grid::CellFinder;
pub use oracle::{
    Constraint, HalfSpace, Objective, Oracle, OracleRequest, OracleResponse, OracleStatus,
    SamplingOracle, Side,
};
pub use sampler::RandomSearch;
pub use score::RankingScorer;
pub use types::{GivenRanking, Relation, SearchOutcome, Tuple, WeightVector};
