//! Core data model: tuples, relations, and target rankings.
//!
//! A [`Relation`] is loaded once per run and read-only afterwards. Everything
//! downstream — dominance classification, cell bounds, oracle requests —
//! borrows the same tuple slice. Key design decisions:
//! - attributes are `f64` at the data-model layer; exact comparisons happen in
//!   the scaled-integer domain inside [`crate::score`], never here
//! - tuples carry their original position, because the target ranking is
//!   index-aligned with relation order
//! - ranks are 1-based and ties share a rank, matching how ranked lists are
//!   published in practice

use serde::{Deserialize, Serialize};

use crate::error::{RankexError, Result};

/// A point in weight space. Nonnegative entries; in most contexts constrained
/// to sum to 1 (a point on the weight simplex).
pub type WeightVector = Vec<f64>;

/// Target ranking, index-aligned with the relation: `ranking[i]` is the
/// 1-based rank the given ordering assigns to tuple `i`. Ties share a rank.
pub type GivenRanking = Vec<u32>;

/// Tie precision when deriving a ranking from a raw score column.
const SCORE_COLUMN_PRECISION: f64 = 1e-10;

/// One row of the relation: an identifier plus a fixed-dimension numeric
/// attribute vector. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    /// Row identifier from the input (display only, never used in search).
    pub id: String,
    /// Original position in the relation.
    pub index: usize,
    /// Attribute values, length d.
    pub attributes: Vec<f64>,
}

impl Tuple {
    pub fn dim(&self) -> usize {
        self.attributes.len()
    }
}

/// A named list of tuples over a shared schema.
///
/// Empty on construction; rows are appended with [`Relation::insert`], which
/// enforces a fixed arity. The optional rank/score column of the input is not
/// stored here — it is extracted into a [`GivenRanking`] up front and the
/// relation keeps attributes only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    name: String,
    schema: Vec<String>,
    tuples: Vec<Tuple>,
}

impl Relation {
    /// Create an empty relation. `schema` names the attribute columns.
    pub fn new(name: impl Into<String>, schema: Vec<String>) -> Result<Self> {
        if schema.is_empty() {
            return Err(RankexError::degenerate("relation has zero attributes"));
        }
        Ok(Self {
            name: name.into(),
            schema,
            tuples: Vec::new(),
        })
    }

    /// Append a row. The attribute count must match the schema.
    pub fn insert(&mut self, id: impl Into<String>, attributes: Vec<f64>) -> Result<()> {
        if attributes.len() != self.schema.len() {
            return Err(RankexError::degenerate(format!(
                "row {} has {} attributes, schema has {}",
                self.tuples.len(),
                attributes.len(),
                self.schema.len()
            )));
        }
        let index = self.tuples.len();
        self.tuples.push(Tuple {
            id: id.into(),
            index,
            attributes,
        });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    pub fn get(&self, index: usize) -> &Tuple {
        &self.tuples[index]
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Number of attributes per tuple.
    pub fn dim(&self) -> usize {
        self.schema.len()
    }

    /// Keep only the first `num` tuples.
    pub fn top(&mut self, num: usize) {
        self.tuples.truncate(num);
    }

    /// Keep only the attribute columns at `indices`, in the given order.
    pub fn project(&mut self, indices: &[usize]) -> Result<()> {
        for &i in indices {
            if i >= self.schema.len() {
                return Err(RankexError::degenerate(format!(
                    "projection index {i} out of range for {} attributes",
                    self.schema.len()
                )));
            }
        }
        self.schema = indices.iter().map(|&i| self.schema[i].clone()).collect();
        for tuple in &mut self.tuples {
            tuple.attributes = indices.iter().map(|&i| tuple.attributes[i]).collect();
        }
        Ok(())
    }

    /// Append powers `2..=exponent` of every attribute as new columns, for
    /// polynomial score models. `derive(1)` is a no-op.
    pub fn derive(&mut self, exponent: u32) {
        if exponent < 2 {
            return;
        }
        let base = self.schema.len();
        for i in 0..base {
            for p in 2..=exponent {
                self.schema.push(format!("{}^{}", self.schema[i], p));
            }
        }
        for tuple in &mut self.tuples {
            let mut extra = Vec::with_capacity(base * (exponent as usize - 1));
            for i in 0..base {
                for p in 2..=exponent {
                    extra.push(tuple.attributes[i].powi(p as i32));
                }
            }
            tuple.attributes.extend(extra);
        }
    }

    /// Validate that a top-k search over this relation is well-posed.
    pub fn validate_search(&self, given: &GivenRanking, k: usize) -> Result<()> {
        if self.tuples.is_empty() {
            return Err(RankexError::degenerate("empty relation"));
        }
        if self.dim() < 1 {
            return Err(RankexError::degenerate("relation has zero attributes"));
        }
        if k == 0 || k > self.len() {
            return Err(RankexError::degenerate(format!(
                "k = {k} out of range for {} tuples",
                self.len()
            )));
        }
        if given.len() != self.len() {
            return Err(RankexError::degenerate(format!(
                "given ranking has {} entries for {} tuples",
                given.len(),
                self.len()
            )));
        }
        Ok(())
    }
}

/// Read a target ranking directly from a column of 1-based ranks.
pub fn ranking_from_rank_column(column: &[f64]) -> Result<GivenRanking> {
    column
        .iter()
        .map(|&r| {
            if r < 1.0 || r.fract() != 0.0 || r > u32::MAX as f64 {
                Err(RankexError::degenerate(format!(
                    "rank column value {r} is not a positive integer"
                )))
            } else {
                Ok(r as u32)
            }
        })
        .collect()
}

/// Derive a target ranking from a column of scores listed in ranked order
/// (best first). Scores within `1e-10` of the previous row collapse into the
/// same rank, scanning backward the way the scorer collapses ties.
pub fn ranking_from_score_column(column: &[f64]) -> GivenRanking {
    let mut ranking = Vec::with_capacity(column.len());
    for (i, &score) in column.iter().enumerate() {
        let mut rank = i as u32 + 1;
        for j in (0..i).rev() {
            if column[j] - score <= SCORE_COLUMN_PRECISION {
                rank -= 1;
            } else {
                break;
            }
        }
        ranking.push(rank);
    }
    ranking
}

/// Final answer of a search: the explaining weights, the ranking they induce
/// over the top-k target positions, and the total position error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Best weight vector found, if any candidate was feasible.
    pub weights: Option<WeightVector>,
    /// Induced 1-based ranks for the first k target positions.
    pub ranking: Vec<u32>,
    /// Total absolute position error over the top-k positions.
    pub error: u32,
}
