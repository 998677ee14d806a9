//! rankex CLI - explain an observed ranking from the command line
//!
//! Loads a relation from CSV, extracts the target ranking from the last
//! column, and runs one of the search strategies:
//!
//! 1. Grid: cell-bound scan only, report the most promising center
//! 2. Descent: grid seed + Sym-GD refinement through the oracle
//! 3. Tree: exact hyperplane-arrangement branch and bound
//! 4. Sample: random-sampling baseline
//!
//! Design philosophy:
//! - Fail fast on degenerate input, before any search begins
//! - Timeouts degrade the answer, they never erase it
//! - Make defaults sane (gap 1e-4, cell size 0.1)
//! - --stats for the counters that explain what the search did

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use owo_colors::OwoColorize;

use rankex::{
    ArrangementTree, CellFinder, DescentBudget, DominanceIndex, RandomSearch, RankingScorer,
    Relation, SamplingOracle, SearchConfig, SearchOutcome, SymbolicDescent, TreeStats,
};

/// Explain an observed ranking of tuples by finding an attribute-weight
/// vector whose linear score order best matches it.
///
/// The input CSV must carry a header row, an identifier in the first
/// column, numeric attributes in the middle columns, and the target
/// ranking (a 1-based rank, or a raw score) in the last column.
///
/// Examples:
///   rankex data.csv                          # exact tree search, full ranking
///   rankex data.csv --k 10 -a descent        # top-10, local refinement
///   rankex data.csv --rank-column score      # last column holds scores
#[derive(Parser, Debug)]
#[command(name = "rankex")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Input relation (CSV with header; id, attributes..., rank/score)
    #[arg(value_name = "CSV")]
    csv: PathBuf,

    /// k in top-k; 0 means the full relation
    ///
    /// Only the first k target positions contribute to the position error.
    /// Smaller k means fewer contested pairs and a much smaller search.
    #[arg(short, long, default_value = "0")]
    k: usize,

    /// Search strategy
    ///
    /// grid    cheapest: cell-bound scan, no oracle calls
    /// descent grid seed + iterative refinement (good default)
    /// tree    exact global optimum, exponential in attributes
    /// sample  random baseline under the wall-clock budget
    #[arg(short, long, value_enum, default_value = "descent")]
    algorithm: Algorithm,

    /// How to read the last CSV column
    ///
    /// rank   it already holds 1-based ranks (ties share a rank)
    /// score  it holds raw scores in ranked order; ranks are derived with
    ///        a 1e-10 tie precision
    #[arg(long, value_enum, default_value = "rank")]
    rank_column: RankColumn,

    /// Numeric gap for dominance, tie collapse, and region margins
    ///
    /// Overrides the value from rankex.toml. Scores closer than gap/2
    /// share a rank; dominance requires a per-attribute lead of at least
    /// the gap.
    #[arg(long)]
    gap: Option<f64>,

    /// Grid pitch and initial descent cell size (overrides rankex.toml)
    #[arg(long)]
    cell_size: Option<f64>,

    /// Random-draw budget for the sampling oracle (overrides rankex.toml)
    #[arg(long)]
    samples: Option<usize>,

    /// Seed for every random component (overrides rankex.toml)
    #[arg(long)]
    seed: Option<u64>,

    /// Wall-clock budget in seconds
    ///
    /// Descent switches to its growth mode, the tree stops inserting
    /// hyperplanes when the budget expires, and the sampling baseline runs
    /// for exactly this long. Without it, descent uses a step budget and
    /// the tree runs to completion.
    #[arg(long)]
    budget_secs: Option<u64>,

    /// Emit the outcome as JSON instead of the colorized report
    ///
    /// Shape: {"weights": [...], "ranking": [...], "error": N}. Meant for
    /// piping into evaluation scripts.
    #[arg(long)]
    json: bool,

    /// Show search statistics (nodes, leaves, oracle programs, timings)
    #[arg(long)]
    stats: bool,

    /// Show resolved configuration before running
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    Grid,
    Descent,
    Tree,
    Sample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RankColumn {
    Rank,
    Score,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SearchConfig::load(&std::env::current_dir()?);
    if let Some(gap) = cli.gap {
        config.gap = gap;
    }
    if let Some(cell_size) = cli.cell_size {
        config.cell_size = cell_size;
    }
    if let Some(samples) = cli.samples {
        config.samples = samples;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(budget) = cli.budget_secs {
        config.budget_secs = Some(budget);
    }

    if cli.verbose {
        eprintln!("{}", "Resolved configuration".bold());
        eprintln!("{}", config.display_summary());
    }

    let (relation, given) = load_relation(&cli.csv, cli.rank_column)
        .with_context(|| format!("failed to load {}", cli.csv.display()))?;
    let k = if cli.k == 0 { relation.len() } else { cli.k };
    relation.validate_search(&given, k)?;

    let tuples = relation.tuples();
    let dominance = DominanceIndex::new(tuples, config.gap);
    let scorer = RankingScorer::new(tuples, config.gap);
    let oracle = SamplingOracle::new(tuples, &given, config.gap)
        .with_budget(config.lattice_cap, config.samples)
        .with_seed(config.seed);
    let budget = config.budget_secs.map(Duration::from_secs);

    let mut stats: Option<TreeStats> = None;
    let outcome = match cli.algorithm {
        Algorithm::Grid => {
            let center = CellFinder::new(&dominance, &given).find(k, config.cell_size);
            // The center is a cube point; project onto the simplex to score.
            let sum: f64 = center.iter().sum();
            let weights: Vec<f64> = center.iter().map(|c| c / sum).collect();
            let ranking = scorer.rank(&weights, k);
            let error = RankingScorer::error(&ranking, &given, k);
            SearchOutcome {
                weights: Some(weights),
                ranking,
                error,
            }
        }
        Algorithm::Descent => {
            let seed = CellFinder::new(&dominance, &given).find(k, config.cell_size);
            let descent_budget = match budget {
                Some(limit) => DescentBudget::WallClock(limit),
                None => DescentBudget::Steps(64),
            };
            let descent = SymbolicDescent::new(&oracle, &dominance, &scorer, &given, k)
                .with_budget(descent_budget);
            let outcome = descent.run(&seed, config.cell_size)?;
            if cli.stats {
                eprintln!(
                    "Descent: {} steps, state {:?}, {} inconsistency re-checks",
                    outcome.steps, outcome.state, outcome.inconsistencies
                );
            }
            SearchOutcome {
                weights: outcome.weights,
                ranking: outcome.ranking,
                error: outcome.error,
            }
        }
        Algorithm::Tree => {
            let mut tree = ArrangementTree::new(&oracle, &dominance, &scorer, &given, k);
            let outcome = tree.solve(budget)?;
            stats = Some(outcome.stats.clone());
            SearchOutcome {
                weights: outcome.weights,
                ranking: outcome.ranking,
                error: outcome.error,
            }
        }
        Algorithm::Sample => {
            let search = RandomSearch::new(&scorer, &given, relation.dim()).with_seed(config.seed);
            match budget {
                Some(limit) => search.run_for(k, limit),
                None => search.run_samples(k, config.samples),
            }
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        report(&relation, &outcome, k);
    }
    if cli.stats {
        if let Some(stats) = stats {
            report_tree_stats(&stats);
        }
    }
    Ok(())
}

/// Parse the relation and extract the target ranking from the last column.
fn load_relation(path: &PathBuf, kind: RankColumn) -> Result<(Relation, Vec<u32>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.len() < 3 {
        bail!(
            "need at least id, one attribute, and a rank/score column; got {} columns",
            headers.len()
        );
    }
    let schema: Vec<String> = headers
        .iter()
        .skip(1)
        .take(headers.len() - 2)
        .map(|h| h.to_string())
        .collect();

    let mut relation = Relation::new(
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "relation".to_string()),
        schema,
    )?;
    let mut column = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != headers.len() {
            bail!("row {row} has {} fields, header has {}", record.len(), headers.len());
        }
        let id = record.get(0).unwrap_or_default().to_string();
        let attributes: Vec<f64> = record
            .iter()
            .skip(1)
            .take(record.len() - 2)
            .map(|field| {
                field
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("row {row}: bad attribute {field:?}"))
            })
            .collect::<Result<_>>()?;
        let last = record.get(record.len() - 1).unwrap_or_default();
        column.push(
            last.trim()
                .parse::<f64>()
                .with_context(|| format!("row {row}: bad rank/score {last:?}"))?,
        );
        relation.insert(id, attributes)?;
    }

    let given = match kind {
        RankColumn::Rank => rankex::types::ranking_from_rank_column(&column)?,
        RankColumn::Score => rankex::types::ranking_from_score_column(&column),
    };
    Ok((relation, given))
}

/// Print the final answer: weights, standardized weights, ranking, error.
fn report(relation: &Relation, outcome: &SearchOutcome, k: usize) {
    match &outcome.weights {
        Some(weights) => {
            print!("{}", "Weight:".bold());
            for w in weights {
                print!(" {w:.10}");
            }
            println!();

            let std_dev = standard_deviation(relation);
            let standardized: Vec<f64> =
                weights.iter().zip(std_dev.iter()).map(|(w, s)| w * s).collect();
            let total: f64 = standardized.iter().sum();
            if total > 0.0 {
                print!("{}", "Standard weight:".bold());
                for s in &standardized {
                    print!(" {:.10}", s / total);
                }
                println!();
            }
        }
        None => println!("{}", "No feasible weights found".red().bold()),
    }

    print!("{}", "Ranking:".bold());
    for rank in outcome.ranking.iter().take(k) {
        print!(" {rank}");
    }
    println!();
    println!("{} {}", "Error:".bold(), outcome.error.yellow());
}

fn report_tree_stats(stats: &TreeStats) {
    eprintln!(
        "Tree: {}/{} hyperplanes, {} nodes, {} leaves ({} fake), {} programs, solver {:?}",
        stats.hyperplanes_inserted,
        stats.hyperplanes_total,
        stats.nodes,
        stats.leaves,
        stats.fake_leaves,
        stats.programs,
        stats.solver_time
    );
}

/// Population standard deviation per attribute, for the standardized-weight
/// report.
fn standard_deviation(relation: &Relation) -> Vec<f64> {
    let n = relation.len() as f64;
    (0..relation.dim())
        .map(|a| {
            let mean: f64 = relation
                .tuples()
                .iter()
                .map(|t| t.attributes[a])
                .sum::<f64>()
                / n;
            let variance: f64 = relation
                .tuples()
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
