//! Configuration loading from rankex.toml.
//!
//! Search parameters live in a `[search]` table; anything not set falls
//! back to the defaults the experiments were tuned with. CLI flags override
//! file values, file values override defaults.
//!
//! ## Example
//!
//! ```toml
//! [search]
//! gap = 1e-4
//! cell-size = 0.1
//! samples = 2048
//! lattice-cap = 4096
//! seed = 42
//! budget-secs = 30
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default numeric gap for dominance tests, tie collapse, and margins.
pub const DEFAULT_GAP: f64 = 1e-4;
/// Default grid pitch / descent cell size.
pub const DEFAULT_CELL_SIZE: f64 = 0.1;
/// Default random-draw budget for the sampling oracle.
pub const DEFAULT_SAMPLES: usize = 2048;
/// Default cap on deterministic lattice candidates.
pub const DEFAULT_LATTICE_CAP: usize = 4096;

/// Search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Source file for this config (for display).
    pub source: Option<PathBuf>,

    /// Numeric gap: dominance threshold, tie-collapse width, region margin.
    pub gap: f64,

    /// Grid pitch and initial descent cell size.
    pub cell_size: f64,

    /// Random-draw budget for the sampling oracle.
    pub samples: usize,

    /// Cap on deterministic lattice candidates in the sampling oracle.
    pub lattice_cap: usize,

    /// Seed for every random component.
    pub seed: u64,

    /// Optional wall-clock budget in seconds for descent and tree runs.
    pub budget_secs: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            source: None,
            gap: DEFAULT_GAP,
            cell_size: DEFAULT_CELL_SIZE,
            samples: DEFAULT_SAMPLES,
            lattice_cap: DEFAULT_LATTICE_CAP,
            seed: 0,
            budget_secs: None,
        }
    }
}

/// Raw config as deserialized from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct RawSearch {
    gap: Option<f64>,
    cell_size: Option<f64>,
    samples: Option<usize>,
    lattice_cap: Option<usize>,
    seed: Option<u64>,
    budget_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    search: Option<RawSearch>,
}

impl SearchConfig {
    /// Load configuration from the given directory.
    ///
    /// Search order:
    /// 1. rankex.toml in the directory
    /// 2. Walk up parent directories for rankex.toml
    /// 3. Defaults if nothing found
    pub fn load(directory: &Path) -> Self {
        let mut current = directory.to_path_buf();
        loop {
            let candidate = current.join("rankex.toml");
            if candidate.exists() {
                if let Some(config) = Self::load_file(&candidate) {
                    return config;
                }
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
        Self::default()
    }

    fn load_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        let raw: RawConfig = toml::from_str(&content).ok()?;
        let search = raw.search.unwrap_or_default();
        let defaults = Self::default();
        Some(Self {
            source: Some(path.to_path_buf()),
            gap: search.gap.unwrap_or(defaults.gap),
            cell_size: search.cell_size.unwrap_or(defaults.cell_size),
            samples: search.samples.unwrap_or(defaults.samples),
            lattice_cap: search.lattice_cap.unwrap_or(defaults.lattice_cap),
            seed: search.seed.unwrap_or(defaults.seed),
            budget_secs: search.budget_secs.or(defaults.budget_secs),
        })
    }

    /// Format config for verbose display.
    pub fn display_summary(&self) -> String {
        let mut lines = Vec::new();
        match &self.source {
            Some(source) => lines.push(format!("   Config: {}", source.display())),
            None => lines.push("   Config: (defaults)".to_string()),
        }
        lines.push(format!("   Gap: {}", self.gap));
        lines.push(format!("   Cell size: {}", self.cell_size));
        lines.push(format!(
            "   Oracle budget: {} lattice / {} random (seed {})",
            self.lattice_cap, self.samples, self.seed
        ));
        if let Some(secs) = self.budget_secs {
            lines.push(format!("   Wall clock: {secs}s"));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = SearchConfig::load(dir.path());
        assert_eq!(config.gap, DEFAULT_GAP);
        assert_eq!(config.cell_size, DEFAULT_CELL_SIZE);
        assert!(config.source.is_none());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rankex.toml"),
            "[search]\ngap = 1e-3\nbudget-secs = 5\n",
        )
        .unwrap();
        let config = SearchConfig::load(dir.path());
        assert_eq!(config.gap, 1e-3);
        assert_eq!(config.budget_secs, Some(5));
        assert_eq!(config.cell_size, DEFAULT_CELL_SIZE, "unset keys fall back");
        assert!(config.source.is_some());
    }

    #[test]
    fn test_walks_up_to_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rankex.toml"), "[search]\nseed = 9\n").unwrap();
        let child = dir.path().join("nested/deeper");
        std::fs::create_dir_all(&child).unwrap();
        let config = SearchConfig::load(&child);
        assert_eq!(config.seed, 9);
    }
}
