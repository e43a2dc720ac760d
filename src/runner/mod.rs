//! Stage execution and timing capture
//!
//! A stage is one reorder or multiply run. The runner resolves the unit,
//! runs it (in process or as a child process), decides which elapsed time to
//! believe and, for reorders, turns the emitted permutation into the
//! reordered matrix.
//!
//! Timing precedence, first match wins:
//!
//! 1. last `TIMING_MS:<float>` line on the unit's stdout
//! 2. `avg_time_ms` in a `results.txt` kernel results file
//! 3. `timing_ms.txt` sidecar in the output directory
//! 4. wall clock around the invocation
//!
//! Reported values that are negative or not finite are ignored.

pub mod executor;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::constants::{DEFAULT_DENSE_COLS, KERNEL_RESULTS_FILE, TIMING_MARKER, TIMING_SIDECAR};
use crate::registry::RegistryEntry;

pub use executor::StageRunner;

/// Where an elapsed time came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingSource {
    /// The unit timed its own computational section
    Reported(f64),
    /// The harness timed the whole invocation
    Measured(f64),
}

impl TimingSource {
    pub fn elapsed_ms(&self) -> f64 {
        match *self {
            TimingSource::Reported(ms) | TimingSource::Measured(ms) => ms.max(0.0),
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, TimingSource::Reported(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimingSource::Reported(_) => "reported",
            TimingSource::Measured(_) => "measured",
        }
    }
}

impl fmt::Display for TimingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.elapsed_ms(), self.label())
    }
}

/// Extra figures a multiply unit reported besides its time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelMetrics {
    pub gflops: Option<f64>,
    /// Shape details as `key:value` pairs, in report order
    pub details: Vec<(String, String)>,
}

impl KernelMetrics {
    /// `mult_metrics` column value, `None` when nothing was reported
    pub fn details_string(&self) -> Option<String> {
        if self.details.is_empty() {
            None
        } else {
            Some(
                self.details
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k, v))
                    .collect::<Vec<_>>()
                    .join(";"),
            )
        }
    }
}

/// Outcome of one stage run
#[derive(Debug, Clone)]
pub struct StageResult {
    pub exit_code: i32,
    pub timing: TimingSource,
    pub artifact_dir: PathBuf,
    /// The registry entry the stage resolved to
    pub entry: RegistryEntry,
    pub kernel_metrics: KernelMetrics,
    /// Set when the stage failed because a required backend is absent
    pub unavailable: Option<String>,
}

impl StageResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.timing.elapsed_ms()
    }
}

fn accept_reported(value: f64) -> Option<f64> {
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Last valid `TIMING_MS:<float>` value in a unit's stdout
pub fn parse_timing_marker(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix(TIMING_MARKER))
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .filter_map(accept_reported)
        .last()
}

/// Parsed `key,value` lines of a kernel results file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelResultsFile {
    entries: Vec<(String, String)>,
}

impl KernelResultsFile {
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter_map(|line| line.split_once(','))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn avg_time_ms(&self) -> Option<f64> {
        self.get_f64("avg_time_ms").and_then(accept_reported)
    }

    /// Reported gflops, or derived as `2 * nnz * num_cols_B / (avg_time_ms * 1e6)`
    pub fn gflops(&self) -> Option<f64> {
        if let Some(g) = self.get_f64("gflops") {
            return Some(g);
        }
        let avg = self.avg_time_ms().filter(|&t| t > 0.0)?;
        let nnz = self.get_f64("nnz")?;
        let dense_cols = self.get_f64("num_cols_B").unwrap_or(DEFAULT_DENSE_COLS);
        Some(2.0 * nnz * dense_cols / (avg * 1e6))
    }

    pub fn kernel_metrics(&self) -> KernelMetrics {
        let details = ["nnz", "num_rows", "num_cols", "num_cols_B"]
            .iter()
            .filter_map(|&key| self.get(key).map(|v| (key.to_string(), v.to_string())))
            .collect();
        KernelMetrics {
            gflops: self.gflops(),
            details,
        }
    }
}

/// Read `results.txt` from an output directory if present
pub fn read_kernel_results(output_dir: &Path) -> Option<KernelResultsFile> {
    fs::read_to_string(output_dir.join(KERNEL_RESULTS_FILE))
        .ok()
        .map(|content| KernelResultsFile::parse(&content))
}

/// Value of the `timing_ms.txt` sidecar if present and valid
pub fn read_timing_sidecar(output_dir: &Path) -> Option<f64> {
    fs::read_to_string(output_dir.join(TIMING_SIDECAR))
        .ok()
        .and_then(|content| content.trim().parse::<f64>().ok())
        .and_then(accept_reported)
}

/// Apply the timing precedence to everything an external unit left behind
pub fn resolve_timing(
    stdout: &str,
    kernel_results: Option<&KernelResultsFile>,
    output_dir: &Path,
    measured_ms: f64,
) -> TimingSource {
    let timing = if let Some(ms) = parse_timing_marker(stdout) {
        TimingSource::Reported(ms)
    } else if let Some(ms) = kernel_results.and_then(KernelResultsFile::avg_time_ms) {
        TimingSource::Reported(ms)
    } else if let Some(ms) = read_timing_sidecar(output_dir) {
        TimingSource::Reported(ms)
    } else {
        TimingSource::Measured(measured_ms.max(0.0))
    };
    debug!("resolved timing: {}", timing);
    timing
}
