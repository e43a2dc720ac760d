//! Harness configuration
//!
//! Defaults come from [`HarnessConfig::default`], the environment can
//! override them through [`HarnessConfig::from_env`], and the CLI applies its
//! flags last.

use std::env;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_BLOCK_SIZES, DEFAULT_PROGRAMS_DIR, DEFAULT_RESULTS_DIR, ENV_METRICS_BACKEND,
    ENV_PROGRAMS_DIR, ENV_RESULTS_DIR, MULTIPLICATION_DIR, MULTIPLY_PROGRAMS_SUBDIR,
    REORDERING_DIR, REORDER_PROGRAMS_SUBDIR,
};
use crate::error::Result;
use crate::metrics::MetricsBackend;
use crate::probe::ProbeCommands;
use crate::registry::Stage;

/// Everything a harness invocation needs besides its arguments
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Root of the results tree
    pub results_dir: PathBuf,

    /// Root of the external programs tree
    pub programs_dir: PathBuf,

    /// Storage used to extract structural metrics
    pub metrics_backend: MetricsBackend,

    /// Tile edge lengths for the block density columns
    pub block_sizes: Vec<usize>,

    /// Commands and timeout used by the backend prober
    pub probe: ProbeCommands,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            programs_dir: PathBuf::from(DEFAULT_PROGRAMS_DIR),
            metrics_backend: MetricsBackend::default(),
            block_sizes: DEFAULT_BLOCK_SIZES.to_vec(),
            probe: ProbeCommands::default(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by `RESULTS_DIR`, `PROGRAMS_DIR` and `METRICS_BACKEND`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = non_empty_var(ENV_RESULTS_DIR) {
            config.results_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty_var(ENV_PROGRAMS_DIR) {
            config.programs_dir = PathBuf::from(dir);
        }
        if let Some(backend) = non_empty_var(ENV_METRICS_BACKEND) {
            config.metrics_backend = backend.parse()?;
        }
        Ok(config)
    }

    /// Config rooted at the given results and programs directories
    pub fn with_dirs(results_dir: impl Into<PathBuf>, programs_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            programs_dir: programs_dir.into(),
            ..Self::default()
        }
    }

    /// `RESULTS_DIR/Reordering/<matrix>/<technique>_<token>`
    pub fn reorder_dir(&self, matrix: &str, technique: &str, token: &str) -> PathBuf {
        self.results_dir
            .join(REORDERING_DIR)
            .join(matrix)
            .join(format!("{}_{}", technique, token))
    }

    /// `RESULTS_DIR/Multiplication/<matrix>/<technique_dir>/<kernel>`
    pub fn multiply_dir(&self, matrix: &str, technique_dir: &str, kernel: &str) -> PathBuf {
        self.results_dir
            .join(MULTIPLICATION_DIR)
            .join(matrix)
            .join(technique_dir)
            .join(kernel)
    }

    /// Where the external program for a stage unit lives
    pub fn program_path(&self, stage: Stage, program: &str) -> PathBuf {
        let subdir = match stage {
            Stage::Reorder => REORDER_PROGRAMS_SUBDIR,
            Stage::Multiply => MULTIPLY_PROGRAMS_SUBDIR,
        };
        self.programs_dir.join(subdir).join(program)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.results_dir, Path::new("results"));
        assert_eq!(config.programs_dir, Path::new("programs"));
        assert_eq!(config.block_sizes, vec![4, 8, 16, 32, 64]);
        assert_eq!(config.metrics_backend, MetricsBackend::Compressed);
    }

    #[test]
    fn test_layout() {
        let config = HarnessConfig::with_dirs("/r", "/p");
        assert_eq!(
            config.reorder_dir("bcsstk01", "rcm", "default"),
            Path::new("/r/Reordering/bcsstk01/rcm_default")
        );
        assert_eq!(
            config.multiply_dir("bcsstk01", "rcm_default", "mock"),
            Path::new("/r/Multiplication/bcsstk01/rcm_default/mock")
        );
        assert_eq!(
            config.program_path(Stage::Multiply, "cucsrspmv"),
            Path::new("/p/multiply/cucsrspmv")
        );
        assert_eq!(
            config.program_path(Stage::Reorder, "amd"),
            Path::new("/p/reorder/amd")
        );
    }
}
