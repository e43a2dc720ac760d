//! Builtin and child-process execution of stage units

use std::cell::OnceCell;
use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use log::{debug, error, info, warn};

use super::{read_kernel_results, resolve_timing, KernelMetrics, StageResult, TimingSource};
use crate::config::HarnessConfig;
use crate::constants::{
    ENV_CAPABILITY_SET, ENV_RESULTS_DIR, ENV_STAGE_OUTPUT_DIR, EXIT_BACKEND_UNAVAILABLE,
    EXIT_FAILURE, KERNEL_RESULTS_FILE, PERMUTATION_FILE, REORDERED_MATRIX_FILE, STDERR_LOG,
    STDOUT_LOG, TIMING_MARKER, TIMING_SIDECAR,
};
use crate::error::{HarnessError, Result};
use crate::kernels::create_kernel;
use crate::matrix::{MatrixMarketIO, Permutation};
use crate::params::{validate_path_segment, ParameterSet};
use crate::probe::{probe_with, BackendAvailability};
use crate::registry::{Builtin, CapabilitySet, KernelKind, Registry, RegistryEntry, Stage, Unit};
use crate::reordering::create_reordering;

/// Exit status, timing and extras of one unit invocation
struct UnitOutcome {
    exit_code: i32,
    timing: TimingSource,
    kernel_metrics: KernelMetrics,
}

impl UnitOutcome {
    fn reported(ms: f64) -> Self {
        Self {
            exit_code: 0,
            timing: TimingSource::Reported(ms),
            kernel_metrics: KernelMetrics::default(),
        }
    }

    fn failed(exit_code: i32, timing: TimingSource) -> Self {
        Self {
            exit_code,
            timing,
            kernel_metrics: KernelMetrics::default(),
        }
    }
}

/// Runs reorder and multiply stages against a registry
///
/// Backend availability is probed at most once per runner, and only when a
/// GPU or dual-path kernel asks for it.
pub struct StageRunner<'a> {
    config: &'a HarnessConfig,
    registry: &'a Registry,
    availability: OnceCell<BackendAvailability>,
}

impl<'a> StageRunner<'a> {
    pub fn new(config: &'a HarnessConfig, registry: &'a Registry) -> Self {
        Self {
            config,
            registry,
            availability: OnceCell::new(),
        }
    }

    /// Use a known availability instead of probing
    pub fn with_availability(self, availability: BackendAvailability) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(availability);
        Self {
            availability: cell,
            ..self
        }
    }

    pub fn availability(&self) -> BackendAvailability {
        *self
            .availability
            .get_or_init(|| probe_with(&self.config.probe))
    }

    /// Run one stage unit and place its artifacts in `output_dir`
    ///
    /// A unit exiting nonzero is not an error here: the result carries the
    /// exit code and whatever timing was captured. Errors are reserved for
    /// inputs, configuration and I/O.
    pub fn run_stage(
        &self,
        stage: Stage,
        name: &str,
        input_path: &Path,
        params: &ParameterSet,
        output_dir: &Path,
    ) -> Result<StageResult> {
        validate_path_segment(name, &format!("{} name", stage))?;
        let entry = self.registry.resolve(stage, name);
        fs::create_dir_all(output_dir)?;

        info!(
            "Running {} '{}' on {} into {}",
            stage,
            name,
            input_path.display(),
            output_dir.display()
        );

        match stage {
            Stage::Reorder => self.run_reorder(entry, input_path, params, output_dir),
            Stage::Multiply => self.run_multiply(entry, input_path, params, output_dir),
        }
    }

    fn run_reorder(
        &self,
        entry: RegistryEntry,
        input_path: &Path,
        params: &ParameterSet,
        output_dir: &Path,
    ) -> Result<StageResult> {
        let matrix = MatrixMarketIO::read_matrix(input_path)?;
        remove_stale(output_dir, &[PERMUTATION_FILE, REORDERED_MATRIX_FILE])?;

        let outcome = match &entry.unit {
            Unit::Builtin(builtin) => {
                let start = Instant::now();
                match create_reordering(*builtin)?.compute(&matrix, params) {
                    Ok(permutation) => {
                        let ms = start.elapsed().as_secs_f64() * 1000.0;
                        permutation.write(output_dir.join(PERMUTATION_FILE))?;
                        UnitOutcome::reported(ms)
                    }
                    Err(HarnessError::StageExecution { exit_code, .. }) => UnitOutcome::failed(
                        exit_code,
                        TimingSource::Measured(start.elapsed().as_secs_f64() * 1000.0),
                    ),
                    Err(e) => return Err(e),
                }
            }
            Unit::External { program } => self.run_external(
                Stage::Reorder,
                program,
                entry.capability_set,
                input_path,
                params,
                output_dir,
            )?,
        };

        if outcome.exit_code == 0 {
            let permutation = Permutation::read(output_dir.join(PERMUTATION_FILE), matrix.n_rows)
                .map_err(|e| {
                    HarnessError::input(format!(
                        "technique '{}' produced an invalid permutation: {}",
                        entry.name, e
                    ))
                })?;
            let reordered = permutation.apply(&matrix, entry.reorder_type())?;
            MatrixMarketIO::write_matrix(output_dir.join(REORDERED_MATRIX_FILE), &reordered)?;
            debug!(
                "wrote {} ({} reordering)",
                REORDERED_MATRIX_FILE,
                entry.reorder_type()
            );
        }

        Ok(self.finish(entry, outcome, output_dir, None))
    }

    fn run_multiply(
        &self,
        entry: RegistryEntry,
        input_path: &Path,
        params: &ParameterSet,
        output_dir: &Path,
    ) -> Result<StageResult> {
        match entry.kernel_kind() {
            KernelKind::CpuOnly => {
                let outcome = self.dispatch_kernel(&entry, input_path, params, output_dir)?;
                Ok(self.finish(entry, outcome, output_dir, None))
            }
            KernelKind::GpuOnly => {
                if !self.availability().cusparse_usable {
                    return self.fail_unavailable(entry, output_dir);
                }
                let outcome = self.dispatch_kernel(&entry, input_path, params, output_dir)?;
                Ok(self.finish(entry, outcome, output_dir, None))
            }
            KernelKind::DualPath => {
                let force_cpu = params.get_bool("force_cpu", false)?;
                let use_cpu = force_cpu || !self.availability().cusparse_usable;
                let outcome = if use_cpu {
                    let fallback = entry.cpu_fallback.ok_or_else(|| {
                        HarnessError::config(format!(
                            "kernel '{}' has no CPU fallback",
                            entry.name
                        ))
                    })?;
                    if force_cpu {
                        info!("force_cpu requested, running '{}' on the CPU", entry.name);
                    } else {
                        warn!(
                            "cuSPARSE unavailable, falling back to CPU for '{}'",
                            entry.name
                        );
                    }
                    self.run_builtin_kernel(fallback, input_path, params)?
                } else {
                    self.dispatch_kernel(&entry, input_path, params, output_dir)?
                };
                Ok(self.finish(entry, outcome, output_dir, None))
            }
        }
    }

    /// GPU-only kernel without a usable device: report a zero timing and fail
    fn fail_unavailable(&self, entry: RegistryEntry, output_dir: &Path) -> Result<StageResult> {
        let reason = format!(
            "kernel '{}' requires cuSPARSE but no usable GPU was found",
            entry.name
        );
        error!("{}", reason);

        let marker = format!("{}0", TIMING_MARKER);
        println!("{}", marker);
        fs::write(output_dir.join(STDOUT_LOG), format!("{}\n", marker))?;
        fs::write(output_dir.join(STDERR_LOG), format!("{}\n", reason))?;

        let outcome = UnitOutcome::failed(EXIT_BACKEND_UNAVAILABLE, TimingSource::Reported(0.0));
        Ok(self.finish(entry, outcome, output_dir, Some(reason)))
    }

    fn dispatch_kernel(
        &self,
        entry: &RegistryEntry,
        input_path: &Path,
        params: &ParameterSet,
        output_dir: &Path,
    ) -> Result<UnitOutcome> {
        match &entry.unit {
            Unit::Builtin(builtin) => self.run_builtin_kernel(*builtin, input_path, params),
            Unit::External { program } => self.run_external(
                Stage::Multiply,
                program,
                entry.capability_set,
                input_path,
                params,
                output_dir,
            ),
        }
    }

    fn run_builtin_kernel(
        &self,
        builtin: Builtin,
        input_path: &Path,
        params: &ParameterSet,
    ) -> Result<UnitOutcome> {
        let matrix = MatrixMarketIO::read_matrix(input_path)?;
        let kernel = create_kernel(builtin)?;

        let start = Instant::now();
        match kernel.run(&matrix, params) {
            Ok(report) => {
                debug!("{:?} checksum {}", builtin, report.checksum);
                Ok(UnitOutcome {
                    exit_code: 0,
                    timing: TimingSource::Reported(report.time_ms),
                    kernel_metrics: KernelMetrics {
                        gflops: report.gflops,
                        details: vec![
                            ("nnz".to_string(), matrix.nnz().to_string()),
                            ("num_rows".to_string(), matrix.n_rows.to_string()),
                            ("num_cols".to_string(), matrix.n_cols.to_string()),
                        ],
                    },
                })
            }
            Err(HarnessError::StageExecution { exit_code, .. }) => Ok(UnitOutcome::failed(
                exit_code,
                TimingSource::Measured(start.elapsed().as_secs_f64() * 1000.0),
            )),
            Err(e) => Err(e),
        }
    }

    /// Invoke `<program> <input> <output_dir> [key=value ...]`
    fn run_external(
        &self,
        stage: Stage,
        program: &str,
        capability_set: CapabilitySet,
        input_path: &Path,
        params: &ParameterSet,
        output_dir: &Path,
    ) -> Result<UnitOutcome> {
        let program_path = self.config.program_path(stage, program);
        if !program_path.is_file() {
            return Err(HarnessError::config(format!(
                "no program for {} unit '{}' at {}",
                stage,
                program,
                program_path.display()
            )));
        }

        remove_stale(output_dir, &[TIMING_SIDECAR, KERNEL_RESULTS_FILE])?;
        let stdout_path = output_dir.join(STDOUT_LOG);
        let stdout_file = File::create(&stdout_path)?;
        let stderr_file = File::create(output_dir.join(STDERR_LOG))?;

        let mut command = Command::new(&program_path);
        command
            .arg(input_path)
            .arg(output_dir)
            .args(params.to_args())
            .env(ENV_RESULTS_DIR, &self.config.results_dir)
            .env(ENV_STAGE_OUTPUT_DIR, output_dir)
            .env(ENV_CAPABILITY_SET, capability_set.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file));
        debug!("spawning {:?}", command);

        let start = Instant::now();
        let status = command.status()?;
        let measured_ms = start.elapsed().as_secs_f64() * 1000.0;

        let exit_code = status.code().unwrap_or(EXIT_FAILURE);
        if exit_code != 0 {
            warn!(
                "{} unit '{}' exited with code {} (see {})",
                stage,
                program,
                exit_code,
                output_dir.join(STDERR_LOG).display()
            );
        }

        let stdout = fs::read_to_string(&stdout_path).unwrap_or_default();
        let kernel_results = read_kernel_results(output_dir);
        let timing = resolve_timing(&stdout, kernel_results.as_ref(), output_dir, measured_ms);
        let kernel_metrics = kernel_results
            .map(|k| k.kernel_metrics())
            .unwrap_or_default();

        Ok(UnitOutcome {
            exit_code,
            timing,
            kernel_metrics,
        })
    }

    fn finish(
        &self,
        entry: RegistryEntry,
        outcome: UnitOutcome,
        output_dir: &Path,
        unavailable: Option<String>,
    ) -> StageResult {
        info!(
            "{} '{}' finished with exit code {} in {}",
            entry.stage, entry.name, outcome.exit_code, outcome.timing
        );
        StageResult {
            exit_code: outcome.exit_code,
            timing: outcome.timing,
            artifact_dir: output_dir.to_path_buf(),
            entry,
            kernel_metrics: outcome.kernel_metrics,
            unavailable,
        }
    }
}

/// Protocol files from an earlier run must not be mistaken for fresh output
fn remove_stale(dir: &Path, names: &[&str]) -> Result<()> {
    for name in names {
        let path = dir.join(name);
        if path.is_file() {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}
