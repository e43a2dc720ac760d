//! Pipeline coordination: reorder, metrics, multiply, merge
//!
//! A full run moves through
//! `Loaded -> Reordered -> MetricsComputed -> Multiplied -> Done`; any
//! failure ends in `Failed` with the failing step's exit code. Artifacts
//! written before a failure are left in place.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::config::HarnessConfig;
use crate::constants::{REORDERED_MATRIX_FILE, RESULTS_CSV};
use crate::error::{HarnessError, Result};
use crate::matrix::{CooMatrix, MatrixMarketIO};
use crate::metrics::compute_metrics;
use crate::params::{validate_path_segment, ParameterSet};
use crate::probe::BackendAvailability;
use crate::registry::{Registry, Stage};
use crate::results::{merge, ResultsRow, METRICS_COLUMNS, MULTIPLY_COLUMNS, REORDER_COLUMNS};
use crate::runner::{StageResult, StageRunner};
use crate::utils::{dataset_name, format_float, matrix_name, now_iso8601};

/// Where a pipeline run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Loaded,
    Reordered,
    MetricsComputed,
    Multiplied,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Loaded => "LOADED",
            PipelineState::Reordered => "REORDERED",
            PipelineState::MetricsComputed => "METRICS_COMPUTED",
            PipelineState::Multiplied => "MULTIPLIED",
            PipelineState::Done => "DONE",
            PipelineState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// A stage result together with the row it produced
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub csv_path: PathBuf,
    pub row: ResultsRow,
    pub result: StageResult,
}

/// Summary of a full pipeline run
#[derive(Debug)]
pub struct RunReport {
    /// `Done` or `Failed`
    pub state: PipelineState,
    /// Last state reached before a failure, `None` if the matrix never loaded
    pub reached: Option<PipelineState>,
    pub exit_code: i32,
    pub reorder_csv: Option<PathBuf>,
    pub multiply_csv: Option<PathBuf>,
    pub error: Option<HarnessError>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.state == PipelineState::Done
    }
}

/// Sequences stages and merges their rows
pub struct Coordinator {
    config: HarnessConfig,
    registry: Registry,
    availability: Option<BackendAvailability>,
}

impl Coordinator {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            registry: Registry::default(),
            availability: None,
        }
    }

    /// Skip probing and assume the given availability
    pub fn with_availability(mut self, availability: BackendAvailability) -> Self {
        self.availability = Some(availability);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    fn runner(&self) -> StageRunner<'_> {
        let runner = StageRunner::new(&self.config, &self.registry);
        match self.availability {
            Some(availability) => runner.with_availability(availability),
            None => runner,
        }
    }

    /// Reorder a matrix and record structural metrics of the result
    pub fn reorder<S: AsRef<str>>(
        &self,
        matrix_path: &Path,
        technique: &str,
        params: &[S],
    ) -> Result<StageOutcome> {
        let matrix = load_matrix(matrix_path)?;
        let runner = self.runner();
        let outcome = self.reorder_stage(&runner, matrix_path, &matrix, technique, params)?;
        self.metrics_stage(&outcome.csv_path)?;
        Ok(outcome)
    }

    fn reorder_stage<S: AsRef<str>>(
        &self,
        runner: &StageRunner<'_>,
        matrix_path: &Path,
        matrix: &CooMatrix,
        technique: &str,
        params: &[S],
    ) -> Result<StageOutcome> {
        let params = ParameterSet::parse(params)?;
        let token = params.token()?;
        validate_path_segment(technique, "technique name")?;
        let name = matrix_name(matrix_path)?;
        validate_path_segment(&name, "matrix name")?;

        let output_dir = self.config.reorder_dir(&name, technique, &token);
        let csv_path = output_dir.join(RESULTS_CSV);
        let attempt = ReorderRow {
            name: &name,
            matrix_path,
            matrix,
            technique,
            params: &params,
            result: None,
            exit_code: 0,
        };

        let result =
            match runner.run_stage(Stage::Reorder, technique, matrix_path, &params, &output_dir) {
                Ok(result) => result,
                Err(e) => {
                    // The unit left nothing usable; an earlier success row must not survive
                    let failed = ReorderRow {
                        exit_code: e.exit_code(),
                        ..attempt
                    };
                    if let Err(write_err) = failed.write(&csv_path) {
                        warn!(
                            "Could not record failed reorder in {}: {}",
                            csv_path.display(),
                            write_err
                        );
                    }
                    return Err(e);
                }
            };

        let finished = ReorderRow {
            result: Some(&result),
            exit_code: result.exit_code,
            ..attempt
        };
        let row = finished.write(&csv_path)?;
        info!("Wrote reorder results to {}", csv_path.display());

        check_stage(&result)?;
        Ok(StageOutcome {
            csv_path,
            row,
            result,
        })
    }

    /// Compute structural metrics of a reordered matrix into its results row
    pub fn metrics_stage(&self, reorder_csv: &Path) -> Result<ResultsRow> {
        let dir = parent_dir(reorder_csv)?;
        let reordered = MatrixMarketIO::read_matrix(dir.join(REORDERED_MATRIX_FILE))?;
        let metrics = compute_metrics(
            &reordered,
            self.config.metrics_backend,
            &self.config.block_sizes,
        )?;

        let fields = [
            ("bandwidth", Some(metrics.bandwidth.to_string())),
            ("block_density", Some(metrics.block_density_json()?)),
            ("block_occupancy", Some(metrics.block_occupancy_json()?)),
            (
                "metrics_backend",
                Some(self.config.metrics_backend.to_string()),
            ),
        ];
        let row = merge(Some(ResultsRow::read(reorder_csv)?), &fields, METRICS_COLUMNS);
        row.write(reorder_csv)?;
        info!(
            "Bandwidth {} for {}",
            metrics.bandwidth,
            dir.display()
        );
        Ok(row)
    }

    /// Run a kernel on the matrix a reorder results file points at
    pub fn multiply<S: AsRef<str>>(
        &self,
        reorder_csv: &Path,
        kernel: &str,
        params: &[S],
    ) -> Result<StageOutcome> {
        let runner = self.runner();
        self.multiply_stage(&runner, reorder_csv, kernel, params)
    }

    fn multiply_stage<S: AsRef<str>>(
        &self,
        runner: &StageRunner<'_>,
        reorder_csv: &Path,
        kernel: &str,
        params: &[S],
    ) -> Result<StageOutcome> {
        let params = ParameterSet::parse(params)?;
        params.token()?;
        validate_path_segment(kernel, "kernel name")?;

        let reorder_row = ResultsRow::read(reorder_csv)?;
        if reorder_row.get("exit_code") != Some("0") {
            return Err(HarnessError::input(format!(
                "{} does not record a successful reorder",
                reorder_csv.display()
            )));
        }
        let name = reorder_row
            .get("matrix_name")
            .ok_or_else(|| {
                HarnessError::input(format!("{} has no matrix_name", reorder_csv.display()))
            })?
            .to_string();
        validate_path_segment(&name, "matrix name")?;

        let reorder_dir = parent_dir(reorder_csv)?;
        let technique_dir = reorder_dir
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                HarnessError::input(format!(
                    "cannot derive technique directory from {}",
                    reorder_csv.display()
                ))
            })?;
        let reordered = reorder_dir.join(REORDERED_MATRIX_FILE);
        if !reordered.is_file() {
            return Err(HarnessError::input(format!(
                "reordered matrix {} is missing",
                reordered.display()
            )));
        }

        let output_dir = self.config.multiply_dir(&name, technique_dir, kernel);
        let result = runner.run_stage(Stage::Multiply, kernel, &reordered, &params, &output_dir)?;

        let fields = [
            ("mult_type", Some(kernel.to_string())),
            ("mult_param_set", params.raw()),
            ("mult_time_ms", Some(format_float(result.elapsed_ms()))),
            ("mult_timing_source", Some(result.timing.label().to_string())),
            ("gflops", result.kernel_metrics.gflops.map(format_float)),
            ("mult_metrics", result.kernel_metrics.details_string()),
            ("exit_code", Some(result.exit_code.to_string())),
            ("timestamp", Some(now_iso8601())),
        ];

        let csv_path = output_dir.join(RESULTS_CSV);
        // exit_code and timestamp belong to this stage, not the reorder
        let reorder_part = reorder_row.without(MULTIPLY_COLUMNS);
        let inherited: Vec<(&str, Option<String>)> = reorder_part
            .iter()
            .map(|(c, v)| (c, v.map(str::to_string)))
            .collect();
        let base = merge(ResultsRow::read_optional(&csv_path)?, &inherited, &[]);
        let row = merge(Some(base), &fields, MULTIPLY_COLUMNS);
        row.write(&csv_path)?;
        info!("Wrote multiply results to {}", csv_path.display());

        check_stage(&result)?;
        Ok(StageOutcome {
            csv_path,
            row,
            result,
        })
    }

    /// Run the whole pipeline; never returns early with an error
    pub fn run<S: AsRef<str>, T: AsRef<str>>(
        &self,
        matrix_path: &Path,
        technique: &str,
        reorder_params: &[S],
        kernel: Option<&str>,
        multiply_params: &[T],
    ) -> RunReport {
        let mut report = RunReport {
            state: PipelineState::Failed,
            reached: None,
            exit_code: 0,
            reorder_csv: None,
            multiply_csv: None,
            error: None,
        };

        if let Err(e) = self.run_steps(
            &mut report,
            matrix_path,
            technique,
            reorder_params,
            kernel,
            multiply_params,
        ) {
            error!(
                "Pipeline failed after {}: {}",
                report
                    .reached
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "start".to_string()),
                e
            );
            report.state = PipelineState::Failed;
            report.exit_code = e.exit_code();
            report.error = Some(e);
        }
        report
    }

    fn run_steps<S: AsRef<str>, T: AsRef<str>>(
        &self,
        report: &mut RunReport,
        matrix_path: &Path,
        technique: &str,
        reorder_params: &[S],
        kernel: Option<&str>,
        multiply_params: &[T],
    ) -> Result<()> {
        let matrix = load_matrix(matrix_path)?;
        report.reached = Some(PipelineState::Loaded);

        let runner = self.runner();
        let reorder = self.reorder_stage(&runner, matrix_path, &matrix, technique, reorder_params)?;
        report.reorder_csv = Some(reorder.csv_path.clone());
        report.reached = Some(PipelineState::Reordered);

        self.metrics_stage(&reorder.csv_path)?;
        report.reached = Some(PipelineState::MetricsComputed);

        if let Some(kernel) = kernel {
            let multiply = self.multiply_stage(&runner, &reorder.csv_path, kernel, multiply_params)?;
            report.multiply_csv = Some(multiply.csv_path);
            report.reached = Some(PipelineState::Multiplied);
        }

        report.state = PipelineState::Done;
        report.reached = Some(PipelineState::Done);
        info!("Pipeline finished: {}", PipelineState::Done);
        Ok(())
    }
}

/// Reorder-stage columns for one attempt, successful or not
struct ReorderRow<'a> {
    name: &'a str,
    matrix_path: &'a Path,
    matrix: &'a CooMatrix,
    technique: &'a str,
    params: &'a ParameterSet,
    /// `None` when the stage errored before producing a result
    result: Option<&'a StageResult>,
    exit_code: i32,
}

impl ReorderRow<'_> {
    /// Merge into the row at `csv_path`; a failure also clears the metrics columns
    fn write(&self, csv_path: &Path) -> Result<ResultsRow> {
        let result = self.result;
        let fields = [
            ("matrix_name", Some(self.name.to_string())),
            ("dataset", Some(dataset_name(self.matrix_path))),
            ("n_rows", Some(self.matrix.n_rows.to_string())),
            ("n_cols", Some(self.matrix.n_cols.to_string())),
            ("nnz", Some(self.matrix.nnz().to_string())),
            ("reorder_type", result.map(|r| r.entry.reorder_type().to_string())),
            ("reorder_tech", Some(self.technique.to_string())),
            ("reord_param_set", self.params.raw()),
            ("reorder_time_ms", result.map(|r| format_float(r.elapsed_ms()))),
            ("reorder_timing_source", result.map(|r| r.timing.label().to_string())),
            ("exit_code", Some(self.exit_code.to_string())),
            ("timestamp", Some(now_iso8601())),
        ];

        let owned: Vec<&str> = if self.exit_code == 0 {
            REORDER_COLUMNS.to_vec()
        } else {
            REORDER_COLUMNS.iter().chain(METRICS_COLUMNS).copied().collect()
        };

        let row = merge(ResultsRow::read_optional(csv_path)?, &fields, &owned);
        row.write(csv_path)?;
        Ok(row)
    }
}

fn load_matrix(path: &Path) -> Result<CooMatrix> {
    let matrix = MatrixMarketIO::read_matrix(path)?;
    info!(
        "Loaded {} ({}x{}, {} nonzeros)",
        path.display(),
        matrix.n_rows,
        matrix.n_cols,
        matrix.nnz()
    );
    Ok(matrix)
}

fn parent_dir(path: &Path) -> Result<&Path> {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| HarnessError::input(format!("{} has no parent directory", path.display())))
}

/// Turn a nonzero stage exit into the matching error
fn check_stage(result: &StageResult) -> Result<()> {
    if result.success() {
        return Ok(());
    }
    match &result.unavailable {
        Some(reason) => Err(HarnessError::BackendUnavailable(reason.clone())),
        None => Err(HarnessError::StageExecution {
            stage: result.entry.stage,
            name: result.entry.name.clone(),
            exit_code: result.exit_code,
        }),
    }
}
