//! In-process multiplication kernels
//!
//! Each kernel times only its computational section and reports it, so the
//! stage runner records these timings as self-reported.

use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use ndarray::Array2;
use rayon::prelude::*;
use sprs::CsMat;

use crate::constants::DEFAULT_DENSE_COLS;
use crate::error::{HarnessError, Result};
use crate::matrix::{to_sprs_csr, CooMatrix};
use crate::params::ParameterSet;
use crate::registry::{Builtin, Stage};

/// What a kernel run reports back
#[derive(Debug, Clone, PartialEq)]
pub struct KernelReport {
    /// Average time of one multiplication, in milliseconds
    pub time_ms: f64,
    pub gflops: Option<f64>,
    /// Sum of the output entries, for sanity checks across kernels
    pub checksum: f64,
}

/// A multiplication kernel runnable inside the harness
pub trait MultiplyKernel {
    fn run(&self, matrix: &CooMatrix, params: &ParameterSet) -> Result<KernelReport>;
}

/// Create the kernel for a builtin unit
pub fn create_kernel(builtin: Builtin) -> Result<Box<dyn MultiplyKernel>> {
    match builtin {
        Builtin::Mock => Ok(Box::new(MockKernel)),
        Builtin::CpuSpmv => Ok(Box::new(CpuSpmv)),
        Builtin::CpuSpmm => Ok(Box::new(CpuSpmm)),
        other => Err(HarnessError::config(format!(
            "{:?} is not a multiplication kernel",
            other
        ))),
    }
}

/// Stand-in kernel: sleeps `delay_ms` and reports exactly that
///
/// `exit_code=<n>` makes it fail the way an external unit exiting `n` would.
pub struct MockKernel;

impl MultiplyKernel for MockKernel {
    fn run(&self, _matrix: &CooMatrix, params: &ParameterSet) -> Result<KernelReport> {
        let exit_code = params.get_usize("exit_code", 0)?;
        if exit_code != 0 {
            return Err(HarnessError::StageExecution {
                stage: Stage::Multiply,
                name: "mock".to_string(),
                exit_code: exit_code as i32,
            });
        }

        let delay_ms = params.get_f64("delay_ms", 0.0)?;
        if !delay_ms.is_finite() || delay_ms < 0.0 {
            return Err(HarnessError::config(format!(
                "delay_ms must be a non-negative number, got {}",
                delay_ms
            )));
        }
        thread::sleep(Duration::from_secs_f64(delay_ms / 1000.0));

        Ok(KernelReport {
            time_ms: delay_ms,
            gflops: None,
            checksum: 0.0,
        })
    }
}

/// Sparse matrix times a vector of ones, rows split across a rayon pool
pub struct CpuSpmv;

impl MultiplyKernel for CpuSpmv {
    fn run(&self, matrix: &CooMatrix, params: &ParameterSet) -> Result<KernelReport> {
        let threads = params.get_usize("threads", num_cpus::get())?.max(1);
        let iterations = params.get_usize("iterations", 1)?.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| HarnessError::config(format!("cannot build thread pool: {}", e)))?;

        let csr = to_sprs_csr(matrix);
        let nnz = csr.nnz();
        let x = vec![1.0; matrix.n_cols];

        let start = Instant::now();
        let mut y = Vec::new();
        for _ in 0..iterations {
            y = pool.install(|| spmv_parallel(&csr, &x));
        }
        let time_ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;
        debug!(
            "cpu_spmv: {} threads, {} iterations, {:.3} ms each",
            threads, iterations, time_ms
        );

        Ok(KernelReport {
            time_ms,
            gflops: gflops(nnz, 1, time_ms),
            checksum: y.iter().sum(),
        })
    }
}

/// `y = A x` over CSR storage, parallel over rows
///
/// Runs on the current rayon pool; wrap in `ThreadPool::install` to bound it.
pub fn spmv_parallel(matrix: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
    let csr = if matrix.is_csr() {
        matrix.clone()
    } else {
        matrix.to_csr()
    };
    let n_rows = csr.rows();
    let (indptr, indices, data) = csr.into_raw_storage();

    (0..n_rows)
        .into_par_iter()
        .map(|i| {
            (indptr[i]..indptr[i + 1])
                .map(|k| data[k] * x[indices[k]])
                .sum::<f64>()
        })
        .collect()
}

/// Sparse matrix times a dense block of ones with `n_cols` columns
pub struct CpuSpmm;

impl MultiplyKernel for CpuSpmm {
    fn run(&self, matrix: &CooMatrix, params: &ParameterSet) -> Result<KernelReport> {
        let dense_cols = params.get_usize("n_cols", DEFAULT_DENSE_COLS as usize)?;
        if dense_cols == 0 {
            return Err(HarnessError::config("n_cols must be positive"));
        }

        let csr = to_sprs_csr(matrix);
        let b = Array2::<f64>::ones((matrix.n_cols, dense_cols));

        let start = Instant::now();
        let c = &csr * &b;
        let time_ms = start.elapsed().as_secs_f64() * 1000.0;

        Ok(KernelReport {
            time_ms,
            gflops: gflops(csr.nnz(), dense_cols, time_ms),
            checksum: c.sum(),
        })
    }
}

/// `2 * nnz * dense_cols` flops over the elapsed time; `None` when too fast to measure
pub fn gflops(nnz: usize, dense_cols: usize, time_ms: f64) -> Option<f64> {
    if time_ms > 0.0 {
        Some(2.0 * nnz as f64 * dense_cols as f64 / (time_ms * 1e6))
    } else {
        None
    }
}
