//! # reorder_bench: sparse matrix reordering and multiplication benchmarks
//!
//! Applies reordering techniques and then multiplication kernels to Matrix
//! Market matrices, recording timings and structural metrics as one CSV row
//! per (matrix, technique, parameters, kernel) combination.
//!
//! ## Overview
//!
//! - **Parameter canonicalization**: `key=value` lists map to a
//!   deterministic directory token and a raw provenance string
//! - **Stage runner**: runs builtin or external units, captures exit status
//!   and picks self-reported timing over wall-clock timing
//! - **Structural metrics**: bandwidth and block density, computed through
//!   interchangeable storage backends
//! - **Results aggregation**: merges each stage's columns into a single row
//!   without clobbering columns owned by other stages
//! - **Backend probing**: detects GPU/cuSPARSE and GraphBLAS availability
//!   with bounded external checks
//!
//! ## Results layout
//!
//! ```text
//! RESULTS_DIR/Reordering/<matrix>/<technique>_<token>/
//!     permutation.g  reordered.mtx  results.csv
//! RESULTS_DIR/Multiplication/<matrix>/<technique>_<token>/<kernel>/
//!     results.csv
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use reorder_bench::{Coordinator, HarnessConfig};
//!
//! let coordinator = Coordinator::new(HarnessConfig::default());
//! let report = coordinator.run(
//!     Path::new("data/bcsstk01.mtx"),
//!     "rcm",
//!     &["symmetric=true"],
//!     Some("cpu_spmv"),
//!     &["threads=4"],
//! );
//! assert!(report.success());
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod kernels;
pub mod matrix;
pub mod metrics;
pub mod params;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod reordering;
pub mod results;
pub mod runner;
pub mod utils;

// Re-export primary components
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use matrix::{CooMatrix, MatrixMarketIO, Permutation, ReorderType};
pub use metrics::{
    bandwidth, fill_density, occupancy_density, CompressedBackend, CoordinateBackend,
    CoordinateList, CoordinateSource, MetricsBackend, StructuralMetrics,
};
pub use params::{canonicalize, ParameterSet};
pub use pipeline::{Coordinator, PipelineState, RunReport, StageOutcome};
pub use probe::{probe, probe_with, BackendAvailability, ProbeCommand, ProbeCommands};
pub use registry::{Builtin, CapabilitySet, KernelKind, Registry, RegistryEntry, Stage, Unit};
pub use results::{merge, ResultsRow};
pub use runner::{StageResult, StageRunner, TimingSource};

/// Crate version, recorded by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
