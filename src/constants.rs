//! Centralized constants for the reordering benchmark harness
//!
//! File names, directory layout, protocol markers and exit codes live here
//! rather than being scattered through the stage and pipeline code.
//! Constants are organized by category for easy reference and maintenance.

// ============================================================================
// RESULTS DIRECTORY LAYOUT
// ============================================================================

/// Subdirectory of the results root holding reorder stage output
pub const REORDERING_DIR: &str = "Reordering";

/// Subdirectory of the results root holding multiply stage output
pub const MULTIPLICATION_DIR: &str = "Multiplication";

/// One-row results file written by every stage
pub const RESULTS_CSV: &str = "results.csv";

/// Permutation emitted by a reorder unit (one 1-based index per line)
pub const PERMUTATION_FILE: &str = "permutation.g";

/// Matrix with the permutation applied, read by metrics and multiply
pub const REORDERED_MATRIX_FILE: &str = "reordered.mtx";

/// Captured standard output of an external unit
pub const STDOUT_LOG: &str = "stdout.log";

/// Captured standard error of an external unit
pub const STDERR_LOG: &str = "stderr.log";

/// Default results root when neither the flag nor `RESULTS_DIR` is set
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Default root for external technique and kernel programs
pub const DEFAULT_PROGRAMS_DIR: &str = "programs";

/// Programs subdirectory for reorder units
pub const REORDER_PROGRAMS_SUBDIR: &str = "reorder";

/// Programs subdirectory for multiply units
pub const MULTIPLY_PROGRAMS_SUBDIR: &str = "multiply";

// ============================================================================
// SELF-REPORTED TIMING PROTOCOL
// ============================================================================

/// Prefix of the stdout line carrying a unit's own elapsed time
pub const TIMING_MARKER: &str = "TIMING_MS:";

/// Sidecar file carrying a unit's own elapsed time in milliseconds
pub const TIMING_SIDECAR: &str = "timing_ms.txt";

/// `key,value` metrics file written by cuSPARSE-style multiply units
pub const KERNEL_RESULTS_FILE: &str = "results.txt";

/// Dense operand width assumed when a kernel results file omits `num_cols_B`
pub const DEFAULT_DENSE_COLS: f64 = 64.0;

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// Results root shared by every entry point
pub const ENV_RESULTS_DIR: &str = "RESULTS_DIR";

/// Root of the external programs tree
pub const ENV_PROGRAMS_DIR: &str = "PROGRAMS_DIR";

/// Metrics backend override (`compressed` or `coordinate`)
pub const ENV_METRICS_BACKEND: &str = "METRICS_BACKEND";

/// Output directory handed to external units
pub const ENV_STAGE_OUTPUT_DIR: &str = "STAGE_OUTPUT_DIR";

/// Capability set name handed to external units
pub const ENV_CAPABILITY_SET: &str = "CAPABILITY_SET";

// ============================================================================
// STRUCTURAL METRICS
// ============================================================================

/// Tile edge lengths used for the block density columns
pub const DEFAULT_BLOCK_SIZES: [usize; 5] = [4, 8, 16, 32, 64];

// ============================================================================
// BACKEND PROBING
// ============================================================================

/// Upper bound on every individual probe check, in seconds
pub const PROBE_TIMEOUT_SECS: u64 = 5;

/// Poll interval while waiting on a probe child process, in milliseconds
pub const PROBE_POLL_INTERVAL_MS: u64 = 20;

// ============================================================================
// PARAMETER TOKENS
// ============================================================================

/// Path token used when no parameters were supplied
pub const DEFAULT_PARAM_TOKEN: &str = "default";

/// Separator between pairs in the raw parameter string
pub const RAW_PARAM_SEPARATOR: &str = ";";

/// Separator between pairs in the path token
pub const TOKEN_PAIR_SEPARATOR: &str = "_";

// ============================================================================
// EXIT CODES
// ============================================================================

/// Generic failure (I/O, CSV serialization)
pub const EXIT_FAILURE: i32 = 1;

/// Malformed input matrix, results file or permutation
pub const EXIT_INPUT_ERROR: i32 = 2;

/// Unsafe token, malformed parameter, missing program
pub const EXIT_CONFIGURATION_ERROR: i32 = 3;

/// GPU-only kernel requested without a usable GPU backend
pub const EXIT_BACKEND_UNAVAILABLE: i32 = 4;
