//! Backend availability probing
//!
//! Each check runs one external command bounded by a timeout. A check never
//! fails: spawn errors, nonzero exits and timeouts all read as "absent".

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::{PROBE_POLL_INTERVAL_MS, PROBE_TIMEOUT_SECS};

/// A program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProbeCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// The commands behind every probe field, plus the per-check timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommands {
    pub nvidia_smi: ProbeCommand,
    pub cuda_toolkit: ProbeCommand,
    pub gpu_array_lib: ProbeCommand,
    pub cusparse_usable: ProbeCommand,
    pub graphblas: ProbeCommand,
    pub timeout: Duration,
}

impl Default for ProbeCommands {
    fn default() -> Self {
        Self {
            nvidia_smi: ProbeCommand::new("nvidia-smi", &["-L"]),
            cuda_toolkit: ProbeCommand::new("nvcc", &["--version"]),
            gpu_array_lib: ProbeCommand::new("python3", &["-c", "import cupy"]),
            cusparse_usable: ProbeCommand::new(
                "python3",
                &[
                    "-c",
                    "import cupy; import cupyx.scipy.sparse; \
                     cupy.cuda.Device(0).use(); cupy.array([1, 2, 3])",
                ],
            ),
            graphblas: ProbeCommand::new("python3", &["-c", "import graphblas"]),
            timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }
}

impl ProbeCommands {
    /// Every check pointed at `program`, which is expected not to exist
    pub fn all_absent(program: &str) -> Self {
        let absent = ProbeCommand::new(program, &[]);
        Self {
            nvidia_smi: absent.clone(),
            cuda_toolkit: absent.clone(),
            gpu_array_lib: absent.clone(),
            cusparse_usable: absent.clone(),
            graphblas: absent,
            timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }
}

/// Result of probing the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendAvailability {
    pub nvidia_smi: bool,
    pub cuda_toolkit: bool,
    pub gpu_array_lib: bool,
    pub cusparse_usable: bool,
    pub graphblas: bool,
}

impl BackendAvailability {
    /// Field name and value, in report order
    pub fn entries(&self) -> [(&'static str, bool); 5] {
        [
            ("nvidia_smi", self.nvidia_smi),
            ("cuda_toolkit", self.cuda_toolkit),
            ("gpu_array_lib", self.gpu_array_lib),
            ("cusparse_usable", self.cusparse_usable),
            ("graphblas", self.graphblas),
        ]
    }
}

/// Probe every backend with the default commands
pub fn probe() -> BackendAvailability {
    probe_with(&ProbeCommands::default())
}

/// Probe every backend with the given commands
pub fn probe_with(commands: &ProbeCommands) -> BackendAvailability {
    let nvidia_smi = run_check(&commands.nvidia_smi, commands.timeout)
        .map(|stdout| stdout.contains("GPU"))
        .unwrap_or(false);
    let cuda_toolkit = run_check(&commands.cuda_toolkit, commands.timeout).is_some();
    let gpu_array_lib = run_check(&commands.gpu_array_lib, commands.timeout).is_some();
    // Importable alone is not enough; the device allocation must succeed too
    let cusparse_usable =
        gpu_array_lib && run_check(&commands.cusparse_usable, commands.timeout).is_some();
    let graphblas = run_check(&commands.graphblas, commands.timeout).is_some();

    let availability = BackendAvailability {
        nvidia_smi,
        cuda_toolkit,
        gpu_array_lib,
        cusparse_usable,
        graphblas,
    };
    debug!("Backend availability: {:?}", availability);
    availability
}

/// Run a command to completion within `timeout`
///
/// Returns captured stdout when the command exits 0, `None` otherwise. A
/// command still running at the deadline is killed and reaped. Stdout is
/// drained on a reader thread while the command runs, so output larger than
/// the pipe buffer cannot stall it.
pub fn run_check(command: &ProbeCommand, timeout: Duration) -> Option<String> {
    let mut child = match Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            debug!("probe '{}' could not start: {}", command.program, e);
            return None;
        }
    };

    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = child.stdout.take() {
        thread::spawn(move || {
            let mut stdout = String::new();
            let _ = pipe.read_to_string(&mut stdout);
            let _ = tx.send(stdout);
        });
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                debug!("probe '{}' timed out after {:?}", command.program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => thread::sleep(Duration::from_millis(PROBE_POLL_INTERVAL_MS)),
            Err(e) => {
                debug!("probe '{}' wait failed: {}", command.program, e);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    };

    if !status.success() {
        debug!("probe '{}' exited with {}", command.program, status);
        return None;
    }

    // A leftover grandchild may still hold the pipe open
    let grace = deadline
        .saturating_duration_since(Instant::now())
        .max(Duration::from_millis(PROBE_POLL_INTERVAL_MS));
    match rx.recv_timeout(grace) {
        Ok(stdout) => Some(stdout),
        Err(_) => {
            debug!("probe '{}' output was not closed in time", command.program);
            None
        }
    }
}
