use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};

use reorder_bench::constants::{ENV_PROGRAMS_DIR, ENV_RESULTS_DIR, EXIT_FAILURE};
use reorder_bench::{probe_with, Coordinator, HarnessConfig, HarnessError, MetricsBackend};

/// Sparse matrix reordering and multiplication benchmark harness
#[derive(Parser, Debug)]
#[command(name = "reorder-bench", version, about)]
struct Cli {
    /// Root of the results tree
    #[arg(long, env = ENV_RESULTS_DIR, global = true)]
    results_dir: Option<PathBuf>,

    /// Root of the external technique and kernel programs
    #[arg(long, env = ENV_PROGRAMS_DIR, global = true)]
    programs_dir: Option<PathBuf>,

    /// Storage used for structural metrics (compressed or coordinate)
    #[arg(long, global = true)]
    metrics_backend: Option<String>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reorder a matrix and record its structural metrics
    Reorder {
        matrix: PathBuf,
        technique: String,
        /// Technique parameters as key=value
        params: Vec<String>,
    },
    /// Run a kernel on the matrix recorded in a reorder results file
    Multiply {
        results_csv: PathBuf,
        kernel: String,
        /// Kernel parameters as key=value
        params: Vec<String>,
    },
    /// Reorder, compute metrics and optionally multiply in one go
    Run {
        matrix: PathBuf,
        technique: String,
        /// Technique parameters as key=value
        params: Vec<String>,
        /// Multiplication kernel to run after reordering
        #[arg(long)]
        kernel: Option<String>,
        /// Kernel parameter as key=value (repeatable)
        #[arg(long = "mult-param")]
        mult_params: Vec<String>,
    },
    /// Report which accelerator backends are usable
    Probe {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match execute(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {:#}", e);
            exit_code(&e)
        }
    };
    process::exit(code);
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<HarnessError>()
        .map(HarnessError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

fn build_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::from_env()?;
    if let Some(dir) = &cli.results_dir {
        config.results_dir = dir.clone();
    }
    if let Some(dir) = &cli.programs_dir {
        config.programs_dir = dir.clone();
    }
    if let Some(backend) = &cli.metrics_backend {
        config.metrics_backend = backend.parse::<MetricsBackend>()?;
    }
    debug!("configuration: {:?}", config);
    Ok(config)
}

fn execute(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    info!("reorder-bench {}", reorder_bench::VERSION);

    match cli.command {
        Command::Reorder {
            matrix,
            technique,
            params,
        } => {
            let coordinator = Coordinator::new(config);
            let outcome = coordinator
                .reorder(&matrix, &technique, params.as_slice())
                .with_context(|| format!("reordering {} with {}", matrix.display(), technique))?;
            println!("{}", outcome.csv_path.display());
        }
        Command::Multiply {
            results_csv,
            kernel,
            params,
        } => {
            let coordinator = Coordinator::new(config);
            let outcome = coordinator
                .multiply(&results_csv, &kernel, params.as_slice())
                .with_context(|| format!("multiplying {} with {}", results_csv.display(), kernel))?;
            println!("{}", outcome.csv_path.display());
        }
        Command::Run {
            matrix,
            technique,
            params,
            kernel,
            mult_params,
        } => {
            let coordinator = Coordinator::new(config);
            let report = coordinator.run(
                &matrix,
                &technique,
                params.as_slice(),
                kernel.as_deref(),
                mult_params.as_slice(),
            );
            if let Some(err) = report.error {
                return Err(anyhow::Error::new(err).context(format!(
                    "pipeline for {} failed after {}",
                    matrix.display(),
                    report
                        .reached
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "start".to_string())
                )));
            }
            for path in report.reorder_csv.iter().chain(report.multiply_csv.iter()) {
                println!("{}", path.display());
            }
        }
        Command::Probe { json } => {
            let availability = probe_with(&config.probe);
            if json {
                println!("{}", serde_json::to_string_pretty(&availability)?);
            } else {
                for (name, available) in availability.entries() {
                    println!("{:<16} {}", name, if available { "yes" } else { "no" });
                }
            }
        }
    }
    Ok(())
}
