//! Thermocircuit - stochastic RLC loop simulator
//!
//! Every subcommand writes CSV rows to stdout. Logs go to stderr and are
//! filtered with `RUST_LOG`.
//!
//! # Usage
//!
//! ```bash
//! thermocircuit --circuit loop.rlc simulate --duration 0.01 --dt 1e-4 > run.csv
//! thermocircuit --demo sweep --param R1=500,1k,2k --repeats 3 > sweep.csv
//! RUST_LOG=debug thermocircuit optimize --dimensions 5 > trace.csv
//! ```

use std::ops::ControlFlow;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use thermocircuit_core::analysis::{self, CalibrationConfig};
use thermocircuit_core::circuit::{self, presets, Circuit};
use thermocircuit_core::compute::AnnealingConfig;
use thermocircuit_core::dsl::parse_value;
use thermocircuit_core::ensemble::{EnsembleConfig, EnsembleRunner, ParameterGrid, ParameterVariations};
use thermocircuit_core::error::Result;
use thermocircuit_core::output::{self, CsvOutput};
use thermocircuit_core::{CancelToken, Problem, RunOptions, Simulator, SimulatorConfig};

/// Stochastic RLC circuit simulator with thermodynamic computation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Circuit file (.json configuration record or .rlc description)
    #[arg(long, global = true, value_name = "FILE")]
    circuit: Option<PathBuf>,

    /// Use the five-component demo circuit instead of the basic loop
    #[arg(long, global = true, conflicts_with = "circuit")]
    demo: bool,

    /// Override the ambient temperature in kelvin
    #[arg(long, global = true)]
    temperature: Option<f64>,

    /// Seed for reproducible runs
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Batch simulation on a uniform time grid
    Simulate {
        #[command(flatten)]
        run: RunArgs,

        /// Add an energy column
        #[arg(long)]
        energy: bool,

        /// Source angular frequency in rad/s (0 for DC)
        #[arg(long, default_value_t = 0.0)]
        omega: f64,
    },

    /// Step-by-step simulation streamed as it runs
    Realtime {
        #[command(flatten)]
        run: RunArgs,

        /// Stop once |voltage| reaches this value
        #[arg(long)]
        stop_at_voltage: Option<f64>,
    },

    /// Minimize the Rosenbrock function by simulated annealing
    Optimize {
        #[arg(long, default_value_t = 5)]
        dimensions: usize,

        #[arg(long, default_value_t = 5000)]
        iterations: usize,

        #[arg(long, default_value_t = 100.0)]
        initial_temperature: f64,
    },

    /// Solve x² + y² = 1, x = y by residual minimization
    Solve {
        #[arg(long, default_value_t = 1000)]
        iterations: usize,

        #[arg(long, default_value_t = 100.0)]
        initial_temperature: f64,
    },

    /// Sample a three-mode Gaussian mixture with Metropolis-Hastings
    Sample {
        #[arg(long, default_value_t = 10000)]
        iterations: usize,

        #[arg(long, default_value_t = 1000)]
        burn_in: usize,

        #[arg(long, default_value_t = 0.1)]
        step_size: f64,
    },

    /// Cartesian parameter sweep over nominal values
    Sweep {
        /// Axis as NAME=v1,v2,... (repeatable, SI suffixes allowed)
        #[arg(long = "param", value_parser = parse_axis, required = true)]
        params: Vec<(String, Vec<f64>)>,

        #[arg(long, default_value_t = 3)]
        repeats: usize,

        #[command(flatten)]
        ensemble: EnsembleArgs,
    },

    /// Monte Carlo analysis with Gaussian nominal values
    MonteCarlo {
        #[arg(long, default_value_t = 100)]
        simulations: usize,

        /// Variation as NAME=mean:std (repeatable); defaults to 10% of
        /// every nominal value
        #[arg(long = "vary", value_parser = parse_variation)]
        variations: Vec<(String, f64, f64)>,

        #[command(flatten)]
        ensemble: EnsembleArgs,
    },

    /// Time-domain noise metrics and Welch spectra
    Noise {
        #[arg(long, default_value_t = 1.0)]
        duration: f64,

        #[arg(long, default_value_t = 1e-4)]
        dt: f64,

        /// Print the time-domain metrics as JSON instead of the spectra
        #[arg(long)]
        metrics: bool,
    },

    /// Adjust R and V until steady state meets the targets
    Calibrate {
        #[arg(long, default_value_t = 1.0)]
        target_current: f64,

        #[arg(long, default_value_t = 5.0)]
        target_voltage: f64,

        #[arg(long, default_value_t = 0.1)]
        tolerance: f64,

        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
    },

    /// Sweep a single component value and summarize each run
    Characterize {
        /// Component name
        #[arg(long)]
        component: String,

        /// Values to try, comma separated
        #[arg(long, value_delimiter = ',', value_parser = parse_si, required = true)]
        values: Vec<f64>,

        #[arg(long, default_value_t = 3)]
        repeats: usize,

        #[arg(long, default_value_t = 0.1)]
        duration: f64,
    },

    /// Print the circuit as a JSON configuration record
    ExportConfig,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Simulated time in seconds
    #[arg(long, default_value_t = 0.01)]
    duration: f64,

    /// Output spacing in seconds
    #[arg(long, default_value_t = 1e-4)]
    dt: f64,

    /// Initial loop current
    #[arg(long, default_value_t = 0.0)]
    i0: f64,

    /// Initial capacitor voltage
    #[arg(long, default_value_t = 0.0)]
    v0: f64,
}

#[derive(Args, Debug)]
struct EnsembleArgs {
    #[arg(long, default_value_t = 0.1)]
    duration: f64,

    #[arg(long, default_value_t = 1e-3)]
    dt: f64,

    /// Worker threads (defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,
}

fn parse_si(text: &str) -> std::result::Result<f64, String> {
    parse_value(text).ok_or_else(|| format!("invalid number '{text}'"))
}

fn parse_axis(text: &str) -> std::result::Result<(String, Vec<f64>), String> {
    let (name, values) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=v1,v2,..., got '{text}'"))?;
    let values = values.split(',').map(parse_si).collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((name.trim().to_string(), values))
}

fn parse_variation(text: &str) -> std::result::Result<(String, f64, f64), String> {
    let (name, rest) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=mean:std, got '{text}'"))?;
    let (mean, std) = rest
        .split_once(':')
        .ok_or_else(|| format!("expected NAME=mean:std, got '{text}'"))?;
    Ok((name.trim().to_string(), parse_si(mean)?, parse_si(std)?))
}

fn load(cli: &Cli) -> Result<Circuit> {
    let mut circuit = match &cli.circuit {
        Some(path) => circuit::load_circuit(path)?,
        None if cli.demo => presets::demo_circuit(),
        None => presets::example_circuit(),
    };
    if let Some(temperature) = cli.temperature {
        circuit.set_temperature(temperature)?;
    }
    Ok(circuit)
}

fn ensemble_runner(circuit: Circuit, args: &EnsembleArgs, seed: Option<u64>) -> Result<EnsembleRunner> {
    let mut config = EnsembleConfig::new();
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    EnsembleRunner::new(circuit, config)
}

fn annealing(config: AnnealingConfig, seed: Option<u64>) -> AnnealingConfig {
    match seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    }
}

fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

fn gaussian_mixture(x: &[f64]) -> f64 {
    const MODES: [([f64; 2], f64); 3] = [([-2.0, -2.0], 0.3), ([2.0, 2.0], 0.5), ([-2.0, 2.0], 0.2)];
    MODES
        .iter()
        .map(|(center, weight)| {
            let d2: f64 = x.iter().zip(center).map(|(xi, ci)| (xi - ci).powi(2)).sum();
            weight * (-d2 / 2.0).exp()
        })
        .sum()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let circuit = load(&cli)?;
    let cancel = CancelToken::new();
    let mut out = CsvOutput::stdout();

    match &cli.command {
        Command::Simulate { run, energy, omega } => {
            circuit::validate_circuit(&circuit)?;
            let config = SimulatorConfig::new().with_source_frequency(*omega);
            let mut sim = Simulator::with_config(circuit, config);
            let mut options = RunOptions::new()
                .with_initial_state(run.i0, run.v0)
                .with_energy(*energy);
            options.seed = cli.seed;
            let trajectory = sim.simulate(run.duration, run.dt, &options)?;
            let stats = trajectory.step_stats();
            info!(
                samples = trajectory.len(),
                accepted = stats.accepted,
                rejected = stats.rejected,
                "simulation complete"
            );
            output::write_trajectory(&mut out, &trajectory)?;
        }

        Command::Realtime { run, stop_at_voltage } => {
            circuit::validate_circuit(&circuit)?;
            let mut sim = Simulator::new(circuit);
            let mut options = RunOptions::new().with_initial_state(run.i0, run.v0);
            options.seed = cli.seed;

            output::trajectory_header(&mut out, true)?;
            let mut write_error = None;
            sim.simulate_realtime(run.duration, run.dt, &options, |sample| {
                if let Err(e) = output::write_sample(&mut out, sample) {
                    write_error = Some(e);
                    return ControlFlow::Break(());
                }
                match stop_at_voltage {
                    Some(limit) if sample.voltage.abs() >= *limit => ControlFlow::Break(()),
                    _ => ControlFlow::Continue(()),
                }
            })?;
            if let Some(e) = write_error {
                return Err(e);
            }
        }

        Command::Optimize {
            dimensions,
            iterations,
            initial_temperature,
        } => {
            let sim = Simulator::new(circuit);
            let config = AnnealingConfig::for_optimize()
                .with_dimensions(*dimensions)
                .with_iterations(*iterations)
                .with_initial_temperature(*initial_temperature);
            let result = sim.perform_computation(
                &Problem::optimize(rosenbrock),
                &annealing(config, cli.seed),
                &cancel,
            )?;
            info!(best_score = result.best_score(), "optimization complete");
            output::write_computation(&mut out, &result)?;
        }

        Command::Solve {
            iterations,
            initial_temperature,
        } => {
            let sim = Simulator::new(circuit);
            let config = AnnealingConfig::for_solve()
                .with_iterations(*iterations)
                .with_initial_temperature(*initial_temperature);
            let system = Problem::solve(|x: &[f64]| vec![x[0] * x[0] + x[1] * x[1] - 1.0, x[0] - x[1]]);
            let result = sim.perform_computation(&system, &annealing(config, cli.seed), &cancel)?;
            info!(best_score = result.best_score(), "solve complete");
            output::write_computation(&mut out, &result)?;
        }

        Command::Sample {
            iterations,
            burn_in,
            step_size,
        } => {
            let sim = Simulator::new(circuit);
            let config = AnnealingConfig::for_sample()
                .with_iterations(*iterations)
                .with_burn_in(*burn_in)
                .with_step_size(*step_size);
            let result = sim.perform_computation(
                &Problem::sample(gaussian_mixture),
                &annealing(config, cli.seed),
                &cancel,
            )?;
            info!(acceptance_rate = result.acceptance_rate(), "sampling complete");
            output::write_computation(&mut out, &result)?;
        }

        Command::Sweep {
            params,
            repeats,
            ensemble,
        } => {
            let grid = params
                .iter()
                .fold(ParameterGrid::new(), |grid, (name, values)| grid.with_axis(name, values.clone()));
            let runner = ensemble_runner(circuit, ensemble, cli.seed)?;
            let records = runner.parameter_sweep(&grid, ensemble.duration, ensemble.dt, *repeats, &cancel)?;
            output::write_sweep(&mut out, &records)?;
        }

        Command::MonteCarlo {
            simulations,
            variations,
            ensemble,
        } => {
            let variations = if variations.is_empty() {
                None
            } else {
                Some(
                    variations
                        .iter()
                        .fold(ParameterVariations::new(), |v, (name, mean, std)| v.with(name, *mean, *std)),
                )
            };
            let runner = ensemble_runner(circuit, ensemble, cli.seed)?;
            let records = runner.monte_carlo_analysis(
                *simulations,
                ensemble.duration,
                ensemble.dt,
                variations.as_ref(),
                &cancel,
            )?;
            output::write_sweep(&mut out, &records)?;
        }

        Command::Noise { duration, dt, metrics } => {
            circuit::validate_circuit(&circuit)?;
            let mut sim = Simulator::new(circuit);
            let report = analysis::analyze_noise(&mut sim, *duration, *dt, cli.seed)?;
            if *metrics {
                let json = serde_json::to_string_pretty(&report.time_domain)?;
                out.row(&[json])?;
            } else {
                output::write_spectrum(&mut out, &report)?;
            }
        }

        Command::Calibrate {
            target_current,
            target_voltage,
            tolerance,
            max_iterations,
        } => {
            circuit::validate_circuit(&circuit)?;
            let mut sim = Simulator::new(circuit);
            let mut config = CalibrationConfig::new(*target_current, *target_voltage)
                .with_tolerance(*tolerance)
                .with_max_iterations(*max_iterations);
            if let Some(seed) = cli.seed {
                config = config.with_seed(seed);
            }
            let report = analysis::calibrate(&mut sim, &config)?;
            info!(
                success = report.success,
                iterations = report.iterations,
                final_current = report.final_current,
                final_voltage = report.final_voltage,
                "calibration finished"
            );
            output::write_calibration(&mut out, &report)?;
        }

        Command::Characterize {
            component,
            values,
            repeats,
            duration,
        } => {
            circuit::validate_circuit(&circuit)?;
            let mut sim = Simulator::new(circuit);
            let records = analysis::characterize(&mut sim, component, values, *repeats, *duration)?;
            output::write_characterization(&mut out, &records)?;
        }

        Command::ExportConfig => {
            out.row(&[circuit.to_json()?])?;
        }
    }

    out.flush()
}
