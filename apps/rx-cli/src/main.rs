use clap::{Parser, Subcommand};
use nalgebra::DMatrix;
use rx_reactor::{Reactor, ReactorError, ReactorKind, ReactorRun};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod scenario;

use scenario::Scenario;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Reactor(#[from] ReactorError),

    #[error("Scenario error: {what}")]
    Scenario { what: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser)]
#[command(name = "rx")]
#[command(about = "Chemical reactor simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a scenario builds a valid reactor
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Integrate the reactor and print the sampled trajectory
    Run {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// End time (volume for a PFR; defaults to the design volume)
        #[arg(long)]
        span: Option<f64>,
        /// Include reaction and transformation rates at every sample
        #[arg(long)]
        full: bool,
    },
    /// Find when the reactor reaches steady state
    Steady {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// First horizon to try
        #[arg(long)]
        guess: Option<f64>,
        /// Largest transformation rate considered steady
        #[arg(long)]
        threshold: Option<f64>,
        /// Number of horizons to try
        #[arg(long)]
        max_iterations: Option<usize>,
    },
    /// Find when a species reaches a target conversion
    Conversion {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Species whose conversion is tracked
        species: String,
        /// Target conversion in [0, 1]
        target: f64,
        /// First horizon of the steady-state search
        #[arg(long, default_value_t = 10.0)]
        guess: f64,
    },
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Run {
            scenario_path,
            span,
            full,
        } => cmd_run(&scenario_path, span, full),
        Commands::Steady {
            scenario_path,
            guess,
            threshold,
            max_iterations,
        } => cmd_steady(&scenario_path, guess, threshold, max_iterations),
        Commands::Conversion {
            scenario_path,
            species,
            target,
            guess,
        } => cmd_conversion(&scenario_path, &species, target, guess),
    }
}

fn load(scenario_path: &Path) -> Result<(Scenario, Reactor), CliError> {
    let scenario = Scenario::load(scenario_path)?;
    let reactor = scenario.build()?;
    tracing::info!(
        scenario = %scenario.name,
        kind = %reactor.kind(),
        species = reactor.species().len(),
        reactions = reactor.reactions().len(),
        "scenario loaded"
    );
    Ok((scenario, reactor))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_validate(scenario_path: &Path) -> Result<(), CliError> {
    let (_scenario, reactor) = load(scenario_path)?;
    println!("{reactor}");
    println!("✓ Scenario is valid");
    Ok(())
}

/// Column-oriented view of a run.
#[derive(Serialize)]
struct RunReport {
    kind: ReactorKind,
    x: Vec<f64>,
    volume: Vec<f64>,
    concentrations: BTreeMap<String, Vec<f64>>,
    amounts: BTreeMap<String, Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    switch_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reaction_rates: Option<BTreeMap<String, Vec<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transformation_rates: Option<BTreeMap<String, Vec<f64>>>,
}

impl RunReport {
    fn new(run: ReactorRun) -> Self {
        let columns = |names: &[String], mat: &DMatrix<f64>| {
            names
                .iter()
                .enumerate()
                .map(|(j, name)| (name.clone(), mat.column(j).iter().copied().collect()))
                .collect::<BTreeMap<_, _>>()
        };
        let (reaction_rates, transformation_rates) = match &run.rates {
            Some(rates) => (
                Some(columns(&run.reaction_names, &rates.reaction_rates)),
                Some(columns(&run.species, &rates.transformation_rates)),
            ),
            None => (None, None),
        };
        Self {
            kind: run.kind,
            concentrations: columns(&run.species, &run.concentrations),
            amounts: columns(&run.species, &run.amounts),
            switch_point: run.switch_point,
            reaction_rates,
            transformation_rates,
            x: run.x,
            volume: run.volumes,
        }
    }
}

fn cmd_run(scenario_path: &Path, span: Option<f64>, full: bool) -> Result<(), CliError> {
    let (_scenario, reactor) = load(scenario_path)?;
    let run = reactor.run(span, full)?;
    print_json(&RunReport::new(run))
}

fn cmd_steady(
    scenario_path: &Path,
    guess: Option<f64>,
    threshold: Option<f64>,
    max_iterations: Option<usize>,
) -> Result<(), CliError> {
    let (scenario, reactor) = load(scenario_path)?;
    let mut options = scenario.steady_state.to_options();
    if let Some(g) = guess {
        options.guess = g;
    }
    if let Some(t) = threshold {
        options.threshold = t;
    }
    if let Some(n) = max_iterations {
        options.max_iterations = n;
    }
    let steady = reactor.find_steady_state(&options)?;
    print_json(&steady)
}

fn cmd_conversion(
    scenario_path: &Path,
    species: &str,
    target: f64,
    guess: f64,
) -> Result<(), CliError> {
    let (_scenario, reactor) = load(scenario_path)?;
    let point = reactor.find_conversion(species, target, guess)?;
    print_json(&point)
}
