//! Metapop: runs a phase-based metapopulation model from the command line.
//!
//! Startup sequence:
//! 1. Parse arguments and initialise tracing
//! 2. Resolve parameters (defaults, file, flags, overrides)
//! 3. Load the scenario
//! 4. Build the model and wire the standard components
//! 5. Run with a progress bar
//! 6. Write the run summary and render figures

mod cli;
mod demo;
mod error;
mod progress;
mod summary;

use clap::Parser;
use metapop_components::default_components;
use metapop_core::{ConsoleSink, VisualizationReport, VisualizeMode, model::Model};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;
use crate::progress::ProgressObserver;
use crate::summary::RunRecord;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the timing report and console figures.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    info!("Metapop starting");
    run(&cli)?;
    info!("Metapop finished");
    Ok(())
}

fn run(cli: &Cli) -> Result<(), CliError> {
    // 2. Parameters
    let params = cli.resolve_parameters()?;

    // 3. Scenario
    let scenario = cli.load_scenario()?;
    info!(
        patches = scenario.len(),
        population = scenario.total_population(),
        "Scenario ready"
    );

    // 4. Model and components
    let mut model = Model::new(scenario, params, &cli.name)?;
    model.set_components(default_components())?;

    // 5. Run
    let mut progress = if cli.quiet {
        ProgressObserver::hidden()
    } else {
        ProgressObserver::new()
    };
    let summary = model.run_with(&mut progress)?;
    if model.verbose() {
        println!("{}", summary.report);
    }
    info!(
        ticks = summary.ticks,
        total_us = summary.report.total_us,
        seed = model.seed(),
        "Run complete"
    );

    // 6. Outputs
    if let Some(path) = &cli.output {
        RunRecord::from_model(&model)?.write(path)?;
    }
    if cli.viz {
        let report = render_figures(&model, cli)?;
        info!(
            rendered = report.rendered,
            skipped = report.skipped.len(),
            document = ?report.document,
            "Figures rendered"
        );
    }
    Ok(())
}

fn render_figures(model: &Model, cli: &Cli) -> Result<VisualizationReport, CliError> {
    let report = if cli.pdf {
        model.visualize(VisualizeMode::Document {
            directory: cli.figures_dir.clone(),
        })?
    } else {
        let mut sink = ConsoleSink::stdout();
        model.visualize(VisualizeMode::Interactive(&mut sink))?
    };
    Ok(report)
}
