//! # petal
//!
//! Searches maximum-entropy hyperparameters on an Iris table, reports
//! multiclass metrics for the best model, and predicts three sample flowers.

mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use pt_data::{train_test_split, IrisCsvLoader, SplitOptions};
use pt_model::MulticlassMetrics;
use pt_optimizer::{
    build_strategy, Experiment, ExperimentConfig, MaxEntParams, MaxEntTrialRunner, TrialEvent,
};
use tracing_subscriber::EnvFilter;

/// Number of ranks reported by top-K accuracy; zero disables it.
const TOP_K: usize = 0;

#[derive(Parser)]
#[command(name = "petal")]
#[command(about = "Hyperparameter search for a maximum-entropy Iris classifier", long_about = None)]
#[command(version)]
struct Cli {
    /// Input table with a header row
    #[arg(long, default_value = "iris.csv")]
    data: PathBuf,

    /// Table used for the final evaluation report (defaults to --data)
    #[arg(long)]
    test_data: Option<PathBuf>,

    /// Column separator of the input tables
    #[arg(long, default_value_t = ',')]
    separator: char,

    /// Experiment wall-clock budget in seconds
    #[arg(long, default_value_t = 30)]
    time_budget: u64,

    /// Maximum number of trials
    #[arg(long, default_value_t = 200)]
    max_trials: usize,

    /// Fraction of rows held out of training
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,

    /// Search strategy (frugal, random, grid)
    #[arg(long, default_value = "frugal")]
    strategy: String,

    /// Seed for the split, the search, and weight initialization
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log filter directive (e.g. warn, info, pt_optimizer=debug)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also print the best trial as JSON
    #[arg(long)]
    json: bool,
}

fn table_loader(cli: &Cli) -> anyhow::Result<IrisCsvLoader> {
    anyhow::ensure!(cli.separator.is_ascii(), "--separator must be a single ASCII character");
    Ok(IrisCsvLoader::with_delimiter(cli.separator as u8))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).context("invalid --log-level")?)
        .init();

    println!("Preparing experiment... Please wait.");

    println!("Reading data.");
    let loader = table_loader(&cli)?;
    let dataset = loader
        .load(&cli.data)
        .with_context(|| format!("failed to load {}", cli.data.display()))?;
    let test_path = cli.test_data.as_ref().unwrap_or(&cli.data);
    let test_data = loader
        .load(test_path)
        .with_context(|| format!("failed to load {}", test_path.display()))?;

    let split = train_test_split(
        &dataset,
        &SplitOptions::new(cli.test_fraction).with_seed(cli.seed),
    )?;

    let config = ExperimentConfig::new("iris")
        .with_strategy(&cli.strategy)
        .with_max_trials(cli.max_trials)
        .with_time_budget(Duration::from_secs(cli.time_budget))
        .with_seed(cli.seed);
    let strategy = build_strategy(&config, MaxEntParams::search_space())?;
    let runner = MaxEntTrialRunner::new(Arc::new(split), cli.seed);

    let observer = |event: &TrialEvent<'_>| match event {
        TrialEvent::Completed { result } => println!("{}", report::trial_completed_line(result)),
        TrialEvent::Failed { settings } => println!("{}", report::trial_failed_line(settings)),
        TrialEvent::Started { .. } | TrialEvent::NewBest { .. } => {}
    };

    println!("Running experiment...");
    let summary = Experiment::new(config, strategy, runner, observer).run();
    tracing::info!(
        "{} trials completed, {} failed in {:?}",
        summary.status.trials_completed,
        summary.status.trials_failed,
        summary.elapsed
    );

    let Some(best) = summary.into_best() else {
        println!("Experiment returned null due to a time-out.");
        std::process::exit(-1);
    };
    let Some(model) = best.model.as_ref() else {
        println!("Experiment returned null due to a time-out.");
        std::process::exit(-1);
    };

    println!("Experiment completed.");
    if cli.json {
        println!("{}", best.to_json()?);
    }

    let metrics = MulticlassMetrics::evaluate(model, &test_data.samples, TOP_K)?;
    println!();
    println!("{}", report::METRICS_HEADER);
    println!("{}", report::metrics_line(&metrics));
    println!();

    println!("Using model to make single prediction -- Comparing actual Label with predicted Label from sample data...\n");
    for sample in report::demo_samples() {
        println!("{}", report::prediction_block(model, &sample));
    }

    Ok(())
}
