//! Churn CLI Module
//!
//! Command-line interface for the data pipeline, training, evaluation,
//! hyperparameter search and the prediction server.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;

use crate::config::AppConfig;
use crate::inference::ChurnPredictor;
use crate::preprocessing::{DataPipeline, ProcessedPaths};
use crate::tracking::{ExperimentTracker, RunRecorder};
use crate::training::{ClassificationMetrics, ModelType, Trainer, TrainingReport};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn print_metrics(train: Option<&ClassificationMetrics>, other: (&str, &ClassificationMetrics)) {
    let fmt_auc = |m: &ClassificationMetrics| match m.auc {
        Some(auc) => format!("{:.4}", auc),
        None => "n/a".to_string(),
    };

    println!();
    match train {
        Some(train) => {
            println!("  {:<12} {:>10} {:>10}", muted("Metric"), muted("train"), muted(other.0));
            println!("  {}", dim(&"─".repeat(34)));
            let rows = [
                ("accuracy", train.accuracy, other.1.accuracy),
                ("precision", train.precision, other.1.precision),
                ("recall", train.recall, other.1.recall),
                ("f1", train.f1, other.1.f1),
            ];
            for (name, a, b) in rows {
                println!("  {:<12} {:>10.4} {:>10.4}", name, a, b);
            }
            println!("  {:<12} {:>10} {:>10}", "auc", fmt_auc(train), fmt_auc(other.1));
        }
        None => {
            let m = other.1;
            println!("  {:<12} {:>10}", muted("Metric"), muted(other.0));
            println!("  {}", dim(&"─".repeat(23)));
            for (name, v) in [
                ("accuracy", m.accuracy),
                ("precision", m.precision),
                ("recall", m.recall),
                ("f1", m.f1),
            ] {
                println!("  {:<12} {:>10.4}", name, v);
            }
            println!("  {:<12} {:>10}", "auc", fmt_auc(m));
        }
    }
    println!();
}

fn print_importances(ranked: &[(String, f64)]) {
    if ranked.is_empty() {
        return;
    }
    println!("  {:<36} {:>10}", muted("Feature"), muted("importance"));
    println!("  {}", dim(&"─".repeat(47)));
    for (name, importance) in ranked {
        println!("  {:<36} {:>10.4}", name, importance);
    }
    println!();
}

// ─── CLI definition ────────────────────────────────────────────────────────────

const DEFAULT_CONFIG: &str = "configs/model1.yaml";

#[derive(Parser)]
#[command(name = "churn")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Telco customer churn pipeline: prepare data, train, evaluate and serve")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate, clean, encode and split the raw dataset
    Pipeline {
        /// Configuration file (YAML or JSON)
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Raw CSV, overriding paths.raw_data
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory, overriding paths.processed_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Train a model on the processed splits
    Train {
        /// Configuration file (YAML or JSON)
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Model type, overriding model.model_type
        #[arg(short, long)]
        model: Option<ModelType>,

        /// Skip experiment tracking
        #[arg(long)]
        no_tracking: bool,
    },

    /// Evaluate on the test split, or score a raw CSV
    Predict {
        /// Configuration file (YAML or JSON)
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Raw customer CSV to score instead of evaluating test.csv
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write scored rows (with --input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cross-validated hyperparameter search
    Tune {
        /// Configuration file (YAML or JSON)
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Write the full search result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the prediction server
    Serve {
        /// Configuration file (YAML or JSON); supplies the model directory
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Server port (defaults to API_PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host (defaults to API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,
    },
}

/// Missing config files fall back to defaults; present ones must be valid
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        Ok(AppConfig::from_file(path)?)
    } else {
        warn!(path = %path.display(), "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_pipeline(
    config_path: &Path,
    input: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Pipeline");
    let config = load_config(config_path)?;
    let raw_path = input.unwrap_or(&config.paths.raw_data);
    let out_dir = output.unwrap_or(&config.paths.processed_dir);

    step_run(&format!("Processing {}", raw_path.display()));
    let start = Instant::now();
    let pipeline = DataPipeline::new(config.pipeline.clone(), config.random_state);
    let result = pipeline.run_file(raw_path, out_dir)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    kv("train rows", &result.split.train.height().to_string());
    kv("val rows", &result.split.val.height().to_string());
    kv("test rows", &result.split.test.height().to_string());
    kv("features", &result.state.feature_columns.len().to_string());
    kv("output", &out_dir.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_train(config_path: &Path, model: Option<ModelType>, no_tracking: bool) -> anyhow::Result<()> {
    section("Train");
    let mut config = load_config(config_path)?;
    if let Some(model_type) = model {
        config.model.model_type = model_type;
    }

    let mut trainer = Trainer::new(config.model.clone(), config.random_state)?;
    step_run(&format!("Training {}", config.model.model_type.to_string().cyan()));
    let start = Instant::now();

    let report = if no_tracking {
        trainer.train(&config.paths.processed_dir, &config.paths.model_dir, None)?
    } else {
        train_tracked(&mut trainer, &config)?
    };
    step_done(&format!("{:?}", start.elapsed()));

    print_metrics(Some(&report.train), ("val", &report.val));
    print_importances(&report.top_features);
    kv("model dir", &config.paths.model_dir.display().to_string());
    kv("tag", &report.tag[..12.min(report.tag.len())]);
    if report.tracking_failures > 0 {
        println!(
            "  {} {}",
            "warning".yellow(),
            format!("{} tracking call(s) failed; artifacts were saved", report.tracking_failures)
        );
    }
    println!();
    Ok(())
}

/// Train inside a tracking run. A tracker that cannot be opened or
/// finished is logged and skipped.
fn train_tracked(trainer: &mut Trainer, config: &AppConfig) -> anyhow::Result<TrainingReport> {
    let experiment = config.experiment();
    let mut tracker = match ExperimentTracker::local(&experiment.tracking_dir) {
        Ok(tracker) => tracker,
        Err(e) => {
            warn!(error = %e, "Experiment tracker unavailable; training without tracking");
            return Ok(trainer.train(&config.paths.processed_dir, &config.paths.model_dir, None)?);
        }
    };

    let mut session = tracker.start_run(&experiment.experiment_name, &config.run_name);
    let result = trainer.train(
        &config.paths.processed_dir,
        &config.paths.model_dir,
        Some(&mut session as &mut dyn RunRecorder),
    );
    match result {
        Ok(report) => {
            if let Err(e) = session.finish() {
                warn!(error = %e, "Failed to close tracking run");
            }
            Ok(report)
        }
        Err(e) => {
            if let Err(track_err) = session.fail() {
                warn!(error = %track_err, "Failed to record failed tracking run");
            }
            Err(e.into())
        }
    }
}

pub fn cmd_predict(config_path: &Path, input: Option<&Path>, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");
    let config = load_config(config_path)?;

    step_run("Loading model");
    let predictor = ChurnPredictor::from_dir(&config.paths.model_dir)?;
    step_done(&format!("{} ({})", predictor.model().model_type(), &predictor.tag()[..12.min(predictor.tag().len())]));

    match input {
        None => {
            let paths = ProcessedPaths::in_dir(&config.paths.processed_dir);
            step_run("Evaluating test split");
            let test = DataLoader::new().load_required(&paths.test, "test split")?;
            let metrics = predictor.evaluate_encoded(&test)?;
            step_done(&format!("{} rows", metrics.n_samples));
            print_metrics(None, ("test", &metrics));
        }
        Some(path) => {
            step_run(&format!("Scoring {}", path.display()));
            let raw = DataLoader::new().load_required(path, "input data")?;
            let predictions = predictor.predict_frame(&raw)?;
            let churners = predictions.iter().filter(|p| p.will_churn).count();
            step_done(&format!("{} rows", predictions.len()));

            println!();
            kv("predicted churn", &format!("{} / {}", churners, predictions.len()));

            if let Some(out) = output {
                let mut scored = DataFrame::new(vec![
                    Column::new(
                        "churn_probability".into(),
                        predictions.iter().map(|p| p.churn_probability).collect::<Vec<f64>>(),
                    ),
                    Column::new(
                        "will_churn".into(),
                        predictions.iter().map(|p| p.will_churn).collect::<Vec<bool>>(),
                    ),
                    Column::new(
                        "risk_level".into(),
                        predictions
                            .iter()
                            .map(|p| p.risk_level.as_str())
                            .collect::<Vec<&str>>(),
                    ),
                ])?;
                DataSaver::save_csv(&mut scored, out)?;
                kv("output", &out.display().to_string());
            }
            println!();
        }
    }
    Ok(())
}

pub fn cmd_tune(config_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Tune");
    let config = load_config(config_path)?;
    let trainer = Trainer::new(config.model.clone(), config.random_state)?;

    step_run(&format!(
        "Searching {} candidates for {}",
        config.tuning.candidate_count(),
        config.tuning.model_type.to_string().cyan()
    ));
    let start = Instant::now();
    let result = trainer.search(&config.paths.processed_dir, &config.tuning)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    let best = &result.best_params;
    kv("best cv f1", &format!("{:.4}", result.best_score));
    kv("n_estimators", &best.n_estimators.to_string());
    kv(
        "max_depth",
        &best.max_depth.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string()),
    );
    kv("min_samples_split", &best.min_samples_split.to_string());
    kv("min_samples_leaf", &best.min_samples_leaf.to_string());
    kv("evaluated", &result.candidates.len().to_string());

    if let Some(out) = output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out, serde_json::to_string_pretty(&result)?)?;
        kv("output", &out.display().to_string());
    }
    println!();
    Ok(())
}

pub async fn cmd_serve(config_path: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut server_config = crate::server::ServerConfig::default();
    if std::env::var("MODEL_DIR").is_err() && config_path.exists() {
        let config = load_config(config_path)?;
        server_config = server_config.with_model_dir(config.paths.model_dir);
    }
    if let Some(host) = host {
        server_config = server_config.with_host(host);
    }
    if let Some(port) = port {
        server_config = server_config.with_port(port);
    }

    println!();
    println!(
        "  {} {}",
        ok("serving"),
        format!("http://{}:{}", server_config.host, server_config.port).white().bold()
    );
    println!("  {}", dim("press ctrl+c to stop"));
    println!();

    crate::server::run_server(server_config).await
}
