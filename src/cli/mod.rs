//! AutoML Agent CLI Module
//!
//! Command-line access to the same service the HTTP server exposes.

use clap::{Parser, Subcommand};
use colored::*;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::AppConfig;
use crate::service::{AutoMlService, TrainCommand};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

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

fn cell(value: &Value) -> String {
    match value {
        Value::Number(n) => n.as_f64().map(|v| format!("{:.4}", v)).unwrap_or_else(|| n.to_string()),
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "automl-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train tabular models from a plain-language goal")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long, env = "API_HOST")]
        host: Option<String>,

        #[arg(short, long, env = "API_PORT")]
        port: Option<u16>,

        #[arg(long, env = "UPLOADS_DIR")]
        uploads_dir: Option<PathBuf>,

        #[arg(long, env = "MODELS_DIR")]
        models_dir: Option<PathBuf>,
    },

    /// Train a model on a CSV or Excel file
    Train {
        /// Input data file (.csv, .xlsx, .xls)
        #[arg(short, long)]
        data: PathBuf,

        /// What to predict, in plain language
        #[arg(short, long, default_value = "")]
        prompt: String,

        /// Target column; skips prompt parsing
        #[arg(short, long)]
        target: Option<String>,

        /// Task type (classification, regression)
        #[arg(long)]
        task: Option<String>,

        /// Metric to optimize (Accuracy, F1, R2, RMSE, ...)
        #[arg(short, long)]
        metric: Option<String>,
    },

    /// Score one row with a saved model
    Predict {
        /// Model identifier as shown by `models`
        #[arg(short, long)]
        model: String,

        /// Feature values as a JSON object
        #[arg(short, long)]
        features: String,
    },

    /// List saved models
    Models,
}

impl Commands {
    /// Run the command; `None` starts the server.
    pub async fn run(command: Option<Self>, mut config: AppConfig) -> anyhow::Result<()> {
        match command {
            Some(Commands::Serve { host, port, uploads_dir, models_dir }) => {
                if let Some(host) = host { config.host = host; }
                if let Some(port) = port { config.port = port; }
                if let Some(dir) = uploads_dir { config.uploads_dir = dir; }
                if let Some(dir) = models_dir { config.models_dir = dir; }
                cmd_serve(config).await
            }
            Some(Commands::Train { data, prompt, target, task, metric }) => {
                cmd_train(config, data, prompt, target, task, metric).await
            }
            Some(Commands::Predict { model, features }) => cmd_predict(config, &model, &features).await,
            Some(Commands::Models) => cmd_models(config),
            None => cmd_serve(config).await,
        }
    }
}

// ─── Train ─────────────────────────────────────────────────────────────────────

pub async fn cmd_train(
    config: AppConfig,
    data_path: PathBuf,
    prompt: String,
    target: Option<String>,
    task: Option<String>,
    metric: Option<String>,
) -> anyhow::Result<()> {
    section("Train");
    config.ensure_dirs()?;
    let service = AutoMlService::from_config(&config);

    let bytes = std::fs::read(&data_path)?;
    let file_name = data_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    step_run("Training");
    let start = Instant::now();
    let response = service
        .train(TrainCommand {
            prompt,
            file_name,
            bytes,
            target_column: target,
            task_type: task,
            metric,
        })
        .await?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<14} {}", muted("Model"), response.model_name.white().bold());
    println!("  {:<14} {}", muted("Task"), response.task_type);
    println!("  {:<14} {}", muted("Target"), response.target_column);
    println!("  {:<14} {}", muted(&response.metric), format!("{:.4}", response.metric_value).white().bold());
    if let Some(message) = &response.message {
        println!("  {:<14} {}", muted("Agent"), message);
    }

    if let Some(board) = response.leaderboard.as_ref().filter(|b| !b.is_empty()) {
        section("Leaderboard");
        let columns: Vec<&String> = board[0].keys().collect();
        let header: Vec<String> = columns.iter().map(|c| format!("{:>10}", c)).collect();
        println!("  {}", muted(&header.join(" ")));
        for row in board {
            let cells: Vec<String> = columns
                .iter()
                .map(|c| format!("{:>10}", row.get(*c).map(cell).unwrap_or_default()))
                .collect();
            println!("  {}", cells.join(" "));
        }
    }
    println!();
    Ok(())
}

// ─── Predict ───────────────────────────────────────────────────────────────────

pub async fn cmd_predict(config: AppConfig, model: &str, features: &str) -> anyhow::Result<()> {
    section("Predict");
    let features: Map<String, Value> = serde_json::from_str(features)
        .map_err(|e| anyhow::anyhow!("--features must be a JSON object: {}", e))?;

    let service = AutoMlService::from_config(&config);
    let outcome = service.predict(model, features).await?;

    println!("  {:<14} {}", muted("Prediction"), cell(&outcome.prediction).white().bold());
    if let Some(probabilities) = &outcome.probabilities {
        for (class, p) in probabilities {
            println!("  {:<14} {:.4}", muted(class), p);
        }
    }
    println!();
    Ok(())
}

// ─── Models ────────────────────────────────────────────────────────────────────

pub fn cmd_models(config: AppConfig) -> anyhow::Result<()> {
    section("Models");
    let service = AutoMlService::from_config(&config);
    let models = service.list_models()?;
    if models.is_empty() {
        println!("  {}", dim("no saved models"));
    }
    for entry in models {
        println!("  {:<48} {}", entry.name, muted(entry.model_type.as_str()));
    }
    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(config: AppConfig) -> anyhow::Result<()> {
    println!();
    println!("  {}", "AutoML Agent".white().bold());
    println!("  {}", dim(&format!("v{}", env!("CARGO_PKG_VERSION"))));
    println!("  {} http://{}:{}", muted("API   "), config.host, config.port);
    println!("  {} http://{}:{}/health", muted("Health"), config.host, config.port);
    println!("  {}", dim("ctrl+c to stop"));
    println!();

    crate::server::run_server(config).await
}
