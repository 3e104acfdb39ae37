//! Crop yield CLI module
//!
//! Command-line interface for running the evaluation pipeline and inspecting
//! datasets and presets.

use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ColumnMap, PipelineConfig, Preset};
use crate::data::{load_dataset, Feature};
use crate::evaluation::EvaluationReport;
use crate::pipeline::Pipeline;
use crate::report::FileReporter;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "crop-yield")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sugarcane yield regression: fit, evaluate and report")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the evaluation pipeline
    Run {
        /// Preset (linear, svr, xgb, xgb-extended, temporal-svr)
        #[arg(short, long, default_value = "linear")]
        preset: String,

        /// JSON configuration file; replaces the preset
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dataset CSV, overriding the configured path
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output directory (charts go to <dir>/images)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Write the metrics table only
        #[arg(long)]
        no_plots: bool,
    },

    /// Print a preset configuration as JSON
    Config {
        /// Preset (linear, svr, xgb, xgb-extended, temporal-svr)
        #[arg(short, long, default_value = "linear")]
        preset: String,
    },

    /// Show dataset summary
    Info {
        /// Dataset CSV
        #[arg(short, long, default_value = "data/dataset_unificado.csv")]
        data: PathBuf,
    },
}

/// Resolve the configuration a `run` invocation asks for
pub fn resolve_config(
    preset: &str,
    config: Option<&Path>,
    data: Option<&Path>,
    output_dir: Option<&Path>,
    no_plots: bool,
) -> anyhow::Result<PipelineConfig> {
    let mut resolved = match config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => preset.parse::<Preset>()?.config(),
    };
    if let Some(path) = data {
        resolved = resolved.with_data_path(path);
    }
    if let Some(dir) = output_dir {
        resolved.output = resolved.output.with_dir(dir);
    }
    if no_plots {
        resolved.output = resolved.output.with_plots(false);
    }
    resolved.validate()?;
    Ok(resolved)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(config: PipelineConfig) -> anyhow::Result<()> {
    section(&format!("Run · {}", config.name));

    println!("  {:<12} {}", muted("Data"), config.data_path.display());
    println!("  {:<12} {}", muted("Model"), config.model);
    println!("  {:<12} {:?}", muted("Split"), config.split);
    println!();

    step_run("Fitting and evaluating");
    let start = Instant::now();
    let mut reporter = FileReporter::new(config.output.clone());
    let report = Pipeline::new(config).run(&mut reporter)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&report);

    for path in reporter.written() {
        step_ok(&format!("{}", path.display()));
    }
    println!();
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!();
    for row in &report.rows {
        println!("  {}", row.split.white().bold());
        println!("  {:<16} {}", muted("MAE"), format!("{:.2} ton/ha", row.metrics.mae).white());
        println!("  {:<16} {}", muted("MSE"), format!("{:.2}", row.metrics.mse).white());
        println!("  {:<16} {}", muted("R²"), format!("{:.4}", row.metrics.r2).white().bold());
        if let Some(cv) = row.cv_r2 {
            println!("  {:<16} {}", muted("R² (cv)"), format!("{:.4}", cv).white());
        }
    }

    if !report.skipped_years.is_empty() {
        println!();
        println!(
            "  {} {:?}",
            "skipped years (empty partition):".yellow(),
            report.skipped_years
        );
    }

    if !report.feature_importances.is_empty() {
        println!();
        println!("  {}", "Feature importance".white().bold());
        let mut sorted = report.feature_importances.clone();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (name, value) in sorted {
            println!("  {:<24} {:>8.4}", muted(&name), value);
        }
    }
    println!();
}

pub fn cmd_config(preset: &str) -> anyhow::Result<()> {
    let config = preset.parse::<Preset>()?.config();
    println!("{}", config.to_json()?);
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let columns = ColumnMap::default();
    let dataset = load_dataset(data_path, &columns)?;
    let years = dataset.years();

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Records"), dataset.len());
    match (years.first(), years.last()) {
        (Some(first), Some(last)) => {
            println!("  {:<12} {}–{} ({} years)", muted("Years"), first, last, years.len())
        }
        _ => println!("  {:<12} {}", muted("Years"), dim("unknown")),
    }
    println!();

    println!(
        "  {:<26} {:>10} {:>10} {:>10}",
        muted("Feature"),
        muted("Mean"),
        muted("Min"),
        muted("Max")
    );
    println!("  {}", dim(&"─".repeat(60)));
    for summary in dataset.summary(&Feature::EXTENDED) {
        println!(
            "  {:<26} {:>10.3} {:>10.3} {:>10.3}",
            summary.feature.label(&columns),
            summary.mean,
            summary.min,
            summary.max
        );
    }
    println!();
    Ok(())
}
