//! DriveWatch command line.
//!
//! Three entry points: `analyze-trip`, `evaluate` and `evaluate-range`.
//! Exit code 0 on success; any error prints a single JSON line on stderr
//! and exits 1.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dw_analysis::analyze_trip;
use dw_eval::{
    default_report_id, load_ground_truth, load_predictions, run_eval, run_eval_for_date_range,
    EvalConfig,
};
use dw_models::AnalysisConfig;
use dw_queue::JobRegistry;

#[derive(Parser)]
#[command(name = "drivewatch", about = "Driver monitoring trip analysis and evaluation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one uploaded trip and write its report
    AnalyzeTrip {
        /// Trip id under the upload directory
        trip_id: String,
    },
    /// Evaluate predictions against ground truth
    Evaluate {
        /// Path to the ground truth JSON
        #[arg(long)]
        gt: PathBuf,
        /// Predictions JSON file or reports directory
        #[arg(long)]
        pred: PathBuf,
        /// Temporal IoU threshold
        #[arg(long, default_value_t = 0.30)]
        iou: f64,
        /// Center-distance tolerance in milliseconds
        #[arg(long = "tolerance-ms", default_value_t = 1_200)]
        tolerance_ms: i64,
        /// Calibration bucket count
        #[arg(long, default_value_t = 10)]
        bins: usize,
        /// Directory where evaluation reports are written
        #[arg(long, default_value = "eval_reports")]
        outdir: PathBuf,
    },
    /// Evaluate completed trips reported within a date range
    EvaluateRange {
        /// Path to the ground truth JSON
        #[arg(long)]
        gt: PathBuf,
        /// First report date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last report date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 0.30)]
        iou: f64,
        #[arg(long = "tolerance-ms", default_value_t = 1_200)]
        tolerance_ms: i64,
        #[arg(long, default_value_t = 10)]
        bins: usize,
        #[arg(long, default_value = "eval_reports")]
        outdir: PathBuf,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AnalysisConfig::from_env();

    match cli.command {
        Command::AnalyzeTrip { trip_id } => {
            let registry = JobRegistry::new();
            let (job, _cancel) = registry.submit(&trip_id);
            registry.mark_running(&job.id)?;

            let registry_for_progress = registry.clone();
            let job_id = job.id.clone();
            let result = analyze_trip(&config, &trip_id, &mut |progress, message| {
                let _ = registry_for_progress.update_progress(&job_id, progress, message);
            })
            .await;
            registry.release_handle(&job.id);

            match result {
                Ok(report) => {
                    registry.complete(&job.id)?;
                    let summary = json!({
                        "trip_id": report.trip_id,
                        "status": report.status,
                        "overall_score": report.scores.overall_score,
                        "total_events": report.events.len(),
                        "duration_seconds": report.trip.duration_seconds,
                        "limitations": report.limitations,
                    });
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(())
                }
                Err(e) => {
                    registry.fail(&job.id, e.to_string())?;
                    Err(e.into())
                }
            }
        }
        Command::Evaluate {
            gt,
            pred,
            iou,
            tolerance_ms,
            bins,
            outdir,
        } => {
            let eval_config = EvalConfig {
                iou_threshold: iou,
                tolerance_ms,
                bins,
            };
            let gt_events = load_ground_truth(&gt)?;
            let pred_events = load_predictions(&pred)?;
            let trip_ids: BTreeSet<String> = gt_events
                .iter()
                .chain(pred_events.iter())
                .map(|e| e.trip_id.clone())
                .collect();

            let report_id = default_report_id("eval");
            let summary = run_eval(
                &gt_events,
                &pred_events,
                eval_config,
                &outdir,
                &report_id,
                &trip_ids,
            )?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::EvaluateRange {
            gt,
            from,
            to,
            iou,
            tolerance_ms,
            bins,
            outdir,
        } => {
            let eval_config = EvalConfig {
                iou_threshold: iou,
                tolerance_ms,
                bins,
            };
            let report_id = default_report_id("eval_range");
            let summary = run_eval_for_date_range(
                &gt,
                std::path::Path::new(&config.report_dir),
                from,
                to,
                eval_config,
                &outdir,
                &report_id,
            )?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}


#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dw=info,drivewatch=info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting drivewatch");

    if let Err(e) = run(cli).await {
        eprintln!("{}", json!({ "detail": e.to_string() }));
        std::process::exit(1);
    }
}
