//! `screener run` - score a snapshot, analyze the top K, write the report

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use screener_core::{SharedProgress, cancel_on_ctrl_c, fmt_num};
use screener_oracle::LlmOracle;
use screener_pipeline::{
    Collaborators, NoSentiment, PipelineConfig, PipelineController, RunOutcome, RunReport,
    SentimentOracle,
};
use screener_store::{JsonReportSink, SnapshotSource, report_fingerprint, short_hash};

use crate::config::Config;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON snapshot of work items
    pub snapshot: PathBuf,

    /// Number of top scorers to analyze in depth
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Maximum concurrent oracle calls
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Items per scoring batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Retries for transient failures
    #[arg(long)]
    pub retries: Option<u32>,

    /// Minimum milliseconds between oracle calls
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Report directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Skip the sentiment oracle and keep the analysis's own section
    #[arg(long)]
    pub no_sentiment: bool,
}

impl RunArgs {
    /// Config file values with CLI overrides applied.
    fn pipeline_config(&self, config: &Config) -> PipelineConfig {
        let mut cfg = config.pipeline.to_pipeline_config();
        if let Some(k) = self.top_k {
            cfg.top_k = k;
        }
        if let Some(n) = self.concurrency {
            cfg.max_concurrent_requests = n;
        }
        if let Some(n) = self.batch_size {
            cfg.batch_size = n;
        }
        if let Some(n) = self.retries {
            cfg.retry_count = n;
        }
        if let Some(ms) = self.interval_ms {
            cfg.min_request_interval = Duration::from_millis(ms);
        }
        cfg
    }
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let pipeline = args.pipeline_config(config);
    pipeline.validate()?;
    let oracle_config = config.oracle.to_oracle_config()?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.dir.clone());

    let sink = JsonReportSink::new(&output_dir);
    let stale = sink
        .cleanup_tmp()
        .with_context(|| format!("failed to clean {}", output_dir.display()))?;
    if stale > 0 {
        log::info!("Removed {stale} stale tmp files");
    }

    let oracle = Arc::new(LlmOracle::new(&oracle_config));
    let sentiment: Arc<dyn SentimentOracle> = if args.no_sentiment {
        Arc::new(NoSentiment)
    } else {
        oracle.clone()
    };
    let collaborators = Collaborators {
        source: Arc::new(SnapshotSource::new(&args.snapshot)),
        scoring: oracle.clone(),
        analysis: oracle,
        sentiment,
        sink: Arc::new(sink),
    };

    log::info!(
        "Models: rating={}, analysis={}",
        oracle_config.rating_model,
        oracle_config.analysis_model
    );

    let controller = PipelineController::new(pipeline, collaborators, progress.clone())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let outcome = runtime.block_on(async {
        let watcher = cancel_on_ctrl_c(controller.cancellation_token());
        let result = controller.run().await;
        watcher.abort();
        result
    })?;

    print_summary(&outcome)?;
    Ok(())
}

fn print_summary(outcome: &RunOutcome) -> Result<()> {
    let report = &outcome.report;
    let summary = &report.summary;
    let fingerprint = report_fingerprint(report).context("failed to hash report")?;

    println!();
    println!("=== Run Summary ===");
    println!(
        "Scored:    {} ({} ok, {} degraded, {} label overrides)",
        fmt_num(summary.total),
        fmt_num(summary.succeeded),
        fmt_num(summary.degraded),
        summary.label_overrides
    );
    println!(
        "Analyzed:  {} ({} degraded)",
        summary.detailed, summary.detailed_degraded
    );
    println!(
        "Elapsed:   {:.1}s (scoring {:.2}s/item, analysis {:.2}s/item)",
        outcome.stats.total_elapsed.as_secs_f64(),
        outcome.stats.avg_scoring().as_secs_f64(),
        outcome.stats.avg_analysis().as_secs_f64()
    );
    println!(
        "Report:    {} ({})",
        outcome.report_path.display(),
        short_hash(&fingerprint)
    );

    if summary.detailed > 0 {
        println!("\n{}", top_table(report));
    }
    Ok(())
}

/// Table of the detailed (top-K) entries.
fn top_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Rank").fg(Color::Cyan),
            Cell::new("Code").fg(Color::Cyan),
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Score").fg(Color::Cyan),
            Cell::new("Label").fg(Color::Cyan),
            Cell::new("Analysis").fg(Color::Cyan),
        ]);

    for entry in report.detailed_entries() {
        let analysis = match &entry.detailed {
            Some(d) if d.succeeded => "ok",
            _ => "fallback",
        };
        table.add_row(vec![
            Cell::new(entry.rank),
            Cell::new(&entry.score.item_id),
            Cell::new(entry.score.name.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.1}", entry.score.score)),
            Cell::new(entry.score.label),
            Cell::new(analysis),
        ]);
    }
    table
}
