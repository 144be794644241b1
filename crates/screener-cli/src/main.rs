//! screener - two-stage stock screening pipeline
//!
//! Scores every instrument in a snapshot through a chat-model oracle,
//! runs a deeper analysis on the top scorers and writes one JSON report.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use screener_core::{LogLevel, ProgressContext, init_logging};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "screener")]
#[command(about = "Rate-limited two-stage stock screening pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./screener.toml or ~/.config/screener/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Score a snapshot, analyze the top K and write a report
    Run(cmd::run::RunArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ProgressContext::new());

    // TTY: bars show activity, logs go above them
    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    init_logging(LogLevel::from_flags(cli.quiet, cli.debug), multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let p = &config.pipeline;
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Batch size", &p.batch_size.to_string()]);
            table.add_row(vec![
                "Max concurrent requests",
                &p.max_concurrent_requests.to_string(),
            ]);
            table.add_row(vec![
                "Min request interval",
                &format!("{}ms", p.min_request_interval_ms),
            ]);
            table.add_row(vec![
                "Retries",
                &format!("{} (base delay {}ms)", p.retry_count, p.retry_base_delay_ms),
            ]);
            table.add_row(vec!["Call timeout", &format!("{}s", p.call_timeout_secs)]);
            table.add_row(vec!["Top K", &p.top_k.to_string()]);
            table.add_row(vec!["Oracle base URL", &config.oracle.base_url]);
            table.add_row(vec![
                "API key",
                if config.oracle.has_api_key() {
                    "configured"
                } else {
                    "not set"
                },
            ]);
            table.add_row(vec!["Rating model", &config.oracle.rating_model]);
            table.add_row(vec!["Analysis model", &config.oracle.analysis_model]);
            table.add_row(vec![
                "Report directory",
                &config.output.dir.display().to_string(),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
