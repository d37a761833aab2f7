//! Offline demo runner: drives a full deliberation against the
//! deterministic in-process providers and prints the resulting reports.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use deliberation::{
    offline_toolkit, AnalystKind, OfflineCompletionClient, Pipeline, RunConfig, SituationMemory,
};

#[derive(Debug, Parser)]
#[command(
    name = "deliberation",
    about = "Run a staged trading deliberation with offline providers"
)]
struct Cli {
    /// Ticker to analyze.
    #[arg(long, default_value = "NVDA")]
    ticker: String,

    /// Trade date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// Analysts to run: market, sentiment, news, fundamentals.
    #[arg(long, value_delimiter = ',', default_value = "market,sentiment,news,fundamentals")]
    analysts: Vec<AnalystKind>,

    /// Research debate rounds (bull + bear turns per round).
    #[arg(long, default_value_t = 1)]
    debate_rounds: u32,

    /// Risk debate rounds (three turns per round).
    #[arg(long, default_value_t = 1)]
    risk_rounds: u32,

    /// Enable debug logging.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let date = cli
        .date
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

    let config = RunConfig {
        selected_analysts: cli.analysts,
        max_debate_rounds: cli.debate_rounds,
        max_risk_discuss_rounds: cli.risk_rounds,
        ..Default::default()
    };

    let pipeline = Pipeline::new(
        Arc::new(OfflineCompletionClient::new()),
        Arc::new(offline_toolkit(&cli.ticker)),
        Arc::new(SituationMemory::with_default_playbook()),
        config,
    );

    let outcome = pipeline.run(&cli.ticker, &date).await?;

    println!("# Deliberation for {} on {}\n", cli.ticker, date);
    for (section, text) in outcome.state.reports.iter() {
        println!("## {}\n\n{}\n", section, text);
    }
    println!(
        "(run {} — {} research turns, {} risk turns)",
        outcome.state.run_id,
        outcome.state.investment_debate.count,
        outcome.state.risk_debate.count,
    );

    Ok(())
}
