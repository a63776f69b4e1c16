use anyhow::Context;
use api_client::BinanceClient;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{Config, init_tracing, load_config};
use core_types::{FIVE_MINUTES, MarketSnapshot, round_to_five_minutes};
use database::{ChunkedRetryWriter, DbRepository, connect, run_migrations};
use engine::{
    CycleSummary, ScanCycle, Stopped, StrategyResult, parse_recorded_prices, record_snapshot,
    replay_files, run_every,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// The main entry point for the market scanner.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; DATABASE_URL may come from the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from '{}'", cli.config))?;
    let _log_guard = init_tracing(&config.logging).context("Failed to initialise logging")?;

    let app = App::connect(config).await?;

    match cli.command {
        Commands::Record => {
            app.record().await?;
        }
        Commands::Replay(args) => app.replay(args).await?,
        Commands::Scan(args) => {
            let timestamp = args.at.map(round_to_five_minutes).unwrap_or_else(current_frame);
            let summary = app.cycle.run(timestamp).await;
            print_summary(&summary);
        }
        Commands::Run => app.run_forever().await,
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Scans recorded market snapshots for momentum and paper-trades the results.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all ticker prices and store them as the current five-minute snapshot.
    Record,
    /// Load recorded `binance_prices_*.json` files into the snapshot store.
    Replay(ReplayArgs),
    /// Run one scan cycle.
    Scan(ScanArgs),
    /// Record and scan every five minutes until interrupted.
    Run,
}

#[derive(Parser)]
struct ReplayArgs {
    /// Directory holding the price files.
    #[arg(long, default_value = "binancePrices")]
    dir: PathBuf,

    /// Run a scan cycle after each replayed snapshot.
    #[arg(long)]
    scan: bool,
}

#[derive(Parser)]
struct ScanArgs {
    /// Epoch seconds of the frame to scan; rounded to five minutes. Defaults to now.
    #[arg(long)]
    at: Option<i64>,
}

// ==============================================================================
// Application wiring
// ==============================================================================

struct App {
    client: Arc<BinanceClient>,
    store: Arc<DbRepository>,
    writer: ChunkedRetryWriter,
    cycle: ScanCycle,
}

impl App {
    async fn connect(config: Config) -> anyhow::Result<Self> {
        let pool = connect(config.database.max_connections)
            .await
            .context("Failed to connect to the database")?;
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        let store = Arc::new(DbRepository::new(
            pool,
            config.database.read_timeout(),
            config.database.write_timeout(),
        ));
        let client = Arc::new(
            BinanceClient::new(&config.api).context("Failed to build the exchange client")?,
        );
        let writer = ChunkedRetryWriter::new(
            config.writer.chunk_size,
            config.writer.max_retries,
            config.writer.backoff_unit(),
        );
        let cycle = ScanCycle::new(store.clone(), client.clone(), config.scanner, writer.clone());

        Ok(Self {
            client,
            store,
            writer,
            cycle,
        })
    }

    /// Records the current frame and returns its timestamp.
    async fn record(&self) -> anyhow::Result<i64> {
        let timestamp = current_frame();
        let prices = self
            .client
            .fetch_all_prices()
            .await
            .context("Failed to fetch ticker prices")?;
        let snapshot = MarketSnapshot::new(timestamp, prices);
        record_snapshot(self.store.as_ref(), &self.writer, &snapshot)
            .await
            .context("Failed to store snapshot")?;
        Ok(timestamp)
    }

    async fn replay(&self, args: ReplayArgs) -> anyhow::Result<()> {
        let files = replay_files(&args.dir)?;
        tracing::info!(
            files = files.len(),
            dir = %args.dir.display(),
            "Replaying recorded prices."
        );

        let progress_bar = ProgressBar::new(files.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                .progress_chars("#>-"),
        );

        for file in files {
            progress_bar.set_message(format!("{}", file.display()));
            let snapshots = match tokio::fs::read_to_string(&file).await {
                Ok(contents) => parse_recorded_prices(&contents),
                Err(e) => Err(engine::EngineError::Replay(e.to_string())),
            };
            let snapshots = match snapshots {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    tracing::error!(
                        file = %file.display(),
                        error = %e,
                        "Skipping unreadable price file."
                    );
                    progress_bar.inc(1);
                    continue;
                }
            };

            for snapshot in snapshots {
                record_snapshot(self.store.as_ref(), &self.writer, &snapshot)
                    .await
                    .with_context(|| format!("Failed to store snapshot {}", snapshot.timestamp))?;
                if args.scan {
                    let summary = self.cycle.run(snapshot.timestamp).await;
                    tracing::info!(
                        timestamp = summary.timestamp,
                        active = summary.active_count,
                        liquid = summary.liquid_count,
                        strategies = summary.runs.len(),
                        "Replay cycle finished."
                    );
                }
            }
            progress_bar.inc(1);
        }

        progress_bar.finish_with_message("Replay complete!");
        Ok(())
    }

    /// Records and scans every five minutes until ctrl-c. The signal also
    /// interrupts a cycle that is still waiting on open paper trades.
    async fn run_forever(&self) {
        let period = Duration::from_secs(FIVE_MINUTES as u64);
        match run_every(period, tokio::signal::ctrl_c(), || self.record_and_scan()).await {
            Stopped::Idle => tracing::info!("Shutdown requested."),
            Stopped::Interrupted => {
                tracing::warn!("Shutdown requested; abandoned the running cycle.")
            }
        }
    }

    async fn record_and_scan(&self) {
        match self.record().await {
            Ok(timestamp) => {
                let summary = self.cycle.run(timestamp).await;
                print_summary(&summary);
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Recording failed; skipping this frame.")
            }
        }
    }
}

fn current_frame() -> i64 {
    round_to_five_minutes(chrono::Utc::now().timestamp())
}

fn print_summary(summary: &CycleSummary) {
    println!(
        "\nFrame {}: {} pairs, {} active, {} liquid",
        summary.timestamp, summary.snapshot_size, summary.active_count, summary.liquid_count
    );
    if let Some(report) = &summary.activity_report {
        println!(
            "Average gain {}% (top A {}%, top B {}%, top C {}%)",
            report.avg_gain, report.top_a_gain, report.top_b_gain, report.top_c_gain
        );
    }
    if summary.runs.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Strategy", "Symbol", "Result", "Change %", "Balance"]);
    for run in &summary.runs {
        let symbol = run.symbol.clone().unwrap_or_else(|| "-".to_string());
        let row = match &run.result {
            StrategyResult::Traded(outcome) => vec![
                run.strategy.clone(),
                symbol,
                outcome.outcome.to_string(),
                outcome.percentage_change.to_string(),
                outcome.updated_balance.round_dp(2).to_string(),
            ],
            StrategyResult::NoCandidate => placeholder_row(&run.strategy, symbol, "no candidate"),
            StrategyResult::Skipped(reason) => {
                placeholder_row(&run.strategy, symbol, &format!("skipped: {reason}"))
            }
            StrategyResult::Failed(reason) => {
                placeholder_row(&run.strategy, symbol, &format!("failed: {reason}"))
            }
        };
        table.add_row(row);
    }
    println!("{table}");
}

fn placeholder_row(strategy: &str, symbol: String, result: &str) -> Vec<String> {
    vec![strategy.to_string(), symbol, result.to_string(), "-".into(), "-".into()]
}
