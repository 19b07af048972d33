//! ImpactLab CLI: download, analyze and data management commands.
//!
//! Commands:
//! - `download`: fetch one-minute candles from T-Bank Invest and store them as CSV
//! - `analyze`: fit the square-root impact law per ticker, save reports and plots
//! - `data status`: list stored tickers with candle counts, time ranges and sizes

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use impactlab_core::data::{
    download_tickers, CandleStore, DownloadRequest, DownloadWindow, StdoutProgress,
    SyntheticSpec, TBankProvider,
};
use impactlab_runner::{
    analyze_synthetic, analyze_tickers, api_token, format_summary, save_artifacts,
    ImpactLabConfig, TickerOutcome, TOKEN_ENV,
};

#[derive(Parser)]
#[command(
    name = "impactlab",
    about = "ImpactLab CLI: square-root market impact law on T-Bank minute candles"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./impactlab.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one-minute candles and store them as CSV.
    Download {
        /// Tickers to download (e.g., SBER FLOT). Defaults to the configured list.
        tickers: Vec<String>,

        /// Days of history to fetch, ending now.
        #[arg(long)]
        days_back: Option<u32>,

        /// Trading mode the tickers belong to (e.g., TQBR).
        #[arg(long)]
        class_code: Option<String>,

        /// Keep tickers that already have a CSV file instead of refreshing them.
        #[arg(long, default_value_t = false)]
        skip_existing: bool,

        /// Data directory for CSV files.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Fit the impact law for stored tickers.
    Analyze {
        /// Tickers to analyze. Defaults to the configured list.
        tickers: Vec<String>,

        /// Requested number of volume bins.
        #[arg(long)]
        bins: Option<usize>,

        /// Lower edge of the accepted alpha band.
        #[arg(long)]
        alpha_min: Option<f64>,

        /// Upper edge of the accepted alpha band.
        #[arg(long)]
        alpha_max: Option<f64>,

        /// r² must exceed this for a confirmation.
        #[arg(long)]
        r2_min: Option<f64>,

        /// Data directory holding the CSV files.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Output directory for reports and plots.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Skip plot rendering.
        #[arg(long, default_value_t = false)]
        no_plot: bool,

        /// Analyze generated square-root-law candles instead of stored data.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Stored data management.
    Data {
        #[command(subcommand)]
        action: DataAction,
    },
}

#[derive(Subcommand)]
enum DataAction {
    /// Report stored tickers, candle counts, time ranges and file sizes.
    Status {
        /// Data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ImpactLabConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging.level);

    match cli.command {
        Commands::Download {
            tickers,
            days_back,
            class_code,
            skip_existing,
            data_dir,
        } => {
            let mut config = config;
            if !tickers.is_empty() {
                config.data.tickers = tickers;
            }
            if let Some(days) = days_back {
                config.download.days_back = days;
            }
            if let Some(code) = class_code {
                config.download.class_code = code;
            }
            if let Some(dir) = data_dir {
                config.data.dir = dir;
            }
            run_download(&config, skip_existing)
        }
        Commands::Analyze {
            tickers,
            bins,
            alpha_min,
            alpha_max,
            r2_min,
            data_dir,
            output_dir,
            no_plot,
            synthetic,
        } => {
            let mut config = config;
            if !tickers.is_empty() {
                config.data.tickers = tickers;
            }
            if let Some(bins) = bins {
                config.analysis.bin_count = bins;
            }
            if let Some(v) = alpha_min {
                config.analysis.alpha_min = v;
            }
            if let Some(v) = alpha_max {
                config.analysis.alpha_max = v;
            }
            if let Some(v) = r2_min {
                config.analysis.r2_min = v;
            }
            if let Some(dir) = data_dir {
                config.data.dir = dir;
            }
            if let Some(dir) = output_dir {
                config.analysis.output_dir = dir;
            }
            if no_plot {
                config.analysis.plot = false;
            }
            config.validate()?;
            run_analyze(&config, synthetic)
        }
        Commands::Data { action } => match action {
            DataAction::Status { data_dir } => {
                run_data_status(data_dir.as_deref().unwrap_or(&config.data.dir))
            }
        },
    }
}

/// Log to stderr. `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_download(config: &ImpactLabConfig, skip_existing: bool) -> Result<()> {
    let Some(token) = api_token() else {
        bail!("{TOKEN_ENV} is not set; add it to .env or the environment");
    };

    let provider = TBankProvider::new(config.tbank_config(token))?;
    let store = config.store();
    let request = DownloadRequest {
        tickers: config.data.tickers.clone(),
        window: DownloadWindow::last_days(config.download.days_back),
        skip_existing,
    };

    tracing::info!(
        tickers = ?request.tickers,
        days_back = config.download.days_back,
        class_code = %config.download.class_code,
        dir = %store.data_dir().display(),
        "download requested"
    );

    let summary = download_tickers(
        &provider,
        &store,
        &request,
        &config.retry_policy(),
        &StdoutProgress,
    );

    if !summary.all_succeeded() {
        for (ticker, err) in &summary.errors {
            eprintln!("Error for {ticker}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_analyze(config: &ImpactLabConfig, synthetic: bool) -> Result<()> {
    let analysis = config.analysis_config();
    let tickers = &config.data.tickers;
    let store = config.store();

    let results = if synthetic {
        println!("WARNING: analyzing SYNTHETIC data");
        analyze_synthetic(tickers, &SyntheticSpec::default(), &analysis)
    } else {
        analyze_tickers(&store, tickers, &analysis)
    };

    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(TickerOutcome::Fitted { report, fit }) => {
                println!();
                print!("{}", format_summary(&report));
                let dir = save_artifacts(
                    &report,
                    &fit,
                    &config.analysis.output_dir,
                    config.analysis.plot,
                )
                .with_context(|| format!("saving artifacts for {}", report.ticker))?;
                println!("  Artifacts:     {}", dir.display());
            }
            Ok(TickerOutcome::Insufficient { ticker, reason }) => {
                println!();
                println!("SKIP: {ticker}: insufficient data ({reason})");
            }
            Ok(TickerOutcome::Missing { ticker }) => {
                println!();
                println!(
                    "SKIP: {ticker}: no data at {}; run `impactlab download {ticker}` first",
                    store.candle_path(&ticker).display()
                );
            }
            Err(e) => {
                eprintln!("FAIL: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_data_status(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        println!("Data directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let store = CandleStore::new(data_dir);
    let tickers = store.list()?;
    if tickers.is_empty() {
        println!("No stored tickers in {}", data_dir.display());
        return Ok(());
    }

    let mut total_size: u64 = 0;
    let mut rows: Vec<(String, String, String, String, u64)> = Vec::new();

    for ticker in &tickers {
        let (range, candles, source) = match store.meta(ticker) {
            Some(meta) => (
                format!(
                    "{} to {}",
                    meta.first_time.format("%Y-%m-%d %H:%M"),
                    meta.last_time.format("%Y-%m-%d %H:%M")
                ),
                meta.candle_count.to_string(),
                meta.source.to_string(),
            ),
            None => ("(no meta)".into(), "?".into(), "?".into()),
        };
        let size = file_size(&store.candle_path(ticker));
        total_size += size;
        rows.push((ticker.clone(), candles, range, source, size));
    }

    println!("Data: {}", data_dir.display());
    println!("Tickers: {}", rows.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!(
        "{:<8} {:>9} {:<36} {:<10} {:>10}",
        "Ticker", "Candles", "Time Range (UTC)", "Source", "Size"
    );
    println!("{}", "-".repeat(77));
    for (ticker, candles, range, source, size) in &rows {
        println!(
            "{:<8} {:>9} {:<36} {:<10} {:>10}",
            ticker,
            candles,
            range,
            source,
            format_size(*size)
        );
    }

    Ok(())
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
