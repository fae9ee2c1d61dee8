//! NeuroDrive CLI
//!
//! Real-time driving behavior classification and session reports.

use anyhow::Context;
use clap::{Parser, Subcommand};
use neurodrive::{
    config::Config,
    core::{load_model, Classifier, ReportGenerator, StreamPipeline},
    storage::{JsonlStore, MemoryStore, SampleStore, SharedStore},
    telemetry::ClassifiedSample,
    transparency::create_shared_log_with_persistence,
    ProcessOutcome, VERSION,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "neurodrive")]
#[command(author = "NeuroDrive")]
#[command(version = VERSION)]
#[command(about = "Real-time driving behavior classification from inertial sensors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the telemetry server
    #[cfg(feature = "server")]
    Serve {
        /// Address to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Model file (overrides config)
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Replay recorded sample events (JSON Lines) through a fresh pipeline
    Replay {
        /// File with one sample event per line
        file: PathBuf,

        /// Driver named in the final report
        #[arg(long)]
        driver: Option<String>,

        /// Model file (overrides config)
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Generate a report from the persisted driving log
    Report {
        /// Driver named in the report
        #[arg(long)]
        driver: Option<String>,

        /// Only include rows at or after this epoch-millisecond timestamp
        #[arg(long)]
        since: Option<i64>,
    },

    /// Show the most recent rows of the driving log
    Recent {
        /// Number of rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Clear the persisted driving log
    Reset,

    /// Show pipeline statistics
    Status,

    /// Show configuration
    Config,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve { host, port, model } => cmd_serve(host, port, model),
        Commands::Replay {
            file,
            driver,
            model,
        } => cmd_replay(&file, driver, model),
        Commands::Report { driver, since } => cmd_report(driver, since),
        Commands::Recent { limit } => cmd_recent(limit),
        Commands::Reset => cmd_reset(),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("neurodrive=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config ({e}), using defaults");
        Config::default()
    })
}

fn open_log(config: &Config) -> anyhow::Result<SharedStore> {
    let store = JsonlStore::open(config.log_path())
        .with_context(|| format!("opening driving log {:?}", config.log_path()))?;
    Ok(Arc::new(store))
}

fn build_classifier(config: &Config, model: Option<PathBuf>) -> Classifier {
    let model_path = model.unwrap_or_else(|| config.model_path.clone());
    match load_model(&model_path) {
        Ok(model) => Classifier::new(model),
        Err(e) => {
            eprintln!("Warning: Failed to load model {model_path:?}: {e}");
            eprintln!("Running without predictions.");
            Classifier::new(None)
        }
    }
}

#[cfg(feature = "server")]
fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    model: Option<PathBuf>,
) -> anyhow::Result<()> {
    use neurodrive::server::{self, ServerConfig};

    let mut config = load_config();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let timezone = config.timezone()?;
    let store = open_log(&config)?;
    let stats = create_shared_log_with_persistence(config.stats_path());
    let classifier = build_classifier(&config, model);

    println!("NeuroDrive v{VERSION}");
    println!();
    println!("  Window length: {} samples", config.sequence_length);
    println!(
        "  Model: {}",
        if classifier.has_model() {
            "loaded"
        } else {
            "not loaded (collecting only)"
        }
    );
    println!("  Driving log: {:?}", config.log_path());
    println!();

    let pipeline = StreamPipeline::new(config.sequence_length, classifier, store.clone())
        .with_stats(stats.clone());
    let reports = ReportGenerator::new(store, timezone);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (addr, shutdown_tx) =
            server::run(ServerConfig::from_config(&config), pipeline, reports).await?;
        println!("Listening on http://{addr} (WebSocket at ws://{addr}/ws)");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        println!();
        println!("Shutting down...");
        let _ = shutdown_tx.send(());
        // Let in-flight connections drain.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        anyhow::Ok(())
    })?;

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save pipeline stats: {e}");
    }
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_replay(file: &Path, driver: Option<String>, model: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config();
    let timezone = config.timezone()?;
    let store: SharedStore = Arc::new(MemoryStore::new());
    let classifier = build_classifier(&config, model);
    let mut pipeline = StreamPipeline::new(config.sequence_length, classifier, store.clone());

    let reader = std::io::BufReader::new(
        std::fs::File::open(file).with_context(|| format!("opening {file:?}"))?,
    );

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: serde_json::Value = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("Line {}: not JSON ({e})", index + 1);
                continue;
            }
        };

        match pipeline.process(&raw) {
            ProcessOutcome::Processed(result) => print_row(&result.sample),
            ProcessOutcome::Dropped(reason) => {
                eprintln!("Line {}: dropped ({reason})", index + 1);
            }
        }
    }

    println!();
    println!("{}", pipeline.stats().summary());
    println!();

    // Recorded timestamps predate this run, so report over the whole replay.
    let driver = driver.unwrap_or_else(|| config.default_driver_name.clone());
    let reports = ReportGenerator::new(store, timezone);
    println!("{}", reports.generate_since(i64::MIN, &driver));
    Ok(())
}

fn cmd_report(driver: Option<String>, since: Option<i64>) -> anyhow::Result<()> {
    let config = load_config();
    let reports = ReportGenerator::new(open_log(&config)?, config.timezone()?);
    let driver = driver.unwrap_or_else(|| config.default_driver_name.clone());

    println!("{}", reports.generate_since(since.unwrap_or(i64::MIN), &driver));
    Ok(())
}

fn cmd_recent(limit: usize) -> anyhow::Result<()> {
    let config = load_config();
    let store = open_log(&config)?;
    let rows = store.recent(limit)?;

    if rows.is_empty() {
        println!("The driving log is empty.");
        println!("Run 'neurodrive serve' and start the simulator to collect data.");
        return Ok(());
    }

    println!("Last {} predictions:", rows.len());
    for row in &rows {
        print_row(row);
    }
    Ok(())
}

fn cmd_reset() -> anyhow::Result<()> {
    let config = load_config();
    let store = open_log(&config)?;
    let removed = store.len()?;
    store.clear()?;
    println!("Cleared {removed} rows from the driving log.");
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config();

    println!("NeuroDrive Status");
    println!("=================");
    println!();
    println!(
        "Model: {}",
        if config.model_path.exists() {
            "installed"
        } else {
            "not installed"
        }
    );
    println!("  Path: {:?}", config.model_path);
    println!();

    match JsonlStore::open_existing(config.log_path()).map(|store| store.len()) {
        Some(Ok(rows)) => println!("Driving log: {rows} rows"),
        Some(Err(e)) => println!("Driving log: unavailable ({e})"),
        None => println!("Driving log: not created yet"),
    }
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let stats = create_shared_log_with_persistence(stats_path);
        println!("{}", stats.summary());
    } else {
        println!("No previous server statistics found.");
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_row(row: &ClassifiedSample) {
    println!(
        "[{}] class {} | {:<15} | speed {:>6.1} km/h",
        row.timestamp(),
        row.predicted_class,
        row.risk_level.as_str(),
        row.sample.speed
    );
}
