//! Metriq CLI
//!
//! Compile, evaluate and replay metric queries against JSON fixtures.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use metriq::alerting::{AlertEngine, AlertPipeline, InMemoryCatalog, LogDispatcher};
use metriq::functions::Function;
use metriq::grammar::{parse, Compiler};
use metriq::graph::GraphObject;
use metriq::models::{ActionRecord, AlertRecord, Metric};
use metriq::query::{Evaluator, QueryKind};
use metriq::store::InMemoryStore;
use metriq::telemetry::{init_logging, Telemetry};

/// Metriq - query language and alerts for time-series metrics
#[derive(Parser)]
#[command(name = "metriq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "METRIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a graph query against a metric fixture
    Graph {
        /// Graph query, e.g. `-1h m("host1", "cpu", "load") | avg(5)`
        query: String,

        /// JSON array of metric samples
        #[arg(long)]
        data: PathBuf,

        /// Evaluate as if it were this time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Work with alert queries
    Alert {
        #[command(subcommand)]
        command: AlertCommands,
    },

    /// Print the parse tree of a query
    Parse {
        /// Graph or alert query
        query: String,
    },

    /// List the functions available to a kind of query
    Functions {
        /// List alert functions instead of graph functions
        #[arg(long)]
        alert: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum AlertCommands {
    /// Compile an alert query and print it
    Check {
        /// Alert query, e.g. `m("host1", "cpu", "load") > 0.9 for 5m do page`
        query: String,
    },

    /// Stream a metric fixture through alert definitions
    Replay {
        /// JSON array of metric samples
        #[arg(long)]
        data: PathBuf,

        /// JSON array of alert records
        #[arg(long)]
        alerts: PathBuf,

        /// JSON array of action records
        #[arg(long)]
        actions: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = match metriq::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging);

    // Execute command
    let result = match cli.command {
        Commands::Graph { query, data, now } => run_graph(&config, &query, &data, now, cli.format),
        Commands::Alert { command } => run_alert(&config, command, cli.format).await,
        Commands::Parse { query } => run_parse(&query),
        Commands::Functions { alert } => {
            run_functions(if alert { QueryKind::Alert } else { QueryKind::Graph }, cli.format)
        }
        Commands::Config => run_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn run_graph(
    config: &metriq::Config,
    query: &str,
    data: &Path,
    now: Option<DateTime<Utc>>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let metrics: Vec<Metric> = read_json(data)?;
    let store = Arc::new(InMemoryStore::from_metrics(&metrics)?);
    info!(samples = store.len(), "Loaded metric fixture");

    let mut compiler = Compiler::new(&config.engine)?;
    if let Some(now) = now {
        compiler = compiler.with_now(now);
    }
    let query = compiler.compile_graph_query(query)?;

    let evaluator = Evaluator::from_store(store)
        .with_config(config.engine.clone())
        .with_telemetry(Telemetry::new("query"));
    let graph = query.execute(&evaluator)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
        OutputFormat::Text => print_graph_text(&graph),
        OutputFormat::Table => print_graph_table(&graph),
    }
    Ok(())
}

fn print_graph_text(graph: &GraphObject) {
    match graph {
        GraphObject::Line { labels, metrics } | GraphObject::Area { labels, metrics } => {
            for (label, points) in labels.iter().zip(metrics) {
                println!("{label}");
                for point in points {
                    println!("  {} {}", point.x, point.y);
                }
            }
        }
        GraphObject::Histogram { labels, metrics } => {
            for (label, buckets) in labels.iter().zip(metrics) {
                println!("{label}");
                for bucket in buckets {
                    println!("  [{}, {}) {}", bucket.x, bucket.x + bucket.dx, bucket.y);
                }
            }
        }
    }
}

fn print_graph_table(graph: &GraphObject) {
    println!("{:<40} {:>16} {:>16}", "SERIES", "X", "Y");
    match graph {
        GraphObject::Line { labels, metrics } | GraphObject::Area { labels, metrics } => {
            for (label, points) in labels.iter().zip(metrics) {
                for point in points {
                    println!("{label:<40} {:>16} {:>16.4}", point.x, point.y);
                }
            }
        }
        GraphObject::Histogram { labels, metrics } => {
            for (label, buckets) in labels.iter().zip(metrics) {
                for bucket in buckets {
                    println!("{label:<40} {:>16.4} {:>16}", bucket.x, bucket.y);
                }
            }
        }
    }
}

async fn run_alert(config: &metriq::Config, command: AlertCommands, format: OutputFormat) -> anyhow::Result<()> {
    let compiler = Compiler::new(&config.engine)?;

    match command {
        AlertCommands::Check { query } => {
            let alert = compiler.compile_alert_query(&query)?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "metric": alert.metric_id(),
                        "trigger": alert.trigger(),
                        "action": alert.action_name(),
                    }))?
                ),
                OutputFormat::Text | OutputFormat::Table => println!("{alert}"),
            }
        }
        AlertCommands::Replay { data, alerts, actions } => {
            let mut metrics: Vec<Metric> = read_json(&data)?;
            let alerts: Vec<AlertRecord> = read_json(&alerts)?;
            let actions: Vec<ActionRecord> = read_json(&actions)?;
            metrics.sort_by_key(|m| m.value.timestamp);

            let catalog = Arc::new(InMemoryCatalog::with_records(alerts, actions));
            let mut queries = Vec::new();
            for record in catalog.enabled_alerts() {
                match compiler.compile_alert_query(&record.query) {
                    Ok(query) => queries.push(query.with_alert_id(record.alert_id)),
                    Err(e) => warn!(alert_id = record.alert_id, error = %e, "Skipping invalid alert"),
                }
            }

            let engine = Arc::new(AlertEngine::new(catalog, Arc::new(LogDispatcher)));
            engine.add_or_update_alert_queries(queries);

            let pipeline = AlertPipeline::new(config.alerting.clone(), Arc::clone(&engine));
            let runner = pipeline.start();
            let feeder = async {
                let submitted = pipeline.submit_batch(metrics).await;
                pipeline.close();
                submitted
            };
            let (run, submitted) = tokio::join!(runner, feeder);
            run?;

            let stats = pipeline.stats();
            println!(
                "Replayed {} samples through {} alerts, {} triggers",
                submitted?,
                engine.get_active_queries().len(),
                stats.triggered
            );
        }
    }
    Ok(())
}

fn run_parse(query: &str) -> anyhow::Result<()> {
    let tree = parse(query)?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn run_functions(kind: QueryKind, format: OutputFormat) -> anyhow::Result<()> {
    let names: Vec<&str> = Function::available(kind).into_iter().map(Function::name).collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&names)?),
        OutputFormat::Text | OutputFormat::Table => {
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}

fn run_config(config: &metriq::Config) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
