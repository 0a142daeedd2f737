//! sql-replay CLI - differential replay of captured SQL statements.

use clap::{Args, Parser, Subcommand};
use sql_replay::{Config, Orchestrator, ReplayError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// Exit code of a successful run that found inconsistent statements.
const EXIT_INCONSISTENT: u8 = 5;

#[derive(Parser)]
#[command(name = "sql-replay")]
#[command(about = "Replay captured SQL statements against a MySQL-compatible engine and compare results")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (defaults and flags only when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the loaded configuration.
#[derive(Args, Default)]
struct Overrides {
    /// Corpus store host
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Corpus store port
    #[arg(short = 'P', long, global = true)]
    port: Option<u16>,

    /// Corpus store user
    #[arg(short = 'U', long, global = true)]
    user: Option<String>,

    /// Corpus store password
    #[arg(long, global = true, env = "SQL_REPLAY_PASSWD", hide_env_values = true)]
    passwd: Option<String>,

    /// Target engine host
    #[arg(long, global = true)]
    tihost: Option<String>,

    /// Target engine port
    #[arg(long, global = true)]
    tiport: Option<u16>,

    /// Target engine user
    #[arg(long, global = true)]
    tiuser: Option<String>,

    /// Target engine password
    #[arg(long, global = true, env = "SQL_REPLAY_TIPASSWD", hide_env_values = true)]
    tipasswd: Option<String>,

    /// Statements per batch
    #[arg(long, global = true)]
    batch_size: Option<u64>,

    /// Batches replayed concurrently
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Directory for per-batch log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.source.host = host;
        }
        if let Some(port) = self.port {
            config.source.port = port;
        }
        if let Some(user) = self.user {
            config.source.user = user;
        }
        if let Some(password) = self.passwd {
            config.source.password = password;
        }
        if let Some(host) = self.tihost {
            config.target.host = host;
        }
        if let Some(port) = self.tiport {
            config.target.port = port;
        }
        if let Some(user) = self.tiuser {
            config.target.user = user;
        }
        if let Some(password) = self.tipasswd {
            config.target.password = password;
        }
        if let Some(batch_size) = self.batch_size {
            config.replay.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.replay.workers = Some(workers);
        }
        if let Some(dir) = self.log_dir {
            config.replay.log_dir = Some(dir);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the corpus against the target and print the summary
    Run {
        /// Exit with code 5 when any statement is inconsistent
        #[arg(long)]
        fail_on_inconsistent: bool,
    },

    /// Count the corpus and show the batch plan without touching the target
    Plan,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, ReplayError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format).map_err(ReplayError::Config)?;

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };
    cli.overrides.apply(&mut config);
    config.validate()?;
    let config = config.with_auto_tuning();

    match cli.command {
        Commands::Run {
            fail_on_inconsistent,
        } => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run().await;
            orchestrator.close().await;
            let summary = result?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                println!("\nReplay completed!");
                println!("  Run ID: {}", summary.run_id);
                println!("  Duration: {:.2}s", summary.duration_seconds);
                println!("  Batches: {}", summary.batches);
                println!("\nSummary:");
                println!("\ttotal: {}", summary.total);
                println!("\tsuccess count: {}", summary.consistent);
                println!("\tfail count: {}", summary.inconsistent);
                println!("\tfiltered count: {}", summary.filtered);
                if summary.skipped > 0 {
                    println!("\tskipped count: {}", summary.skipped);
                }
            }

            if fail_on_inconsistent && summary.inconsistent > 0 {
                return Ok(ExitCode::from(EXIT_INCONSISTENT));
            }
        }

        Commands::Plan => {
            let orchestrator = Orchestrator::for_plan(config).await?;
            let plan = orchestrator.plan().await;
            orchestrator.close().await;
            let plan = plan?;

            if cli.output_json {
                println!("{}", plan.to_json()?);
            } else {
                println!("Replay plan:");
                println!("  Corpus size: {}", plan.corpus_size);
                println!("  Batch size: {}", plan.batch_size);
                println!("  Workers: {}", plan.workers);
                println!("  Batches: {}", plan.batches.len());
                for (batch, schema) in plan.batches.iter().zip(plan.schemas()) {
                    println!(
                        "    #{:<4} offset {:>10}  size {:>6}  schema {}",
                        batch.index, batch.offset, batch.size, schema
                    );
                }
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::for_health_check(config).await;
            let result = orchestrator.health_check().await?;
            orchestrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (corpus): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                if let Some(size) = result.corpus_size {
                    println!("    Statements: {}", size);
                }
                println!(
                    "  Target (engine under test): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Ok(ExitCode::from(result.exit_code()));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
