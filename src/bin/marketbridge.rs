//! CLI entrypoint for the market-data bridge.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use marketbridge::config::{generate_commented_config_template, Config};
use marketbridge::engine::{FeedTarget, Supervisor};
use marketbridge::publisher::{LogPublisher, Publisher};
use marketbridge::utils::init_logging;

#[derive(Debug, Parser)]
#[command(name = "marketbridge", author, version, about = "Market-data feed to Kafka bridge", long_about = None)]
struct Args {
    /// Path to a configuration file (TOML); environment variables still apply
    #[arg(short, long, env = "MARKETBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Default log level when MARKETBRIDGE_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the default configuration to stdout and exit
    #[arg(long)]
    print_default_config: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream the feed into Kafka (the default)
    Run {
        /// Log envelopes instead of publishing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Write a commented configuration template
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "marketbridge.toml")]
        config: PathBuf,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level);

    if args.print_default_config {
        println!("{}", Config::default_toml()?);
        return Ok(());
    }

    match args.command {
        | Some(Command::Init { config, force }) => {
            if config.exists() && !force {
                eprintln!("Config file {} exists. Use --force to overwrite.", config.display());
                std::process::exit(1);
            }
            generate_commented_config_template(&config)
                .with_context(|| format!("Failed to write {}", config.display()))?;
            println!("Wrote configuration template to {}", config.display());
            Ok(())
        }
        | Some(Command::Run { dry_run }) => run_service(args.config.as_deref(), dry_run).await,
        | None => run_service(args.config.as_deref(), false).await,
    }
}

async fn run_service(config_path: Option<&std::path::Path>, dry_run: bool) -> Result<()> {
    let config = Config::load(config_path).with_context(|| match config_path {
        | Some(path) => format!("Failed to load configuration from {}", path.display()),
        | None => "Failed to load configuration".to_string(),
    })?;
    config.validate().context("Invalid configuration")?;

    let target = FeedTarget::from_config(&config)?;
    log::info!(
        "Feed WS: {} | symbols={:?} | Kafka: {:?} topic={} | dry_run={}",
        target.endpoint,
        config.symbols(),
        config.kafka.brokers,
        config.kafka.topic,
        dry_run
    );

    let publisher: Box<dyn Publisher> = if dry_run {
        Box::new(LogPublisher::new(config.kafka.topic.clone()))
    } else {
        kafka_publisher(&config)?
    };
    let supervisor = Supervisor::new(target, publisher, config.backoff_policy());

    tokio::select! {
        _ = supervisor.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("Shutdown signal received. Stopping...");
        }
    }

    supervisor.publisher().flush().await.context("Failed to flush publisher")?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn kafka_publisher(config: &Config) -> Result<Box<dyn Publisher>> {
    let publisher = marketbridge::publisher::KafkaPublisher::new(&config.kafka)?;
    Ok(Box::new(publisher))
}

#[cfg(not(feature = "kafka"))]
fn kafka_publisher(_config: &Config) -> Result<Box<dyn Publisher>> {
    anyhow::bail!("built without the `kafka` feature; rerun with `run --dry-run`")
}
