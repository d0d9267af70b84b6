use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;

use vessel_config::{AppConfig, HumanDuration};
use vessel_runtime::tracing_init::init_tracing;
use vessel_runtime::{Engine, StartOptions};

#[derive(Parser)]
#[command(name = "vessel-engine", about = "Vessel notification engine")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "./config.toml")]
    config: PathBuf,

    /// Delete the consumer group and purge all state-store containers
    /// before starting, then consume from the beginning of the topic.
    #[arg(long)]
    reset: bool,

    /// Start consuming from the beginning of the topic instead of the
    /// committed offset (implied by --reset).
    #[arg(long)]
    from_beginning: bool,

    /// Print partition count, backlog, discovery cardinalities, and active
    /// rule count, then exit without starting the engine.
    #[arg(long)]
    info: bool,

    /// Enable the Prometheus metrics endpoint.
    #[arg(long)]
    metrics: bool,

    /// Override the metrics listen address (e.g. "0.0.0.0:9901").
    #[arg(long)]
    metrics_listen: Option<String>,

    /// Override the metrics summary/report interval (e.g. "30s", "1m").
    #[arg(long)]
    metrics_interval: Option<String>,

    /// Increase log verbosity; repeatable (-v, -vv, -vvv). Ignored when
    /// RUST_LOG is set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", cli.config.display()))?;
    let mut config = AppConfig::load(&config_path)?;
    let base_dir = config_path
        .parent()
        .expect("config path must have a parent directory")
        .to_path_buf();

    if cli.verbose > 0 && std::env::var("RUST_LOG").is_err() {
        config.logging.level = match cli.verbose {
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };
    }

    if cli.metrics || cli.metrics_listen.is_some() || cli.metrics_interval.is_some() {
        config.metrics.enabled = true;
    }
    if let Some(listen) = cli.metrics_listen {
        config.metrics.listen = listen;
    }
    if let Some(interval) = cli.metrics_interval {
        config.metrics.report_interval = HumanDuration::from_str(&interval)
            .map_err(|e| anyhow::anyhow!("invalid --metrics-interval '{interval}': {e}"))?;
    }

    let _guard = init_tracing(&config.logging, &base_dir)?;

    if cli.info {
        return print_info(config).await;
    }

    let options = StartOptions {
        reset: cli.reset,
        from_beginning: cli.from_beginning,
    };
    let engine = Engine::start(config, options)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(domain = "sys", "vessel engine started");

    vessel_runtime::signal::wait_for_signal(engine.cancel_token()).await;
    engine.shutdown();
    engine.wait().await.map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}

/// `--info`: a read-only snapshot of backlog, discovery cardinalities, and
/// the active rule count, printed without starting the consumer loop or any
/// background task.
async fn print_info(config: AppConfig) -> Result<()> {
    let consumer = vessel_runtime::metadata_consumer(&config.kafka).map_err(|e| anyhow::anyhow!("{e}"))?;
    let partitions = vessel_runtime::partition_count(&consumer, &config.kafka.topic)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let backlog = vessel_runtime::total_backlog(&consumer, &config.kafka.topic)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let store = vessel_runtime::store::StateStore::connect(&config.redis)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let counts = store.discovery_counts().await.map_err(|e| anyhow::anyhow!("{e}"))?;

    let pool = vessel_runtime::connect_postgres(&config.postgres)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let catalog = vessel_runtime::catalog::RuleCatalog::bootstrap(pool)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let active_rules = catalog.snapshot().active_rule_count();

    println!("topic:              {}", config.kafka.topic);
    println!("consumer group:     {}", config.kafka.group_id);
    println!("partitions:         {partitions}");
    println!("backlog:            {backlog}");
    println!("active rules:       {active_rules}");
    println!("discovered vessels: {}", counts.vessels);
    println!("discovered destinations: {}", counts.destinations);
    println!("discovered areas:        {}", counts.areas);
    println!("discovered areas (L1):   {}", counts.areas_level1);
    println!("discovered vessel types:   {}", counts.vessel_types);
    println!("discovered vessel classes: {}", counts.vessel_classes);
    println!("discovered voyage statuses: {}", counts.voyage_statuses);

    Ok(())
}
