//! CLI entry point for the FreshGraph freshness monitor.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::{watch, RwLock};
use tracing_subscriber::{fmt, EnvFilter};

use freshgraph_core::config::load_section;
use freshgraph_graph::{GraphClient, GraphConfig, MemoryTripleStore, Neo4jTripleStore, TripleStore};
use freshgraph_ontology::{seed, TripleWriter};
use freshgraph_views::search_sync::{MemorySearchIndex, SearchSyncWorker};
use freshgraph_views::{BatchCacheView, BatchRefresher, IncrementalView, OnDemandView, ViewConfig};

use freshgraph_monitor::{FreshnessMonitor, MonitorConfig, Tiers};

#[derive(Parser)]
#[command(name = "freshgraph-monitor")]
#[command(about = "Compare data freshness across the FreshGraph view tiers")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: freshgraph).
    #[arg(short, long, default_value = "freshgraph", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor one order and print its metrics when done.
    Run {
        /// Subject to monitor, e.g. order:FM-1001.
        #[arg(short, long)]
        subject: String,

        /// How long to monitor before printing metrics.
        #[arg(short, long, default_value_t = 30)]
        duration_secs: u64,

        #[arg(short, long, value_enum, default_value = "memory")]
        backend: Backend,

        /// Write the demo order for the subject before monitoring.
        #[arg(long)]
        seed_demo: bool,
    },
    /// Print the FreshMart ontology as JSON.
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Memory,
    Neo4j,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    match cli.command {
        Command::Schema => {
            let ontology = seed::freshmart()?;
            println!("{}", serde_json::to_string_pretty(&ontology.full_schema())?);
        }
        Command::Run {
            subject,
            duration_secs,
            backend,
            seed_demo,
        } => {
            run(
                &cli.config,
                &subject,
                Duration::from_secs(duration_secs),
                backend,
                seed_demo,
            )
            .await?;
        }
    }
    Ok(())
}

async fn run(
    config_prefix: &str,
    subject: &str,
    duration: Duration,
    backend: Backend,
    seed_demo: bool,
) -> anyhow::Result<()> {
    let monitor_config: MonitorConfig = load_section(config_prefix, "monitor")?;
    let view_config: ViewConfig = load_section(config_prefix, "views")?;

    let store: Arc<dyn TripleStore> = match backend {
        Backend::Memory => Arc::new(MemoryTripleStore::new()),
        Backend::Neo4j => {
            let graph_config: GraphConfig = load_section(config_prefix, "neo4j")?;
            let client = GraphClient::connect(&graph_config).await?;
            tracing::info!(uri = %graph_config.uri, "Connected to Neo4j");
            Arc::new(Neo4jTripleStore::connect(client).await?)
        }
    };

    if seed_demo {
        seed_order(store.clone(), subject).await?;
    }

    let on_demand = Arc::new(OnDemandView::new(store.clone()));
    let batch = Arc::new(BatchCacheView::new(store.clone()));
    let initial = batch.refresh().await?;
    tracing::info!(rows = initial.rows, "Batch tier primed");
    let incremental =
        Arc::new(IncrementalView::spawn(store.clone(), view_config.propagation_delay()).await?);

    let (shutdown, shutdown_rx) = watch::channel(false);
    let index = Arc::new(MemorySearchIndex::new());
    let search = Arc::new(SearchSyncWorker::new(
        incremental.clone(),
        index.clone(),
        view_config.search_batch_size,
    ));
    let search_task = {
        let search = search.clone();
        let every = view_config.search_poll_interval();
        tokio::spawn(async move { search.run(every, shutdown_rx).await })
    };

    let tiers = Tiers::new(store, on_demand, batch, incremental.clone());
    let monitor = FreshnessMonitor::new(tiers, monitor_config);
    monitor.start(subject).await;

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    monitor.stop().await;
    let _ = shutdown.send(true);
    if let Err(e) = search_task.await {
        tracing::error!(error = %e, "Search sync task panicked");
    }
    incremental.shutdown().await;
    tracing::info!(documents = index.len().await, "Search index synced");

    println!("{}", serde_json::to_string_pretty(&monitor.metrics().await)?);
    Ok(())
}

/// Write the demo order through the validated write path.
async fn seed_order(store: Arc<dyn TripleStore>, subject: &str) -> anyhow::Result<()> {
    let order_ref = subject.strip_prefix("order:").unwrap_or(subject);
    let ontology = Arc::new(RwLock::new(seed::freshmart()?));
    let writer = TripleWriter::new(ontology, store);

    let outcomes = writer.write_batch(seed::demo_order(order_ref), true).await;
    let written = outcomes.iter().filter(|o| o.is_written()).count();
    if written != outcomes.len() {
        anyhow::bail!(
            "Demo seed rejected: {} of {} triples not written",
            outcomes.len() - written,
            outcomes.len()
        );
    }
    tracing::info!(order = %subject, triples = written, "Demo order seeded");
    Ok(())
}
