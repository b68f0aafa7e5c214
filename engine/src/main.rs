mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use trinity_agents::SubAgentRegistry;
use trinity_bus::{queues, MessageBus};
use trinity_cost::{SqliteCostTracker, SummaryFilters};
use trinity_patterns::{PatternStore, SqlitePatternStore};
use trinity_roles::{Architect, Executor, StubPatternDetector, Witness};

use config::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "trinity-engine")]
#[command(about = "Headless Trinity Protocol orchestrator")]
struct Cli {
    /// Optional YAML config file; defaults and `TRINITY_*` env vars apply
    /// on top of it (§2: layered configuration loader).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run only the WITNESS perception loop.
    RunWitness,
    /// Run only the ARCHITECT cognition loop.
    RunArchitect,
    /// Run only the EXECUTOR action loop.
    RunExecutor,
    /// Run all three role loops concurrently until interrupted.
    RunAll,
    /// Print bus / pattern store / cost tracker summaries.
    Stats,
    /// Re-emit a stored telemetry report by correlation id for debugging.
    Replay {
        correlation_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())?;

    let process = match cli.command {
        Command::RunWitness => trinity_observability::ProcessKind::Witness,
        Command::RunArchitect => trinity_observability::ProcessKind::Architect,
        Command::RunExecutor => trinity_observability::ProcessKind::Executor,
        _ => trinity_observability::ProcessKind::Engine,
    };
    let _guard = trinity_observability::init_process_logging(process, &config.logs_dir(), config.log_retention_days)
        .context("failed to initialize logging")?;

    let state = State::build(&config).await?;
    log_startup_paths(&config);

    match cli.command {
        Command::RunWitness => {
            let cancel = shutdown_token();
            state.witness.run(cancel).await;
        }
        Command::RunArchitect => {
            let cancel = shutdown_token();
            state.architect.run(cancel).await;
        }
        Command::RunExecutor => {
            let cancel = shutdown_token();
            state.executor.run(cancel).await;
        }
        Command::RunAll => {
            let cancel = shutdown_token();
            let witness = state.witness.clone();
            let architect = state.architect.clone();
            let executor = state.executor.clone();

            let witness_task = tokio::spawn({
                let cancel = cancel.clone();
                async move { witness.run(cancel).await }
            });
            let architect_task = tokio::spawn({
                let cancel = cancel.clone();
                async move { architect.run(cancel).await }
            });
            let executor_task = tokio::spawn({
                let cancel = cancel.clone();
                async move { executor.run(cancel).await }
            });

            let _ = tokio::join!(witness_task, architect_task, executor_task);
        }
        Command::Stats => {
            print_stats(&state).await?;
        }
        Command::Replay { correlation_id } => {
            replay(&state, &correlation_id).await?;
        }
    }

    Ok(())
}

/// Stateless roles only hold `Arc` handles to shared stores (§9), so the
/// whole set can be cloned cheaply into one `tokio::spawn`ed task per role.
struct State {
    witness: Arc<Witness>,
    architect: Arc<Architect>,
    executor: Arc<Executor<trinity_cost::SqliteStorage>>,
    bus: Arc<MessageBus>,
    patterns: Arc<SqlitePatternStore>,
    cost_tracker: Arc<SqliteCostTracker>,
}

impl State {
    async fn build(config: &EngineConfig) -> anyhow::Result<Self> {
        let bus = Arc::new(MessageBus::open(&config.bus_path()).context("failed to open message bus")?);
        let patterns = Arc::new(
            SqlitePatternStore::open(&config.patterns_path())
                .await
                .context("failed to open pattern store")?,
        );
        let cost_tracker =
            Arc::new(SqliteCostTracker::open(&config.cost_path()).context("failed to open cost tracker")?);
        let registry = Arc::new(SubAgentRegistry::new());
        let detector = Arc::new(StubPatternDetector::new());

        let witness = Arc::new(Witness::new(
            bus.clone(),
            patterns.clone(),
            detector,
            config.witness.clone(),
        ));
        let architect = Arc::new(Architect::new(bus.clone(), patterns.clone(), config.architect.clone()));
        let executor = Arc::new(Executor::new(
            bus.clone(),
            registry,
            cost_tracker.clone(),
            config.executor.clone(),
        ));

        Ok(Self {
            witness,
            architect,
            executor,
            bus,
            patterns,
            cost_tracker,
        })
    }
}

/// Cancels on Ctrl-C so `run-all` and single-role invocations can shut down
/// the bus subscription loops cooperatively instead of being killed mid-ack.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "trinity.engine", "shutdown signal received");
            signal_cancel.cancel();
        }
    });
    cancel
}

fn log_startup_paths(config: &EngineConfig) {
    let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("<unknown>"));
    info!(
        target: "trinity.engine",
        "starting trinity-engine: exe={} state_dir={} in_memory={}",
        exe.display(),
        config.state_dir.display(),
        config.in_memory,
    );
}

async fn print_stats(state: &State) -> anyhow::Result<()> {
    let bus_stats = state.bus.stats().await?;
    let pattern_stats = state.patterns.stats().await?;
    let cost_summary = state.cost_tracker.summary(&SummaryFilters::default())?;

    let report = serde_json::json!({
        "bus": bus_stats_to_json(&bus_stats),
        "patterns": pattern_stats,
        "cost": cost_summary,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn bus_stats_to_json(stats: &trinity_bus::BusStats) -> serde_json::Value {
    serde_json::json!({
        "total_messages": stats.total_messages,
        "by_status": stats.by_status,
        "by_queue": stats.by_queue,
        "active_subscribers": stats.active_subscribers,
    })
}

/// Finds every `telemetry_stream` message recorded under `correlation_id`
/// and republishes it, so an operator can re-drive WITNESS over a past
/// report without waiting for the original producer to run again.
async fn replay(state: &State, correlation_id: &str) -> anyhow::Result<()> {
    let messages = state.bus.by_correlation(correlation_id).await?;
    let telemetry: Vec<_> = messages
        .into_iter()
        .filter(|m| m.queue_name == queues::TELEMETRY_STREAM)
        .collect();

    if telemetry.is_empty() {
        println!("no telemetry_stream messages found for correlation_id={correlation_id}");
        return Ok(());
    }

    for message in &telemetry {
        state
            .bus
            .publish(
                queues::TELEMETRY_STREAM,
                message.payload.clone(),
                message.priority,
                message.correlation_id.clone(),
            )
            .await?;
        println!("replayed message id={} priority={}", message.id, message.priority);
    }

    Ok(())
}
