use clap::{Parser, Subcommand};
use rn_core::ChannelId;
use rn_node::{Node, NodeError, load_yaml};
use rn_store::{SampleStore, StoreError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Node(#[from] NodeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "rn-cli")]
#[command(about = "Regulation node - PID/on-off control with bounded sample logging", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a node configuration file
    Validate {
        /// Path to the node YAML file
        config_path: PathBuf,
    },
    /// Run a node against its simulated plants
    Run {
        /// Path to the node YAML file
        config_path: PathBuf,
        /// Number of control-loop ticks to run
        #[arg(long, default_value_t = 100)]
        ticks: u64,
        /// Tick at the configured cadence on a loop thread instead of a
        /// virtual clock
        #[arg(long)]
        realtime: bool,
    },
    /// Print the retained rows of one channel from a JSONL store
    Dump {
        /// Path to the store file
        store_path: PathBuf,
        /// Channel ID
        channel_id: ChannelId,
    },
}

fn main() -> CliResult<()> {
    // RUST_LOG selects the level (env-filter feature)
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Run {
            config_path,
            ticks,
            realtime,
        } => cmd_run(&config_path, ticks, realtime),
        Commands::Dump {
            store_path,
            channel_id,
        } => cmd_dump(&store_path, channel_id),
    }
}

fn cmd_validate(config_path: &Path) -> CliResult<()> {
    println!("Validating node: {}", config_path.display());
    let config = load_yaml(config_path)?;
    println!("✓ Configuration is valid");
    println!("  cadence: {} ms", config.cadence_ms);
    for channel in &config.channels {
        let regulator = match &channel.regulator {
            Some(r) => format!("{} {} goal {}", r.mode, r.direction, r.goal),
            None => "log only".to_string(),
        };
        println!(
            "  channel {} - every {} ms, {} rows max, {}",
            channel.id, channel.prog.period_ms, channel.prog.max_rows, regulator
        );
    }
    Ok(())
}

fn cmd_run(config_path: &Path, ticks: u64, realtime: bool) -> CliResult<()> {
    let config = load_yaml(config_path)?;
    let node = Arc::new(Node::from_config(&config)?);
    eprintln!(
        "Running {} channel(s) for {} tick(s) at {} ms",
        node.channels().len(),
        ticks,
        config.cadence_ms
    );

    let end = if realtime {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = node.spawn_loop(stop.clone());
        let cadence = node.cadence();
        for _ in 0..ticks {
            std::thread::sleep(cadence);
        }
        stop.store(true, Ordering::Relaxed);
        if handle.join().is_err() {
            tracing::error!("control loop thread panicked");
        }
        Instant::now()
    } else {
        node.run_for(Instant::now(), ticks)
    };

    let snapshot = node.snapshot(end);
    node.shutdown();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn cmd_dump(store_path: &Path, channel_id: ChannelId) -> CliResult<()> {
    let store = SampleStore::open_jsonl(store_path)?;
    let rows = store.rows(channel_id)?;
    if rows.is_empty() {
        println!("No rows for channel {}", channel_id);
        return Ok(());
    }
    println!("timestamp,value,outcome");
    for row in rows {
        println!(
            "{},{},{}",
            row.timestamp.to_rfc3339(),
            row.value,
            row.outcome.code()
        );
    }
    Ok(())
}
