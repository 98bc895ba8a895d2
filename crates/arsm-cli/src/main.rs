//! Command-line monitor for 433 MHz temperature/humidity sensors.

mod pinouts;
mod shutdown;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arsm_core::config::env_vars;
use arsm_core::simulator::DEFAULT_MESSAGE_INTERVAL;
use arsm_core::{BoardLayout, ListenerRegistry, MonitorConfig, SensorReading, SimulatedDecoder};
use clap::Parser;
use tokio::sync::Notify;

const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Acu-Rite temperature/humidity monitor.
#[derive(Parser, Debug)]
#[command(name = "arsm")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pin to monitor, e.g. `27`, `13p` or `2w`.
    #[arg(short, long)]
    pin: Option<String>,

    /// Print the pin conversion tables and exit.
    #[arg(long)]
    pinouts: bool,

    /// Stop after this many readings.
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Seconds between simulated transmissions.
    #[arg(long, default_value_t = DEFAULT_MESSAGE_INTERVAL.as_secs())]
    interval: u64,

    /// Configuration file with a `[pins]` table.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;
    let resolver = config.resolver(detect_layout());

    if args.pinouts {
        print!("{}", pinouts::render(&resolver));
        return Ok(());
    }

    let address = resolver.parse_str(args.pin.as_deref().unwrap_or_default());
    let decoder = Arc::new(SimulatedDecoder::new());
    let registry = ListenerRegistry::new(decoder.clone(), resolver);

    let done = Arc::new(Notify::new());
    let received = Arc::new(AtomicU64::new(0));
    let limit = args.count;

    let handle = registry.clone();
    let finished = done.clone();
    registry
        .add_listener(address, move |reading, id| {
            print_reading(reading);
            let seen = received.fetch_add(1, Ordering::SeqCst) + 1;
            if limit.is_some_and(|limit| seen >= limit) {
                handle.remove_listener(id);
                finished.notify_one();
            }
        })
        .with_context(|| format!("Failed to monitor pin {}", address))?;

    println!("Awaiting humidity/temperature data on pin {}...", address);
    tracing::info!(category = "cli", pin = %address, layout = %resolver.layout(), "Monitor started");

    let transmitter = decoder.spawn_periodic(Duration::from_secs(args.interval.max(1)));

    tokio::select! {
        _ = shutdown::shutdown_signal() => {}
        _ = done.notified() => {
            tracing::info!(category = "cli", "Reading limit reached");
        }
    }

    shutdown::release(&registry, &decoder);
    transmitter.abort();
    Ok(())
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "arsm=debug" } else { "arsm=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<MonitorConfig> {
    let Some(path) = path else {
        return Ok(MonitorConfig::load());
    };

    let config = MonitorConfig::from_file(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    match config {
        Some(config) => Ok(config),
        None => {
            tracing::warn!(category = "config", path = %path.display(), "No [pins] table, using environment");
            Ok(MonitorConfig::from_env())
        }
    }
}

/// Board layout from `/proc/cpuinfo`, if this is a Raspberry Pi.
fn detect_layout() -> Option<BoardLayout> {
    let cpuinfo = match std::fs::read_to_string(CPUINFO_PATH) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(category = "cli", error = %e, "Cannot read {}", CPUINFO_PATH);
            return None;
        }
    };

    let layout = BoardLayout::from_cpuinfo(&cpuinfo);
    match layout {
        Some(layout) => tracing::debug!(category = "cli", layout = %layout, "Detected board layout"),
        None => tracing::warn!(category = "cli", "No board revision found, assuming {}", BoardLayout::default()),
    }
    layout
}

fn print_reading(reading: &SensorReading) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    if reading.is_dead_air() {
        println!("{}: dead air", timestamp);
        return;
    }

    match serde_json::to_string(reading) {
        Ok(json) => println!("{}: {}", timestamp, json),
        Err(e) => tracing::warn!(category = "cli", error = %e, "Failed to format reading"),
    }
}
