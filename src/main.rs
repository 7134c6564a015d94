// src/main.rs
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use serialscope::drivers::describe_ports;
use serialscope::{update_channel, Acquisition, AcquisitionConfig, ConnectionMode, WindowSnapshot};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(
    name = "serialscope",
    version,
    about = "Live rolling window of numbers printed by a serial device, one per line"
)]
struct Cli {
    /// Serial port to open (e.g. COM3, /dev/ttyACM0)
    #[arg(short, long, env = "SERIALSCOPE_PORT")]
    port: Option<String>,

    /// Line speed in baud
    #[arg(short, long)]
    baud: Option<u32>,

    /// Number of most recent samples kept
    #[arg(long)]
    capacity: Option<usize>,

    /// JSON config file; flags given on the command line override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use a synthetic temperature signal instead of a device
    #[arg(long)]
    simulate: bool,

    /// Print available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Stop after this many seconds (default: run until the device goes away)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Defaults, then the JSON file at `file` if any, then flags from `cli`.
fn build_config(file: Option<&Path>, cli: &Cli) -> Result<AcquisitionConfig> {
    let base = match file {
        Some(path) => AcquisitionConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AcquisitionConfig::default(),
    };
    apply_overrides(base, cli)
}

fn apply_overrides(mut config: AcquisitionConfig, cli: &Cli) -> Result<AcquisitionConfig> {
    if let Some(port) = &cli.port {
        config.address = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    if let Some(capacity) = cli.capacity {
        config.window_capacity = capacity;
    }
    if cli.simulate {
        config.mode = ConnectionMode::Simulation;
    }
    config.validate()?;
    Ok(config)
}

fn print_ports() -> Result<()> {
    let ports = describe_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available ports:");
        for port in ports {
            println!("  {port}");
        }
    }
    Ok(())
}

fn print_summary(window: &WindowSnapshot) {
    let Some(latest) = window.latest() else {
        return;
    };
    let (min, max) = window.value_range().unwrap_or((latest.value, latest.value));
    println!(
        "t={:>9.3}s  value={:>9.3}  n={:>4}/{}  min={:.3}  max={:.3}",
        latest.elapsed_seconds,
        latest.value,
        window.len(),
        window.capacity,
        min,
        max
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if cli.list_ports {
        return print_ports();
    }

    let config = build_config(cli.config.as_deref(), &cli)?;
    let source = match config.mode {
        ConnectionMode::Hardware => config.address.clone(),
        ConnectionMode::Simulation => "simulated device".to_owned(),
    };
    let (updates, notices) = update_channel();
    let mut acquisition = Acquisition::new(config, updates)?;
    acquisition
        .start()
        .with_context(|| format!("could not start acquisition on {source}"))?;

    let deadline = cli
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        match notices.recv_timeout(POLL_INTERVAL) {
            Ok(_) => print_summary(&acquisition.current_window()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if acquisition.is_finished() {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    let outcome = acquisition.stop();
    let stats = acquisition.stats();
    info!(
        "{} samples accepted, {} lines skipped, {} coalesced updates",
        stats.accepted,
        stats.skipped,
        notices.coalesced()
    );
    outcome.with_context(|| format!("acquisition on {source} failed"))?;
    Ok(())
}
