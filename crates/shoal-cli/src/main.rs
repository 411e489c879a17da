//! Shoal CLI
//!
//! Runs a Shoal actor runtime against a simulated keyed workload.

mod account;

use account::{Account, AccountStats, Command, Deposit, Withdraw};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shoal_core::{init_telemetry, ShoalConfig, TelemetryConfig};
use shoal_runtime::{SimpleActorsRuntime, SmartActors};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shoal CLI
#[derive(Parser, Debug)]
#[command(name = "shoal")]
#[command(about = "In-process keyed actor runtime")]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML); built-in defaults when omitted
    #[arg(short, long, global = true, env = "SHOAL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a stream of deposits and withdrawals to account actors
    Run {
        /// Number of distinct account keys
        #[arg(long, default_value_t = 100)]
        keys: u32,

        /// Total number of messages to send
        #[arg(long, default_value_t = 10_000)]
        messages: u64,

        /// Idle time after which an account may be evicted (milliseconds)
        #[arg(long, default_value_t = 2_000)]
        idle_ms: u64,

        /// Keep the sweep running this long after the workload (milliseconds)
        #[arg(long, default_value_t = 0)]
        linger_ms: u64,

        /// Process messages in the sending thread instead of the blocking pool
        #[arg(long)]
        direct: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    init_telemetry(TelemetryConfig::new("shoal").with_log_level(level))?;

    let config = match &cli.config {
        Some(path) => ShoalConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ShoalConfig::default(),
    };

    match cli.command {
        Commands::Run {
            keys,
            messages,
            idle_ms,
            linger_ms,
            direct,
        } => {
            anyhow::ensure!(keys > 0, "--keys must be greater than 0");
            let workload = Workload {
                keys,
                messages,
                idle_after: Duration::from_millis(idle_ms),
                linger: Duration::from_millis(linger_ms),
                direct,
            };
            run_workload(config, workload).await
        }
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

struct Workload {
    keys: u32,
    messages: u64,
    idle_after: Duration,
    linger: Duration,
    direct: bool,
}

async fn run_workload(config: ShoalConfig, workload: Workload) -> Result<()> {
    let runtime = if workload.direct {
        SimpleActorsRuntime::direct(config.runtime.clone())?
    } else {
        SimpleActorsRuntime::executor(config.runtime.clone())?
    };
    runtime.start()?;

    let stats = Arc::new(AccountStats::default());
    let dispatcher = Arc::new(account::dispatcher());
    let accounts = {
        let stats = stats.clone();
        let idle_after = workload.idle_after;
        SmartActors::with_factory_fn(
            runtime.clone(),
            config.smart_actors.clone(),
            move |key: &u32| Account::new(*key, idle_after, dispatcher.clone(), stats.clone()),
        )?
    };
    accounts.start()?;

    tracing::info!(
        keys = workload.keys,
        messages = workload.messages,
        direct = workload.direct,
        "Workload starting"
    );

    let started = Instant::now();
    let mut retries = 0u64;
    for i in 0..workload.messages {
        let key = (i % u64::from(workload.keys)) as u32;
        let amount = i % 7 + 1;
        loop {
            let command: Command = if i % 3 == 2 {
                Box::new(Withdraw(amount))
            } else {
                Box::new(Deposit(amount))
            };
            match accounts.send_message(&key, command) {
                Ok(()) => break,
                Err(e) if e.is_retriable() => {
                    retries += 1;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err(e) => return Err(e).context("failed to send command"),
            }
        }
    }

    while runtime.pending_messages() > 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let elapsed = started.elapsed();

    if !workload.linger.is_zero() {
        tokio::time::sleep(workload.linger).await;
    }

    println!("Workload complete in {:?}", elapsed);
    println!("  processed:     {}", stats.processed.load(Ordering::Relaxed));
    println!("  created:       {}", stats.created.load(Ordering::Relaxed));
    println!("  evicted:       {}", stats.evicted.load(Ordering::Relaxed));
    println!("  overdrafts:    {}", stats.overdrafts.load(Ordering::Relaxed));
    println!("  send retries:  {}", retries);
    println!("  live accounts: {}", accounts.len());
    println!(
        "  ping batch:    {} every {} ms",
        accounts.last_ping_batch_size(),
        accounts.last_ping_batch_period_ms()
    );

    if !accounts.stop().await? {
        tracing::warn!("Not every account was destroyed before the shutdown deadline");
    }
    if !runtime.stop().await {
        tracing::warn!("Runtime stopped with pending messages");
    }
    Ok(())
}
