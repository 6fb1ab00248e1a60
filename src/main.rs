use bgloop::{BackgroundLoop, LoopConfig, LoopState};
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging(config: &Config) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bgloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("bgloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let level = config.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => handle_run_command(config, None, None, None).await,
        Some(Commands::Run {
            heartbeat_ms,
            actions,
            duration_ms,
        }) => handle_run_command(config, *heartbeat_ms, *actions, *duration_ms).await,
        Some(Commands::Config) => handle_config_command(config),
    }
}

/// Activity observed during one demo run
#[derive(Debug, Default)]
struct RunSummary {
    ticks: AtomicUsize,
    actions: AtomicUsize,
    failures: AtomicUsize,
}

async fn handle_run_command(
    config: &Config,
    heartbeat_ms: Option<u64>,
    actions: Option<usize>,
    duration_ms: Option<u64>,
) -> Result<()> {
    let mut loop_config: LoopConfig = config.background_loop.clone();
    if let Some(ms) = heartbeat_ms {
        loop_config = loop_config.with_heartbeat(Duration::from_millis(ms));
    }
    let actions = actions.unwrap_or(config.demo.actions);
    let duration = Duration::from_millis(duration_ms.unwrap_or(config.demo.duration_ms));
    let stop_timeout = Duration::from_millis(config.demo.stop_timeout_ms);

    info!("Running loop '{}' for {:?} with {} actions", loop_config.name, duration, actions);

    let lp = BackgroundLoop::with_config(&loop_config);
    let summary = Arc::new(RunSummary::default());

    let counts = Arc::clone(&summary);
    lp.on_tick(move |_, _| {
        counts.ticks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    });
    let counts = Arc::clone(&summary);
    lp.on_thread_exception(move |_, event| {
        counts.failures.fetch_add(1, Ordering::Relaxed);
        eprintln!("{} {} (while {})", "Loop failure:".red(), event.error, event.state);
    });
    lp.on_stopping(|lp| {
        info!("Loop '{}' is stopping", lp.name());
        Ok(())
    });

    let started = Instant::now();
    lp.start_async().await.context("Failed to start background loop")?;
    println!(
        "{} '{}' (heartbeat {:?})",
        "Started:".green(),
        lp.name(),
        lp.heartbeat()
    );

    for _ in 0..actions {
        let counts = Arc::clone(&summary);
        lp.begin_invoke(move || {
            counts.actions.fetch_add(1, Ordering::Relaxed);
        });
    }
    lp.invoke_async(|| {})
        .await
        .context("Failed to flush submitted actions")?;

    tokio::time::sleep(duration.saturating_sub(started.elapsed())).await;

    lp.stop_async(stop_timeout)
        .await
        .context("Failed to stop background loop")?;

    let state = lp.current_state();
    println!("{} after {:?}", "Stopped".green(), started.elapsed());
    println!("  Ticks:    {}", summary.ticks.load(Ordering::Relaxed));
    println!("  Actions:  {}", summary.actions.load(Ordering::Relaxed));
    println!("  Failures: {}", summary.failures.load(Ordering::Relaxed));
    if state != LoopState::None {
        println!("  {} {}", "Final state:".yellow(), state);
    }
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    info!("Printing effective configuration");
    println!("{}", config.to_yaml()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the level is known
    setup_logging(&config).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
