use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use stagehand::demo::build_demo_container;
use stagehand::{LifecycleEvent, LogFormat, StagehandConfig, StagehandError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Drive a set of singleton components through a dependency-ordered lifecycle")]
#[command(version)]
#[command(long_about = "Registers the demo components (logger, settings, server and optional \
metrics), orders every lifecycle milestone by its dependencies, runs the startup pass and, \
on Ctrl+C or SIGTERM, tears everything down in reverse order.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, help = "Path to TOML configuration file (default: stagehand.toml)")]
    config: Option<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the container")]
    validate_config: bool,

    /// Print effective configuration and exit
    #[arg(long, help = "Print the effective configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - plan but don't run anything
    #[arg(long, help = "Print the planned milestone order as JSON and exit")]
    dry_run: bool,

    /// Stop right after startup instead of waiting for a signal
    #[arg(long, help = "Tear down immediately after a successful startup")]
    once: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => StagehandConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => StagehandConfig::load().context("Failed to load configuration")?,
    };

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    // Held until main returns so the file writer flushes
    let _guard = init_logging(&args, &config)?;

    info!("Starting stagehand v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration file: {}",
        args.config.as_deref().unwrap_or("stagehand.toml")
    );

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        return Ok(ExitCode::FAILURE);
    }
    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    let mut container = build_demo_container(&config).map_err(|e| {
        error!("Failed to register components: {}", e);
        e
    })?;

    if args.dry_run {
        let plan = container.describe_plan()?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(ExitCode::SUCCESS);
    }

    let events = tokio::spawn(forward_events(container.subscribe()));

    let report = match container.start() {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to start container: {}", e);
            if let Err(teardown) = container.stop() {
                warn!("Cleanup after failed startup was incomplete: {}", teardown);
            }
            return Err(e.into());
        }
    };
    info!(
        "Container '{}' started: {} milestones, {} executions",
        container.name(),
        report.milestones,
        report.invoked.len()
    );

    if !args.once {
        wait_for_shutdown().await;
    }

    let exit_code: u8 = match container.stop() {
        Ok(report) => {
            info!("Stopped {} components", report.stopped().len());
            0
        }
        Err(StagehandError::Teardown(report)) => {
            error!("Teardown failed: {}", report.summary());
            1
        }
        Err(e) => return Err(e.into()),
    };

    drop(container);
    if let Err(e) = events.await {
        debug!("Event forwarder ended abnormally: {}", e);
    }

    info!("stagehand exited with code: {}", exit_code);
    Ok(ExitCode::from(exit_code))
}

/// Mirror lifecycle events into the log until the container goes away
async fn forward_events(mut receiver: broadcast::Receiver<LifecycleEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => debug!(event = event.event_type(), "{}", event.description()),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Event forwarder lagged, missed {} events", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn wait_for_shutdown() {
    info!("Running, press Ctrl+C to stop");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT signal (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Received SIGTERM signal"),
                }
                return;
            }
            Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT signal (Ctrl+C)"),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}

fn init_logging(args: &Args, config: &StagehandConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        config.logging.level.as_str()
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stagehand={}", log_level)));

    let format = match args.log_format.as_deref() {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        Some(other) => {
            eprintln!("Warning: Unknown log format '{}', using {}", other, config.logging.format);
            config.logging.format
        }
        None => config.logging.format,
    };

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
    };

    let (file_layer, guard) = match &config.logging.directory {
        Some(directory) => {
            let (writer, guard) = file_writer(directory);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Daily-rotated `stagehand.log` in `directory`; lines are flushed when the guard drops
fn file_writer(directory: &str) -> (NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(directory, "stagehand.log");
    tracing_appender::non_blocking(appender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_file_log_is_flushed_when_guard_drops() {
        let dir = tempfile::tempdir().unwrap();
        let directory = dir.path().to_string_lossy().into_owned();

        let (writer, guard) = file_writer(&directory);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            info!("Stopped 3 components");
        });
        drop(guard);

        let contents: String = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(contents.contains("Stopped 3 components"));
    }

    #[test]
    fn test_config_path_is_optional() {
        let args = Args::try_parse_from(["stagehand", "--once"]).unwrap();
        assert!(args.config.is_none());

        let args = Args::try_parse_from(["stagehand", "-c", "edge.toml"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("edge.toml"));
    }
}
