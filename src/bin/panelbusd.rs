//! panelbus daemon - dispatches panel lines into typed signal state
//!
//! Reads `<port> <line>` records from stdin, dispatches each line to the
//! panel owning that port, and writes forwarded payloads to stdout as
//! `<port> <json>`. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config (~/.config/panelbus/panelbus.toml)
//! panelbusd run
//!
//! # Run with an explicit config and module-wide resolution
//! panelbusd run --config ./panelbus.toml --scope module
//!
//! # Validate a config and print its panels
//! panelbusd check --config ./panelbus.toml
//!
//! # List known signal names
//! panelbusd oids
//!
//! # Enable debug logging
//! RUST_LOG=panelbusd=debug panelbusd run
//! ```
//!
//! # Shutdown
//!
//! - stdin EOF: every line read is dispatched and forwarded, then every
//!   module disconnects
//! - SIGTERM/SIGINT: stop reading, disconnect every module and exit

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use panelbus_core::Oid;
use panelbus_transport::{LineTransport, Transport};
use panelbusd::config::{resolve_config_path, SystemConfig};
use panelbusd::reporter::{Reporter, TracingReporter};
use panelbusd::runtime::{InboundRouter, LifecycleReport, ModuleRuntime, RoutingTable};

/// panelbus daemon - serial control panel dispatcher
#[derive(Parser, Debug)]
#[command(name = "panelbusd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect every configured module and dispatch stdin
    Run {
        /// Config file (default: $PANELBUS_CONFIG, then the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Signal resolution scope: panel or module
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Validate a config file and print its modules
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the signal catalog
    Oids,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    let command = args.command.unwrap_or(Command::Run {
        config: None,
        scope: None,
    });

    match command {
        Command::Run { config, scope } => run(config, scope),
        Command::Check { config } => check(config),
        Command::Oids => {
            for oid in Oid::ALL {
                println!("{oid}");
            }
            Ok(())
        }
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("panelbusd=info".parse()?)
                .add_directive("panelbus_core=info".parse()?)
                .add_directive("panelbus_protocol=info".parse()?)
                .add_directive("panelbus_transport=info".parse()?),
        )
        .init();
    Ok(())
}

/// Loads the config and applies overrides, CLI flag last.
fn load_config(path: Option<PathBuf>, scope: Option<&str>) -> Result<(PathBuf, SystemConfig)> {
    let path = resolve_config_path(path)
        .ok_or_else(|| anyhow!("No config path given and no user config directory found"))?;
    let mut config = SystemConfig::load(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    config.apply_env_overrides();
    config.apply_scope_override(scope);
    Ok((path, config))
}

fn check(path: Option<PathBuf>) -> Result<()> {
    let (path, config) = load_config(path, None)?;
    let settings = config.settings().context("Invalid runtime settings")?;
    let modules = config.build_modules().context("Invalid module definitions")?;

    println!("{} (scope: {})", path.display(), settings.scope);
    for module in &modules {
        println!("{}", module.name());
        for panel in module.panels() {
            let signals: Vec<&str> = panel.signals().iter().map(Oid::as_str).collect();
            println!(
                "  {} port={} status={} signals=[{}]",
                panel.name(),
                panel.port(),
                if panel.is_enabled() { "on" } else { "off" },
                signals.join(", ")
            );
            if !panel.skipped_signals().is_empty() {
                println!("    skipped: {}", panel.skipped_signals().join(", "));
            }
        }
    }
    Ok(())
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run(path: Option<PathBuf>, scope: Option<String>) -> Result<()> {
    let (path, config) = load_config(path, scope.as_deref())?;
    let settings = config.settings().context("Invalid runtime settings")?;
    let modules = config.build_modules().context("Invalid module definitions")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        config = %path.display(),
        modules = modules.len(),
        scope = %settings.scope,
        "panelbus daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let transport = Arc::new(LineTransport::stdio());
    let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);

    let mut runtimes = Vec::with_capacity(modules.len());
    let mut table = RoutingTable::new();
    for module in modules {
        let mut runtime = ModuleRuntime::new(module, transport.clone(), reporter.clone());
        log_report(&runtime.initialize_all(settings));
        log_report(&runtime.connect_all().await);
        table.add_module(&runtime);
        runtimes.push(runtime);
    }

    let inbound = transport
        .take_inbound()
        .await
        .ok_or_else(|| anyhow!("Transport {} has no inbound lines", transport.name()))?;
    let router = InboundRouter::spawn(inbound, table, reporter.clone(), cancel_token.child_token());
    let reader = transport
        .spawn_reader(tokio::io::stdin(), cancel_token.clone())
        .await
        .context("Failed to attach stdin")?;

    // Ends on EOF or shutdown signal
    let stats = router.finish().await;
    match reader.await {
        Ok(lines) => info!(lines, routed = stats.routed, dropped = stats.dropped, "Input closed"),
        Err(e) => warn!(error = %e, "Reader task failed"),
    }

    if !cancel_token.is_cancelled() {
        for runtime in &runtimes {
            runtime.drain().await;
        }
    }
    cancel_token.cancel();

    for runtime in &mut runtimes {
        log_report(&runtime.disconnect_all().await);
    }

    info!(transport = transport.name(), "panelbus daemon stopped");
    Ok(())
}

fn log_report(report: &LifecycleReport) {
    if let Err(e) = &report.module_result {
        warn!(module = %report.module, stage = %report.stage, error = %e, "Module step failed");
    }
    for step in &report.panels {
        if let Err(e) = &step.result {
            warn!(
                module = %report.module,
                stage = %report.stage,
                panel = %step.panel,
                error = %e,
                "Panel step failed"
            );
        }
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
