//! Xidi command line tool
//!
//! Inspects mappers and configuration files, and on Windows runs a physical controller through a
//! virtual controller to show what an application would see.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xidi_core::config::{AppConfig, ConfigWatcher};
use xidi_core::controller::mapper::{ElementSlot, Mapper, PhysicalActuator};
use xidi_core::controller::types::{Axis, VirtualState};
use xidi_core::controller::MapperRegistry;
use xidi_core::parser::{element_mapper_from_string, force_feedback_actuator_from_string};
use xidi_core::paths::AppPaths;

/// Xidi - DirectInput-style virtual controllers for XInput gamepads
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (detected when omitted)
    #[arg(short, long, env = "XIDI_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Also write daily log files to this directory
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every known mapper and its capabilities
    List {
        /// Print capabilities as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the element and force feedback mapping of one mapper
    Show {
        /// Mapper name; the configured default when omitted
        mapper: Option<String>,
    },
    /// Parse a mapping-language string and print its canonical form
    Parse {
        text: String,
        /// Parse as a force feedback actuator instead of an element mapper
        #[arg(long)]
        actuator: bool,
    },
    /// Validate the configuration file
    Check,
    /// Print the configuration file's JSON schema
    Schema,
    /// Validate the configuration file on every change
    Watch,
    /// Read a physical controller and print virtual state changes
    #[cfg(windows)]
    Poll {
        /// Physical controller, 1..=4
        #[arg(short, long, default_value = "1")]
        player: u8,
        /// Polling interval in milliseconds
        #[arg(long, default_value = "10")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let _log_guard = init_logging(&args.log_level, args.log_file.as_deref())?;

    let config_path = args.config.clone().unwrap_or_else(|| AppPaths::detect().config);
    info!("Configuration file: {}", config_path.display());

    match args.command {
        Command::List { json } => list_mappers(&load_registry(&config_path).await?, json),
        Command::Show { mapper } => show_mapper(&load_registry(&config_path).await?, mapper.as_deref()),
        Command::Parse { text, actuator } => parse_text(&text, actuator),
        Command::Check => check_config(&config_path).await,
        Command::Schema => {
            println!("{}", AppConfig::json_schema()?);
            Ok(())
        }
        Command::Watch => watch_config(&config_path).await,
        #[cfg(windows)]
        Command::Poll { player, interval } => poll::run(&config_path, player, interval).await,
    }
}

/// Initialise logging.
///
/// `RUST_LOG` overrides `level`. The returned guard flushes the log file and must be held until
/// exit.
fn init_logging(level: &str, log_dir: Option<&std::path::Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "xidi.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Registry from the configuration file, or only the built-ins when there is no file.
async fn load_registry(config_path: &std::path::Path) -> Result<MapperRegistry> {
    if !config_path.exists() {
        info!("No configuration at {}, using built-in mappers", config_path.display());
        return Ok(MapperRegistry::new());
    }
    let config = AppConfig::load(&config_path.to_string_lossy()).await?;
    config.build_registry()
}

fn list_mappers(registry: &MapperRegistry, json: bool) -> Result<()> {
    if json {
        let capabilities: BTreeMap<&str, _> = registry
            .names()
            .filter_map(|name| registry.get(name).map(|mapper| (name, *mapper.capabilities())))
            .collect();
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
        return Ok(());
    }

    let default = registry.default_mapper();
    println!("\n{}", "=== Mappers ===".bold().cyan());
    for name in registry.names() {
        let Some(mapper) = registry.get(name) else {
            continue;
        };
        let marker = if name == default.name() { " (default)".yellow() } else { "".normal() };
        println!("  {}{}: {}", name.bright_white(), marker, describe_capabilities(&mapper));
    }
    Ok(())
}

fn describe_capabilities(mapper: &Mapper) -> String {
    let capabilities = mapper.capabilities();
    let axes: Vec<String> = capabilities
        .axis_list()
        .into_iter()
        .map(|axis| {
            if capabilities.axis_supports_force_feedback(axis) {
                format!("{}*", axis)
            } else {
                axis.to_string()
            }
        })
        .collect();
    format!(
        "axes [{}], {} buttons, {}",
        axes.join(", "),
        capabilities.num_buttons,
        if capabilities.has_pov { "POV" } else { "no POV" }
    )
}

fn show_mapper(registry: &MapperRegistry, name: Option<&str>) -> Result<()> {
    let name = name.unwrap_or("");
    let Some(mapper) = registry.get(name) else {
        bail!("Unknown mapper '{}'", name);
    };

    println!("\n{}", format!("=== {} ===", mapper.name()).bold().cyan());
    println!("  {}", describe_capabilities(&mapper));
    println!("  at rest: {}", format_state(&mapper.map_neutral_physical_to_virtual(0), &mapper));

    println!("\n{}", "Elements:".bold());
    for slot in ElementSlot::ALL {
        let element = mapper.element(slot);
        if element.is_null() {
            println!("  {:<12} {}", slot.name(), "Null".dimmed());
        } else {
            println!("  {:<12} {}", slot.name(), element.to_string().green());
        }
    }

    println!("\n{}", "Force feedback:".bold());
    for actuator in PhysicalActuator::ALL {
        let mode = mapper.actuators().get(actuator);
        println!("  {:<20} {}", actuator.name(), mode.to_string().green());
    }
    Ok(())
}

fn parse_text(text: &str, actuator: bool) -> Result<()> {
    if actuator {
        let mode = force_feedback_actuator_from_string(text)?;
        println!("{}", mode.to_string().green());
        let axes: Vec<String> = mode.source_axes().iter().map(Axis::to_string).collect();
        println!("  source axes: [{}]", axes.join(", "));
        return Ok(());
    }

    let mapper = element_mapper_from_string(text)?;
    println!("{}", mapper.to_string().green());
    let targets: Vec<String> = mapper.target_elements().iter().map(|t| t.to_string()).collect();
    println!("  targets: [{}]", targets.join(", "));
    Ok(())
}

async fn check_config(config_path: &std::path::Path) -> Result<()> {
    let config = AppConfig::load(&config_path.to_string_lossy()).await?;
    let registry = config.build_registry()?;
    println!(
        "{} {} ({} mappers, default {})",
        "✅".green(),
        config_path.display(),
        registry.len(),
        registry.default_mapper().name().bright_white()
    );
    Ok(())
}

async fn watch_config(config_path: &std::path::Path) -> Result<()> {
    let (mut watcher, initial) = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await?;
    println!(
        "Watching {} ({} mappers, default {})",
        config_path.display(),
        initial.registry.len(),
        initial.registry.default_mapper().name().bright_white()
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(loaded) = watcher.next_config() => {
                println!(
                    "{} reloaded: {} mappers, default {}",
                    "✅".green(),
                    loaded.registry.len(),
                    loaded.registry.default_mapper().name().bright_white()
                );
            }
            _ = &mut shutdown => break,
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// One-line rendering of the elements a mapper exposes.
fn format_state(state: &VirtualState, mapper: &Mapper) -> String {
    let capabilities = mapper.capabilities();
    let mut parts: Vec<String> = capabilities
        .axis_list()
        .into_iter()
        .map(|axis| format!("{}={:>6}", axis, state[axis]))
        .collect();

    let pressed: Vec<String> = state
        .buttons
        .iter()
        .take(capabilities.num_buttons)
        .enumerate()
        .filter(|(_, pressed)| **pressed)
        .map(|(index, _)| (index + 1).to_string())
        .collect();
    parts.push(format!("buttons=[{}]", pressed.join(",")));

    if capabilities.has_pov {
        parts.push(format!("pov={}", state.pov));
    }
    parts.join(" ")
}

#[cfg(windows)]
mod poll {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use xidi_core::controller::virtual_controller::timestamp_ms;
    use xidi_core::controller::VirtualController;
    use xidi_core::force_feedback::ForceFeedbackHub;
    use xidi_core::physical::xinput::XInputBackend;
    use xidi_core::physical::{validate_player, StateSource, PHYSICAL_CONTROLLER_COUNT};

    const EVENT_BUFFER_CAPACITY: usize = 64;

    pub async fn run(config_path: &std::path::Path, player: u8, interval_ms: u64) -> Result<()> {
        if player == 0 || player > PHYSICAL_CONTROLLER_COUNT {
            bail!("Player must be 1-{}", PHYSICAL_CONTROLLER_COUNT);
        }
        let index = validate_player(player - 1)?;

        let config = if config_path.exists() {
            AppConfig::load(&config_path.to_string_lossy()).await?
        } else {
            AppConfig::default()
        };
        let registry = config.build_registry()?;
        let mapper = config
            .mapper_for_player(&registry, index)
            .unwrap_or_else(|| registry.default_mapper());

        let hub = Arc::new(ForceFeedbackHub::new());
        let controller = VirtualController::new(index, Arc::clone(&mapper)).with_force_feedback(hub.clone());
        config.properties.apply_to(&controller)?;
        controller.set_event_buffer_capacity(EVENT_BUFFER_CAPACITY);
        controller.force_feedback_register();

        let mut backend = XInputBackend::load()?;
        println!(
            "Polling player {} through {} ({})",
            player,
            mapper.name().bright_white(),
            describe_capabilities(&mapper)
        );

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let physical = backend.read_state(index);
                    if controller.refresh_state(&physical) {
                        let batch = controller.buffered_events(EVENT_BUFFER_CAPACITY, false);
                        if batch.overflowed {
                            println!("{}", "(events lost)".yellow());
                        }
                        println!("{} [{} events]", format_state(&controller.state(), &mapper), batch.events.len());
                    }

                    if let Err(e) = hub.drive(index, &mapper, timestamp_ms(), controller.force_feedback_gain(), &mut backend) {
                        warn!("Force feedback output failed: {}", e);
                    }
                }
                _ = &mut shutdown => break,
            }
        }

        controller.force_feedback_unregister();
        Ok(())
    }
}
