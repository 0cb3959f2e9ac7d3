//! MaidanIO - Fleet control daemon for minibot soccer robots
//!
//! ## Protocol Architecture
//!
//! - **UDP discovery (port 12345)**: robots ping `DISCOVER:<id>:<ip>`;
//!   emergency-stop broadcasts go out on the same port
//! - **UDP commands (port 2367)**: 24-byte movement frames and match
//!   status text, unicast per robot (fire-and-forget)
//!
//! The daemon tracks discovered and connected robots in memory and gates
//! every movement command by the global match phase and the emergency-stop
//! flag. The operator console drives it through `FleetManager`.

use maidan_io::config::AppConfig;
use maidan_io::manager::FleetManager;
use maidan_io::registry::RobotRegistry;
use maidan_io::transport::UdpTransport;
use maidan_io::workers::{DiscoveryWorker, LivenessSweeper};
use maidan_io::{Error, Result};
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `maidan-io <path>` (positional)
/// - `maidan-io --config <path>` (flag-based)
/// - `maidan-io -c <path>` (short flag)
///
/// Defaults to `/etc/maidanio.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "/etc/maidanio.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let (config, config_source) = if Path::new(&config_path).exists() {
        (AppConfig::from_file(&config_path)?, config_path.clone())
    } else {
        (AppConfig::minibot_defaults(), "built-in defaults".to_string())
    };

    // Initialize logger; RUST_LOG overrides the configured level
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    );
    if config.logging.output == "stderr" {
        builder.target(env_logger::Target::Stderr);
    } else {
        builder.target(env_logger::Target::Stdout);
    }
    builder.init();

    log::info!("MaidanIO v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_source);

    // Socket setup is the one fatal failure mode; nothing works without it
    let transport = Arc::new(UdpTransport::new(&config.network)?);
    let registry = Arc::new(RobotRegistry::new());
    let manager = Arc::new(FleetManager::new(
        Arc::clone(&registry),
        transport.clone(),
        &config.network,
    ));

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Spawn discovery worker thread
    let discovery_worker = DiscoveryWorker::new(
        transport.clone(),
        Arc::clone(&registry),
        Arc::clone(&running),
        config.discovery.poll_interval(),
    );
    let discovery_handle = thread::Builder::new()
        .name("discovery".to_string())
        .spawn(move || discovery_worker.run())
        .map_err(|e| Error::Other(format!("Failed to spawn discovery worker: {}", e)))?;

    // Spawn liveness sweeper thread
    let sweeper = LivenessSweeper::new(
        Arc::clone(&manager),
        Arc::clone(&running),
        config.liveness.sweep_interval(),
        config.liveness.stale_timeout(),
    );
    let sweeper_handle = thread::Builder::new()
        .name("liveness-sweeper".to_string())
        .spawn(move || sweeper.run())
        .map_err(|e| Error::Other(format!("Failed to spawn liveness sweeper: {}", e)))?;

    log::info!("MaidanIO running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
    }

    // Best-effort: leave no robot with a "moving" last command
    manager.shutdown();

    let _ = discovery_handle.join();
    let _ = sweeper_handle.join();

    log::info!("MaidanIO shutdown complete");
    Ok(())
}
