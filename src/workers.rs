//! Background workers: discovery polling and liveness sweeping
//!
//! Two recurring loops share the registry with the command-issuing callers:
//!
//! | Worker | Interval | Job |
//! |--------|----------|-----|
//! | DiscoveryWorker | 500 ms | drain a pending discovery ping, upsert |
//! | LivenessSweeper | 2 s | evict stale robots, fire disconnect listeners |
//!
//! The sweep interval is deliberately coarser than discovery polling so a
//! robot missing one ping is not churned in and out of the registry.
//!
//! Both loops check a shared running flag once per cycle; flipping the flag
//! stops them within roughly one interval each.

use crate::manager::FleetManager;
use crate::protocol;
use crate::registry::RobotRegistry;
use crate::transport::RobotTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Polls the discovery socket and feeds the registry
pub struct DiscoveryWorker {
    transport: Arc<dyn RobotTransport>,
    registry: Arc<RobotRegistry>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl DiscoveryWorker {
    pub fn new(
        transport: Arc<dyn RobotTransport>,
        registry: Arc<RobotRegistry>,
        running: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            registry,
            running,
            poll_interval,
        }
    }

    /// Drain one pending discovery datagram, if any
    ///
    /// Non-discovery and malformed datagrams are dropped quietly; robots
    /// re-ping on their own cadence.
    pub fn poll_once(&self) {
        let Some(message) = self.transport.try_receive_discovery() else {
            return;
        };
        match protocol::parse_discovery(&message) {
            Some((id, ip)) => {
                if self.registry.upsert_discovery_ping(&id, &ip) {
                    log::info!("Discovered new robot: {} at {}", id, ip);
                }
            }
            None => {
                log::trace!("Ignoring non-discovery datagram: {:?}", message);
            }
        }
    }

    pub fn run(&self) {
        log::info!("Discovery worker started");
        while self.running.load(Ordering::Relaxed) {
            self.poll_once();
            thread::sleep(self.poll_interval);
        }
        log::info!("Discovery worker stopped");
    }
}

/// Periodically evicts stale robots via the fleet manager
pub struct LivenessSweeper {
    manager: Arc<FleetManager>,
    running: Arc<AtomicBool>,
    sweep_interval: Duration,
    stale_timeout: Duration,
}

impl LivenessSweeper {
    pub fn new(
        manager: Arc<FleetManager>,
        running: Arc<AtomicBool>,
        sweep_interval: Duration,
        stale_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            running,
            sweep_interval,
            stale_timeout,
        }
    }

    pub fn run(&self) {
        log::info!(
            "Liveness sweeper started (timeout {:?}, interval {:?})",
            self.stale_timeout,
            self.sweep_interval
        );
        while self.running.load(Ordering::Relaxed) {
            self.manager.sweep_stale(Instant::now(), self.stale_timeout);
            thread::sleep(self.sweep_interval);
        }
        log::info!("Liveness sweeper stopped");
    }
}
