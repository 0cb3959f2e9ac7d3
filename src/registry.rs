//! In-memory robot registry
//!
//! Two views (discovered, connected) behind one mutex. Every multi-step
//! operation runs as a single critical section, and promotion from
//! discovered to connected is a move: the discovered entry is deleted in
//! the same critical section that inserts the connected one, so an id is
//! never present in both views.
//!
//! No network I/O and no callbacks happen under the lock. Callers get
//! snapshot clones and act on them after the lock is released.

use crate::robot::{Robot, RobotStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Views {
    discovered: HashMap<String, Robot>,
    connected: HashMap<String, Robot>,
}

impl Views {
    fn find_mut(&mut self, id: &str) -> Option<&mut Robot> {
        if self.connected.contains_key(id) {
            self.connected.get_mut(id)
        } else {
            self.discovered.get_mut(id)
        }
    }
}

/// Registry of all robots the daemon currently knows about
#[derive(Default)]
pub struct RobotRegistry {
    views: Mutex<Views>,
}

impl RobotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Views> {
        self.views.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a discovery ping
    ///
    /// A connected robot that still pings is not re-discovered; its IP and
    /// liveness timestamp are refreshed in place. Returns `true` when the
    /// ping created a new discovered entry.
    pub fn upsert_discovery_ping(&self, id: &str, ip: &str) -> bool {
        let mut views = self.lock();

        if let Some(robot) = views.connected.get_mut(id) {
            robot.ip_address = ip.to_string();
            robot.touch();
            return false;
        }

        if let Some(robot) = views.discovered.get_mut(id) {
            robot.ip_address = ip.to_string();
            robot.touch();
            return false;
        }

        views
            .discovered
            .insert(id.to_string(), Robot::new(id, ip, RobotStatus::Discovered));
        true
    }

    /// Promote a discovered robot to connected
    ///
    /// Returns a snapshot of the promoted record, or `None` when the id is
    /// not in the discovered view.
    pub fn connect(&self, id: &str) -> Option<Robot> {
        let mut views = self.lock();
        let mut robot = views.discovered.remove(id)?;
        robot.status = RobotStatus::Connected;
        robot.touch();
        let snapshot = robot.clone();
        views.connected.insert(id.to_string(), robot);
        Some(snapshot)
    }

    /// Register a robot directly into the connected view, bypassing discovery
    ///
    /// Used for manual registration by IP. Any discovered entry for the same
    /// id is consumed so the exclusivity invariant holds.
    pub fn add_robot(&self, id: &str, ip: &str) -> Robot {
        let mut views = self.lock();
        views.discovered.remove(id);
        let robot = Robot::new(id, ip, RobotStatus::Connected);
        views.connected.insert(id.to_string(), robot.clone());
        robot
    }

    /// Look up a robot by id, connected view first
    pub fn get(&self, id: &str) -> Option<Robot> {
        let views = self.lock();
        views
            .connected
            .get(id)
            .or_else(|| views.discovered.get(id))
            .cloned()
    }

    /// Delete a robot from the connected view
    pub fn remove(&self, id: &str) -> Option<Robot> {
        self.lock().connected.remove(id)
    }

    /// Snapshot of the connected view
    pub fn all_connected(&self) -> Vec<Robot> {
        self.lock().connected.values().cloned().collect()
    }

    /// Snapshot of the discovered view
    pub fn all_discovered(&self) -> Vec<Robot> {
        self.lock().discovered.values().cloned().collect()
    }

    pub fn connected_count(&self) -> usize {
        self.lock().connected.len()
    }

    pub fn discovered_count(&self) -> usize {
        self.lock().discovered.len()
    }

    /// Refresh a robot's last-command timestamp
    pub fn mark_command_sent(&self, id: &str) {
        if let Some(robot) = self.lock().find_mut(id) {
            robot.last_command = Some(Instant::now());
        }
    }

    /// Store or clear a robot's paired controller id
    pub fn set_paired_controller(&self, id: &str, controller_id: Option<String>) -> bool {
        match self.lock().find_mut(id) {
            Some(robot) => {
                robot.paired_controller_id = controller_id;
                true
            }
            None => false,
        }
    }

    /// Evict every robot whose liveness timestamp is older than `timeout`
    ///
    /// Returns the ids evicted from the connected view; only those count as
    /// disconnections worth notifying about. Discovered entries age out
    /// silently. Listener invocation is the caller's job, outside this lock.
    pub fn sweep_stale(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut views = self.lock();

        views.discovered.retain(|id, robot| {
            let stale = robot.is_stale(now, timeout);
            if stale {
                log::debug!("Discovered robot {} aged out", id);
            }
            !stale
        });

        let mut evicted = Vec::new();
        views.connected.retain(|id, robot| {
            if robot.is_stale(now, timeout) {
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });
        evicted
    }
}
