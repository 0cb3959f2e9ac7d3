//! Robot record and lifecycle state
//!
//! A robot exists in exactly one of the registry's two views at a time:
//!
//! ```text
//! Discovered --connect()--> Connected --(stale timeout OR remove)--> gone
//!     └──────────(stale timeout)──────────────────────────────────> gone
//! ```
//!
//! "Disconnected" is never a stored state. Once evicted, a robot only
//! reappears through a fresh discovery ping.

use std::time::{Duration, Instant};

/// Where a robot currently sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotStatus {
    /// Announced itself via discovery ping, not yet claimed by an operator
    Discovered,
    /// Claimed by an operator; eligible for movement commands
    Connected,
}

/// One tracked robot
///
/// The id doubles as the display name and as the name field of every
/// command frame, so it should stay within the 16-byte wire limit.
#[derive(Debug, Clone)]
pub struct Robot {
    pub id: String,
    pub name: String,
    /// Refreshed on every ping; DHCP leases and roaming can change it
    pub ip_address: String,
    pub status: RobotStatus,
    /// Last time any ping or reconnection was observed
    pub last_seen: Instant,
    /// Last time the gateway sent this robot a command
    pub last_command: Option<Instant>,
    /// Set and cleared by the console's pairing workflow; opaque here
    pub paired_controller_id: Option<String>,
}

impl Robot {
    pub fn new(id: &str, ip_address: &str, status: RobotStatus) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            ip_address: ip_address.to_string(),
            status,
            last_seen: Instant::now(),
            last_command: None,
            paired_controller_id: None,
        }
    }

    /// Refresh the liveness timestamp
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// True when the liveness timestamp is older than `timeout` as of `now`
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_robot_is_fresh() {
        let robot = Robot::new("Bot1", "10.0.0.5", RobotStatus::Discovered);
        assert_eq!(robot.name, "Bot1");
        assert!(robot.last_command.is_none());
        assert!(!robot.is_stale(Instant::now(), Duration::from_secs(10)));
    }

    #[test]
    fn test_staleness_threshold() {
        let robot = Robot::new("Bot1", "10.0.0.5", RobotStatus::Connected);
        let timeout = Duration::from_secs(10);
        assert!(!robot.is_stale(robot.last_seen + Duration::from_secs(10), timeout));
        assert!(robot.is_stale(robot.last_seen + Duration::from_secs(11), timeout));
    }
}
