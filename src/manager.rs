//! Fleet manager: command gateway, match state, disconnect notification
//!
//! `FleetManager` is the surface the console and controller layers call
//! into. It owns the two safety interlocks every movement command passes
//! through:
//!
//! - **Match phase**: movement is only forwarded during teleop.
//! - **Emergency stop**: fleet-wide override, re-checked on every send and
//!   additionally broadcast so robots outside the registry observe it.
//!
//! When either interlock blocks a command, the command is replaced with the
//! canonical stop command rather than suppressed. On the wire a blocked
//! command is indistinguishable from centered sticks, so robot firmware
//! needs no special "blocked" handling.
//!
//! # Locking Discipline
//!
//! Registry snapshots are taken under the registry lock, the lock is
//! released, and only then does any network send or listener invocation
//! happen. A slow robot or a misbehaving listener can never stall registry
//! operations or deadlock back into the registry.

use crate::config::NetworkConfig;
use crate::protocol::{self, MatchPhase, MovementCommand};
use crate::registry::RobotRegistry;
use crate::robot::{Robot, RobotStatus};
use crate::transport::RobotTransport;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Callback invoked with the robot id when a connected robot is evicted
pub type DisconnectListener = Arc<dyn Fn(&str) + Send + Sync>;

/// The two fleet-wide safety flags
///
/// Kept as a tagged pair behind one lock, not a combined enum: the flags
/// are toggled independently by different operator actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchState {
    pub phase: MatchPhase,
    pub estop_active: bool,
}

impl MatchState {
    /// True when movement commands may reach robots unmodified
    fn movement_allowed(&self) -> bool {
        self.phase == MatchPhase::Teleop && !self.estop_active
    }
}

/// Coordinates the registry, the transport, and the safety interlocks
pub struct FleetManager {
    registry: Arc<RobotRegistry>,
    transport: Arc<dyn RobotTransport>,
    state: Mutex<MatchState>,
    listeners: Mutex<Vec<DisconnectListener>>,
    command_port: u16,
    discovery_port: u16,
}

impl FleetManager {
    pub fn new(
        registry: Arc<RobotRegistry>,
        transport: Arc<dyn RobotTransport>,
        network: &NetworkConfig,
    ) -> Self {
        log::info!("Fleet manager initialized (standby, e-stop inactive)");
        Self {
            registry,
            transport,
            state: Mutex::new(MatchState::default()),
            listeners: Mutex::new(Vec::new()),
            command_port: network.command_port,
            discovery_port: network.discovery_port,
        }
    }

    fn state(&self) -> MutexGuard<'_, MatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current match state snapshot
    pub fn match_state(&self) -> MatchState {
        *self.state()
    }

    pub fn registry(&self) -> &Arc<RobotRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Registry surface
    // ------------------------------------------------------------------

    pub fn get_connected(&self) -> Vec<Robot> {
        self.registry.all_connected()
    }

    pub fn get_discovered(&self) -> Vec<Robot> {
        self.registry.all_discovered()
    }

    pub fn get_robot(&self, id: &str) -> Option<Robot> {
        self.registry.get(id)
    }

    /// Promote a discovered robot to connected
    ///
    /// If the match is already in teleop, the newly connected robot gets
    /// the teleop status message immediately so it does not sit in standby
    /// until the next phase change.
    pub fn connect(&self, id: &str) -> Option<Robot> {
        let robot = match self.registry.connect(id) {
            Some(robot) => robot,
            None => {
                log::warn!("Cannot connect - robot not found in discovered set: {}", id);
                return None;
            }
        };
        log::info!("Connected robot {} at {}", robot.id, robot.ip_address);

        if self.match_state().phase == MatchPhase::Teleop {
            self.push_game_status(&robot, MatchPhase::Teleop);
        }
        Some(robot)
    }

    /// Register a robot directly into the connected set by id and address
    pub fn add_robot(&self, id: &str, ip: &str) -> Robot {
        let robot = self.registry.add_robot(id, ip);
        log::info!("Added robot {} at {}", robot.id, robot.ip_address);
        robot
    }

    /// Remove a robot from the connected set
    ///
    /// A stop command goes out before the record is deleted so the robot's
    /// last-received command is never "moving".
    pub fn remove(&self, id: &str) -> bool {
        let robot = match self.registry.get(id) {
            Some(robot) if robot.status == RobotStatus::Connected => robot,
            _ => return false,
        };
        self.transmit(&robot, &MovementCommand::stop(&robot.name));
        let removed = self.registry.remove(id).is_some();
        if removed {
            log::info!("Removed robot {}", id);
        }
        removed
    }

    /// Store or clear the controller paired to a robot
    pub fn pair_controller(&self, id: &str, controller_id: Option<String>) -> bool {
        self.registry.set_paired_controller(id, controller_id)
    }

    // ------------------------------------------------------------------
    // Command gateway
    // ------------------------------------------------------------------

    /// Send a movement command built from normalized stick input
    ///
    /// Unknown ids are a warning and a no-op; late commands for departed
    /// robots are expected, not exceptional. The interlocks are applied
    /// before transmission, and the last-command timestamp is refreshed
    /// whether or not the command was overridden.
    pub fn send_movement(&self, id: &str, left_x: f32, left_y: f32, right_x: f32, right_y: f32) {
        let robot = match self.registry.get(id) {
            Some(robot) => robot,
            None => {
                log::warn!("Robot not found: {}", id);
                return;
            }
        };

        let mut command = MovementCommand::from_normalized(id, left_x, left_y, right_x, right_y);
        if !self.match_state().movement_allowed() {
            command = MovementCommand::stop(id);
        }
        self.transmit(&robot, &command);
    }

    /// Send the stop command unconditionally
    ///
    /// Bypasses the interlocks; stop is always allowed.
    pub fn send_stop(&self, id: &str) {
        let robot = match self.registry.get(id) {
            Some(robot) => robot,
            None => {
                log::warn!("Robot not found: {}", id);
                return;
            }
        };
        self.transmit(&robot, &MovementCommand::stop(id));
    }

    fn transmit(&self, robot: &Robot, command: &MovementCommand) {
        let packet = protocol::encode_movement(command);
        if let Err(e) = self
            .transport
            .send_unicast(&packet, &robot.ip_address, self.command_port)
        {
            log::warn!("Failed to send command to {} at {}: {}", robot.id, robot.ip_address, e);
        }
        self.registry.mark_command_sent(&robot.id);
    }

    fn push_game_status(&self, robot: &Robot, phase: MatchPhase) {
        let message = protocol::encode_game_status(&robot.name, phase);
        if let Err(e) = self
            .transport
            .send_unicast(message.as_bytes(), &robot.ip_address, self.command_port)
        {
            log::warn!("Failed to send game status to {}: {}", robot.id, e);
        }
    }

    // ------------------------------------------------------------------
    // Match phase
    // ------------------------------------------------------------------

    /// Enter teleop: operator input may reach robots
    pub fn start_teleop(&self) {
        self.state().phase = MatchPhase::Teleop;
        log::info!("Teleop started");

        // snapshot first, send after the registry lock is released
        for robot in self.registry.all_connected() {
            self.push_game_status(&robot, MatchPhase::Teleop);
        }
    }

    /// Leave teleop: every robot gets the standby status and a stop
    pub fn stop_teleop(&self) {
        self.state().phase = MatchPhase::Standby;
        log::info!("Teleop stopped");

        for robot in self.registry.all_connected() {
            self.push_game_status(&robot, MatchPhase::Standby);
            self.transmit(&robot, &MovementCommand::stop(&robot.name));
        }
    }

    // ------------------------------------------------------------------
    // Emergency stop
    // ------------------------------------------------------------------

    /// Engage the fleet-wide emergency stop
    ///
    /// The flag gates every subsequent unicast; the broadcast is a second,
    /// independent channel that reaches robots not yet in the registry.
    pub fn engage_estop(&self) {
        self.state().estop_active = true;
        log::warn!("Emergency stop engaged for all robots");
        self.broadcast_estop(true);
    }

    /// Release the emergency stop
    pub fn release_estop(&self) {
        self.state().estop_active = false;
        log::info!("Emergency stop released");
        self.broadcast_estop(false);
    }

    fn broadcast_estop(&self, active: bool) {
        let message = protocol::encode_estop(active);
        if let Err(e) = self
            .transport
            .broadcast(message.as_bytes(), self.discovery_port)
        {
            log::warn!("Failed to broadcast {}: {}", message, e);
        }
    }

    // ------------------------------------------------------------------
    // Liveness
    // ------------------------------------------------------------------

    /// Register a callback fired once per connected-robot eviction
    pub fn register_disconnect_listener(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(listener));
    }

    /// Evict stale robots and notify listeners
    ///
    /// Listeners run outside every lock, each wrapped in `catch_unwind`;
    /// one panicking listener must not stop the others or the sweeper.
    pub fn sweep_stale(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let evicted = self.registry.sweep_stale(now, timeout);
        if evicted.is_empty() {
            return evicted;
        }

        let listeners: Vec<DisconnectListener> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for id in &evicted {
            log::info!("Robot {} timed out and was disconnected", id);
            for listener in &listeners {
                let callback: &(dyn Fn(&str) + Send + Sync) = listener.as_ref();
                if catch_unwind(AssertUnwindSafe(|| callback(id))).is_err() {
                    log::error!("Disconnect listener panicked for robot {}", id);
                }
            }
        }
        evicted
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Best-effort stop to every connected robot before the process exits
    pub fn shutdown(&self) {
        log::info!("Fleet manager shutting down, stopping all connected robots");
        for robot in self.registry.all_connected() {
            self.transmit(&robot, &MovementCommand::stop(&robot.name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::transport::{MockTransport, SentDatagram};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_manager() -> (Arc<FleetManager>, MockTransport) {
        let config = AppConfig::minibot_defaults();
        let transport = MockTransport::new();
        let manager = Arc::new(FleetManager::new(
            Arc::new(RobotRegistry::new()),
            Arc::new(transport.clone()),
            &config.network,
        ));
        (manager, transport)
    }

    fn connect_robot(manager: &FleetManager, id: &str, ip: &str) {
        manager.registry().upsert_discovery_ping(id, ip);
        manager.connect(id).expect("connect should succeed");
    }

    fn axes(datagram: &SentDatagram) -> [u8; 4] {
        [
            datagram.payload[16],
            datagram.payload[17],
            datagram.payload[18],
            datagram.payload[19],
        ]
    }

    #[test]
    fn test_movement_reaches_wire_during_teleop() {
        let (manager, transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");
        manager.start_teleop();
        transport.clear_sent();

        manager.send_movement("Bot1", 1.0, -1.0, 0.0, 0.0);

        let sent = transport.sent_unicasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, "10.0.0.5");
        assert_eq!(sent[0].port, 2367);
        assert_eq!(axes(&sent[0]), [255, 0, 128, 128]);
    }

    #[test]
    fn test_interlock_matrix_forces_stop() {
        // every combination except (teleop, e-stop inactive) must put the
        // canonical stop on the wire
        let blocked = [
            (MatchPhase::Standby, false),
            (MatchPhase::Standby, true),
            (MatchPhase::Teleop, true),
        ];

        for (phase, estop) in blocked {
            let (manager, transport) = make_manager();
            connect_robot(&manager, "Bot1", "10.0.0.5");
            if phase == MatchPhase::Teleop {
                manager.start_teleop();
            }
            if estop {
                manager.engage_estop();
            }
            transport.clear_sent();

            manager.send_movement("Bot1", 1.0, 1.0, -1.0, 0.5);

            let sent = transport.sent_unicasts();
            assert_eq!(sent.len(), 1, "phase={:?} estop={}", phase, estop);
            assert_eq!(axes(&sent[0]), [128, 128, 128, 128], "phase={:?} estop={}", phase, estop);
            assert_eq!(sent[0].payload[22], 0, "buttons must be clear");
        }
    }

    #[test]
    fn test_last_command_updated_even_when_overridden() {
        let (manager, _transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");
        // standby: command will be overridden with stop
        manager.send_movement("Bot1", 1.0, 0.0, 0.0, 0.0);
        assert!(manager.get_robot("Bot1").unwrap().last_command.is_some());
    }

    #[test]
    fn test_unknown_robot_is_a_noop() {
        let (manager, transport) = make_manager();
        manager.start_teleop();
        manager.send_movement("Ghost", 1.0, 0.0, 0.0, 0.0);
        manager.send_stop("Ghost");
        assert!(transport.sent_unicasts().is_empty());
    }

    #[test]
    fn test_send_failure_does_not_propagate() {
        let (manager, transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");
        manager.start_teleop();
        transport.set_fail_sends(true);
        // must not panic, and the liveness bookkeeping still happens
        manager.send_movement("Bot1", 1.0, 0.0, 0.0, 0.0);
        assert!(manager.get_robot("Bot1").unwrap().last_command.is_some());
    }

    #[test]
    fn test_send_stop_bypasses_interlocks() {
        let (manager, transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");
        manager.engage_estop();
        transport.clear_sent();

        manager.send_stop("Bot1");
        let sent = transport.sent_unicasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(axes(&sent[0]), [128, 128, 128, 128]);
    }

    #[test]
    fn test_start_teleop_pushes_status_to_connected() {
        let (manager, transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");
        connect_robot(&manager, "Bot2", "10.0.0.6");
        transport.clear_sent();

        manager.start_teleop();

        let mut statuses: Vec<String> = transport.sent_unicasts().iter().map(|d| d.text()).collect();
        statuses.sort();
        assert_eq!(statuses, vec!["Bot1:teleop", "Bot2:teleop"]);
    }

    #[test]
    fn test_stop_teleop_sends_standby_and_stop() {
        let (manager, transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");
        manager.start_teleop();
        transport.clear_sent();

        manager.stop_teleop();

        let sent = transport.sent_unicasts();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].text(), "Bot1:standby");
        assert_eq!(axes(&sent[1]), [128, 128, 128, 128]);
    }

    #[test]
    fn test_connect_during_teleop_gets_status_immediately() {
        let (manager, transport) = make_manager();
        manager.start_teleop();
        manager.registry().upsert_discovery_ping("Late", "10.0.0.9");
        transport.clear_sent();

        manager.connect("Late").unwrap();

        let sent = transport.sent_unicasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text(), "Late:teleop");
    }

    #[test]
    fn test_estop_broadcasts_on_discovery_port() {
        let (manager, transport) = make_manager();
        manager.engage_estop();
        manager.release_estop();

        let broadcasts = transport.sent_broadcasts();
        assert_eq!(broadcasts.len(), 2);
        assert_eq!(broadcasts[0].text(), "ESTOP");
        assert_eq!(broadcasts[0].port, 12345);
        assert_eq!(broadcasts[1].text(), "ESTOP_OFF");
        assert!(manager.match_state() == MatchState { phase: MatchPhase::Standby, estop_active: false });
    }

    #[test]
    fn test_remove_sends_stop_before_deletion() {
        let (manager, transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");
        transport.clear_sent();

        assert!(manager.remove("Bot1"));

        let sent = transport.sent_unicasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(axes(&sent[0]), [128, 128, 128, 128]);
        assert!(manager.get_robot("Bot1").is_none());

        // discovered-only robots are not removable and get no stop
        transport.clear_sent();
        manager.registry().upsert_discovery_ping("Bot2", "10.0.0.6");
        assert!(!manager.remove("Bot2"));
        assert!(transport.sent_unicasts().is_empty());
    }

    #[test]
    fn test_sweep_notifies_each_eviction_once() {
        let (manager, _transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");

        let notifications = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notifications);
        manager.register_disconnect_listener(move |id| {
            assert_eq!(id, "Bot1");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let future = Instant::now() + Duration::from_secs(11);
        let evicted = manager.sweep_stale(future, Duration::from_secs(10));
        assert_eq!(evicted, vec!["Bot1".to_string()]);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);

        // second sweep finds nothing, notifies nothing
        let evicted = manager.sweep_stale(future, Duration::from_secs(10));
        assert!(evicted.is_empty());
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let (manager, _transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");

        let notifications = Arc::new(AtomicUsize::new(0));
        manager.register_disconnect_listener(|_| panic!("bad listener"));
        let counter = Arc::clone(&notifications);
        manager.register_disconnect_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let future = Instant::now() + Duration::from_secs(11);
        manager.sweep_stale(future, Duration::from_secs(10));
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_stops_all_connected() {
        let (manager, transport) = make_manager();
        connect_robot(&manager, "Bot1", "10.0.0.5");
        connect_robot(&manager, "Bot2", "10.0.0.6");
        transport.clear_sent();

        manager.shutdown();

        let sent = transport.sent_unicasts();
        assert_eq!(sent.len(), 2);
        for datagram in &sent {
            assert_eq!(axes(datagram), [128, 128, 128, 128]);
        }
    }

    #[test]
    fn test_add_robot_and_pairing() {
        let (manager, _transport) = make_manager();
        let robot = manager.add_robot("Manual", "10.0.0.42");
        assert_eq!(robot.status, RobotStatus::Connected);
        assert!(manager.pair_controller("Manual", Some("pad-0".to_string())));
        assert_eq!(
            manager.get_robot("Manual").unwrap().paired_controller_id.as_deref(),
            Some("pad-0")
        );
    }
}
