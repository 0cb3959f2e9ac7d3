//! End-to-end fleet scenario through the public API: discovery ping,
//! connect, teleop movement, emergency-stop override.

use maidan_io::config::AppConfig;
use maidan_io::manager::FleetManager;
use maidan_io::registry::RobotRegistry;
use maidan_io::robot::RobotStatus;
use maidan_io::transport::MockTransport;
use maidan_io::workers::DiscoveryWorker;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn discovery_to_estop_scenario() {
    let config = AppConfig::minibot_defaults();
    let transport = MockTransport::new();
    let registry = Arc::new(RobotRegistry::new());
    let manager = Arc::new(FleetManager::new(
        Arc::clone(&registry),
        Arc::new(transport.clone()),
        &config.network,
    ));
    let worker = DiscoveryWorker::new(
        Arc::new(transport.clone()),
        Arc::clone(&registry),
        Arc::new(AtomicBool::new(true)),
        config.discovery.poll_interval(),
    );

    // A robot announces itself
    transport.inject_discovery("DISCOVER:Bot1:10.0.0.5");
    worker.poll_once();

    let discovered = manager.get_discovered();
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].id, "Bot1");
    assert_eq!(discovered[0].ip_address, "10.0.0.5");
    assert_eq!(discovered[0].status, RobotStatus::Discovered);

    // Operator claims it: exclusive move into the connected set
    manager.connect("Bot1").expect("connect should succeed");
    assert!(manager.get_discovered().is_empty());
    assert_eq!(manager.get_connected().len(), 1);

    // Teleop starts and a movement command reaches the wire unmodified
    manager.start_teleop();
    transport.clear_sent();
    manager.send_movement("Bot1", 1.0, -1.0, 0.0, 0.0);

    let sent = transport.sent_unicasts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].target, "10.0.0.5");
    assert_eq!(sent[0].payload[16..20], [255, 0, 128, 128]);

    // E-stop: the same input now yields the centered override
    manager.engage_estop();
    assert_eq!(transport.sent_broadcasts()[0].text(), "ESTOP");
    transport.clear_sent();
    manager.send_movement("Bot1", 1.0, -1.0, 0.0, 0.0);

    let sent = transport.sent_unicasts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload[16..20], [128, 128, 128, 128]);

    // The robot goes quiet and is evicted exactly once
    let evicted = manager.sweep_stale(
        std::time::Instant::now() + Duration::from_secs(11),
        config.liveness.stale_timeout(),
    );
    assert_eq!(evicted, vec!["Bot1".to_string()]);
    assert!(manager.get_robot("Bot1").is_none());
}
