//! UDP transport for robot communication
//!
//! Two endpoints: a send socket with broadcast capability for commands and
//! the e-stop broadcast, and a receive socket bound to the discovery port.
//! All sends are fire-and-forget; lost datagrams are tolerated by the
//! robots' own re-ping and re-command cadence, never retried here.

use crate::error::Result;

mod udp;
pub use udp::UdpTransport;

mod mock;
pub use mock::{MockTransport, SentDatagram};

/// Datagram-level seam between the fleet manager and the network
///
/// `UdpTransport` is the production implementation; `MockTransport` records
/// traffic for tests.
pub trait RobotTransport: Send + Sync {
    /// Best-effort datagram to one robot
    ///
    /// Callers log and continue on error; one unreachable robot must not
    /// block commands to the rest of the fleet.
    fn send_unicast(&self, payload: &[u8], ip: &str, port: u16) -> Result<()>;

    /// Best-effort datagram to the subnet broadcast address
    ///
    /// Used only for emergency stop, so even robots not yet in the
    /// registry observe it.
    fn broadcast(&self, payload: &[u8], port: u16) -> Result<()>;

    /// Bounded-wait receive on the discovery port
    ///
    /// Returns `None` on timeout; never blocks the caller beyond the
    /// configured socket timeout.
    fn try_receive_discovery(&self) -> Option<String>;
}
