//! Production UDP transport

use super::RobotTransport;
use crate::config::NetworkConfig;
use crate::error::Result;
use std::io::ErrorKind;
use std::net::UdpSocket;

/// Largest discovery datagram we accept
const DISCOVERY_BUFFER_SIZE: usize = 1024;

/// UDP socket pair for robot communication
pub struct UdpTransport {
    /// Ephemeral-port socket for commands and broadcasts
    command_socket: UdpSocket,
    /// Socket bound to the discovery port for inbound pings
    discovery_socket: UdpSocket,
    broadcast_address: String,
}

impl UdpTransport {
    /// Bind both sockets
    ///
    /// Failure here is fatal to the daemon; without its sockets the whole
    /// system is inert, so errors propagate instead of being swallowed.
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let command_socket = UdpSocket::bind(("0.0.0.0", 0))?;
        command_socket.set_broadcast(true)?;

        let discovery_socket = UdpSocket::bind(("0.0.0.0", network.discovery_port))?;
        discovery_socket.set_read_timeout(Some(network.receive_timeout()))?;

        log::info!(
            "UDP transport ready (discovery port {}, command sends from {})",
            network.discovery_port,
            command_socket.local_addr()?
        );

        Ok(Self {
            command_socket,
            discovery_socket,
            broadcast_address: network.broadcast_address.clone(),
        })
    }
}

impl RobotTransport for UdpTransport {
    fn send_unicast(&self, payload: &[u8], ip: &str, port: u16) -> Result<()> {
        self.command_socket.send_to(payload, (ip, port))?;
        Ok(())
    }

    fn broadcast(&self, payload: &[u8], port: u16) -> Result<()> {
        self.command_socket
            .send_to(payload, (self.broadcast_address.as_str(), port))?;
        Ok(())
    }

    fn try_receive_discovery(&self) -> Option<String> {
        let mut buffer = [0u8; DISCOVERY_BUFFER_SIZE];
        match self.discovery_socket.recv_from(&mut buffer) {
            Ok((len, _sender)) => Some(String::from_utf8_lossy(&buffer[..len]).into_owned()),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => None,
            Err(e) => {
                log::debug!("Discovery receive error: {}", e);
                None
            }
        }
    }
}
