//! MaidanIO - Fleet control library for minibot soccer robots
//!
//! This library provides the core components of the control plane: UDP
//! discovery and transport, the robot registry, and the interlocked
//! command gateway.
//!
//! The HTTP/WebSocket console and the controller input layer live outside
//! this crate and drive it through [`manager::FleetManager`].

pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod robot;
pub mod transport;
pub mod workers;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
