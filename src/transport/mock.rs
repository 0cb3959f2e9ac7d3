//! Mock transport for testing

use super::RobotTransport;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One datagram captured by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub payload: Vec<u8>,
    pub target: String,
    pub port: u16,
}

impl SentDatagram {
    /// Payload reinterpreted as UTF-8 text (for status/e-stop assertions)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Mock transport recording all traffic, with an injectable discovery queue
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    unicasts: Vec<SentDatagram>,
    broadcasts: Vec<SentDatagram>,
    discovery_queue: VecDeque<String>,
    fail_sends: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a discovery message to be returned by `try_receive_discovery`
    pub fn inject_discovery(&self, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.discovery_queue.push_back(message.to_string());
    }

    /// All unicast datagrams sent so far
    pub fn sent_unicasts(&self) -> Vec<SentDatagram> {
        self.inner.lock().unwrap().unicasts.clone()
    }

    /// All broadcast datagrams sent so far
    pub fn sent_broadcasts(&self) -> Vec<SentDatagram> {
        self.inner.lock().unwrap().broadcasts.clone()
    }

    /// Forget all recorded traffic
    pub fn clear_sent(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.unicasts.clear();
        inner.broadcasts.clear();
    }

    /// Make every subsequent send fail, simulating an unreachable network
    pub fn set_fail_sends(&self, fail: bool) {
        self.inner.lock().unwrap().fail_sends = fail;
    }
}

impl RobotTransport for MockTransport {
    fn send_unicast(&self, payload: &[u8], ip: &str, port: u16) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_sends {
            return Err(Error::Other("simulated send failure".to_string()));
        }
        inner.unicasts.push(SentDatagram {
            payload: payload.to_vec(),
            target: ip.to_string(),
            port,
        });
        Ok(())
    }

    fn broadcast(&self, payload: &[u8], port: u16) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_sends {
            return Err(Error::Other("simulated send failure".to_string()));
        }
        inner.broadcasts.push(SentDatagram {
            payload: payload.to_vec(),
            target: "<broadcast>".to_string(),
            port,
        });
        Ok(())
    }

    fn try_receive_discovery(&self) -> Option<String> {
        self.inner.lock().unwrap().discovery_queue.pop_front()
    }
}
