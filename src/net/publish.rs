// SeismoNode: Report Publishing
//
// Outbound reporting seam between the seismic monitor and the network.

use crate::error::BridgeError;

/// Collector endpoint a payload is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Event,
    Status,
}

pub trait Publisher {
    /// Whether a publish attempt has any chance of getting out.
    fn is_online(&self) -> bool;

    /// Deliver one JSON body. No retries; the caller's schedule retries.
    fn publish(&mut self, endpoint: Endpoint, body: &str) -> Result<(), BridgeError>;
}

/// Dry-run publisher for the host build: logs instead of sending.
#[derive(Debug, Default)]
pub struct LogPublisher {
    pub sent: usize,
}

impl Publisher for LogPublisher {
    fn is_online(&self) -> bool {
        true
    }

    fn publish(&mut self, endpoint: Endpoint, body: &str) -> Result<(), BridgeError> {
        self.sent += 1;
        log::info!("[dry-run] {:?} <- {}", endpoint, body);
        Ok(())
    }
}
