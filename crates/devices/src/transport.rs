//! Contract of the short-range wireless transport.
//!
//! The transport itself (adapter, scan, GATT plumbing) lives outside this
//! workspace; streamers only talk to it through `GattTransport`.

use std::time::Duration;

use thiserror::Error;

/// Callback invoked with `(handle, payload)` for every notification.
///
/// Implementations must deliver notifications serially.
pub type NotificationCallback = Box<dyn FnMut(u16, &[u8]) + Send + 'static>;

/// A peripheral seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub address: String,
}

/// Errors that can occur in the wireless transport
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Target address unreachable or connection refused
    #[error("Unable to connect to device at address {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },
    /// Operation requires an open connection
    #[error("Transport not connected")]
    NotConnected,
    /// Scan failed
    #[error("Scan error: {0}")]
    Scan(String),
    /// Subscription to a characteristic failed
    #[error("Subscribe to {uuid} failed: {reason}")]
    Subscribe { uuid: String, reason: String },
    /// Control write failed
    #[error("Write to handle {handle:#06x} failed: {reason}")]
    Write { handle: u16, reason: String },
    /// Generic error
    #[error("Transport error: {0}")]
    Other(String),
}

/// Trait that every wireless backend must implement
pub trait GattTransport: Send + 'static {
    /// Scan for advertising peripherals for `timeout`.
    fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Open a connection to the peripheral at `address`.
    fn connect(&mut self, address: &str) -> Result<(), TransportError>;

    /// Route notifications of the characteristic `uuid` to `callback`.
    fn subscribe(&mut self, uuid: &str, callback: NotificationCallback) -> Result<(), TransportError>;

    /// Write a command frame to the control characteristic.
    fn write_control(&mut self, handle: u16, command: &[u8]) -> Result<(), TransportError>;

    /// Close the connection and drop every subscription.
    fn disconnect(&mut self) -> Result<(), TransportError>;
}
