//! In-memory `GattTransport` that does not touch any radio.
//!
//! Tests drive it from the outside: `notify` plays a notification into the
//! callback subscribed for a characteristic, and `control_writes` exposes every
//! command the streamer sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info};

use crate::transport::{DeviceDescriptor, GattTransport, NotificationCallback, TransportError};

/// A stubbed-out transport. Clones share state, so a test can keep one handle
/// while the streamer owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    advertised: Vec<DeviceDescriptor>,
    connected: Option<String>,
    subscriptions: HashMap<String, NotificationCallback>,
    writes: Vec<(u16, Vec<u8>)>,
    connect_attempts: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport on which `devices` advertise and accept connections.
    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        let transport = Self::new();
        transport.lock().advertised = devices;
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        // A panicking test thread must not wedge the others.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected.is_some()
    }

    pub fn connected_address(&self) -> Option<String> {
        self.lock().connected.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    /// UUIDs with a live subscription, sorted.
    pub fn subscribed_uuids(&self) -> Vec<String> {
        let mut uuids: Vec<String> = self.lock().subscriptions.keys().cloned().collect();
        uuids.sort();
        uuids
    }

    pub fn control_writes(&self) -> Vec<(u16, Vec<u8>)> {
        self.lock().writes.clone()
    }

    /// Deliver one notification to the callback subscribed for `uuid`.
    ///
    /// Returns `false` when nothing is subscribed. The callback runs without
    /// the internal lock held, so it may call back into the transport.
    pub fn notify(&self, uuid: &str, handle: u16, payload: &[u8]) -> bool {
        let callback = self.lock().subscriptions.remove(uuid);
        let Some(mut callback) = callback else {
            return false;
        };
        callback(handle, payload);

        let mut inner = self.lock();
        // Keep a subscription made while the callback ran.
        inner.subscriptions.entry(uuid.to_string()).or_insert(callback);
        true
    }
}

impl GattTransport for MockTransport {
    fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let found = self.lock().advertised.clone();
        debug!("Mock scan ({:?}) found {} device(s)", timeout, found.len());
        Ok(found)
    }

    fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.connect_attempts += 1;
        if !inner.advertised.iter().any(|d| d.address == address) {
            return Err(TransportError::ConnectionFailed {
                address: address.to_string(),
                reason: "no device advertising at this address".into(),
            });
        }
        inner.connected = Some(address.to_string());
        info!("Mock transport connected to {}", address);
        Ok(())
    }

    fn subscribe(&mut self, uuid: &str, callback: NotificationCallback) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.connected.is_none() {
            return Err(TransportError::NotConnected);
        }
        inner.subscriptions.insert(uuid.to_string(), callback);
        Ok(())
    }

    fn write_control(&mut self, handle: u16, command: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.connected.is_none() {
            return Err(TransportError::NotConnected);
        }
        inner.writes.push((handle, command.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.subscriptions.clear();
        if let Some(address) = inner.connected.take() {
            info!("Mock transport disconnected from {}", address);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn device() -> DeviceDescriptor {
        DeviceDescriptor { name: "Muse-1234".into(), address: "00:55:DA:B0:12:34".into() }
    }

    #[test]
    fn test_connect_unknown_address_fails() {
        let mut transport = MockTransport::with_devices(vec![device()]);
        let err = transport.connect("11:22:33:44:55:66").unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_notify_reaches_subscriber() {
        let mut transport = MockTransport::with_devices(vec![device()]);
        transport.connect(&device().address).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        transport
            .subscribe("uuid-a", Box::new(move |handle: u16, payload: &[u8]| {
                assert_eq!(handle, 0x20);
                assert_eq!(payload, &[1, 2]);
                seen.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert!(transport.notify("uuid-a", 0x20, &[1, 2]));
        assert!(transport.notify("uuid-a", 0x20, &[1, 2]));
        assert!(!transport.notify("uuid-b", 0x20, &[1, 2]));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_writes_require_connection() {
        let mut transport = MockTransport::new();
        assert!(matches!(transport.write_control(0x0e, &[1]), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_disconnect_drops_subscriptions() {
        let mut transport = MockTransport::with_devices(vec![device()]);
        transport.connect(&device().address).unwrap();
        transport.subscribe("uuid-a", Box::new(|_: u16, _: &[u8]| {})).unwrap();
        transport.disconnect().unwrap();
        assert!(transport.subscribed_uuids().is_empty());
        assert!(!transport.notify("uuid-a", 0x20, &[]));
    }
}
