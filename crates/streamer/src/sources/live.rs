use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};

use devices::{GattTransport, PacketDecoder, SequenceTracker};
use stream_types::DeviceProfile;

use crate::error::{StreamerError, StreamerResult};
use crate::streamer::{DataSource, SourceContext};
use crate::worker::StreamWorker;

/// Decode counters for one live stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveStats {
    pub packets: u64,
    pub decode_errors: u64,
    pub gaps: u64,
    pub missed: u64,
    /// Cycles closed by the trigger before every characteristic arrived.
    pub incomplete: u64,
}

/// Decoder, continuity tracker and (while armed) worker of one stream.
///
/// Only the transport's callback context touches a slot while streaming; the
/// mutex exists so the callback is `Send`, not to arbitrate contention.
struct LiveSlot {
    decoder: PacketDecoder,
    tracker: SequenceTracker,
    worker: Option<StreamWorker>,
    /// Characteristics decoded in the current cycle, in layout order.
    received: Vec<bool>,
    packets: u64,
    decode_errors: u64,
    incomplete: u64,
}

impl LiveSlot {
    fn new(stream: &str, decoder: PacketDecoder) -> Self {
        let characteristics = decoder.layout().characteristics.len();
        Self {
            tracker: SequenceTracker::new(stream, decoder.layout().index.bits),
            decoder,
            worker: None,
            received: vec![false; characteristics],
            packets: 0,
            decode_errors: 0,
            incomplete: 0,
        }
    }

    fn arm(&mut self, worker: StreamWorker) {
        self.tracker.reset();
        self.received.iter_mut().for_each(|r| *r = false);
        self.worker = Some(worker);
    }

    fn on_notification(&mut self, handle: u16, payload: &[u8]) {
        let Some(worker) = self.worker.as_mut() else {
            return;
        };
        self.packets += 1;

        let packet = match self.decoder.decode(handle, payload) {
            Ok(packet) => packet,
            Err(e) => {
                self.decode_errors += 1;
                warn!("{}: {}", worker.stream(), e);
                return;
            }
        };

        worker.apply_packet(&packet);
        if let Some(position) = self
            .decoder
            .layout()
            .characteristics
            .iter()
            .position(|c| c.handle == handle)
        {
            self.received[position] = true;
        }

        if self.decoder.trigger_handle() == Some(handle) {
            self.tracker.observe(packet.index);
            if self.received.iter().all(|&r| r) {
                if let Err(e) = worker.complete_chunk() {
                    error!("{}: failed to publish chunk: {}", worker.stream(), e);
                }
            } else {
                self.incomplete += 1;
                let missing = self.received.iter().filter(|r| !**r).count();
                warn!(
                    "{}: cycle ending at index {} lacks {} characteristic(s), chunk dropped",
                    worker.stream(),
                    packet.index,
                    missing
                );
                worker.discard_chunk();
            }
            self.received.iter_mut().for_each(|r| *r = false);
        }
    }

    fn stats(&self) -> LiveStats {
        LiveStats {
            packets: self.packets,
            decode_errors: self.decode_errors,
            gaps: self.tracker.gap_count(),
            missed: self.tracker.missed_count(),
            incomplete: self.incomplete,
        }
    }
}

fn lock_slot(slot: &Mutex<LiveSlot>) -> MutexGuard<'_, LiveSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Notifications from a device, decoded per its profile's packet layouts.
pub struct LiveSource<T: GattTransport> {
    transport: T,
    address: Option<String>,
    connected_to: Option<String>,
    slots: Vec<(String, Arc<Mutex<LiveSlot>>)>,
}

impl<T: GattTransport> LiveSource<T> {
    /// The device address is discovered by scanning for the profile's name.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            address: None,
            connected_to: None,
            slots: Vec::new(),
        }
    }

    /// Connect to `address` without scanning.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Address of the connected device.
    pub fn address(&self) -> Option<&str> {
        self.connected_to.as_deref()
    }

    pub fn stats(&self, stream: &str) -> Option<LiveStats> {
        self.slots
            .iter()
            .find(|(name, _)| name == stream)
            .map(|(_, slot)| lock_slot(slot).stats())
    }

    fn resolve_address(&mut self, profile: &DeviceProfile, ctx: &SourceContext<'_>) -> StreamerResult<String> {
        if let Some(address) = &self.address {
            return Ok(address.clone());
        }
        info!("Scanning {:?} for '{}'", ctx.config.scan_timeout(), profile.name);
        let found = self
            .transport
            .scan(ctx.config.scan_timeout())
            .map_err(StreamerError::Connection)?;
        found
            .into_iter()
            .find(|device| device.name == profile.name)
            .map(|device| device.address)
            .ok_or_else(|| StreamerError::DeviceNotFound(profile.name.clone()))
    }

    fn subscribe_all(&mut self, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        for stream in ctx.subscriptions {
            let Some(params) = ctx.profile.stream(stream) else {
                return Err(StreamerError::UnknownStream(stream.clone()));
            };
            let Some(decoder) = PacketDecoder::for_stream(params) else {
                info!("{} has no wire layout, nothing to subscribe", stream);
                continue;
            };

            let characteristics = decoder.layout().characteristics.clone();
            let slot = Arc::new(Mutex::new(LiveSlot::new(stream, decoder)));

            for characteristic in characteristics {
                let target = slot.clone();
                self.transport.subscribe(
                    &characteristic.uuid,
                    Box::new(move |handle: u16, payload: &[u8]| {
                        lock_slot(&target).on_notification(handle, payload)
                    }),
                )?;
                debug!("Subscribed {} to {}", stream, characteristic.uuid);
            }
            self.slots.push((stream.clone(), slot));
        }
        Ok(())
    }

    fn disarm(&mut self) {
        for (_, slot) in &self.slots {
            lock_slot(slot).worker = None;
        }
    }
}

impl<T: GattTransport> DataSource for LiveSource<T> {
    fn kind(&self) -> &'static str {
        "live"
    }

    fn connect(&mut self, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        let address = self.resolve_address(ctx.profile, ctx)?;
        self.transport
            .connect(&address)
            .map_err(StreamerError::Connection)?;
        info!("Connected to {} at {}", ctx.profile.name, address);
        self.connected_to = Some(address);

        if let Err(e) = self.subscribe_all(ctx) {
            self.slots.clear();
            if let Err(close) = self.transport.disconnect() {
                warn!("Disconnect after failed subscribe: {}", close);
            }
            self.connected_to = None;
            return Err(e);
        }
        Ok(())
    }

    fn start(&mut self, workers: Vec<StreamWorker>, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        for worker in workers {
            match self.slots.iter().find(|(name, _)| name == worker.stream()) {
                Some((_, slot)) => lock_slot(slot).arm(worker),
                None => debug!("{} receives no notifications", worker.stream()),
            }
        }

        if let Some(control) = &ctx.profile.control {
            if let Err(e) = self.transport.write_control(control.handle, &control.start) {
                self.disarm();
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn stop(&mut self, ctx: &SourceContext<'_>) -> StreamerResult<()> {
        let result = match &ctx.profile.control {
            Some(control) => self
                .transport
                .write_control(control.handle, &control.stop)
                .map_err(StreamerError::from),
            None => Ok(()),
        };
        self.disarm();
        result
    }

    fn disconnect(&mut self) -> StreamerResult<()> {
        self.disarm();
        self.slots.clear();
        self.transport.disconnect()?;
        if let Some(address) = self.connected_to.take() {
            info!("Disconnected from {}", address);
        }
        Ok(())
    }

    fn active_workers(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, slot)| lock_slot(slot).worker.is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }
}
