pub mod decoder;
pub mod mock_transport;
pub mod muse2016;
pub mod registry;
pub mod synthetic;
pub mod transport;

// Re-export the main types that users need
pub use decoder::{BitReader, DecodeError, DecodedPacket, Gap, PacketDecoder, SequenceTracker};
pub use mock_transport::MockTransport;
pub use registry::DeviceRegistry;
pub use synthetic::SignalGenerator;
pub use transport::{DeviceDescriptor, GattTransport, NotificationCallback, TransportError};
