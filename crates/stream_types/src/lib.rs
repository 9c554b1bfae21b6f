//! Shared types for the biosensor streaming workspace
//!
//! This crate contains the static device description (`DeviceProfile`) and the
//! data that flows out of a streamer (`Chunk`, `StreamInfo`). Everything here is
//! plain data: no threads, no I/O beyond loading a profile file.

pub mod data;
pub mod error;
pub mod profile;

// Re-export commonly used types
pub use data::*;
pub use error::*;
pub use profile::*;
