//! Decoding of vendor notification packets into calibrated values.
//!
//! A notification is a big-endian bit string: one sequence-index field followed
//! by fixed-width value fields laid out sample-major over the channels its
//! characteristic carries.

use log::warn;
use thiserror::Error;

use stream_types::{FieldType, PacketLayout, StreamParams};

/// Errors produced while decoding a single notification. Never fatal to a stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed packet on handle {handle:#06x}: {actual_bytes} bytes instead of {expected_bytes}")]
    MalformedPacket {
        handle: u16,
        expected_bytes: usize,
        actual_bytes: usize,
    },
    #[error("Notification on undeclared handle {0:#06x}")]
    UnknownHandle(u16),
}

/// Sequential reader over a big-endian bit string.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    /// Read `bits` (at most 64) as an unsigned integer.
    pub fn read_bits(&mut self, bits: u8) -> Option<u64> {
        let bits = bits as usize;
        if bits > 64 || bits > self.remaining() {
            return None;
        }
        let mut value = 0u64;
        for _ in 0..bits {
            let byte = self.data[self.pos / 8];
            let bit = (byte >> (7 - (self.pos % 8))) & 1;
            value = (value << 1) | bit as u64;
            self.pos += 1;
        }
        Some(value)
    }

    /// Read one field, sign-extending two's-complement fields.
    pub fn read_field(&mut self, field: FieldType) -> Option<i64> {
        let raw = self.read_bits(field.bits)?;
        if field.signed && field.bits < 64 && raw & (1 << (field.bits - 1)) != 0 {
            Some(raw as i64 - (1i64 << field.bits))
        } else {
            Some(raw as i64)
        }
    }
}

/// One decoded notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub handle: u16,
    /// Device-assigned sequence index.
    pub index: u64,
    /// Stream channels carried, in wire order.
    pub channels: Vec<usize>,
    /// Calibrated values, sample-major: `rows * channels.len()` entries.
    pub values: Vec<f64>,
}

impl DecodedPacket {
    pub fn rows(&self) -> usize {
        if self.channels.is_empty() {
            0
        } else {
            self.values.len() / self.channels.len()
        }
    }

    /// Value of the `k`-th carried channel in row `row`.
    pub fn value(&self, row: usize, k: usize) -> f64 {
        self.values[row * self.channels.len() + k]
    }
}

/// Stateless decoder for the notifications of one stream.
#[derive(Debug, Clone)]
pub struct PacketDecoder {
    layout: PacketLayout,
    rows: usize,
}

impl PacketDecoder {
    /// Returns `None` for streams that have no wire layout.
    pub fn for_stream(params: &StreamParams) -> Option<Self> {
        params.packet.clone().map(|layout| Self {
            layout,
            rows: params.chunk_size,
        })
    }

    pub fn layout(&self) -> &PacketLayout {
        &self.layout
    }

    pub fn trigger_handle(&self) -> Option<u16> {
        self.layout.trigger_handle()
    }

    /// Notification length on `handle`, trailing padding included.
    pub fn expected_len(&self, handle: u16) -> Option<usize> {
        self.layout
            .characteristic_by_handle(handle)
            .map(|c| self.layout.payload_len(c, self.rows))
    }

    pub fn decode(&self, handle: u16, payload: &[u8]) -> Result<DecodedPacket, DecodeError> {
        let characteristic = self
            .layout
            .characteristic_by_handle(handle)
            .ok_or(DecodeError::UnknownHandle(handle))?;

        let expected_bytes = self.layout.payload_len(characteristic, self.rows);
        if payload.len() != expected_bytes {
            return Err(DecodeError::MalformedPacket {
                handle,
                expected_bytes,
                actual_bytes: payload.len(),
            });
        }

        let malformed = || DecodeError::MalformedPacket {
            handle,
            expected_bytes,
            actual_bytes: payload.len(),
        };

        let mut reader = BitReader::new(payload);
        let index = reader.read_bits(self.layout.index.bits).ok_or_else(malformed)?;

        let mut values = Vec::with_capacity(self.rows * characteristic.channels.len());
        for _ in 0..self.rows {
            for &channel in &characteristic.channels {
                let raw = reader.read_field(self.layout.value).ok_or_else(malformed)?;
                values.push(self.layout.calibration_for(channel).apply(raw));
            }
        }

        Ok(DecodedPacket {
            handle,
            index,
            channels: characteristic.channels.clone(),
            values,
        })
    }
}

/// A discontinuity in a stream's packet sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub expected: u64,
    pub received: u64,
    /// Packets skipped between `expected` and `received`, modulo the index width.
    pub missed: u64,
}

/// Tracks the sequence index of one stream and reports gaps.
///
/// The first observed index seeds the tracker. Gaps are counted and logged but
/// never block: `last_seq` always moves to the latest index.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    stream: String,
    modulus: u64,
    last_seq: Option<u64>,
    gaps: u64,
    missed: u64,
}

impl SequenceTracker {
    pub fn new(stream: impl Into<String>, index_bits: u8) -> Self {
        Self {
            stream: stream.into(),
            modulus: 1u64 << index_bits.min(63),
            last_seq: None,
            gaps: 0,
            missed: 0,
        }
    }

    pub fn observe(&mut self, index: u64) -> Option<Gap> {
        let index = index % self.modulus;
        let gap = match self.last_seq {
            None => None,
            Some(last) => {
                let expected = (last + 1) % self.modulus;
                if index == expected {
                    None
                } else {
                    let missed = (index + self.modulus - expected) % self.modulus;
                    Some(Gap { expected, received: index, missed })
                }
            }
        };

        if let Some(gap) = gap {
            self.gaps += 1;
            self.missed += gap.missed;
            warn!(
                "Missing sample on {}: expected index {}, received {} ({} skipped)",
                self.stream, gap.expected, gap.received, gap.missed
            );
        }
        self.last_seq = Some(index);
        gap
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn gap_count(&self) -> u64 {
        self.gaps
    }

    pub fn missed_count(&self) -> u64 {
        self.missed
    }

    pub fn reset(&mut self) {
        self.last_seq = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muse2016;

    /// Pack an index and 12-bit values the way the headset does.
    fn pack_eeg(index: u16, values: &[u16]) -> Vec<u8> {
        let mut bits: Vec<u8> = Vec::new();
        for i in (0..16).rev() {
            bits.push(((index >> i) & 1) as u8);
        }
        for v in values {
            for i in (0..12).rev() {
                bits.push(((v >> i) & 1) as u8);
            }
        }
        bits.chunks(8)
            .map(|byte| byte.iter().fold(0u8, |acc, b| (acc << 1) | b))
            .collect()
    }

    fn eeg_decoder() -> PacketDecoder {
        let profile = muse2016::profile();
        PacketDecoder::for_stream(profile.stream("EEG").unwrap()).unwrap()
    }

    #[test]
    fn test_bit_reader_reads_across_bytes() {
        let data = [0b1010_1100, 0b0101_0011];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(4), Some(0b1010));
        assert_eq!(reader.read_bits(8), Some(0b1100_0101));
        assert_eq!(reader.read_bits(4), Some(0b0011));
        assert_eq!(reader.read_bits(1), None);
    }

    #[test]
    fn test_bit_reader_sign_extends() {
        let data = 0xFFFEu16.to_be_bytes();
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_field(FieldType::int(16)), Some(-2));
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_field(FieldType::uint(16)), Some(0xFFFE));
    }

    #[test]
    fn test_eeg_packet_calibrated() {
        let decoder = eeg_decoder();
        let mut raw = vec![2048u16; 12];
        raw[0] = 4095;
        raw[11] = 0;
        let payload = pack_eeg(513, &raw);
        assert_eq!(payload.len(), 20);

        let packet = decoder.decode(0x20, &payload).unwrap();
        assert_eq!(packet.index, 513);
        assert_eq!(packet.channels, vec![0]);
        assert_eq!(packet.rows(), 12);
        assert_eq!(packet.values[0], 0.48828125 * 2047.0);
        assert_eq!(packet.values[1], 0.0);
        assert_eq!(packet.values[11], -1000.0);
    }

    #[test]
    fn test_wrong_size_packet_rejected() {
        let decoder = eeg_decoder();
        let err = decoder.decode(0x20, &[0u8; 19]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedPacket { handle: 0x20, expected_bytes: 20, actual_bytes: 19 }
        );
    }

    #[test]
    fn test_unknown_handle_rejected() {
        let decoder = eeg_decoder();
        assert_eq!(decoder.decode(0x99, &[0u8; 20]), Err(DecodeError::UnknownHandle(0x99)));
    }

    #[test]
    fn test_imu_packet_is_sample_major_and_signed() {
        let profile = muse2016::profile();
        let decoder = PacketDecoder::for_stream(profile.stream("ACC").unwrap()).unwrap();
        let mut payload = 7u16.to_be_bytes().to_vec();
        for v in [1i16, -1, 2, -2, 3, -3, 4, -4, 16384] {
            payload.extend_from_slice(&v.to_be_bytes());
        }
        let packet = decoder.decode(0x17, &payload).unwrap();
        assert_eq!(packet.index, 7);
        assert_eq!(packet.rows(), 3);
        assert!(packet.value(0, 1) < 0.0);
        assert!(packet.value(1, 0) > 0.0);
        assert!((packet.value(2, 2) - 16384.0 * 0.0000610352).abs() < 1e-12);
    }

    #[test]
    fn test_padded_telemetry_packet() {
        let profile = muse2016::profile();
        let decoder = PacketDecoder::for_stream(profile.stream("TELEMETRY").unwrap()).unwrap();
        assert_eq!(decoder.expected_len(0x1a), Some(20));
        assert_eq!(decoder.expected_len(0x20), None);

        let mut payload = 42u16.to_be_bytes().to_vec();
        for v in [51200u16, 40, 3000, 25] {
            payload.extend_from_slice(&v.to_be_bytes());
        }
        payload.resize(20, 0);

        let packet = decoder.decode(0x1a, &payload).unwrap();
        assert_eq!(packet.index, 42);
        assert_eq!(packet.values.len(), 4);
        assert_eq!(packet.values[0], 100.0);
        assert!((packet.values[1] - 88.0).abs() < 1e-9);
        assert_eq!(&packet.values[2..], &[3000.0, 25.0]);
        assert!(matches!(
            decoder.decode(0x1a, &payload[..10]),
            Err(DecodeError::MalformedPacket { expected_bytes: 20, actual_bytes: 10, .. })
        ));
    }

    #[test]
    fn test_gap_reported_once_and_decoding_continues() {
        let decoder = eeg_decoder();
        let mut tracker = SequenceTracker::new("EEG", 16);
        let mut gaps = Vec::new();

        for index in [10u16, 12, 13] {
            let packet = decoder.decode(0x2c, &pack_eeg(index, &[2048; 12])).unwrap();
            if let Some(gap) = tracker.observe(packet.index) {
                gaps.push(gap);
            }
        }

        assert_eq!(gaps, vec![Gap { expected: 11, received: 12, missed: 1 }]);
        assert_eq!(tracker.gap_count(), 1);
        assert_eq!(tracker.last_seq(), Some(13));
    }

    #[test]
    fn test_sequence_wraps_without_gap() {
        let mut tracker = SequenceTracker::new("EEG", 16);
        assert_eq!(tracker.observe(65535), None);
        assert_eq!(tracker.observe(0), None);
        assert_eq!(tracker.gap_count(), 0);
    }

    #[test]
    fn test_reset_reseeds_tracker() {
        let mut tracker = SequenceTracker::new("EEG", 16);
        tracker.observe(4);
        tracker.reset();
        assert_eq!(tracker.observe(100), None);
        assert_eq!(tracker.missed_count(), 0);
    }
}
