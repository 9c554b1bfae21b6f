//! Static device descriptions.
//!
//! A `DeviceProfile` is loaded once (from the built-in registry or a JSON/TOML
//! file), validated once, and then shared read-only behind an `Arc` by every
//! worker of a streamer.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{ChannelInfo, StreamInfo};
use crate::error::{ProfileError, ProfileResult};

/// Numeric encoding advertised to the output transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelFormat {
    #[default]
    Float32,
    Double64,
    Int32,
    Int16,
}

/// Width and signedness of one fixed-width field in a wire packet.
///
/// Serialized in the `uint:12` / `int:16` notation used by device vendors'
/// protocol notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldType {
    pub bits: u8,
    pub signed: bool,
}

impl FieldType {
    pub const fn uint(bits: u8) -> Self {
        Self { bits, signed: false }
    }

    pub const fn int(bits: u8) -> Self {
        Self { bits, signed: true }
    }

    /// Widths the decoder reads: 1 to 32 bits.
    pub const fn is_supported(&self) -> bool {
        self.bits >= 1 && self.bits <= 32
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.signed { "int" } else { "uint" };
        write!(f, "{}:{}", kind, self.bits)
    }
}

impl TryFrom<String> for FieldType {
    type Error = ProfileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (kind, bits) = value
            .split_once(':')
            .ok_or_else(|| ProfileError::BadFieldType(value.clone()))?;
        let bits: u8 = bits
            .trim()
            .parse()
            .map_err(|_| ProfileError::BadFieldType(value.clone()))?;
        let field = match kind.trim() {
            "uint" => Self::uint(bits),
            "int" => Self::int(bits),
            _ => return Err(ProfileError::BadFieldType(value)),
        };
        if !field.is_supported() {
            return Err(ProfileError::BadFieldType(value));
        }
        Ok(field)
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

/// Linear calibration applied to a raw integer: `scale * (raw - offset)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for Calibration {
    fn default() -> Self {
        Self { scale: default_scale(), offset: 0.0 }
    }
}

impl Calibration {
    pub const fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }

    #[inline]
    pub fn apply(&self, raw: i64) -> f64 {
        self.scale * (raw as f64 - self.offset)
    }
}

/// One notifying GATT characteristic and the stream channels it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    pub uuid: String,
    /// Attribute handle the transport reports alongside each notification.
    pub handle: u16,
    /// Stream channel indices carried, in wire order.
    pub channels: Vec<usize>,
}

/// Binary layout of the notifications that feed one stream.
///
/// Every notification holds one index field followed by
/// `chunk_size * channels.len()` value fields, sample-major. The last entry of
/// `characteristics` closes a chunk cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketLayout {
    pub index: FieldType,
    pub value: FieldType,
    /// One calibration for every channel, or one per channel.
    #[serde(default = "default_calibration")]
    pub calibration: Vec<Calibration>,
    pub characteristics: Vec<Characteristic>,
    /// Notification size in bytes when the device pads past the packed fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_bytes: Option<usize>,
}

fn default_calibration() -> Vec<Calibration> {
    vec![Calibration::default()]
}

impl PacketLayout {
    pub fn calibration_for(&self, channel: usize) -> Calibration {
        match self.calibration.len() {
            0 => Calibration::default(),
            1 => self.calibration[0],
            _ => self.calibration.get(channel).copied().unwrap_or_default(),
        }
    }

    pub fn characteristic_by_handle(&self, handle: u16) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.handle == handle)
    }

    /// Handle whose notification completes a chunk.
    pub fn trigger_handle(&self) -> Option<u16> {
        self.characteristics.last().map(|c| c.handle)
    }

    /// Total bit width of a notification on `characteristic` for `rows` samples.
    pub fn packet_bits(&self, characteristic: &Characteristic, rows: usize) -> usize {
        self.index.bits as usize + rows * characteristic.channels.len() * self.value.bits as usize
    }

    /// Byte length of a notification on `characteristic`, padding included.
    pub fn payload_len(&self, characteristic: &Characteristic, rows: usize) -> usize {
        self.payload_bytes
            .unwrap_or_else(|| self.packet_bits(characteristic, rows).div_ceil(8))
    }
}

/// Description of one stream type (one sensor modality) of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamParams {
    /// Stream name, also the tag embedded in recorded session filenames.
    pub name: String,
    /// Content type advertised to consumers (e.g. "EEG", "Accelerometer").
    #[serde(rename = "type")]
    pub content_type: String,
    /// Declared sampling frequency in Hz; `0` marks an irregular stream.
    pub nominal_srate: f64,
    pub channel_count: usize,
    pub chunk_size: usize,
    #[serde(default)]
    pub channel_format: ChannelFormat,
    pub channel_names: Vec<String>,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub packet: Option<PacketLayout>,
}

impl StreamParams {
    pub fn is_regular(&self) -> bool {
        self.nominal_srate > 0.0
    }
}

/// Control characteristic and the command frames that begin/end streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSpec {
    pub handle: u16,
    pub start: Vec<u8>,
    pub stop: Vec<u8>,
}

/// Immutable description of one device model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    #[serde(default)]
    pub manufacturer: String,
    pub streams: Vec<StreamParams>,
    pub default_subscriptions: Vec<String>,
    #[serde(default)]
    pub control: Option<ControlSpec>,
}

impl DeviceProfile {
    pub fn stream(&self, name: &str) -> Option<&StreamParams> {
        self.streams.iter().find(|s| s.name == name)
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.iter().map(|s| s.name.as_str())
    }

    /// Whether `name` is on the declared default subscription list.
    pub fn is_default_subscribed(&self, name: &str) -> bool {
        self.default_subscriptions.iter().any(|s| s == name)
    }

    /// Metadata handed to the output transport when an outlet is created.
    pub fn stream_info(&self, stream: &str, source_id: &str) -> Option<StreamInfo> {
        let params = self.stream(stream)?;
        let channels = params
            .channel_names
            .iter()
            .map(|label| ChannelInfo {
                label: label.clone(),
                unit: params.units.clone(),
                kind: params.content_type.clone(),
            })
            .collect();
        Some(StreamInfo {
            name: format!("{}-{}", self.name, params.name),
            stream: params.name.clone(),
            content_type: params.content_type.clone(),
            channel_count: params.channel_count,
            nominal_srate: params.nominal_srate,
            chunk_size: params.chunk_size,
            channel_format: params.channel_format,
            source_id: source_id.to_string(),
            manufacturer: self.manufacturer.clone(),
            channels,
        })
    }

    /// Check every structural invariant once, at load time.
    pub fn validate(&self) -> ProfileResult<()> {
        let invalid = |message: String| ProfileError::Invalid {
            device: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("device name must not be empty".into()));
        }
        if self.streams.is_empty() {
            return Err(invalid("at least one stream must be declared".into()));
        }

        let mut seen = HashSet::new();
        for stream in &self.streams {
            if !seen.insert(stream.name.as_str()) {
                return Err(invalid(format!("duplicate stream '{}'", stream.name)));
            }
            if !stream.nominal_srate.is_finite() || stream.nominal_srate < 0.0 {
                return Err(invalid(format!(
                    "stream '{}' has invalid nominal_srate {}",
                    stream.name, stream.nominal_srate
                )));
            }
            if stream.channel_count == 0 || stream.chunk_size == 0 {
                return Err(invalid(format!(
                    "stream '{}' needs channel_count > 0 and chunk_size > 0",
                    stream.name
                )));
            }
            if stream.channel_names.len() != stream.channel_count {
                return Err(invalid(format!(
                    "stream '{}' declares {} channel names for {} channels",
                    stream.name,
                    stream.channel_names.len(),
                    stream.channel_count
                )));
            }
            if let Some(layout) = &stream.packet {
                Self::validate_layout(stream, layout).map_err(invalid)?;
            }
        }

        for name in &self.default_subscriptions {
            if self.stream(name).is_none() {
                return Err(invalid(format!("default subscription '{}' is not a stream", name)));
            }
        }

        Ok(())
    }

    fn validate_layout(stream: &StreamParams, layout: &PacketLayout) -> Result<(), String> {
        if layout.characteristics.is_empty() {
            return Err(format!("stream '{}' packet layout has no characteristics", stream.name));
        }
        for (role, field) in [("index", layout.index), ("value", layout.value)] {
            if !field.is_supported() {
                return Err(format!(
                    "stream '{}' {} field {} must be 1 to 32 bits wide",
                    stream.name, role, field
                ));
            }
        }
        let calibrations = layout.calibration.len();
        if calibrations > 1 && calibrations != stream.channel_count {
            return Err(format!(
                "stream '{}' has {} calibrations for {} channels",
                stream.name, calibrations, stream.channel_count
            ));
        }

        let mut covered = vec![false; stream.channel_count];
        let mut handles = HashSet::new();
        for characteristic in &layout.characteristics {
            if !handles.insert(characteristic.handle) {
                return Err(format!(
                    "stream '{}' repeats handle {:#06x}",
                    stream.name, characteristic.handle
                ));
            }
            if characteristic.channels.is_empty() {
                return Err(format!(
                    "characteristic {} of stream '{}' carries no channels",
                    characteristic.uuid, stream.name
                ));
            }
            for &channel in &characteristic.channels {
                match covered.get_mut(channel) {
                    Some(slot) if !*slot => *slot = true,
                    Some(_) => {
                        return Err(format!(
                            "channel {} of stream '{}' is carried twice",
                            channel, stream.name
                        ))
                    }
                    None => {
                        return Err(format!(
                            "channel {} out of range for stream '{}'",
                            channel, stream.name
                        ))
                    }
                }
            }
        }
        if let Some(missing) = covered.iter().position(|c| !c) {
            return Err(format!(
                "channel {} of stream '{}' is not carried by any characteristic",
                missing, stream.name
            ));
        }

        if let Some(declared) = layout.payload_bytes {
            for characteristic in &layout.characteristics {
                let packed = layout.packet_bits(characteristic, stream.chunk_size).div_ceil(8);
                if declared < packed {
                    return Err(format!(
                        "stream '{}' declares {}-byte payloads but characteristic {} packs {} bytes",
                        stream.name, declared, characteristic.uuid, packed
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> ProfileResult<Self> {
        let profile: DeviceProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_toml_str(text: &str) -> ProfileResult<Self> {
        let profile: DeviceProfile = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile from a `.json` or `.toml` file.
    pub fn from_file(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Self::from_json_str(&contents),
            "toml" => Self::from_toml_str(&contents),
            other => Err(ProfileError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_stream_profile() -> DeviceProfile {
        DeviceProfile {
            name: "Probe".into(),
            manufacturer: "Acme".into(),
            streams: vec![
                StreamParams {
                    name: "EEG".into(),
                    content_type: "EEG".into(),
                    nominal_srate: 128.0,
                    channel_count: 2,
                    chunk_size: 4,
                    channel_format: ChannelFormat::Float32,
                    channel_names: vec!["C3".into(), "C4".into()],
                    units: "microvolts".into(),
                    packet: Some(PacketLayout {
                        index: FieldType::uint(16),
                        value: FieldType::uint(12),
                        calibration: vec![Calibration::new(0.5, 2048.0)],
                        characteristics: vec![
                            Characteristic { uuid: "a".into(), handle: 0x20, channels: vec![0] },
                            Characteristic { uuid: "b".into(), handle: 0x23, channels: vec![1] },
                        ],
                        payload_bytes: None,
                    }),
                },
                StreamParams {
                    name: "STATUS".into(),
                    content_type: "Status".into(),
                    nominal_srate: 0.0,
                    channel_count: 1,
                    chunk_size: 1,
                    channel_format: ChannelFormat::Float32,
                    channel_names: vec!["status".into()],
                    units: String::new(),
                    packet: None,
                },
            ],
            default_subscriptions: vec!["EEG".into(), "STATUS".into()],
            control: None,
        }
    }

    #[test]
    fn test_field_type_notation() {
        let parsed = FieldType::try_from("uint:12".to_string()).unwrap();
        assert_eq!(parsed, FieldType::uint(12));
        assert_eq!(FieldType::int(16).to_string(), "int:16");
        assert!(FieldType::try_from("float:12".to_string()).is_err());
        assert!(FieldType::try_from("uint:0".to_string()).is_err());
        assert!(FieldType::try_from("uint".to_string()).is_err());
    }

    #[test]
    fn test_calibration_apply() {
        let cal = Calibration::new(0.48828125, 2048.0);
        assert_eq!(cal.apply(2048), 0.0);
        assert_eq!(cal.apply(4095), 0.48828125 * 2047.0);
        assert_eq!(Calibration::default().apply(-7), -7.0);
    }

    #[test]
    fn test_valid_profile_passes() {
        assert!(two_stream_profile().validate().is_ok());
    }

    #[test]
    fn test_default_subscription_flag() {
        let mut profile = two_stream_profile();
        profile.default_subscriptions = vec!["STATUS".into()];
        assert!(profile.is_default_subscribed("STATUS"));
        assert!(!profile.is_default_subscribed("EEG"));
        assert!(!profile.is_default_subscribed("GYRO"));
    }

    #[test]
    fn test_unknown_default_subscription_rejected() {
        let mut profile = two_stream_profile();
        profile.default_subscriptions.push("GYRO".into());
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("GYRO"));
    }

    #[test]
    fn test_uncovered_channel_rejected() {
        let mut profile = two_stream_profile();
        if let Some(layout) = profile.streams[0].packet.as_mut() {
            layout.characteristics.pop();
        }
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_zero_width_field_rejected() {
        let mut profile = two_stream_profile();
        if let Some(layout) = profile.streams[0].packet.as_mut() {
            layout.value = FieldType::int(0);
        }
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("value field int:0"));

        let mut profile = two_stream_profile();
        if let Some(layout) = profile.streams[0].packet.as_mut() {
            layout.index = FieldType::uint(40);
        }
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_declared_payload_must_hold_packed_fields() {
        let mut profile = two_stream_profile();
        let layout = profile.streams[0].packet.as_mut().unwrap();
        // 16 + 4 * 12 bits pack into 8 bytes.
        layout.payload_bytes = Some(7);
        assert!(profile.validate().is_err());

        let layout = profile.streams[0].packet.as_mut().unwrap();
        layout.payload_bytes = Some(20);
        let characteristic = layout.characteristics[0].clone();
        assert_eq!(layout.payload_len(&characteristic, 4), 20);
        assert!(profile.validate().is_ok());

        let layout = profile.streams[0].packet.as_mut().unwrap();
        layout.payload_bytes = None;
        assert_eq!(layout.payload_len(&characteristic, 4), 8);
    }

    #[test]
    fn test_channel_name_count_checked() {
        let mut profile = two_stream_profile();
        profile.streams[1].channel_names.clear();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_field_notation() {
        let json = serde_json::to_string(&two_stream_profile()).unwrap();
        assert!(json.contains("\"uint:12\""));
        let loaded = DeviceProfile::from_json_str(&json).unwrap();
        assert_eq!(loaded, two_stream_profile());
    }

    #[test]
    fn test_stream_info_carries_channel_labels() {
        let profile = two_stream_profile();
        let info = profile.stream_info("EEG", "Probe-0").unwrap();
        assert_eq!(info.name, "Probe-EEG");
        assert_eq!(info.stream, "EEG");
        assert_eq!(info.channel_count, 2);
        assert_eq!(info.channels[1].label, "C4");
        assert_eq!(info.channels[0].unit, "microvolts");
        assert!(profile.stream_info("GYRO", "Probe-0").is_none());
    }
}
