//! Interaxon Muse (2016 model) parameters.
//!
//! All characteristic UUIDs live in the vendor namespace
//! `273eXXXX-4c4d-454d-96be-f03bac821358`.

use stream_types::{
    Calibration, ChannelFormat, Characteristic, ControlSpec, DeviceProfile, FieldType,
    PacketLayout, StreamParams,
};

pub const NAME: &str = "Muse";

/// Control characteristic handle.
pub const CONTROL_HANDLE: u16 = 0x000e;

/// 12-bit EEG ADC centred at 2048, 0.48828125 µV per LSB.
pub const EEG_CALIBRATION: Calibration = Calibration::new(0.48828125, 2048.0);

pub const EEG_CHANNEL_NAMES: [&str; 5] = ["TP9", "AF7", "AF8", "TP10", "Right AUX"];
const EEG_HANDLES: [u16; 5] = [0x20, 0x23, 0x26, 0x29, 0x2c];

fn uuid(short: u16) -> String {
    format!("273e{:04x}-4c4d-454d-96be-f03bac821358", short)
}

/// Frame a text command for the control characteristic: a length byte, the
/// ASCII command and a trailing newline (`"d"` → `[0x02, b'd', b'\n']`).
pub fn encode_command(cmd: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(cmd.len() + 2);
    bytes.push((cmd.len() + 1) as u8);
    bytes.extend_from_slice(cmd.as_bytes());
    bytes.push(b'\n');
    bytes
}

fn imu_stream(name: &str, content_type: &str, short: u16, handle: u16, scale: f64, units: &str) -> StreamParams {
    StreamParams {
        name: name.into(),
        content_type: content_type.into(),
        nominal_srate: 52.0,
        channel_count: 3,
        chunk_size: 3,
        channel_format: ChannelFormat::Float32,
        channel_names: vec!["x".into(), "y".into(), "z".into()],
        units: units.into(),
        packet: Some(PacketLayout {
            index: FieldType::uint(16),
            value: FieldType::int(16),
            calibration: vec![Calibration::new(scale, 0.0)],
            characteristics: vec![Characteristic {
                uuid: uuid(short),
                handle,
                channels: vec![0, 1, 2],
            }],
            payload_bytes: None,
        }),
    }
}

/// The reference profile.
///
/// `STATUS` is declared in the default subscriptions but carries no regular
/// samples, so the declared defaults and the positive-rate set differ.
pub fn profile() -> DeviceProfile {
    let eeg = StreamParams {
        name: "EEG".into(),
        content_type: "EEG".into(),
        nominal_srate: 256.0,
        channel_count: 5,
        chunk_size: 12,
        channel_format: ChannelFormat::Float32,
        channel_names: EEG_CHANNEL_NAMES.iter().map(|s| s.to_string()).collect(),
        units: "microvolts".into(),
        packet: Some(PacketLayout {
            index: FieldType::uint(16),
            value: FieldType::uint(12),
            calibration: vec![EEG_CALIBRATION],
            characteristics: EEG_HANDLES
                .iter()
                .enumerate()
                .map(|(i, &handle)| Characteristic {
                    uuid: uuid(0x0003 + i as u16),
                    handle,
                    channels: vec![i],
                })
                .collect(),
            payload_bytes: None,
        }),
    };

    let telemetry = StreamParams {
        name: "TELEMETRY".into(),
        content_type: "Telemetry".into(),
        nominal_srate: 0.1,
        channel_count: 4,
        chunk_size: 1,
        channel_format: ChannelFormat::Float32,
        channel_names: vec![
            "battery".into(),
            "fuel_gauge".into(),
            "adc_volt".into(),
            "temperature".into(),
        ],
        units: String::new(),
        packet: Some(PacketLayout {
            index: FieldType::uint(16),
            value: FieldType::uint(16),
            calibration: vec![
                Calibration::new(1.0 / 512.0, 0.0),
                Calibration::new(2.2, 0.0),
                Calibration::new(1.0, 0.0),
                Calibration::new(1.0, 0.0),
            ],
            characteristics: vec![Characteristic {
                uuid: uuid(0x000b),
                handle: 0x1a,
                channels: vec![0, 1, 2, 3],
            }],
            // Four fields after the index, zero-padded to a full notification.
            payload_bytes: Some(20),
        }),
    };

    let status = StreamParams {
        name: "STATUS".into(),
        content_type: "Status".into(),
        nominal_srate: 0.0,
        channel_count: 1,
        chunk_size: 1,
        channel_format: ChannelFormat::Float32,
        channel_names: vec!["status".into()],
        units: String::new(),
        packet: None,
    };

    DeviceProfile {
        name: NAME.into(),
        manufacturer: "Muse".into(),
        streams: vec![
            eeg,
            imu_stream("ACC", "Accelerometer", 0x000a, 0x17, 0.0000610352, "g"),
            imu_stream("GYRO", "Gyroscope", 0x0009, 0x14, 0.0074768, "dps"),
            telemetry,
            status,
        ],
        default_subscriptions: vec![
            "EEG".into(),
            "ACC".into(),
            "GYRO".into(),
            "TELEMETRY".into(),
            "STATUS".into(),
        ],
        control: Some(ControlSpec {
            handle: CONTROL_HANDLE,
            start: encode_command("d"),
            stop: encode_command("h"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_is_valid() {
        profile().validate().unwrap();
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(encode_command("d"), vec![0x02, 0x64, 0x0a]);
        assert_eq!(encode_command("h"), vec![0x02, 0x68, 0x0a]);
        assert_eq!(encode_command("p21"), vec![0x04, b'p', b'2', b'1', b'\n']);
    }

    #[test]
    fn test_eeg_characteristics_in_channel_order() {
        let profile = profile();
        let layout = profile.stream("EEG").unwrap().packet.as_ref().unwrap();
        assert_eq!(layout.characteristics[0].uuid, "273e0003-4c4d-454d-96be-f03bac821358");
        assert_eq!(layout.characteristics[4].uuid, "273e0007-4c4d-454d-96be-f03bac821358");
        assert_eq!(layout.trigger_handle(), Some(0x2c));
    }
}
