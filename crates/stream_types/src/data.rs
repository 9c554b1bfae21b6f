use serde::{Deserialize, Serialize};

use crate::profile::ChannelFormat;

/// Per-channel description published with a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub label: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Metadata describing an output stream.
///
/// Built once per subscription from the device profile and handed to the
/// output transport when the outlet is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Published name, `<device>-<stream>`.
    pub name: String,
    /// Stream type name as declared in the profile.
    pub stream: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub channel_count: usize,
    pub nominal_srate: f64,
    pub chunk_size: usize,
    pub channel_format: ChannelFormat,
    pub source_id: String,
    pub manufacturer: String,
    pub channels: Vec<ChannelInfo>,
}

/// One timestamped row of calibrated channel values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub index: u64,
    pub values: Vec<f64>,
    pub timestamp: f64,
}

/// A fixed-size batch of samples for exactly one stream.
///
/// `samples` is row-major: `chunk_size` rows of `channel_count` values. A chunk
/// is only ever built complete and moved whole into an outlet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub stream: String,
    /// Stream-local index of the first row.
    pub first_index: u64,
    pub samples: Vec<Vec<f64>>,
    pub timestamps: Vec<f64>,
}

impl Chunk {
    pub fn rows(&self) -> usize {
        self.samples.len()
    }

    pub fn channels(&self) -> usize {
        self.samples.first().map_or(0, |row| row.len())
    }

    /// True when every value is exactly zero (an unpopulated buffer).
    pub fn is_all_zero(&self) -> bool {
        self.samples.iter().flatten().all(|v| *v == 0.0)
    }

    pub fn column(&self, channel: usize) -> Option<Vec<f64>> {
        if channel >= self.channels() {
            return None;
        }
        Some(self.samples.iter().map(|row| row[channel]).collect())
    }

    /// Iterate the chunk row by row, the way per-sample consumers push it.
    pub fn iter_samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.samples
            .iter()
            .zip(&self.timestamps)
            .enumerate()
            .map(move |(i, (values, &timestamp))| Sample {
                index: self.first_index + i as u64,
                values: values.clone(),
                timestamp,
            })
    }
}
