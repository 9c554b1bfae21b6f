//! Synthetic sample sources for running a streamer without hardware.

use std::f64::consts::PI;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use stream_types::StreamParams;

/// Band centre frequencies in Hz: delta, theta, alpha, beta, gamma.
const BAND_FREQS: [f64; 5] = [2.5, 6.0, 10.0, 20.0, 40.0];

// Relative band weights, cycled over channels: frontal-like channels carry
// more delta/theta, posterior-like ones more alpha.
const CHANNEL_WEIGHTS: [[f64; 5]; 4] = [
    [3.0, 1.5, 0.8, 0.4, 0.1],
    [2.0, 1.2, 1.5, 0.6, 0.1],
    [1.5, 1.0, 2.5, 0.7, 0.1],
    [1.2, 0.8, 3.0, 0.5, 0.1],
];

/// Rate assumed when advancing oscillators of an irregular stream.
const IRREGULAR_STEP_HZ: f64 = 1.0;

#[derive(Debug, Clone)]
enum Shape {
    /// EEG-like: band oscillators, line noise and white noise, in microvolts.
    Bands {
        amplitude: f64,
        phases: Vec<[f64; 5]>,
        line_phase: Vec<f64>,
        line_amplitude: Vec<f64>,
    },
    /// Anything else: a random walk around a per-channel baseline.
    Drift { level: Vec<f64>, step: f64 },
}

/// Noise-shaped sample generator for one stream.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    channel_count: usize,
    sample_rate: f64,
    shape: Shape,
    rng: StdRng,
}

impl SignalGenerator {
    pub fn new(params: &StreamParams) -> Self {
        Self::with_rng(params, StdRng::from_entropy())
    }

    /// Deterministic generator for reproducible tests.
    pub fn seeded(params: &StreamParams, seed: u64) -> Self {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: &StreamParams, mut rng: StdRng) -> Self {
        let channels = params.channel_count;
        let sample_rate = if params.is_regular() {
            params.nominal_srate
        } else {
            IRREGULAR_STEP_HZ
        };

        let eeg_like = params.content_type.eq_ignore_ascii_case("eeg");
        let shape = if eeg_like {
            Shape::Bands {
                amplitude: 10.0,
                phases: (0..channels)
                    .map(|_| std::array::from_fn(|_| rng.gen::<f64>() * 2.0 * PI))
                    .collect(),
                line_phase: (0..channels).map(|_| rng.gen::<f64>() * 2.0 * PI).collect(),
                line_amplitude: (0..channels).map(|_| rng.gen_range(0.2..0.7)).collect(),
            }
        } else {
            Shape::Drift {
                level: (0..channels).map(|_| rng.gen_range(-1.0..1.0)).collect(),
                step: 0.01,
            }
        };

        debug!(
            "Synthetic generator for {} ({} channels, {} Hz, {})",
            params.name,
            channels,
            sample_rate,
            if eeg_like { "bands" } else { "drift" }
        );

        Self {
            channel_count: channels,
            sample_rate,
            shape,
            rng,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Produce the next row, one value per channel.
    pub fn next_sample(&mut self) -> Vec<f64> {
        let dt = 1.0 / self.sample_rate;
        let rng = &mut self.rng;

        match &mut self.shape {
            Shape::Bands { amplitude, phases, line_phase, line_amplitude } => phases
                .iter_mut()
                .enumerate()
                .map(|(ch, phase)| {
                    let weights = CHANNEL_WEIGHTS[ch % CHANNEL_WEIGHTS.len()];
                    let mut signal = 0.0;
                    for band in 0..BAND_FREQS.len() {
                        phase[band] = (phase[band] + 2.0 * PI * BAND_FREQS[band] * dt) % (2.0 * PI);
                        signal += phase[band].sin() * weights[band];
                    }
                    line_phase[ch] = (line_phase[ch] + 2.0 * PI * 50.0 * dt) % (2.0 * PI);
                    signal += line_phase[ch].sin() * line_amplitude[ch];
                    let n: f64 = StandardNormal.sample(&mut *rng);
                    signal += n * 0.1;
                    signal * *amplitude
                })
                .collect(),
            Shape::Drift { level, step } => level
                .iter_mut()
                .map(|value| {
                    let n: f64 = StandardNormal.sample(&mut *rng);
                    *value += n * *step;
                    *value
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muse2016;

    #[test]
    fn test_rows_have_channel_count_values() {
        let profile = muse2016::profile();
        for stream in &profile.streams {
            let mut gen = SignalGenerator::seeded(stream, 7);
            for _ in 0..20 {
                let row = gen.next_sample();
                assert_eq!(row.len(), stream.channel_count, "stream {}", stream.name);
                assert!(row.iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn test_eeg_output_is_not_flat() {
        let profile = muse2016::profile();
        let mut gen = SignalGenerator::seeded(profile.stream("EEG").unwrap(), 1);
        let rows: Vec<Vec<f64>> = (0..64).map(|_| gen.next_sample()).collect();
        let first = rows[0][0];
        assert!(rows.iter().any(|r| r[0] != first));
        assert!(rows.iter().flatten().any(|v| *v != 0.0));
    }

    #[test]
    fn test_seeded_generators_agree() {
        let profile = muse2016::profile();
        let params = profile.stream("ACC").unwrap();
        let mut a = SignalGenerator::seeded(params, 42);
        let mut b = SignalGenerator::seeded(params, 42);
        assert_eq!(a.next_sample(), b.next_sample());
    }
}
