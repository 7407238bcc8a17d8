//! Synthetic ECG records.
//!
//! Each beat is a sum of Gaussian bumps (P, Q, R, S, T) in millivolts,
//! projected onto every lead with a fixed amplitude factor and quantized
//! with the record's ADU gain. Optional noise is drawn from a seeded RNG so a
//! given seed always produces the same record.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::EcgError;
use crate::format::FormatTag;
use crate::ir::{EcgRecord, SignalMatrix, DEFAULT_ADU_GAIN};
use crate::leads;

/// Upper bound on generated samples across all channels.
const MAX_TOTAL_SAMPLES: usize = 50_000_000;

/// Amplitude factors applied to the beat template, in twelve-lead order.
const LEAD_FACTORS: [f64; 12] = [
    0.6, 1.0, 0.4, -0.8, 0.1, 0.7, -0.5, 0.2, 0.6, 1.2, 1.1, 0.8,
];

/// One Gaussian component of the beat template.
struct Wave {
    /// Offset from the R peak, in seconds.
    center: f64,
    /// Width, in seconds.
    sigma: f64,
    /// Peak amplitude, in millivolts.
    amplitude: f64,
}

const BEAT: [Wave; 5] = [
    Wave { center: -0.20, sigma: 0.025, amplitude: 0.15 },
    Wave { center: -0.03, sigma: 0.008, amplitude: -0.10 },
    Wave { center: 0.00, sigma: 0.010, amplitude: 1.00 },
    Wave { center: 0.03, sigma: 0.008, amplitude: -0.25 },
    Wave { center: 0.28, sigma: 0.050, amplitude: 0.30 },
];

/// Options for generating a synthetic record.
#[derive(Clone, Debug)]
pub struct SampleOptions {
    pub channels: usize,
    /// Samples per second per channel.
    pub sampling_rate: f64,
    pub duration_secs: f64,
    pub heart_rate_bpm: f64,
    /// Counts per millivolt.
    pub adu_gain: u32,
    /// Peak noise amplitude in microvolts; zero disables noise.
    pub noise_uv: f64,
    pub seed: Option<u64>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            channels: 12,
            sampling_rate: 500.0,
            duration_secs: 10.0,
            heart_rate_bpm: 72.0,
            adu_gain: DEFAULT_ADU_GAIN,
            noise_uv: 0.0,
            seed: None,
        }
    }
}

/// Validate generation options before running.
pub fn validate_sample_options(opts: &SampleOptions) -> Result<(), EcgError> {
    if opts.channels == 0 {
        return Err(EcgError::InvalidSampleParams {
            message: "--channels must be greater than 0".to_string(),
        });
    }

    if !(opts.sampling_rate.is_finite() && opts.sampling_rate > 0.0) {
        return Err(EcgError::InvalidSampleParams {
            message: "--rate must be a positive number".to_string(),
        });
    }

    if !(opts.duration_secs.is_finite() && opts.duration_secs > 0.0) {
        return Err(EcgError::InvalidSampleParams {
            message: "--duration must be a positive number".to_string(),
        });
    }

    if !(20.0..=250.0).contains(&opts.heart_rate_bpm) {
        return Err(EcgError::InvalidSampleParams {
            message: "--heart-rate must be in the interval [20, 250]".to_string(),
        });
    }

    if opts.adu_gain == 0 {
        return Err(EcgError::InvalidSampleParams {
            message: "--gain must be greater than 0".to_string(),
        });
    }

    if !(opts.noise_uv.is_finite() && opts.noise_uv >= 0.0) {
        return Err(EcgError::InvalidSampleParams {
            message: "--noise must be zero or positive".to_string(),
        });
    }

    let total = samples_per_channel(opts).saturating_mul(opts.channels);
    if total > MAX_TOTAL_SAMPLES {
        return Err(EcgError::InvalidSampleParams {
            message: format!(
                "{} samples requested; the limit is {}",
                total, MAX_TOTAL_SAMPLES
            ),
        });
    }

    Ok(())
}

/// Generate a synthetic record tagged with `source_format`.
///
/// Twelve- and fifteen-channel records get the standard lead names for that
/// format; other channel counts carry none.
pub fn generate_record(
    opts: &SampleOptions,
    source_format: FormatTag,
) -> Result<EcgRecord, EcgError> {
    validate_sample_options(opts)?;

    let rows = match opts.seed {
        Some(seed) => generate_rows(opts, &mut StdRng::seed_from_u64(seed)),
        None => generate_rows(opts, &mut rand::rng()),
    };
    let signals = SignalMatrix::from_rows(rows)?;

    let record =
        EcgRecord::new(source_format, opts.sampling_rate, signals).with_adu_gain(opts.adu_gain);
    match leads::fallback_lead_names(opts.channels, source_format) {
        Some(names) => record.with_lead_names(names),
        None => Ok(record),
    }
}

fn samples_per_channel(opts: &SampleOptions) -> usize {
    (opts.duration_secs * opts.sampling_rate).round() as usize
}

fn generate_rows<R: Rng + ?Sized>(opts: &SampleOptions, rng: &mut R) -> Vec<Vec<i32>> {
    let n = samples_per_channel(opts);
    let rr = 60.0 / opts.heart_rate_bpm;
    let template: Vec<f64> = (0..n)
        .map(|i| beat_millivolts(i as f64 / opts.sampling_rate, rr))
        .collect();

    let gain = opts.adu_gain as f64;
    let noise_counts = opts.noise_uv * gain / 1000.0;

    (0..opts.channels)
        .map(|channel| {
            let factor = LEAD_FACTORS[channel % LEAD_FACTORS.len()];
            template
                .iter()
                .map(|&mv| {
                    let noise = if noise_counts > 0.0 {
                        rng.random_range(-noise_counts..=noise_counts)
                    } else {
                        0.0
                    };
                    (mv * factor * gain + noise).round() as i32
                })
                .collect()
        })
        .collect()
}

/// Template voltage at time `t`, with the first R peak a third into the beat.
fn beat_millivolts(t: f64, rr: f64) -> f64 {
    let offset = t.rem_euclid(rr) - rr / 3.0;
    // Neighbouring beats contribute their T and P waves at high heart rates.
    [offset - rr, offset, offset + rr]
        .iter()
        .map(|&dt| {
            BEAT.iter()
                .map(|w| w.amplitude * (-(dt - w.center).powi(2) / (2.0 * w.sigma * w.sigma)).exp())
                .sum::<f64>()
        })
        .sum()
}
