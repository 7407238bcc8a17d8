//! Raw XY text reader.
//!
//! Each row holds a time stamp in seconds followed by one value per channel,
//! comma-separated. An optional first row of labels names the columns; its
//! first (time) label is ignored. Values are rounded to the nearest integer
//! sample.
//!
//! The sampling rate is not stored in the file and is derived from the time
//! column: [`XySampling::Constant`] uses the first interval,
//! [`XySampling::Variable`] the mean interval over the whole recording.

use std::fs;
use std::path::Path;

use super::model::{LoadedSignals, SignalMatrix};
use crate::error::EcgError;
use crate::format::{LoadRequest, SignalLoader};

const FORMAT_NAME: &str = "RAW_XY";
/// Relative deviation from the first interval tolerated in constant mode.
const INTERVAL_TOLERANCE: f64 = 0.01;

/// How the time column maps onto a sampling rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XySampling {
    Constant,
    Variable,
}

/// Built-in raw XY collaborator.
#[derive(Clone, Copy, Debug)]
pub struct XyLoader {
    sampling: XySampling,
}

impl XyLoader {
    pub fn new(sampling: XySampling) -> Self {
        Self { sampling }
    }
}

impl SignalLoader for XyLoader {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
        read_xy(request.file_path, self.sampling)
    }
}

/// Reads a raw XY file.
pub fn read_xy(path: &Path, sampling: XySampling) -> Result<LoadedSignals, EcgError> {
    let bytes = fs::read(path).map_err(EcgError::Io)?;
    parse_xy(&bytes, sampling, path)
}

/// Parses raw XY text from bytes.
///
/// Useful for testing and fuzzing without file I/O.
pub fn from_xy_slice(bytes: &[u8], sampling: XySampling) -> Result<LoadedSignals, EcgError> {
    parse_xy(bytes, sampling, Path::new("<memory>"))
}

fn parse_xy(bytes: &[u8], sampling: XySampling, path: &Path) -> Result<LoadedSignals, EcgError> {
    let parse_error = |message: String| EcgError::FormatParse {
        format: FORMAT_NAME,
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut labels: Option<Vec<String>> = None;
    let mut times = Vec::new();
    let mut samples = Vec::new();
    let mut channels = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let row = result.map_err(|source| EcgError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?;
        if row.len() < 2 {
            return Err(parse_error(format!(
                "row {}: expected a time column and at least one channel",
                row_idx + 1
            )));
        }

        let first = row.get(0).unwrap_or_default();
        let Ok(time) = first.parse::<f64>() else {
            if row_idx == 0 {
                labels = Some(row.iter().skip(1).map(str::to_string).collect());
                continue;
            }
            return Err(parse_error(format!(
                "row {}: invalid time value '{}'",
                row_idx + 1,
                first
            )));
        };

        channels = row.len() - 1;
        times.push(time);
        for field in row.iter().skip(1) {
            let value = field.parse::<f64>().map_err(|_| {
                parse_error(format!(
                    "row {}: invalid sample value '{}'",
                    row_idx + 1,
                    field
                ))
            })?;
            if !value.is_finite() || value.round().abs() > i32::MAX as f64 {
                return Err(parse_error(format!(
                    "row {}: sample value {} is out of range",
                    row_idx + 1,
                    field
                )));
            }
            samples.push(value.round() as i32);
        }
    }

    let sampling_rate = derive_sampling_rate(&times, sampling).map_err(parse_error)?;
    let signals = SignalMatrix::from_interleaved(channels, &samples)?;

    let mut loaded = LoadedSignals::new(signals, sampling_rate);
    if let Some(labels) = labels {
        loaded = loaded.with_lead_names(labels);
    }
    Ok(loaded)
}

fn derive_sampling_rate(times: &[f64], sampling: XySampling) -> Result<f64, String> {
    if times.len() < 2 {
        return Err(format!(
            "at least two sample rows are needed to derive a sampling rate, found {}",
            times.len()
        ));
    }
    if let Some(pair) = times.windows(2).find(|pair| pair[1] <= pair[0]) {
        return Err(format!(
            "time column is not strictly increasing ({} then {})",
            pair[0], pair[1]
        ));
    }

    let interval = match sampling {
        XySampling::Constant => {
            let interval = times[1] - times[0];
            if times
                .windows(2)
                .any(|pair| ((pair[1] - pair[0]) - interval).abs() > interval * INTERVAL_TOLERANCE)
            {
                log::warn!(
                    "Raw XY time column is not evenly spaced; using first interval {interval}s"
                );
            }
            interval
        }
        XySampling::Variable => (times[times.len() - 1] - times[0]) / (times.len() - 1) as f64,
    };

    let rate = 1.0 / interval;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("derived sampling rate {rate} is not usable"))
    }
}
