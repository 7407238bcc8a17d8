//! GE MUSE text export reader and writer.
//!
//! # Layout
//!
//! ```text
//! # sample_rate=500
//! # adu_gain=200
//! I	II	V1
//! 12	-4	7
//! 13	-4	9
//! ```
//!
//! A preamble of `# key=value` lines is followed by a tab-separated table:
//! one header row of channel labels, then one row per sample instant.
//! `sample_rate` is required; `adu_gain` is optional. Unknown keys are
//! ignored. Channels without a lead label are written as `CH1`, `CH2`, ...

use std::fs;
use std::path::Path;

use super::model::{EcgRecord, LoadedSignals, SignalMatrix};
use crate::error::EcgError;
use crate::format::{LoadRequest, SignalLoader, SignalWriter, WriteTarget};

const FORMAT_NAME: &str = "GEMUSE";
const SAMPLE_RATE_KEY: &str = "sample_rate";
const ADU_GAIN_KEY: &str = "adu_gain";

/// Built-in GE MUSE text collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeMuseCodec;

impl SignalLoader for GeMuseCodec {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
        read_ge_muse(request.file_path)
    }
}

impl SignalWriter for GeMuseCodec {
    fn write(&self, record: &EcgRecord, target: &WriteTarget<'_>) -> Result<usize, EcgError> {
        write_ge_muse(&target.file_path, record)
    }
}

/// Reads a GE MUSE text file.
pub fn read_ge_muse(path: &Path) -> Result<LoadedSignals, EcgError> {
    let text = fs::read_to_string(path).map_err(EcgError::Io)?;
    parse_ge_muse(&text, path)
}

/// Writes `record` as GE MUSE text and returns the number of sample rows.
pub fn write_ge_muse(path: &Path, record: &EcgRecord) -> Result<usize, EcgError> {
    let text = render_ge_muse(record, path)?;
    fs::write(path, text).map_err(EcgError::Io)?;
    Ok(record.samples_per_channel())
}

/// Parses GE MUSE text from a string.
///
/// Useful for testing without file I/O.
pub fn from_ge_muse_str(text: &str) -> Result<LoadedSignals, EcgError> {
    parse_ge_muse(text, Path::new("<memory>"))
}

/// Parses GE MUSE text from bytes.
///
/// Useful for fuzzing without requiring UTF-8 upfront.
pub fn from_ge_muse_slice(bytes: &[u8]) -> Result<LoadedSignals, EcgError> {
    let text = std::str::from_utf8(bytes).map_err(|err| EcgError::FormatParse {
        format: FORMAT_NAME,
        path: Path::new("<memory>").to_path_buf(),
        message: format!("invalid UTF-8: {err}"),
    })?;
    from_ge_muse_str(text)
}

/// Renders `record` as GE MUSE text.
pub fn to_ge_muse_string(record: &EcgRecord) -> Result<String, EcgError> {
    render_ge_muse(record, Path::new("<memory>"))
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_ge_muse(text: &str, path: &Path) -> Result<LoadedSignals, EcgError> {
    let parse_error = |message: String| EcgError::FormatParse {
        format: FORMAT_NAME,
        path: path.to_path_buf(),
        message,
    };

    let mut sampling_rate = None;
    let mut adu_gain = None;
    for line in text.lines().map(str::trim).take_while(|line| line.starts_with('#')) {
        let Some((key, value)) = line.trim_start_matches('#').split_once('=') else {
            continue;
        };
        match key.trim() {
            SAMPLE_RATE_KEY => {
                sampling_rate = Some(
                    value
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| parse_error(format!("invalid sample_rate '{value}'")))?,
                );
            }
            ADU_GAIN_KEY => {
                adu_gain = Some(
                    value
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| parse_error(format!("invalid adu_gain '{value}'")))?,
                );
            }
            _ => {}
        }
    }
    let sampling_rate =
        sampling_rate.ok_or_else(|| parse_error("missing '# sample_rate=' line".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let csv_error = |source: csv::Error| EcgError::CsvParse {
        path: path.to_path_buf(),
        source,
    };

    let labels: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();
    if labels.is_empty() || labels.iter().all(String::is_empty) {
        return Err(parse_error("missing channel header row".to_string()));
    }
    let channels = labels.len();

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let row = result.map_err(csv_error)?;
        for field in row.iter() {
            let value = field.parse::<i32>().map_err(|_| {
                parse_error(format!(
                    "row {}: invalid sample value '{}'",
                    row_idx + 1,
                    field
                ))
            })?;
            samples.push(value);
        }
    }

    let signals = SignalMatrix::from_interleaved(channels, &samples)?;
    let mut loaded = LoadedSignals::new(signals, sampling_rate).with_lead_names(labels);
    if let Some(gain) = adu_gain {
        loaded = loaded.with_adu_gain(gain);
    }
    Ok(loaded)
}

// ============================================================================
// Rendering
// ============================================================================

fn render_ge_muse(record: &EcgRecord, path: &Path) -> Result<String, EcgError> {
    if record.channel_count() == 0 {
        return Err(EcgError::FormatWrite {
            format: FORMAT_NAME,
            path: path.to_path_buf(),
            message: "record has no channels".to_string(),
        });
    }

    let mut out = format!(
        "# {}={}\n# {}={}\n",
        SAMPLE_RATE_KEY,
        record.sampling_rate(),
        ADU_GAIN_KEY,
        record.adu_gain()
    )
    .into_bytes();

    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(&mut out);
        let write_error = |source: csv::Error| EcgError::FormatWrite {
            format: FORMAT_NAME,
            path: path.to_path_buf(),
            message: source.to_string(),
        };

        let labels: Vec<String> = (0..record.channel_count())
            .map(|channel| record.channel_label(channel))
            .collect();
        writer.write_record(&labels).map_err(write_error)?;

        let signals = record.signals();
        for sample in 0..record.samples_per_channel() {
            let row = signals
                .rows()
                .map(|channel| channel[sample].to_string());
            writer.write_record(row).map_err(write_error)?;
        }
        writer.flush().map_err(EcgError::Io)?;
    }

    String::from_utf8(out).map_err(|err| EcgError::FormatWrite {
        format: FORMAT_NAME,
        path: path.to_path_buf(),
        message: format!("invalid UTF-8 in output: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatTag;

    const SAMPLE: &str = "# sample_rate=500\n# adu_gain=400\n# patient=anon\nI\tII\n1\t-1\n2\t-2\n3\t-3\n";

    #[test]
    fn parses_preamble_header_and_rows() {
        let loaded = from_ge_muse_str(SAMPLE).unwrap();
        assert_eq!(loaded.sampling_rate, 500.0);
        assert_eq!(loaded.adu_gain, Some(400));
        assert_eq!(
            loaded.lead_names,
            Some(vec!["I".to_string(), "II".to_string()])
        );
        assert_eq!(loaded.signals.channel(0), &[1, 2, 3]);
        assert_eq!(loaded.signals.channel(1), &[-1, -2, -3]);
    }

    #[test]
    fn missing_sample_rate_is_rejected() {
        let err = from_ge_muse_str("I\tII\n1\t2\n").unwrap_err();
        assert!(err.to_string().contains("sample_rate"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(from_ge_muse_str("# sample_rate=250\nI\tII\n1\t2\n3\n").is_err());
    }

    #[test]
    fn non_numeric_samples_are_rejected() {
        assert!(from_ge_muse_str("# sample_rate=250\nI\n1\nabc\n").is_err());
    }

    #[test]
    fn renders_channel_fallback_labels() {
        let signals = SignalMatrix::from_rows(vec![vec![5, 6], vec![7, 8]]).unwrap();
        let record = EcgRecord::new(FormatTag::Rdt, 250.0, signals);
        let text = to_ge_muse_string(&record).unwrap();
        assert_eq!(
            text,
            "# sample_rate=250\n# adu_gain=200\nCH1\tCH2\n5\t7\n6\t8\n"
        );
    }
}
