//! WFDB (PhysioNet) record reader and writer.
//!
//! A WFDB record is a text header `<record>.hea` plus one or more signal
//! files. This module handles the common single-file layout where every
//! signal is stored frame-interleaved in one file using one of three storage
//! formats:
//!
//! - `16`: 16-bit two's complement, little-endian
//! - `61`: 16-bit two's complement, big-endian
//! - `212`: 12-bit two's complement, pairs of samples packed into 3 bytes
//!
//! The loader detects the storage format from the header, so any WFDB tag can
//! read any of the three. Writers produce `<record>.hea` and `<record>.dat`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use super::model::{EcgRecord, LoadedSignals, SignalMatrix, DEFAULT_ADU_GAIN};
use crate::error::EcgError;
use crate::format::{LoadRequest, SignalLoader, SignalWriter, WfdbStorage, WriteTarget};
use crate::leads::LeadName;

const FORMAT_NAME: &str = "WFDB";
const HEADER_EXTENSION: &str = "hea";
const DATA_EXTENSION: &str = "dat";
const DEFAULT_SAMPLING_RATE: f64 = 250.0;

/// Built-in WFDB collaborator; `storage` selects the encoding used on write.
#[derive(Clone, Copy, Debug)]
pub struct WfdbCodec {
    storage: WfdbStorage,
}

impl WfdbCodec {
    pub fn new(storage: WfdbStorage) -> Self {
        Self { storage }
    }
}

impl SignalLoader for WfdbCodec {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
        read_wfdb(
            request.input_dir,
            request.record_name,
            request.signals_requested,
        )
    }

    fn signal_count(&self, input_dir: &Path, record_name: &str) -> Result<usize, EcgError> {
        wfdb_signal_count(input_dir, record_name)
    }
}

impl SignalWriter for WfdbCodec {
    fn write(&self, record: &EcgRecord, target: &WriteTarget<'_>) -> Result<usize, EcgError> {
        write_wfdb(target.output_dir, target.record_name, self.storage, record)
    }
}

// ============================================================================
// Header model
// ============================================================================

/// Parsed contents of a `.hea` file.
#[derive(Clone, Debug, PartialEq)]
pub struct WfdbHeader {
    pub record_name: String,
    pub sampling_rate: f64,
    /// Samples per signal, if the header states it.
    pub samples_per_signal: Option<usize>,
    pub signals: Vec<WfdbSignalSpec>,
}

/// One signal line of a header.
#[derive(Clone, Debug, PartialEq)]
pub struct WfdbSignalSpec {
    pub file_name: String,
    pub format: u32,
    pub byte_offset: usize,
    /// ADC units per physical unit; 0 in the file means unspecified.
    pub gain: f64,
    pub baseline: Option<i32>,
    pub units: Option<String>,
    pub adc_resolution: Option<u32>,
    pub adc_zero: Option<i32>,
    pub initial_value: Option<i32>,
    pub checksum: Option<i32>,
    pub description: Option<String>,
}

impl WfdbHeader {
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Reads the header of `record_name` in `dir`.
pub fn read_wfdb_header(dir: &Path, record_name: &str) -> Result<WfdbHeader, EcgError> {
    let path = header_path(dir, record_name);
    let text = fs::read_to_string(&path).map_err(EcgError::Io)?;
    parse_header(&text, &path)
}

/// Number of signals declared by the record header.
pub fn wfdb_signal_count(dir: &Path, record_name: &str) -> Result<usize, EcgError> {
    Ok(read_wfdb_header(dir, record_name)?.signal_count())
}

/// Reads the first `signals_requested` signals of a record (all when 0).
pub fn read_wfdb(
    dir: &Path,
    record_name: &str,
    signals_requested: usize,
) -> Result<LoadedSignals, EcgError> {
    let header = read_wfdb_header(dir, record_name)?;
    let header_file = header_path(dir, record_name);
    let parse_error = |message: String| EcgError::FormatParse {
        format: FORMAT_NAME,
        path: header_file.clone(),
        message,
    };

    let total_signals = header.signal_count();
    if total_signals == 0 {
        return Err(parse_error("header declares no signals".to_string()));
    }
    let wanted = if signals_requested == 0 {
        total_signals
    } else {
        signals_requested
    };
    if wanted > total_signals {
        return Err(parse_error(format!(
            "{wanted} signal(s) requested but the record has {total_signals}"
        )));
    }

    let first = &header.signals[0];
    if header
        .signals
        .iter()
        .any(|s| s.file_name != first.file_name || s.format != first.format)
    {
        return Err(parse_error(
            "signals stored in multiple files or formats are not supported".to_string(),
        ));
    }
    let storage = WfdbStorage::from_code(first.format)
        .ok_or_else(|| parse_error(format!("unsupported storage format {}", first.format)))?;

    let data_path = dir.join(&first.file_name);
    let bytes = fs::read(&data_path).map_err(EcgError::Io)?;
    let bytes = bytes.get(first.byte_offset..).unwrap_or_default();

    let mut samples = decode_samples(storage, bytes);
    let frame_total = |frames: usize| {
        frames.checked_mul(total_signals).ok_or_else(|| EcgError::FormatParse {
            format: FORMAT_NAME,
            path: data_path.clone(),
            message: format!("{frames} samples x {total_signals} signals overflows"),
        })
    };
    let frames = match header.samples_per_signal.filter(|n| *n > 0) {
        Some(n) => {
            if samples.len() < frame_total(n)? {
                return Err(EcgError::FormatParse {
                    format: FORMAT_NAME,
                    path: data_path.clone(),
                    message: format!(
                        "header declares {} samples per signal but the file holds {}",
                        n,
                        samples.len() / total_signals
                    ),
                });
            }
            n
        }
        None => samples.len() / total_signals,
    };
    samples.truncate(frame_total(frames)?);

    let all_signals = SignalMatrix::from_interleaved(total_signals, &samples)?;
    verify_checksums(&header, &all_signals);

    let rows: Vec<Vec<i32>> = all_signals.rows().take(wanted).map(<[i32]>::to_vec).collect();
    let signals = SignalMatrix::from_rows(rows)?;

    let gain = first.gain.round();
    let mut loaded = LoadedSignals::new(signals, header.sampling_rate)
        .with_allocated_channels(total_signals);
    if gain >= 1.0 && gain <= u32::MAX as f64 {
        loaded = loaded.with_adu_gain(gain as u32);
    }
    if let Some(labels) = header.signals[..wanted]
        .iter()
        .map(|s| s.description.as_deref().map(canonical_label))
        .collect::<Option<Vec<String>>>()
    {
        loaded = loaded.with_lead_names(labels);
    }

    Ok(loaded)
}

/// Writes `record` as `<record_name>.hea` + `<record_name>.dat` in `dir`.
///
/// Returns the number of samples written per signal.
pub fn write_wfdb(
    dir: &Path,
    record_name: &str,
    storage: WfdbStorage,
    record: &EcgRecord,
) -> Result<usize, EcgError> {
    let header_file = header_path(dir, record_name);
    let data_file_name = format!("{record_name}.{DATA_EXTENSION}");

    if record.channel_count() == 0 {
        return Err(EcgError::FormatWrite {
            format: FORMAT_NAME,
            path: header_file,
            message: "record has no channels".to_string(),
        });
    }

    let samples: Vec<i32> = record.signals().interleaved().collect();
    let data = encode_samples(storage, &samples).map_err(|message| EcgError::FormatWrite {
        format: FORMAT_NAME,
        path: dir.join(&data_file_name),
        message,
    })?;
    let header = render_header(record_name, &data_file_name, storage, record);

    let data_file = dir.join(&data_file_name);
    fs::write(&data_file, data).map_err(EcgError::Io)?;
    if let Err(err) = fs::write(&header_file, header) {
        // A data file without its header is not a record.
        let _ = fs::remove_file(&data_file);
        return Err(EcgError::Io(err));
    }

    Ok(record.samples_per_channel())
}

/// Parses a header from a string.
///
/// Useful for testing and fuzzing without file I/O.
pub fn from_wfdb_header_str(text: &str) -> Result<WfdbHeader, EcgError> {
    parse_header(text, Path::new("<memory>"))
}

/// Decodes a byte stream in the given storage format.
///
/// For format 212 a dangling byte that cannot complete a sample is ignored.
pub fn decode_samples(storage: WfdbStorage, bytes: &[u8]) -> Vec<i32> {
    match storage {
        WfdbStorage::Fmt16 => bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32)
            .collect(),
        WfdbStorage::Fmt61 => bytes
            .chunks_exact(2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]) as i32)
            .collect(),
        WfdbStorage::Fmt212 => {
            let mut out = Vec::with_capacity(bytes.len() / 3 * 2 + 1);
            let mut chunks = bytes.chunks_exact(3);
            for b in &mut chunks {
                out.push(sign_extend_12(b[0] as i32 | ((b[1] as i32 & 0x0F) << 8)));
                out.push(sign_extend_12(b[2] as i32 | ((b[1] as i32 & 0xF0) << 4)));
            }
            if let [b0, b1] = chunks.remainder() {
                out.push(sign_extend_12(*b0 as i32 | ((*b1 as i32 & 0x0F) << 8)));
            }
            out
        }
    }
}

/// Encodes samples in the given storage format.
///
/// Fails if a sample does not fit the storage width.
pub fn encode_samples(storage: WfdbStorage, samples: &[i32]) -> Result<Vec<u8>, String> {
    match storage {
        WfdbStorage::Fmt16 | WfdbStorage::Fmt61 => {
            let mut out = Vec::with_capacity(samples.len() * 2);
            for &value in samples {
                let sample = i16::try_from(value)
                    .map_err(|_| format!("sample {value} does not fit in 16 bits"))?;
                if storage == WfdbStorage::Fmt16 {
                    out.extend_from_slice(&sample.to_le_bytes());
                } else {
                    out.extend_from_slice(&sample.to_be_bytes());
                }
            }
            Ok(out)
        }
        WfdbStorage::Fmt212 => {
            if let Some(value) = samples.iter().find(|v| !(-2048..=2047).contains(*v)) {
                return Err(format!("sample {value} does not fit in 12 bits"));
            }
            let mut out = Vec::with_capacity(samples.len().div_ceil(2) * 3);
            for pair in samples.chunks(2) {
                let s0 = pair[0] & 0x0FFF;
                let s1 = pair.get(1).copied().unwrap_or(0) & 0x0FFF;
                out.push((s0 & 0xFF) as u8);
                out.push((((s0 >> 8) & 0x0F) | ((s1 >> 4) & 0xF0)) as u8);
                out.push((s1 & 0xFF) as u8);
            }
            Ok(out)
        }
    }
}

// ============================================================================
// Internals
// ============================================================================

fn header_path(dir: &Path, record_name: &str) -> PathBuf {
    dir.join(format!("{record_name}.{HEADER_EXTENSION}"))
}

fn sign_extend_12(value: i32) -> i32 {
    if value > 2047 {
        value - 4096
    } else {
        value
    }
}

fn checksum(channel: &[i32]) -> i16 {
    channel.iter().fold(0i32, |acc, &v| acc.wrapping_add(v)) as i16
}

fn verify_checksums(header: &WfdbHeader, signals: &SignalMatrix) {
    for (idx, (spec, channel)) in header.signals.iter().zip(signals.rows()).enumerate() {
        if let Some(expected) = spec.checksum {
            let actual = checksum(channel) as i32;
            if actual != expected {
                log::warn!(
                    "WFDB record '{}' signal {}: checksum {} does not match header {}",
                    header.record_name,
                    idx,
                    actual,
                    expected
                );
            }
        }
    }
}

/// Maps case variants of known leads (`avr`, `V1 `) onto the vocabulary.
fn canonical_label(description: &str) -> String {
    LeadName::from_str_loose(description)
        .map(|lead| lead.as_str().to_string())
        .unwrap_or_else(|| description.trim().to_string())
}

fn leading_number(token: &str) -> &str {
    let end = token
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map_or(token.len(), |(i, _)| i);
    &token[..end]
}

fn parse_header(text: &str, path: &Path) -> Result<WfdbHeader, EcgError> {
    let parse_error = |message: String| EcgError::FormatParse {
        format: FORMAT_NAME,
        path: path.to_path_buf(),
        message,
    };

    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let record_line = lines
        .next()
        .ok_or_else(|| parse_error("header has no record line".to_string()))?;
    let mut fields = record_line.split_whitespace();

    let record_name = fields
        .next()
        .ok_or_else(|| parse_error("record line is empty".to_string()))?;
    if record_name.contains('/') {
        return Err(parse_error(format!(
            "multi-segment record '{record_name}' is not supported"
        )));
    }

    let signal_count: usize = fields
        .next()
        .ok_or_else(|| parse_error("record line has no signal count".to_string()))?
        .parse()
        .map_err(|_| parse_error(format!("invalid signal count in '{record_line}'")))?;

    let sampling_rate = match fields.next() {
        Some(token) => {
            let rate: f64 = leading_number(token)
                .parse()
                .map_err(|_| parse_error(format!("invalid sampling frequency '{token}'")))?;
            if rate > 0.0 {
                rate
            } else {
                DEFAULT_SAMPLING_RATE
            }
        }
        None => DEFAULT_SAMPLING_RATE,
    };

    let samples_per_signal = match fields.next() {
        Some(token) => Some(
            token
                .parse::<usize>()
                .map_err(|_| parse_error(format!("invalid sample count '{token}'")))?,
        ),
        None => None,
    };

    // The count is untrusted; lines are checked before anything is stored.
    let mut signals = Vec::new();
    for idx in 0..signal_count {
        let line = lines.next().ok_or_else(|| {
            parse_error(format!(
                "header declares {signal_count} signal(s) but has {idx} signal line(s)"
            ))
        })?;
        signals.push(parse_signal_line(line).map_err(|message| {
            parse_error(format!("signal line {}: {}", idx + 1, message))
        })?);
    }

    Ok(WfdbHeader {
        record_name: record_name.to_string(),
        sampling_rate,
        samples_per_signal,
        signals,
    })
}

fn parse_signal_line(line: &str) -> Result<WfdbSignalSpec, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let file_name = tokens
        .first()
        .ok_or_else(|| "empty signal line".to_string())?
        .to_string();

    let format_token = tokens
        .get(1)
        .ok_or_else(|| format!("missing storage format for '{file_name}'"))?;
    if format_token.contains('x') || format_token.contains(':') {
        return Err(format!(
            "storage format '{format_token}' uses multi-sample frames or skew, which is not supported"
        ));
    }
    let format: u32 = leading_number(format_token)
        .parse()
        .map_err(|_| format!("invalid storage format '{format_token}'"))?;
    let byte_offset = match format_token.split_once('+') {
        Some((_, offset)) => offset
            .parse()
            .map_err(|_| format!("invalid byte offset in '{format_token}'"))?,
        None => 0,
    };

    let (gain, baseline, units) = match tokens.get(2) {
        Some(token) => parse_gain(token)?,
        None => (0.0, None, None),
    };

    let optional_int = |idx: usize, name: &str| -> Result<Option<i32>, String> {
        tokens
            .get(idx)
            .map(|token| {
                token
                    .parse::<i32>()
                    .map_err(|_| format!("invalid {name} '{token}'"))
            })
            .transpose()
    };

    let adc_resolution = optional_int(3, "ADC resolution")?.map(|v| v.max(0) as u32);
    let adc_zero = optional_int(4, "ADC zero")?;
    let initial_value = optional_int(5, "initial value")?;
    let checksum = optional_int(6, "checksum")?;
    // tokens[7] is the block size; anything after it is the description.
    let description = (tokens.len() > 8).then(|| tokens[8..].join(" "));

    Ok(WfdbSignalSpec {
        file_name,
        format,
        byte_offset,
        gain,
        baseline,
        units,
        adc_resolution,
        adc_zero,
        initial_value,
        checksum,
        description,
    })
}

/// Parses `gain[(baseline)][/units]`.
fn parse_gain(token: &str) -> Result<(f64, Option<i32>, Option<String>), String> {
    let (value_part, units) = match token.split_once('/') {
        Some((value, units)) => (value, Some(units.to_string())),
        None => (token, None),
    };
    let (gain_part, baseline) = match value_part.split_once('(') {
        Some((gain, rest)) => {
            let baseline = rest
                .trim_end_matches(')')
                .parse::<i32>()
                .map_err(|_| format!("invalid baseline in '{token}'"))?;
            (gain, Some(baseline))
        }
        None => (value_part, None),
    };
    let gain = gain_part
        .parse::<f64>()
        .map_err(|_| format!("invalid gain '{token}'"))?;
    Ok((gain, baseline, units))
}

fn render_header(
    record_name: &str,
    data_file_name: &str,
    storage: WfdbStorage,
    record: &EcgRecord,
) -> String {
    let adc_resolution = match storage {
        WfdbStorage::Fmt212 => 12,
        WfdbStorage::Fmt16 | WfdbStorage::Fmt61 => 16,
    };
    let gain = if record.adu_gain() > 0 {
        record.adu_gain()
    } else {
        DEFAULT_ADU_GAIN
    };
    let labels = record.lead_labels();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} {} {}",
        record_name,
        record.channel_count(),
        record.sampling_rate(),
        record.samples_per_channel()
    );
    for (idx, channel) in record.signals().rows().enumerate() {
        let initial_value = channel.first().copied().unwrap_or(0);
        let _ = write!(
            out,
            "{} {} {} {} 0 {} {} 0",
            data_file_name,
            storage.code(),
            gain,
            adc_resolution,
            initial_value,
            checksum(channel)
        );
        if let Some(label) = labels.as_ref().and_then(|labels| labels.get(idx)) {
            let _ = write!(out, " {label}");
        }
        out.push('\n');
    }
    out
}
