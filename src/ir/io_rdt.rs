//! RDT binary reader and writer.
//!
//! # Layout
//!
//! All fields are big-endian.
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 2 | channel count (`u16`) |
//! | 2 | 4 | sampling rate in Hz (`f32`) |
//! | 6 | 2 | ADU gain (`u16`, 0 = unspecified) |
//! | 8 | .. | frames: one `i16` per channel, repeated per sample |
//!
//! RDT carries no lead labels. Samples outside the `i16` range cannot be
//! written; the writer refuses rather than clipping.

use std::fs;
use std::path::Path;

use super::model::{EcgRecord, LoadedSignals, SignalMatrix};
use crate::error::EcgError;
use crate::format::{LoadRequest, SignalLoader, SignalWriter, WriteTarget};

const FORMAT_NAME: &str = "RDT";
const HEADER_LEN: usize = 8;

/// Built-in RDT collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct RdtCodec;

impl SignalLoader for RdtCodec {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
        read_rdt(request.file_path)
    }
}

impl SignalWriter for RdtCodec {
    fn write(&self, record: &EcgRecord, target: &WriteTarget<'_>) -> Result<usize, EcgError> {
        write_rdt(&target.file_path, record)
    }
}

/// Reads an RDT file.
pub fn read_rdt(path: &Path) -> Result<LoadedSignals, EcgError> {
    let bytes = fs::read(path).map_err(EcgError::Io)?;
    parse_rdt(&bytes, path)
}

/// Writes `record` as an RDT file and returns the number of frames written.
pub fn write_rdt(path: &Path, record: &EcgRecord) -> Result<usize, EcgError> {
    let bytes = encode_rdt(record, path)?;
    fs::write(path, bytes).map_err(EcgError::Io)?;
    Ok(record.samples_per_channel())
}

/// Parses RDT data from bytes.
///
/// Useful for testing and fuzzing without file I/O.
pub fn from_rdt_slice(bytes: &[u8]) -> Result<LoadedSignals, EcgError> {
    parse_rdt(bytes, Path::new("<memory>"))
}

/// Encodes `record` as RDT bytes.
pub fn to_rdt_bytes(record: &EcgRecord) -> Result<Vec<u8>, EcgError> {
    encode_rdt(record, Path::new("<memory>"))
}

fn parse_rdt(bytes: &[u8], path: &Path) -> Result<LoadedSignals, EcgError> {
    let parse_error = |message: String| EcgError::FormatParse {
        format: FORMAT_NAME,
        path: path.to_path_buf(),
        message,
    };

    if bytes.len() < HEADER_LEN {
        return Err(parse_error(format!(
            "file is {} bytes, shorter than the {}-byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let channels = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let sampling_rate = f32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as f64;
    let adu_gain = u16::from_be_bytes([bytes[6], bytes[7]]) as u32;

    if channels == 0 {
        return Err(parse_error("header declares zero channels".to_string()));
    }
    if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
        return Err(parse_error(format!(
            "invalid sampling rate {sampling_rate}"
        )));
    }

    let body = &bytes[HEADER_LEN..];
    let frame_len = channels * 2;
    if body.len() % frame_len != 0 {
        return Err(parse_error(format!(
            "{} data bytes are not a whole number of {}-channel frames",
            body.len(),
            channels
        )));
    }

    let samples: Vec<i32> = body
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]) as i32)
        .collect();
    let signals = SignalMatrix::from_interleaved(channels, &samples)?;

    let mut loaded = LoadedSignals::new(signals, sampling_rate);
    if adu_gain > 0 {
        loaded = loaded.with_adu_gain(adu_gain);
    }
    Ok(loaded)
}

fn encode_rdt(record: &EcgRecord, path: &Path) -> Result<Vec<u8>, EcgError> {
    let write_error = |message: String| EcgError::FormatWrite {
        format: FORMAT_NAME,
        path: path.to_path_buf(),
        message,
    };

    let channels = u16::try_from(record.channel_count()).map_err(|_| {
        write_error(format!(
            "{} channels exceed the u16 header field",
            record.channel_count()
        ))
    })?;
    if channels == 0 {
        return Err(write_error("record has no channels".to_string()));
    }
    let adu_gain = u16::try_from(record.adu_gain()).map_err(|_| {
        write_error(format!(
            "ADU gain {} exceeds the u16 header field",
            record.adu_gain()
        ))
    })?;

    let sample_count = record.channel_count() * record.samples_per_channel();
    let mut bytes = Vec::with_capacity(HEADER_LEN + sample_count * 2);
    bytes.extend_from_slice(&channels.to_be_bytes());
    bytes.extend_from_slice(&(record.sampling_rate() as f32).to_be_bytes());
    bytes.extend_from_slice(&adu_gain.to_be_bytes());

    for value in record.signals().interleaved() {
        let sample = i16::try_from(value)
            .map_err(|_| write_error(format!("sample {value} does not fit in 16 bits")))?;
        bytes.extend_from_slice(&sample.to_be_bytes());
    }

    Ok(bytes)
}
