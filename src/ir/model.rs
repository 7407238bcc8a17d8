//! Core record model for the ecgconv intermediate representation.
//!
//! Every loader produces a [`LoadedSignals`] value; the dispatcher turns it
//! into an [`EcgRecord`], and every writer renders an [`EcgRecord`] back out.

use serde::Serialize;

use crate::error::EcgError;
use crate::format::FormatTag;
use crate::leads;

/// ADU gain assumed when a format does not carry one.
pub const DEFAULT_ADU_GAIN: u32 = 200;

/// Rectangular matrix of raw integer samples, one row per channel.
///
/// Storage is channel-major: all samples of channel 0, then channel 1, etc.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignalMatrix {
    channels: usize,
    samples_per_channel: usize,
    data: Vec<i32>,
}

impl SignalMatrix {
    /// Creates a zero-filled matrix.
    pub fn zeros(channels: usize, samples_per_channel: usize) -> Self {
        Self {
            channels,
            samples_per_channel,
            data: vec![0; channels * samples_per_channel],
        }
    }

    /// Builds a matrix from per-channel rows. All rows must have equal length.
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self, EcgError> {
        let channels = rows.len();
        let samples_per_channel = rows.first().map_or(0, Vec::len);

        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != samples_per_channel)
        {
            return Err(EcgError::ShapeMismatch {
                message: format!(
                    "channel {} has {} samples, expected {}",
                    idx,
                    row.len(),
                    samples_per_channel
                ),
            });
        }

        Ok(Self {
            channels,
            samples_per_channel,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Builds a matrix from frame-interleaved samples (`c0 c1 .. cN c0 c1 ..`).
    ///
    /// A trailing partial frame is rejected.
    pub fn from_interleaved(channels: usize, samples: &[i32]) -> Result<Self, EcgError> {
        if channels == 0 {
            return if samples.is_empty() {
                Ok(Self::default())
            } else {
                Err(EcgError::ShapeMismatch {
                    message: format!("{} samples for zero channels", samples.len()),
                })
            };
        }
        if samples.len() % channels != 0 {
            return Err(EcgError::ShapeMismatch {
                message: format!(
                    "{} interleaved samples do not divide into {} channels",
                    samples.len(),
                    channels
                ),
            });
        }

        let samples_per_channel = samples.len() / channels;
        let mut matrix = Self::zeros(channels, samples_per_channel);
        for (frame_idx, frame) in samples.chunks_exact(channels).enumerate() {
            for (channel, &value) in frame.iter().enumerate() {
                matrix.data[channel * samples_per_channel + frame_idx] = value;
            }
        }
        Ok(matrix)
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn samples_per_channel(&self) -> usize {
        self.samples_per_channel
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Samples of one channel.
    ///
    /// # Panics
    /// Panics if `channel` is out of range.
    pub fn channel(&self, channel: usize) -> &[i32] {
        let start = channel * self.samples_per_channel;
        &self.data[start..start + self.samples_per_channel]
    }

    /// Iterates over channel rows.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        (0..self.channels).map(move |channel| self.channel(channel))
    }

    /// Iterates over samples in frame order (`c0 c1 .. cN` for each instant).
    pub fn interleaved(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.samples_per_channel).flat_map(move |sample| {
            (0..self.channels)
                .map(move |channel| self.data[channel * self.samples_per_channel + sample])
        })
    }

    /// Copies the matrix into per-channel rows.
    pub fn to_rows(&self) -> Vec<Vec<i32>> {
        self.rows().map(<[i32]>::to_vec).collect()
    }

    /// Smallest and largest sample, or `None` for an empty matrix.
    pub fn value_range(&self) -> Option<(i32, i32)> {
        let min = self.data.iter().copied().min()?;
        let max = self.data.iter().copied().max()?;
        Some((min, max))
    }
}

/// Metadata describing one loaded record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordMetadata {
    /// Samples per second per channel, in Hz.
    pub sampling_rate: f64,
    pub channel_count: usize,
    pub samples_per_channel: usize,
    /// ADC units per millivolt-scale unit; always positive.
    pub adu_gain: u32,
    /// Normalized, comma-joined lead labels (one per channel) if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_names: Option<String>,
    /// Sample count as reported by the source format.
    pub number_of_points: usize,
    /// Channel slots the source format allocated (may exceed `channel_count`).
    pub allocated_channels: usize,
    pub source_format: FormatTag,
}

/// A vendor document retained verbatim by some loaders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatPayload {
    /// Raw GE MUSE XML document.
    MuseXml(String),
    /// Raw Philips SierraECG document and its schema version (e.g. `1.03`).
    PhilipsXml { version: String, document: String },
    /// Raw Schiller SEMA document.
    SchillerXml(String),
}

impl FormatPayload {
    /// Short name of the payload kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FormatPayload::MuseXml(_) => "muse-xml",
            FormatPayload::PhilipsXml { .. } => "philips-xml",
            FormatPayload::SchillerXml(_) => "schiller-xml",
        }
    }

    /// The retained document text.
    pub fn document(&self) -> &str {
        match self {
            FormatPayload::MuseXml(doc) | FormatPayload::SchillerXml(doc) => doc,
            FormatPayload::PhilipsXml { document, .. } => document,
        }
    }
}

/// Everything a loader reports after a successful parse.
#[derive(Clone, Debug)]
pub struct LoadedSignals {
    pub sampling_rate: f64,
    pub channel_count: usize,
    pub samples_per_channel: usize,
    pub signals: SignalMatrix,
    /// `None` when the format does not carry a gain.
    pub adu_gain: Option<u32>,
    /// Channel labels exactly as found in the source.
    pub lead_names: Option<Vec<String>>,
    pub number_of_points: usize,
    pub allocated_channels: usize,
    pub payload: Option<FormatPayload>,
}

impl LoadedSignals {
    /// Creates a report whose counters are derived from `signals`.
    pub fn new(signals: SignalMatrix, sampling_rate: f64) -> Self {
        Self {
            sampling_rate,
            channel_count: signals.channel_count(),
            samples_per_channel: signals.samples_per_channel(),
            adu_gain: None,
            lead_names: None,
            number_of_points: signals.channel_count() * signals.samples_per_channel(),
            allocated_channels: signals.channel_count(),
            payload: None,
            signals,
        }
    }

    pub fn with_adu_gain(mut self, adu_gain: u32) -> Self {
        self.adu_gain = Some(adu_gain);
        self
    }

    pub fn with_lead_names(mut self, lead_names: Vec<String>) -> Self {
        self.lead_names = Some(lead_names);
        self
    }

    pub fn with_allocated_channels(mut self, allocated_channels: usize) -> Self {
        self.allocated_channels = allocated_channels;
        self
    }

    pub fn with_number_of_points(mut self, number_of_points: usize) -> Self {
        self.number_of_points = number_of_points;
        self
    }

    pub fn with_payload(mut self, payload: FormatPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// One complete generation of converter data.
#[derive(Clone, Debug, PartialEq)]
pub struct EcgRecord {
    metadata: RecordMetadata,
    signals: SignalMatrix,
    payload: Option<FormatPayload>,
}

impl EcgRecord {
    /// Creates a record with default gain and no lead names.
    pub fn new(source_format: FormatTag, sampling_rate: f64, signals: SignalMatrix) -> Self {
        Self {
            metadata: RecordMetadata {
                sampling_rate,
                channel_count: signals.channel_count(),
                samples_per_channel: signals.samples_per_channel(),
                adu_gain: DEFAULT_ADU_GAIN,
                lead_names: None,
                number_of_points: signals.channel_count() * signals.samples_per_channel(),
                allocated_channels: signals.channel_count(),
                source_format,
            },
            signals,
            payload: None,
        }
    }

    /// Sets the ADU gain; zero keeps [`DEFAULT_ADU_GAIN`].
    pub fn with_adu_gain(mut self, adu_gain: u32) -> Self {
        if adu_gain > 0 {
            self.metadata.adu_gain = adu_gain;
        }
        self
    }

    /// Sets comma-joined lead names; the label count must match the channel count.
    pub fn with_lead_names(mut self, lead_names: impl Into<String>) -> Result<Self, EcgError> {
        let lead_names = lead_names.into();
        let count = leads::split_lead_names(&lead_names).count();
        if count != self.metadata.channel_count {
            return Err(EcgError::ShapeMismatch {
                message: format!(
                    "{} lead name(s) for {} channel(s)",
                    count, self.metadata.channel_count
                ),
            });
        }
        self.metadata.lead_names = Some(lead_names);
        Ok(self)
    }

    pub fn with_payload(mut self, payload: FormatPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds a record from a loader report, normalizing its lead names.
    ///
    /// Fails if the reported counts disagree with the matrix shape or the
    /// sampling rate is not a positive number.
    pub fn from_loaded(loaded: LoadedSignals, source_format: FormatTag) -> Result<Self, EcgError> {
        let LoadedSignals {
            sampling_rate,
            channel_count,
            samples_per_channel,
            signals,
            adu_gain,
            lead_names,
            number_of_points,
            allocated_channels,
            payload,
        } = loaded;

        if channel_count != signals.channel_count()
            || samples_per_channel != signals.samples_per_channel()
        {
            return Err(EcgError::ShapeMismatch {
                message: format!(
                    "reported {}x{} but matrix is {}x{}",
                    channel_count,
                    samples_per_channel,
                    signals.channel_count(),
                    signals.samples_per_channel()
                ),
            });
        }
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(EcgError::ShapeMismatch {
                message: format!("sampling rate {sampling_rate} is not positive"),
            });
        }

        let lead_names =
            leads::normalize_lead_names(lead_names.as_deref(), channel_count, source_format);

        Ok(Self {
            metadata: RecordMetadata {
                sampling_rate,
                channel_count,
                samples_per_channel,
                adu_gain: adu_gain.filter(|gain| *gain > 0).unwrap_or(DEFAULT_ADU_GAIN),
                lead_names,
                number_of_points,
                allocated_channels,
                source_format,
            },
            signals,
            payload,
        })
    }

    pub fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    pub fn signals(&self) -> &SignalMatrix {
        &self.signals
    }

    pub fn payload(&self) -> Option<&FormatPayload> {
        self.payload.as_ref()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.metadata.sampling_rate
    }

    pub fn channel_count(&self) -> usize {
        self.metadata.channel_count
    }

    pub fn samples_per_channel(&self) -> usize {
        self.metadata.samples_per_channel
    }

    pub fn adu_gain(&self) -> u32 {
        self.metadata.adu_gain
    }

    pub fn lead_names(&self) -> Option<&str> {
        self.metadata.lead_names.as_deref()
    }

    /// Lead labels as a list, if known.
    pub fn lead_labels(&self) -> Option<Vec<&str>> {
        self.lead_names()
            .map(|names| leads::split_lead_names(names).collect())
    }

    /// Label for one channel, falling back to a 1-based `CHn` name.
    pub fn channel_label(&self, channel: usize) -> String {
        self.lead_names()
            .and_then(|names| leads::split_lead_names(names).nth(channel))
            .map(str::to_string)
            .unwrap_or_else(|| format!("CH{}", channel + 1))
    }

    pub fn number_of_points(&self) -> usize {
        self.metadata.number_of_points
    }

    pub fn allocated_channels(&self) -> usize {
        self.metadata.allocated_channels
    }

    pub fn source_format(&self) -> FormatTag {
        self.metadata.source_format
    }

    /// Recording length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.metadata.sampling_rate > 0.0 {
            self.metadata.samples_per_channel as f64 / self.metadata.sampling_rate
        } else {
            0.0
        }
    }
}
