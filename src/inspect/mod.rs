//! Record inspection and statistics.
//!
//! This module summarizes a loaded record: its metadata and, for each
//! channel, the amplitude range, mean and peak-to-peak voltage.

mod report;

pub use report::{ChannelStats, InspectReport, SummarySection};

use crate::ir::EcgRecord;

/// Options for record inspection.
#[derive(Clone, Debug)]
pub struct InspectOptions {
    /// Also compute the standard deviation of every channel.
    pub std_dev: bool,
    /// Width of amplitude bars (in characters).
    pub bar_width: usize,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            std_dev: false,
            bar_width: 12,
        }
    }
}

/// Inspect a record and produce a detailed report.
pub fn inspect_record(record: &EcgRecord, opts: &InspectOptions) -> InspectReport {
    let summary = compute_summary(record);
    let channels = (0..record.channel_count())
        .map(|index| compute_channel_stats(record, index, opts.std_dev))
        .collect();

    InspectReport {
        summary,
        channels,
        bar_width: opts.bar_width,
    }
}

fn compute_summary(record: &EcgRecord) -> SummarySection {
    SummarySection {
        format: record.source_format().name().to_string(),
        sampling_rate: record.sampling_rate(),
        channels: record.channel_count(),
        samples_per_channel: record.samples_per_channel(),
        duration_secs: record.duration_secs(),
        adu_gain: record.adu_gain(),
        lead_names: record.lead_names().map(str::to_string),
        allocated_channels: record.allocated_channels(),
        number_of_points: record.number_of_points(),
        payload: record.payload().map(|p| p.kind().to_string()),
    }
}

fn compute_channel_stats(record: &EcgRecord, index: usize, with_std_dev: bool) -> ChannelStats {
    let samples = record.signals().channel(index);
    let label = record.channel_label(index);

    let min = samples.iter().copied().min();
    let max = samples.iter().copied().max();
    let mean = (!samples.is_empty())
        .then(|| samples.iter().map(|&v| v as f64).sum::<f64>() / samples.len() as f64);
    let std_dev = mean.filter(|_| with_std_dev).map(|mean| {
        let variance = samples
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / samples.len() as f64;
        variance.sqrt()
    });
    let peak_to_peak_mv = match (min, max) {
        (Some(min), Some(max)) => Some((max as f64 - min as f64) / record.adu_gain() as f64),
        _ => None,
    };

    ChannelStats {
        index,
        label,
        min,
        max,
        mean,
        std_dev,
        peak_to_peak_mv,
    }
}
