//! Record validation for ecgconv.
//!
//! This module checks a loaded record for:
//! - Structural integrity (metadata agrees with the signal matrix)
//! - Metadata sanity (positive sampling rate and gain)
//! - Lead labelling (vocabulary, one label per channel, no duplicates)
//! - Signal quality hints (empty records, flat channels)

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::HashMap;

use crate::ir::{EcgRecord, RecordMetadata, SignalMatrix};
use crate::leads::{self, LeadName};

/// Sampling rates outside this range (Hz) draw a warning.
const PLAUSIBLE_SAMPLING_RATE: std::ops::RangeInclusive<f64> = 50.0..=20_000.0;

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

/// Validates a record and returns a report of all issues found.
pub fn validate_record(record: &EcgRecord, opts: &ValidateOptions) -> ValidationReport {
    validate_parts(record.metadata(), record.signals(), opts)
}

/// Validates metadata against a signal matrix.
///
/// [`EcgRecord`] construction already enforces the shape invariants; this
/// entry point also accepts hand-assembled metadata.
pub fn validate_parts(
    metadata: &RecordMetadata,
    signals: &SignalMatrix,
    _opts: &ValidateOptions,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_shape(metadata, signals, &mut report);
    validate_metadata(metadata, &mut report);
    validate_lead_names(metadata, &mut report);
    validate_channels(metadata, signals, &mut report);

    report
}

fn validate_shape(
    metadata: &RecordMetadata,
    signals: &SignalMatrix,
    report: &mut ValidationReport,
) {
    if metadata.channel_count != signals.channel_count() {
        report.add(ValidationIssue::error(
            IssueCode::ChannelCountMismatch,
            format!(
                "Metadata reports {} channel(s) but the matrix has {} row(s)",
                metadata.channel_count,
                signals.channel_count()
            ),
            IssueContext::Metadata {
                field: "channel_count",
            },
        ));
    }

    if metadata.samples_per_channel != signals.samples_per_channel() {
        report.add(ValidationIssue::error(
            IssueCode::SampleCountMismatch,
            format!(
                "Metadata reports {} sample(s) per channel but the matrix has {} column(s)",
                metadata.samples_per_channel,
                signals.samples_per_channel()
            ),
            IssueContext::Metadata {
                field: "samples_per_channel",
            },
        ));
    }

    if signals.is_empty() {
        report.add(ValidationIssue::warning(
            IssueCode::EmptySignal,
            "Record holds no samples",
            IssueContext::Record,
        ));
    }

    let matrix_points = signals.channel_count() * signals.samples_per_channel();
    if metadata.number_of_points != matrix_points {
        report.add(ValidationIssue::warning(
            IssueCode::PointCountMismatch,
            format!(
                "Source reported {} point(s); the matrix holds {}",
                metadata.number_of_points, matrix_points
            ),
            IssueContext::Metadata {
                field: "number_of_points",
            },
        ));
    }
}

fn validate_metadata(metadata: &RecordMetadata, report: &mut ValidationReport) {
    let rate = metadata.sampling_rate;
    if !(rate.is_finite() && rate > 0.0) {
        report.add(ValidationIssue::error(
            IssueCode::InvalidSamplingRate,
            format!("Sampling rate {} Hz is not a positive number", rate),
            IssueContext::Metadata {
                field: "sampling_rate",
            },
        ));
    } else if !PLAUSIBLE_SAMPLING_RATE.contains(&rate) {
        report.add(ValidationIssue::warning(
            IssueCode::UnusualSamplingRate,
            format!(
                "Sampling rate {} Hz is outside {}..={} Hz",
                rate,
                PLAUSIBLE_SAMPLING_RATE.start(),
                PLAUSIBLE_SAMPLING_RATE.end()
            ),
            IssueContext::Metadata {
                field: "sampling_rate",
            },
        ));
    }

    if metadata.adu_gain == 0 {
        report.add(ValidationIssue::error(
            IssueCode::InvalidAduGain,
            "ADU gain must be positive",
            IssueContext::Metadata { field: "adu_gain" },
        ));
    }
}

fn validate_lead_names(metadata: &RecordMetadata, report: &mut ValidationReport) {
    let Some(names) = metadata.lead_names.as_deref() else {
        report.add(ValidationIssue::warning(
            IssueCode::MissingLeadNames,
            "Record carries no lead names",
            IssueContext::Metadata {
                field: "lead_names",
            },
        ));
        return;
    };

    let labels: Vec<&str> = leads::split_lead_names(names).collect();
    if labels.len() != metadata.channel_count {
        report.add(ValidationIssue::error(
            IssueCode::LeadCountMismatch,
            format!(
                "{} lead name(s) for {} channel(s)",
                labels.len(),
                metadata.channel_count
            ),
            IssueContext::Metadata {
                field: "lead_names",
            },
        ));
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (index, label) in labels.iter().enumerate() {
        if label.parse::<LeadName>().is_err() {
            report.add(ValidationIssue::error(
                IssueCode::UnknownLeadName,
                format!("Lead name '{}' is not a recognized lead", label),
                IssueContext::Channel {
                    index,
                    label: label.to_string(),
                },
            ));
        }

        if let Some(first) = seen.get(label) {
            report.add(ValidationIssue::warning(
                IssueCode::DuplicateLeadName,
                format!(
                    "Lead name '{}' already used by channel {}",
                    label, first
                ),
                IssueContext::Channel {
                    index,
                    label: label.to_string(),
                },
            ));
        } else {
            seen.insert(*label, index);
        }
    }
}

fn validate_channels(
    metadata: &RecordMetadata,
    signals: &SignalMatrix,
    report: &mut ValidationReport,
) {
    let labels: Vec<&str> = metadata
        .lead_names
        .as_deref()
        .map(|names| leads::split_lead_names(names).collect())
        .unwrap_or_default();

    for (index, channel) in signals.rows().enumerate() {
        let Some((&first, rest)) = channel.split_first() else {
            continue;
        };
        if !rest.is_empty() && rest.iter().all(|&value| value == first) {
            let label = labels
                .get(index)
                .map(|label| label.to_string())
                .unwrap_or_else(|| format!("CH{}", index + 1));
            report.add(ValidationIssue::warning(
                IssueCode::FlatChannel,
                format!("All {} samples equal {}", channel.len(), first),
                IssueContext::Channel { index, label },
            ));
        }
    }
}
