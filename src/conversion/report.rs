//! Conversion report types for tracking lossiness and policy decisions.
//!
//! This module provides structured reporting for format conversions,
//! similar to how `validation::ValidationReport` tracks record issues.

use serde::Serialize;
use std::fmt;

/// A report generated during format conversion.
///
/// Tracks the record shape before and after conversion, lossiness warnings
/// and policy decisions so callers can see exactly what the target format
/// kept.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Source format name.
    pub from: String,
    /// Target format name.
    pub to: String,
    /// Shape of the loaded record.
    pub input: RecordCounts,
    /// Shape of what the target format stores.
    pub output: RecordCounts,
    /// Rows reported by the writer, once the write has happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_written: Option<usize>,
    /// Issues discovered during conversion analysis.
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    /// Create a new empty report for a conversion between formats.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Count of warning-level issues (true lossiness).
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// Count of info-level issues (policy decisions, notes).
    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Info)
            .count()
    }

    /// Returns true if this conversion would lose information.
    pub fn is_lossy(&self) -> bool {
        self.warning_count() > 0
    }

    /// Iterate over warning messages.
    pub fn lossy_messages(&self) -> impl Iterator<Item = &str> {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .map(|i| i.message.as_str())
    }

    pub fn has_code(&self, code: ConversionIssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} channel(s) x {} sample(s) at {} Hz",
            self.input.channels, self.input.samples_per_channel, self.input.sampling_rate
        )?;

        if self.output != self.input {
            writeln!(
                f,
                "  output: {} channel(s) x {} sample(s) at {} Hz",
                self.output.channels, self.output.samples_per_channel, self.output.sampling_rate
            )?;
        }

        if let Some(rows) = self.rows_written {
            writeln!(f, "  rows written: {rows}")?;
        }

        let warnings = self.warning_count();
        if warnings > 0 {
            writeln!(f)?;
            writeln!(f, "Warnings ({}):", warnings)?;
            for message in self.lossy_messages() {
                writeln!(f, "  - {}", message)?;
            }
        }

        let infos = self.info_count();
        if infos > 0 {
            writeln!(f)?;
            writeln!(f, "Notes ({}):", infos)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ConversionSeverity::Info)
            {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        Ok(())
    }
}

/// Shape of a record as seen by one side of a conversion.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RecordCounts {
    pub channels: usize,
    pub samples_per_channel: usize,
    pub sampling_rate: f64,
}

/// A single issue discovered during conversion analysis.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
}

impl ConversionIssue {
    /// Create a warning-level issue (indicates lossiness).
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            message: message.into(),
        }
    }

    /// Create an info-level issue (policy note, does not block).
    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            message: message.into(),
        }
    }
}

/// Severity level for conversion issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    /// Information will be lost; `--strict` refuses the conversion.
    Warning,
    /// A policy note; never blocks.
    Info,
}

/// Stable issue codes for programmatic consumption.
///
/// These codes are part of the JSON schema and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    /// Target format has no place for lead labels.
    DropLeadNames,
    /// The retained vendor document is not written.
    DropPayload,
    /// Source allocated more channel slots than it filled.
    DropAllocatedChannels,
    /// Target stores the sampling rate with less precision.
    SamplingRatePrecision,
    /// Samples exceed the target's sample width; the writer will refuse.
    SampleRangeExceeded,
    /// ADU gain exceeds the target's gain field; the writer will refuse.
    AduGainRangeExceeded,

    /// Record has no lead labels; the writer names channels `CH1`, `CH2`, ...
    GenericChannelLabels,
    /// Limb leads in the source record were derived at load time.
    DerivedLimbLeads,
    /// WFDB without an explicit storage tag writes format 16.
    WfdbDefaultStorage,
    /// HL7 stores the ADU gain as a microvolt scale.
    Hl7GainAsScale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_not_lossy() {
        let report = ConversionReport::new("WFDB", "GEMUSE");
        assert!(!report.is_lossy());
        assert_eq!(report.warning_count(), 0);
        assert_eq!(report.info_count(), 0);
    }

    #[test]
    fn warning_makes_report_lossy() {
        let mut report = ConversionReport::new("MUSEXML", "RDT");
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropLeadNames,
            "lead names will be dropped",
        ));
        assert!(report.is_lossy());
        assert_eq!(report.warning_count(), 1);
        assert!(report.has_code(ConversionIssueCode::DropLeadNames));
    }

    #[test]
    fn info_does_not_make_report_lossy() {
        let mut report = ConversionReport::new("RDT", "WFDB");
        report.add(ConversionIssue::info(
            ConversionIssueCode::WfdbDefaultStorage,
            "WFDB output uses storage format 16",
        ));
        assert!(!report.is_lossy());
        assert_eq!(report.info_count(), 1);
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = ConversionReport::new("PHILIPS104", "RDT");
        report.input = RecordCounts {
            channels: 12,
            samples_per_channel: 5000,
            sampling_rate: 500.0,
        };
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropPayload,
            "philips-xml document will be dropped",
        ));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"from\":\"PHILIPS104\""));
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"code\":\"drop_payload\""));
        assert!(!json.contains("rows_written"));
    }
}
