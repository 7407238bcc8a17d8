//! The conversion pipeline: read a source record, write it in another format.
//!
//! [`convert`] is the one-shot entry point. It derives the record name from
//! the input file name, loads through the [`Dispatcher`], and hands the
//! immutable [`EcgRecord`] to the target writer. A failed read is logged with
//! the full request and the writer is never called. [`convert_or_sentinel`]
//! flattens the result to a row count or `-1` for callers that want the
//! classic integer boundary.
//!
//! [`Converter`] keeps a [`Workspace`] across calls for callers that want to
//! inspect the loaded generation between conversions.

pub mod report;

pub use report::{
    ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity, RecordCounts,
};

use std::path::Path;

use crate::error::{Direction, EcgError};
use crate::format::{Dispatcher, FormatTag, ReadRequest, WfdbStorage};
use crate::ir::{EcgRecord, Workspace};

/// Everything one conversion needs.
#[derive(Clone, Copy, Debug)]
pub struct ConvertRequest<'a> {
    pub input_format: FormatTag,
    pub output_format: FormatTag,
    /// Input file name, including its extension.
    pub file_name: &'a str,
    /// Signals to read (WFDB only); 0 means all.
    pub signals_requested: usize,
    pub input_dir: &'a Path,
    pub output_dir: &'a Path,
}

impl<'a> ConvertRequest<'a> {
    pub fn new(
        input_format: FormatTag,
        output_format: FormatTag,
        file_name: &'a str,
        input_dir: &'a Path,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            input_format,
            output_format,
            file_name,
            signals_requested: 0,
            input_dir,
            output_dir,
        }
    }

    pub fn with_signals(mut self, signals_requested: usize) -> Self {
        self.signals_requested = signals_requested;
        self
    }

    /// Base name shared by input and output files.
    pub fn record_name(&self) -> Result<&'a str, EcgError> {
        record_name_from_file_name(self.file_name)
    }

    /// The read half of this conversion.
    pub fn read_request(&self, record_name: &'a str) -> ReadRequest<'a> {
        ReadRequest::new(self.input_format, self.file_name, self.input_dir, record_name)
            .with_signals(self.signals_requested)
    }
}

/// Strips the extension: everything up to the last `.`.
///
/// A file name without a `.` has no record name.
pub fn record_name_from_file_name(file_name: &str) -> Result<&str, EcgError> {
    file_name
        .rfind('.')
        .map(|idx| &file_name[..idx])
        .ok_or_else(|| EcgError::InvalidRecordName {
            file_name: file_name.to_string(),
        })
}

/// Converts one record and returns the writer's row count.
pub fn convert(dispatcher: &Dispatcher, request: &ConvertRequest<'_>) -> Result<usize, EcgError> {
    let record_name = request.record_name()?;
    let record = read_logged(dispatcher, &request.read_request(record_name))?;
    dispatcher.write(request.output_format, &record, request.output_dir, record_name)
}

/// Converts one record and describes what the target format kept.
///
/// With `allow_lossy` unset, a report with warnings stops the conversion
/// before anything is written.
pub fn convert_with_report(
    dispatcher: &Dispatcher,
    request: &ConvertRequest<'_>,
    allow_lossy: bool,
) -> Result<ConversionReport, EcgError> {
    let record_name = request.record_name()?;
    let record = read_logged(dispatcher, &request.read_request(record_name))?;
    let mut report = build_conversion_report(&record, request.output_format);
    if !allow_lossy && report.is_lossy() {
        return Err(EcgError::LossyConversion {
            from: request.input_format,
            to: request.output_format,
            report: Box::new(report),
        });
    }
    let rows = dispatcher.write(request.output_format, &record, request.output_dir, record_name)?;
    report.rows_written = Some(rows);
    Ok(report)
}

/// [`convert`] with every failure mapped to `-1`.
pub fn convert_or_sentinel(dispatcher: &Dispatcher, request: &ConvertRequest<'_>) -> i64 {
    to_sentinel(convert(dispatcher, request))
}

fn to_sentinel(result: Result<usize, EcgError>) -> i64 {
    match result {
        Ok(rows) => i64::try_from(rows).unwrap_or(i64::MAX),
        Err(err) => {
            log::debug!("Conversion failed: {err}");
            -1
        }
    }
}

fn read_logged(dispatcher: &Dispatcher, request: &ReadRequest<'_>) -> Result<EcgRecord, EcgError> {
    dispatcher.read(request).inspect_err(|_| {
        log::error!("Record reading failed: {request}");
    })
}

/// A dispatcher plus the workspace holding the last loaded generation.
#[derive(Debug, Default)]
pub struct Converter {
    dispatcher: Dispatcher,
    workspace: Workspace,
}

impl Converter {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            workspace: Workspace::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Loads into the workspace; on failure the previous generation stays.
    pub fn read(&mut self, request: &ReadRequest<'_>) -> Result<(), EcgError> {
        self.workspace.load(&self.dispatcher, request)
    }

    /// Writes the current generation.
    pub fn write(
        &self,
        format: FormatTag,
        output_dir: &Path,
        record_name: &str,
    ) -> Result<usize, EcgError> {
        if !self.dispatcher.can_write(format) {
            return Err(EcgError::unsupported(format, Direction::Write));
        }
        let record = self.workspace.record().ok_or(EcgError::NoRecordLoaded)?;
        self.dispatcher.write(format, record, output_dir, record_name)
    }

    /// Read then write; the write only happens after a successful read.
    pub fn convert(&mut self, request: &ConvertRequest<'_>) -> Result<usize, EcgError> {
        let record_name = request.record_name()?;
        self.read(&request.read_request(record_name))?;
        self.write(request.output_format, request.output_dir, record_name)
    }

    /// [`Converter::convert`] with every failure mapped to `-1`.
    pub fn convert_or_sentinel(&mut self, request: &ConvertRequest<'_>) -> i64 {
        to_sentinel(self.convert(request))
    }
}

// ============================================================================
// Lossiness analysis
// ============================================================================

/// Inclusive sample range a writable format can store, if limited.
pub fn sample_range(format: FormatTag) -> Option<(i32, i32)> {
    match format {
        FormatTag::Rdt | FormatTag::Wfdb | FormatTag::Wfdb16 | FormatTag::Wfdb61 => {
            Some((i16::MIN as i32, i16::MAX as i32))
        }
        FormatTag::Wfdb212 => Some((-2048, 2047)),
        _ => None,
    }
}

/// Build a conversion report analyzing what writing `record` as `to` keeps.
pub fn build_conversion_report(record: &EcgRecord, to: FormatTag) -> ConversionReport {
    let mut report = ConversionReport::new(record.source_format().name(), to.name());

    report.input = RecordCounts {
        channels: record.channel_count(),
        samples_per_channel: record.samples_per_channel(),
        sampling_rate: record.sampling_rate(),
    };
    report.output = report.input.clone();

    analyze_common(record, to, &mut report);
    match to {
        FormatTag::Rdt => analyze_to_rdt(record, &mut report),
        FormatTag::Hl7 => report.add(ConversionIssue::info(
            ConversionIssueCode::Hl7GainAsScale,
            format!(
                "HL7 stores ADU gain {} as a scale of {} uV per unit",
                record.adu_gain(),
                1000.0 / record.adu_gain() as f64
            ),
        )),
        FormatTag::Wfdb => report.add(ConversionIssue::info(
            ConversionIssueCode::WfdbDefaultStorage,
            format!(
                "WFDB output uses storage format {}",
                WfdbStorage::Fmt16.code()
            ),
        )),
        _ => {}
    }
    analyze_sample_range(record, to, &mut report);

    report
}

fn analyze_common(record: &EcgRecord, to: FormatTag, report: &mut ConversionReport) {
    if let Some(payload) = record.payload() {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropPayload,
            format!("{} document will not be written", payload.kind()),
        ));
    }

    if record.allocated_channels() > record.channel_count() {
        report.add(ConversionIssue::info(
            ConversionIssueCode::DropAllocatedChannels,
            format!(
                "source allocated {} channel slot(s); {} carry data",
                record.allocated_channels(),
                record.channel_count()
            ),
        ));
    } else if record.allocated_channels() < record.channel_count() {
        report.add(ConversionIssue::info(
            ConversionIssueCode::DerivedLimbLeads,
            format!(
                "{} of {} channel(s) were derived at load time",
                record.channel_count() - record.allocated_channels(),
                record.channel_count()
            ),
        ));
    }

    if record.lead_names().is_none() && to != FormatTag::Rdt {
        report.add(ConversionIssue::info(
            ConversionIssueCode::GenericChannelLabels,
            "record has no lead names; channels are written as CH1, CH2, ...",
        ));
    }
}

fn analyze_to_rdt(record: &EcgRecord, report: &mut ConversionReport) {
    if let Some(names) = record.lead_names() {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropLeadNames,
            format!("RDT has no lead labels; '{names}' will be dropped"),
        ));
    }

    let stored_rate = record.sampling_rate() as f32 as f64;
    if stored_rate != record.sampling_rate() {
        report.output.sampling_rate = stored_rate;
        report.add(ConversionIssue::warning(
            ConversionIssueCode::SamplingRatePrecision,
            format!(
                "RDT stores the sampling rate as f32: {} Hz becomes {} Hz",
                record.sampling_rate(),
                stored_rate
            ),
        ));
    }

    if record.adu_gain() > u16::MAX as u32 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::AduGainRangeExceeded,
            format!(
                "ADU gain {} exceeds the RDT gain field (max {})",
                record.adu_gain(),
                u16::MAX
            ),
        ));
    }
}

fn analyze_sample_range(record: &EcgRecord, to: FormatTag, report: &mut ConversionReport) {
    let (Some((lo, hi)), Some((min, max))) = (sample_range(to), record.signals().value_range())
    else {
        return;
    };
    if min < lo || max > hi {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::SampleRangeExceeded,
            format!(
                "samples span {min}..={max} but {} stores {lo}..={hi}; the write will fail",
                to.name()
            ),
        ));
    }
}
