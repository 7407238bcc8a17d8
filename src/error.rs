use std::path::PathBuf;
use thiserror::Error;

use crate::conversion::ConversionReport;
use crate::format::FormatTag;
use crate::validation::ValidationReport;

/// The main error type for ecgconv operations.
#[derive(Debug, Error)]
pub enum EcgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format: {format} cannot be {direction}")]
    UnsupportedFormat {
        format: String,
        direction: Direction,
    },

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error(
        "Failed to load {format} record '{record_name}' from {path} \
         (signals requested: {signals_requested}): {source}"
    )]
    SourceParseFailure {
        format: FormatTag,
        path: PathBuf,
        record_name: String,
        signals_requested: usize,
        #[source]
        source: Box<EcgError>,
    },

    #[error("Failed to write {format} output to {path}: {source}")]
    WriteFailure {
        format: FormatTag,
        path: PathBuf,
        #[source]
        source: Box<EcgError>,
    },

    #[error("Invalid record name: '{file_name}' has no extension separator")]
    InvalidRecordName { file_name: String },

    #[error("Failed to parse {format} data from {path}: {message}")]
    FormatParse {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Failed to write {format} data to {path}: {message}")]
    FormatWrite {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Failed to parse XML from {path}: {source}")]
    XmlParse {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Failed to parse CSV from {path}: {source}")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Signal shape mismatch: {message}")]
    ShapeMismatch { message: String },

    #[error("Signal count for record '{record_name}' is unavailable: {message}")]
    SignalCountUnavailable {
        record_name: String,
        message: String,
    },

    #[error("Format collaborator panicked: {message}")]
    CollaboratorPanicked { message: String },

    #[error("No record has been loaded")]
    NoRecordLoaded,

    #[error("Invalid sample parameters: {message}")]
    InvalidSampleParams { message: String },

    #[error(
        "Lossy conversion from {from} to {to} refused: {} warning(s)",
        .report.warning_count()
    )]
    LossyConversion {
        from: FormatTag,
        to: FormatTag,
        report: Box<ConversionReport>,
    },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },
}

/// Direction of a dispatch request, used in capability errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Load,
    Write,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Load => write!(f, "loaded"),
            Direction::Write => write!(f, "written"),
        }
    }
}

/// Coarse classification of an [`EcgError`] at the conversion boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedFormat,
    SourceParseFailure,
    WriteFailure,
    InvalidRecordName,
    Other,
}

impl EcgError {
    pub(crate) fn unsupported(format: FormatTag, direction: Direction) -> Self {
        EcgError::UnsupportedFormat {
            format: format.name().to_string(),
            direction,
        }
    }

    /// Returns the boundary error kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EcgError::UnsupportedFormat { .. } | EcgError::UnknownFormat(_) => {
                ErrorKind::UnsupportedFormat
            }
            EcgError::SourceParseFailure { .. } => ErrorKind::SourceParseFailure,
            EcgError::WriteFailure { .. } => ErrorKind::WriteFailure,
            EcgError::InvalidRecordName { .. } => ErrorKind::InvalidRecordName,
            _ => ErrorKind::Other,
        }
    }
}
