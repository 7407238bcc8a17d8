//! Supported ECG formats and their dispatch.
//!
//! [`FormatTag`] is the closed set of formats the converter knows about; each
//! tag carries a static [`Capabilities`] record. The [`Dispatcher`] maps tags
//! to the loader and writer collaborators that actually touch bytes.

mod dispatch;

pub use dispatch::{
    Dispatcher, LoadRequest, ReadRequest, SignalLoader, SignalWriter, WriteTarget,
};

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::EcgError;

/// Identifier for a source or target ECG format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatTag {
    Rdt,
    Hl7,
    /// WFDB with the default storage format (16).
    Wfdb,
    Wfdb16,
    Wfdb61,
    Wfdb212,
    GeMuse,
    RawXyConstSample,
    RawXyVarSample,
    Philips103,
    Philips104,
    Schiller,
    MuseXml,
}

/// What the converter can do with a format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_load: bool,
    pub can_write: bool,
    /// Loads honor a requested signal count and can discover it when zero.
    pub accepts_signal_count: bool,
    /// Loads retain the vendor document as an opaque payload.
    pub produces_payload: bool,
}

impl Capabilities {
    const fn new(
        can_load: bool,
        can_write: bool,
        accepts_signal_count: bool,
        produces_payload: bool,
    ) -> Self {
        Self {
            can_load,
            can_write,
            accepts_signal_count,
            produces_payload,
        }
    }
}

const READ_WRITE: Capabilities = Capabilities::new(true, true, false, false);
const WFDB_FAMILY: Capabilities = Capabilities::new(true, true, true, false);
const LOAD_ONLY: Capabilities = Capabilities::new(true, false, false, false);
const VENDOR_XML: Capabilities = Capabilities::new(true, false, false, true);

/// WFDB sample storage encodings written by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WfdbStorage {
    /// 16-bit two's complement, little-endian.
    Fmt16,
    /// 16-bit two's complement, big-endian.
    Fmt61,
    /// 12-bit two's complement, two samples packed into three bytes.
    Fmt212,
}

impl WfdbStorage {
    /// The format number as it appears in a header signal line.
    pub fn code(&self) -> u32 {
        match self {
            WfdbStorage::Fmt16 => 16,
            WfdbStorage::Fmt61 => 61,
            WfdbStorage::Fmt212 => 212,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            16 => Some(WfdbStorage::Fmt16),
            61 => Some(WfdbStorage::Fmt61),
            212 => Some(WfdbStorage::Fmt212),
            _ => None,
        }
    }
}

impl FormatTag {
    /// Every tag, in declaration order.
    pub const ALL: [FormatTag; 13] = [
        FormatTag::Rdt,
        FormatTag::Hl7,
        FormatTag::Wfdb,
        FormatTag::Wfdb16,
        FormatTag::Wfdb61,
        FormatTag::Wfdb212,
        FormatTag::GeMuse,
        FormatTag::RawXyConstSample,
        FormatTag::RawXyVarSample,
        FormatTag::Philips103,
        FormatTag::Philips104,
        FormatTag::Schiller,
        FormatTag::MuseXml,
    ];

    /// Canonical name of the tag.
    pub fn name(&self) -> &'static str {
        match self {
            FormatTag::Rdt => "RDT",
            FormatTag::Hl7 => "HL7",
            FormatTag::Wfdb => "WFDB",
            FormatTag::Wfdb16 => "WFDB_16",
            FormatTag::Wfdb61 => "WFDB_61",
            FormatTag::Wfdb212 => "WFDB_212",
            FormatTag::GeMuse => "GEMUSE",
            FormatTag::RawXyConstSample => "RAW_XY_CONST_SAMPLE",
            FormatTag::RawXyVarSample => "RAW_XY_VAR_SAMPLE",
            FormatTag::Philips103 => "PHILIPS103",
            FormatTag::Philips104 => "PHILIPS104",
            FormatTag::Schiller => "SCHILLER",
            FormatTag::MuseXml => "MUSEXML",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            FormatTag::Rdt | FormatTag::Hl7 | FormatTag::GeMuse => READ_WRITE,
            FormatTag::Wfdb | FormatTag::Wfdb16 | FormatTag::Wfdb61 | FormatTag::Wfdb212 => {
                WFDB_FAMILY
            }
            FormatTag::RawXyConstSample | FormatTag::RawXyVarSample => LOAD_ONLY,
            FormatTag::Philips103
            | FormatTag::Philips104
            | FormatTag::Schiller
            | FormatTag::MuseXml => VENDOR_XML,
        }
    }

    /// Extension appended to the record name when writing this format.
    pub fn output_extension(&self) -> Option<&'static str> {
        match self {
            FormatTag::Rdt => Some(".rdt"),
            FormatTag::Hl7 => Some(".xml"),
            FormatTag::Wfdb | FormatTag::Wfdb16 | FormatTag::Wfdb61 | FormatTag::Wfdb212 => {
                Some(".hea")
            }
            FormatTag::GeMuse => Some(".txt"),
            _ => None,
        }
    }

    /// Storage encoding used when writing a WFDB-family tag.
    pub fn wfdb_storage(&self) -> Option<WfdbStorage> {
        match self {
            FormatTag::Wfdb | FormatTag::Wfdb16 => Some(WfdbStorage::Fmt16),
            FormatTag::Wfdb61 => Some(WfdbStorage::Fmt61),
            FormatTag::Wfdb212 => Some(WfdbStorage::Fmt212),
            _ => None,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatTag {
    type Err = EcgError;

    /// Parses a tag name ignoring case; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        FormatTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                let supported: Vec<&str> = FormatTag::ALL.iter().map(|t| t.name()).collect();
                EcgError::UnknownFormat(format!("'{}' (supported: {})", s, supported.join(", ")))
            })
    }
}

impl Serialize for FormatTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
