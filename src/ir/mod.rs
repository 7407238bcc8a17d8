//! Intermediate Representation (IR) for ecgconv.
//!
//! This module defines the canonical, format-agnostic representation of an
//! ECG recording. Every format conversion passes through it: a loader turns a
//! source file into [`LoadedSignals`], the dispatcher promotes that into an
//! [`EcgRecord`] (normalizing lead names on the way), and a writer renders the
//! record into the target format.
//!
//! # Example
//!
//! ```
//! use ecgconv::format::FormatTag;
//! use ecgconv::ir::{EcgRecord, SignalMatrix};
//!
//! let signals = SignalMatrix::from_rows(vec![vec![0, 5, 10], vec![1, 6, 11]]).unwrap();
//! let record = EcgRecord::new(FormatTag::Rdt, 500.0, signals)
//!     .with_lead_names("I,II")
//!     .unwrap();
//!
//! assert_eq!(record.channel_count(), 2);
//! assert_eq!(record.samples_per_channel(), 3);
//! ```

pub mod io_ge_muse;
pub mod io_hl7_xml;
pub mod io_muse_xml;
pub mod io_philips_xml;
pub mod io_rdt;
pub mod io_schiller_xml;
pub mod io_wfdb;
pub mod io_xy;
mod model;
mod workspace;
mod xml;

// Re-export core types for convenient access
pub use model::{
    EcgRecord, FormatPayload, LoadedSignals, RecordMetadata, SignalMatrix, DEFAULT_ADU_GAIN,
};
pub use workspace::Workspace;
