//! Dispatch table from [`FormatTag`] to format collaborators.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use super::FormatTag;
use crate::error::{Direction, EcgError};
use crate::ir::io_ge_muse::GeMuseCodec;
use crate::ir::io_hl7_xml::Hl7Codec;
use crate::ir::io_muse_xml::MuseXmlLoader;
use crate::ir::io_philips_xml::{PhilipsLoader, PhilipsVersion};
use crate::ir::io_rdt::RdtCodec;
use crate::ir::io_schiller_xml::SchillerLoader;
use crate::ir::io_wfdb::WfdbCodec;
use crate::ir::io_xy::{XyLoader, XySampling};
use crate::ir::{EcgRecord, LoadedSignals};

/// A format-specific parser.
pub trait SignalLoader {
    /// Parses the source described by `request`.
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError>;

    /// Number of signals available in a record.
    ///
    /// Only consulted for formats that accept a signal count, when the caller
    /// asked for zero signals.
    fn signal_count(&self, _input_dir: &Path, record_name: &str) -> Result<usize, EcgError> {
        Err(EcgError::SignalCountUnavailable {
            record_name: record_name.to_string(),
            message: "format does not report signal counts".to_string(),
        })
    }
}

/// A format-specific serializer.
pub trait SignalWriter {
    /// Writes `record` and returns the number of rows written.
    fn write(&self, record: &EcgRecord, target: &WriteTarget<'_>) -> Result<usize, EcgError>;
}

/// Caller-facing description of a load.
#[derive(Clone, Copy, Debug)]
pub struct ReadRequest<'a> {
    pub format: FormatTag,
    /// Input file name, including its extension.
    pub file_name: &'a str,
    /// Signals to read, starting with the first; 0 means all (WFDB only).
    pub signals_requested: usize,
    pub input_dir: &'a Path,
    /// Record base name shared by multi-file formats.
    pub record_name: &'a str,
}

impl<'a> ReadRequest<'a> {
    pub fn new(
        format: FormatTag,
        file_name: &'a str,
        input_dir: &'a Path,
        record_name: &'a str,
    ) -> Self {
        Self {
            format,
            file_name,
            signals_requested: 0,
            input_dir,
            record_name,
        }
    }

    pub fn with_signals(mut self, signals_requested: usize) -> Self {
        self.signals_requested = signals_requested;
        self
    }

    /// Full path of the input file.
    pub fn file_path(&self) -> PathBuf {
        self.input_dir.join(self.file_name)
    }
}

impl fmt::Display for ReadRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inputFormat = {}, fileName = {}, signalsRequested = {}, inputPath = {}, recordName = {}",
            self.format,
            self.file_name,
            self.signals_requested,
            self.input_dir.display(),
            self.record_name
        )
    }
}

/// What a loader receives.
#[derive(Clone, Copy, Debug)]
pub struct LoadRequest<'a> {
    pub format: FormatTag,
    pub file_path: &'a Path,
    pub input_dir: &'a Path,
    pub record_name: &'a str,
    /// Resolved signal count; never zero for WFDB-family loads.
    pub signals_requested: usize,
}

/// Where a writer puts its output.
#[derive(Clone, Debug)]
pub struct WriteTarget<'a> {
    pub format: FormatTag,
    pub output_dir: &'a Path,
    pub record_name: &'a str,
    /// `output_dir/record_name` plus the format's extension.
    pub file_path: PathBuf,
}

#[derive(Default)]
struct FormatEntry {
    loader: Option<Box<dyn SignalLoader>>,
    writer: Option<Box<dyn SignalWriter>>,
}

/// Routes loads and writes to the collaborator registered for each format.
pub struct Dispatcher {
    entries: BTreeMap<FormatTag, FormatEntry>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (tag, entry) in &self.entries {
            map.entry(
                &tag.name(),
                &(entry.loader.is_some(), entry.writer.is_some()),
            );
        }
        map.finish()
    }
}

impl Dispatcher {
    /// A dispatcher with no collaborators registered.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// A dispatcher with the built-in collaborator for every format.
    pub fn builtin() -> Self {
        let mut dispatcher = Self::empty();

        dispatcher.register_loader(FormatTag::Rdt, RdtCodec);
        dispatcher.register_writer(FormatTag::Rdt, RdtCodec);
        dispatcher.register_loader(FormatTag::Hl7, Hl7Codec);
        dispatcher.register_writer(FormatTag::Hl7, Hl7Codec);
        dispatcher.register_loader(FormatTag::GeMuse, GeMuseCodec);
        dispatcher.register_writer(FormatTag::GeMuse, GeMuseCodec);

        for tag in [
            FormatTag::Wfdb,
            FormatTag::Wfdb16,
            FormatTag::Wfdb61,
            FormatTag::Wfdb212,
        ] {
            if let Some(storage) = tag.wfdb_storage() {
                dispatcher.register_loader(tag, WfdbCodec::new(storage));
                dispatcher.register_writer(tag, WfdbCodec::new(storage));
            }
        }

        dispatcher.register_loader(
            FormatTag::RawXyConstSample,
            XyLoader::new(XySampling::Constant),
        );
        dispatcher.register_loader(
            FormatTag::RawXyVarSample,
            XyLoader::new(XySampling::Variable),
        );
        dispatcher.register_loader(FormatTag::Philips103, PhilipsLoader::new(PhilipsVersion::V103));
        dispatcher.register_loader(FormatTag::Philips104, PhilipsLoader::new(PhilipsVersion::V104));
        dispatcher.register_loader(FormatTag::Schiller, SchillerLoader);
        dispatcher.register_loader(FormatTag::MuseXml, MuseXmlLoader);

        dispatcher
    }

    pub fn register_loader(&mut self, format: FormatTag, loader: impl SignalLoader + 'static) {
        self.entries.entry(format).or_default().loader = Some(Box::new(loader));
    }

    pub fn register_writer(&mut self, format: FormatTag, writer: impl SignalWriter + 'static) {
        self.entries.entry(format).or_default().writer = Some(Box::new(writer));
    }

    pub fn with_loader(mut self, format: FormatTag, loader: impl SignalLoader + 'static) -> Self {
        self.register_loader(format, loader);
        self
    }

    pub fn with_writer(mut self, format: FormatTag, writer: impl SignalWriter + 'static) -> Self {
        self.register_writer(format, writer);
        self
    }

    pub fn can_load(&self, format: FormatTag) -> bool {
        self.loader(format).is_some()
    }

    pub fn can_write(&self, format: FormatTag) -> bool {
        self.writer(format).is_some()
    }

    fn loader(&self, format: FormatTag) -> Option<&dyn SignalLoader> {
        self.entries.get(&format)?.loader.as_deref()
    }

    fn writer(&self, format: FormatTag) -> Option<&dyn SignalWriter> {
        self.entries.get(&format)?.writer.as_deref()
    }

    /// Loads a record through the collaborator registered for `request.format`.
    ///
    /// For WFDB-family formats a request for zero signals first asks the
    /// loader how many signals the record holds. Collaborator errors and
    /// panics become [`EcgError::SourceParseFailure`].
    pub fn read(&self, request: &ReadRequest<'_>) -> Result<EcgRecord, EcgError> {
        let result = self.read_inner(request);
        if let Err(err) = &result {
            log::error!("Load failed ({request}): {err}");
        }
        result
    }

    fn read_inner(&self, request: &ReadRequest<'_>) -> Result<EcgRecord, EcgError> {
        let format = request.format;
        log::debug!("Load format: {format}");

        let loader = self
            .loader(format)
            .ok_or_else(|| EcgError::unsupported(format, Direction::Load))?;

        let file_path = request.file_path();
        let fail = |source: EcgError| EcgError::SourceParseFailure {
            format,
            path: file_path.clone(),
            record_name: request.record_name.to_string(),
            signals_requested: request.signals_requested,
            source: Box::new(source),
        };

        let mut signals_requested = request.signals_requested;
        if format.capabilities().accepts_signal_count && signals_requested == 0 {
            signals_requested =
                guarded(|| loader.signal_count(request.input_dir, request.record_name))
                    .map_err(&fail)?;
            if signals_requested == 0 {
                return Err(fail(EcgError::SignalCountUnavailable {
                    record_name: request.record_name.to_string(),
                    message: "record reports no signals".to_string(),
                }));
            }
            log::debug!(
                "Record '{}' reports {} signal(s)",
                request.record_name,
                signals_requested
            );
        }

        let load_request = LoadRequest {
            format,
            file_path: &file_path,
            input_dir: request.input_dir,
            record_name: request.record_name,
            signals_requested,
        };

        let loaded = guarded(|| loader.load(&load_request)).map_err(&fail)?;
        let record = EcgRecord::from_loaded(loaded, format).map_err(&fail)?;

        log::info!(
            "Loaded {}: {} channel(s) x {} sample(s) at {} Hz",
            format,
            record.channel_count(),
            record.samples_per_channel(),
            record.sampling_rate()
        );
        Ok(record)
    }

    /// Writes `record` as `format` into `output_dir`, named after `record_name`.
    ///
    /// Returns the writer's row count. Collaborator errors and panics become
    /// [`EcgError::WriteFailure`].
    pub fn write(
        &self,
        format: FormatTag,
        record: &EcgRecord,
        output_dir: &Path,
        record_name: &str,
    ) -> Result<usize, EcgError> {
        log::debug!("Write format: {format}");

        let writer = self
            .writer(format)
            .ok_or_else(|| EcgError::unsupported(format, Direction::Write))?;

        let extension = format.output_extension().unwrap_or_default();
        let target = WriteTarget {
            format,
            output_dir,
            record_name,
            file_path: output_dir.join(format!("{record_name}{extension}")),
        };

        let rows_written =
            guarded(|| writer.write(record, &target)).map_err(|source| {
                let err = EcgError::WriteFailure {
                    format,
                    path: target.file_path.clone(),
                    source: Box::new(source),
                };
                log::error!("{err}");
                err
            })?;

        log::info!("rowsWritten = {rows_written} outputFormat = {format}");
        Ok(rows_written)
    }
}

/// Runs a collaborator call, turning a panic into an error.
fn guarded<T>(call: impl FnOnce() -> Result<T, EcgError>) -> Result<T, EcgError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(EcgError::CollaboratorPanicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ir::SignalMatrix;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FixedLoader {
        channels: usize,
        count: usize,
        seen_signals: Rc<Cell<usize>>,
    }

    impl SignalLoader for FixedLoader {
        fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
            self.seen_signals.set(request.signals_requested);
            Ok(LoadedSignals::new(SignalMatrix::zeros(self.channels, 4), 360.0))
        }

        fn signal_count(&self, _input_dir: &Path, _record_name: &str) -> Result<usize, EcgError> {
            Ok(self.count)
        }
    }

    struct PanickingLoader;

    impl SignalLoader for PanickingLoader {
        fn load(&self, _request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
            panic!("decoder exploded")
        }
    }

    fn request(format: FormatTag) -> ReadRequest<'static> {
        ReadRequest::new(format, "rec.dat", Path::new("/tmp"), "rec")
    }

    #[test]
    fn unregistered_format_is_unsupported() {
        let dispatcher = Dispatcher::empty();
        let err = dispatcher.read(&request(FormatTag::Rdt)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn wfdb_zero_signals_discovers_count() {
        let seen = Rc::new(Cell::new(0));
        let dispatcher = Dispatcher::empty().with_loader(
            FormatTag::Wfdb,
            FixedLoader {
                channels: 2,
                count: 2,
                seen_signals: Rc::clone(&seen),
            },
        );

        let record = dispatcher.read(&request(FormatTag::Wfdb)).unwrap();
        assert_eq!(seen.get(), 2);
        assert_eq!(record.channel_count(), 2);
    }

    #[test]
    fn non_positive_signal_count_is_a_parse_failure() {
        let seen = Rc::new(Cell::new(99));
        let dispatcher = Dispatcher::empty().with_loader(
            FormatTag::Wfdb16,
            FixedLoader {
                channels: 2,
                count: 0,
                seen_signals: Rc::clone(&seen),
            },
        );

        let err = dispatcher.read(&request(FormatTag::Wfdb16)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceParseFailure);
        assert_eq!(seen.get(), 99, "load must not run");
    }

    #[test]
    fn explicit_signal_count_skips_discovery_for_other_formats() {
        let seen = Rc::new(Cell::new(0));
        let dispatcher = Dispatcher::empty().with_loader(
            FormatTag::Rdt,
            FixedLoader {
                channels: 3,
                count: 0,
                seen_signals: Rc::clone(&seen),
            },
        );

        dispatcher.read(&request(FormatTag::Rdt)).unwrap();
        assert_eq!(seen.get(), 0);
    }

    #[test]
    fn loader_panic_becomes_parse_failure() {
        let dispatcher = Dispatcher::empty().with_loader(FormatTag::Hl7, PanickingLoader);
        let err = dispatcher.read(&request(FormatTag::Hl7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceParseFailure);
        assert!(err.to_string().contains("decoder exploded"));
    }

    #[test]
    fn write_to_load_only_format_is_unsupported() {
        let dispatcher = Dispatcher::builtin();
        let record = EcgRecord::new(FormatTag::Rdt, 500.0, SignalMatrix::zeros(1, 1));
        let err = dispatcher
            .write(FormatTag::MuseXml, &record, Path::new("/tmp"), "rec")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn builtin_table_matches_capabilities() {
        let dispatcher = Dispatcher::builtin();
        for tag in FormatTag::ALL {
            let caps = tag.capabilities();
            assert_eq!(dispatcher.can_load(tag), caps.can_load, "{tag}");
            assert_eq!(dispatcher.can_write(tag), caps.can_write, "{tag}");
        }
    }
}
