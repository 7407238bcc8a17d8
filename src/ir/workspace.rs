//! The conversion workspace: at most one loaded generation.

use crate::error::EcgError;
use crate::format::{Dispatcher, FormatTag, ReadRequest};

use super::model::{EcgRecord, FormatPayload, SignalMatrix, DEFAULT_ADU_GAIN};

/// Holds the record produced by the most recent successful load.
///
/// A generation is replaced as a whole by [`Workspace::install`]; there are no
/// per-field setters. Reads of an empty workspace return neutral values.
#[derive(Clone, Debug, Default)]
pub struct Workspace {
    generation: Option<EcgRecord>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current generation, returning the previous one.
    pub fn install(&mut self, record: EcgRecord) -> Option<EcgRecord> {
        self.generation.replace(record)
    }

    /// Loads through `dispatcher` and installs the result.
    ///
    /// On failure the current generation is left untouched.
    pub fn load(
        &mut self,
        dispatcher: &Dispatcher,
        request: &ReadRequest<'_>,
    ) -> Result<(), EcgError> {
        let record = dispatcher.read(request).inspect_err(|_| {
            log::error!("Record reading failed: {request}");
        })?;
        self.install(record);
        Ok(())
    }

    pub fn record(&self) -> Option<&EcgRecord> {
        self.generation.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.generation.is_some()
    }

    pub fn signals(&self) -> Option<&SignalMatrix> {
        self.generation.as_ref().map(EcgRecord::signals)
    }

    pub fn payload(&self) -> Option<&FormatPayload> {
        self.generation.as_ref().and_then(EcgRecord::payload)
    }

    pub fn sampling_rate(&self) -> f64 {
        self.generation.as_ref().map_or(0.0, EcgRecord::sampling_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.generation.as_ref().map_or(0, EcgRecord::channel_count)
    }

    pub fn samples_per_channel(&self) -> usize {
        self.generation
            .as_ref()
            .map_or(0, EcgRecord::samples_per_channel)
    }

    pub fn adu_gain(&self) -> u32 {
        self.generation
            .as_ref()
            .map_or(DEFAULT_ADU_GAIN, EcgRecord::adu_gain)
    }

    pub fn lead_names(&self) -> Option<&str> {
        self.generation.as_ref().and_then(EcgRecord::lead_names)
    }

    pub fn number_of_points(&self) -> usize {
        self.generation.as_ref().map_or(0, EcgRecord::number_of_points)
    }

    pub fn allocated_channels(&self) -> usize {
        self.generation
            .as_ref()
            .map_or(0, EcgRecord::allocated_channels)
    }

    /// Format of the most recent successful load.
    pub fn source_format(&self) -> Option<FormatTag> {
        self.generation.as_ref().map(EcgRecord::source_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::format::{LoadRequest, SignalLoader};
    use crate::ir::LoadedSignals;
    use std::path::Path;

    #[test]
    fn empty_workspace_reports_neutral_values() {
        let workspace = Workspace::new();
        assert!(!workspace.is_loaded());
        assert_eq!(workspace.channel_count(), 0);
        assert_eq!(workspace.samples_per_channel(), 0);
        assert_eq!(workspace.adu_gain(), DEFAULT_ADU_GAIN);
        assert_eq!(workspace.source_format(), None);
        assert!(workspace.payload().is_none());
    }

    #[test]
    fn install_replaces_the_whole_generation() {
        let mut workspace = Workspace::new();
        let first = EcgRecord::new(FormatTag::MuseXml, 500.0, SignalMatrix::zeros(2, 3))
            .with_payload(FormatPayload::MuseXml("<RestingECG/>".into()));
        workspace.install(first.clone());
        assert!(workspace.payload().is_some());

        let second = EcgRecord::new(FormatTag::Rdt, 250.0, SignalMatrix::zeros(1, 8));
        let previous = workspace.install(second);

        assert_eq!(previous, Some(first));
        assert_eq!(workspace.source_format(), Some(FormatTag::Rdt));
        assert_eq!(workspace.channel_count(), 1);
        assert!(workspace.payload().is_none());
    }

    struct RowsLoader(usize);

    impl SignalLoader for RowsLoader {
        fn load(&self, _request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
            Ok(LoadedSignals::new(SignalMatrix::zeros(self.0, 4), 500.0))
        }
    }

    struct BrokenLoader;

    impl SignalLoader for BrokenLoader {
        fn load(&self, request: &LoadRequest<'_>) -> Result<LoadedSignals, EcgError> {
            Err(EcgError::FormatParse {
                format: "broken",
                path: request.file_path.to_path_buf(),
                message: "truncated".to_string(),
            })
        }
    }

    #[test]
    fn load_installs_on_success_and_keeps_generation_on_failure() {
        let dispatcher = Dispatcher::empty()
            .with_loader(FormatTag::Rdt, RowsLoader(3))
            .with_loader(FormatTag::Hl7, BrokenLoader);
        let dir = Path::new("in");
        let mut workspace = Workspace::new();

        workspace
            .load(&dispatcher, &ReadRequest::new(FormatTag::Rdt, "a.rdt", dir, "a"))
            .unwrap();
        let loaded = workspace.record().cloned();
        assert_eq!(workspace.channel_count(), 3);

        let err = workspace
            .load(&dispatcher, &ReadRequest::new(FormatTag::Hl7, "b.xml", dir, "b"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceParseFailure);
        assert_eq!(workspace.record().cloned(), loaded);
        assert_eq!(workspace.source_format(), Some(FormatTag::Rdt));
    }
}
