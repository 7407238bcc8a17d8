//! Integration tests for the GE MUSE text format.

use ecgconv::format::{Dispatcher, FormatTag, ReadRequest};
use ecgconv::ir::io_ge_muse::{read_ge_muse, write_ge_muse};
use ecgconv::ir::{EcgRecord, SignalMatrix};

mod common;

#[test]
fn ge_muse_roundtrip_preserves_everything() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let record = common::twelve_lead_record(5);
    let rows = Dispatcher::builtin()
        .write(FormatTag::GeMuse, &record, temp.path(), "ecg")
        .expect("write ge muse");
    assert_eq!(rows, 5);

    let request = ReadRequest::new(FormatTag::GeMuse, "ecg.txt", temp.path(), "ecg");
    let restored = Dispatcher::builtin().read(&request).expect("read ge muse");
    assert_eq!(restored.signals(), record.signals());
    assert_eq!(restored.sampling_rate(), 250.0);
    assert_eq!(restored.adu_gain(), record.adu_gain());
    assert_eq!(restored.lead_names(), Some(common::TWELVE));
}

#[test]
fn unlabelled_channels_are_written_as_generic_labels() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("plain.txt");
    let signals = SignalMatrix::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6]])
        .expect("build matrix");
    let record = EcgRecord::new(FormatTag::Rdt, 360.0, signals);

    write_ge_muse(&path, &record).expect("write ge muse");
    let text = std::fs::read_to_string(&path).expect("read back text");
    assert!(text.contains("CH1\tCH2\tCH3\n"));

    // Generic labels are not lead names; the loaded record falls back to none.
    let loaded = read_ge_muse(&path).expect("read ge muse");
    assert_eq!(loaded.signals, *record.signals());
    let restored = EcgRecord::from_loaded(loaded, FormatTag::GeMuse).expect("promote");
    assert!(restored.lead_names().is_none());
}
