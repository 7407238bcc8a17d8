//! Integration tests for WFDB record support.

use std::fs;
use std::path::Path;

use ecgconv::conversion::{self, ConvertRequest};
use ecgconv::error::{EcgError, ErrorKind};
use ecgconv::format::{Dispatcher, FormatTag, ReadRequest, WfdbStorage};
use ecgconv::ir::io_wfdb::{read_wfdb, read_wfdb_header, wfdb_signal_count, write_wfdb};
use ecgconv::ir::{EcgRecord, SignalMatrix};

mod common;

fn read_back(dir: &Path, format: FormatTag, signals: usize) -> EcgRecord {
    let request = ReadRequest::new(format, "rec.hea", dir, "rec").with_signals(signals);
    Dispatcher::builtin().read(&request).expect("read wfdb record")
}

#[test]
fn every_storage_format_preserves_matrix_gain_and_leads() {
    for format in [FormatTag::Wfdb16, FormatTag::Wfdb61, FormatTag::Wfdb212] {
        let temp = tempfile::tempdir().expect("create temp dir");
        let record = common::two_lead_record();

        let rows = Dispatcher::builtin()
            .write(format, &record, temp.path(), "rec")
            .expect("write wfdb record");
        assert_eq!(rows, record.samples_per_channel());

        let restored = read_back(temp.path(), format, 0);
        assert_eq!(restored.signals(), record.signals(), "{format}");
        assert_eq!(restored.adu_gain(), 200, "{format}");
        assert_eq!(restored.sampling_rate(), 500.0, "{format}");
        assert_eq!(restored.lead_names(), Some("I,II"), "{format}");
    }
}

#[test]
fn header_names_the_storage_format() {
    let temp = tempfile::tempdir().expect("create temp dir");
    write_wfdb(
        temp.path(),
        "rec",
        WfdbStorage::Fmt212,
        &common::two_lead_record(),
    )
    .expect("write wfdb record");

    let header = read_wfdb_header(temp.path(), "rec").expect("read header");
    assert_eq!(header.record_name, "rec");
    assert_eq!(header.signal_count(), 2);
    assert_eq!(header.samples_per_signal, Some(7));
    assert!(header.signals.iter().all(|s| s.format == 212));
    assert!(header.signals.iter().all(|s| s.file_name == "rec.dat"));

    // 14 samples packed two per three bytes
    let data = fs::read(temp.path().join("rec.dat")).expect("read data file");
    assert_eq!(data.len(), 21);
}

#[test]
fn odd_sample_count_survives_format_212() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let signals = SignalMatrix::from_rows(vec![vec![-3, 0, 5]]).expect("build matrix");
    let record = EcgRecord::new(FormatTag::Rdt, 360.0, signals);

    write_wfdb(temp.path(), "rec", WfdbStorage::Fmt212, &record).expect("write wfdb record");
    let restored = read_back(temp.path(), FormatTag::Wfdb212, 0);
    assert_eq!(restored.signals().channel(0), &[-3, 0, 5]);
}

#[test]
fn twelve_unlabelled_signals_get_standard_leads() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let rows = (0..12).map(|c| vec![c, c + 1]).collect();
    let record = EcgRecord::new(
        FormatTag::Rdt,
        500.0,
        SignalMatrix::from_rows(rows).expect("build matrix"),
    );
    write_wfdb(temp.path(), "rec", WfdbStorage::Fmt16, &record).expect("write wfdb record");

    let restored = read_back(temp.path(), FormatTag::Wfdb, 0);
    assert_eq!(restored.lead_names(), Some(common::TWELVE));
}

#[test]
fn signal_count_is_discovered_from_header() {
    let temp = tempfile::tempdir().expect("create temp dir");
    write_wfdb(
        temp.path(),
        "rec",
        WfdbStorage::Fmt16,
        &common::twelve_lead_record(4),
    )
    .expect("write wfdb record");

    assert_eq!(wfdb_signal_count(temp.path(), "rec").expect("count"), 12);
    let restored = read_back(temp.path(), FormatTag::Wfdb16, 0);
    assert_eq!(restored.channel_count(), 12);
    assert_eq!(restored.lead_names(), Some(common::TWELVE));
}

#[test]
fn requested_signals_are_a_prefix() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let record = common::twelve_lead_record(4);
    write_wfdb(temp.path(), "rec", WfdbStorage::Fmt16, &record).expect("write wfdb record");

    let loaded = read_wfdb(temp.path(), "rec", 3).expect("read three signals");
    assert_eq!(loaded.channel_count, 3);
    assert_eq!(loaded.allocated_channels, 12);
    assert_eq!(loaded.signals.channel(2), record.signals().channel(2));
    assert_eq!(
        loaded.lead_names,
        Some(vec!["I".to_string(), "II".to_string(), "III".to_string()])
    );
}

#[test]
fn too_many_requested_signals_fail() {
    let temp = tempfile::tempdir().expect("create temp dir");
    write_wfdb(
        temp.path(),
        "rec",
        WfdbStorage::Fmt16,
        &common::two_lead_record(),
    )
    .expect("write wfdb record");

    let request =
        ReadRequest::new(FormatTag::Wfdb16, "rec.hea", temp.path(), "rec").with_signals(5);
    let err = Dispatcher::builtin().read(&request).unwrap_err();
    assert_eq!(err.kind(), ecgconv::error::ErrorKind::SourceParseFailure);
}

#[test]
fn wide_samples_are_refused_by_format_212() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let signals = SignalMatrix::from_rows(vec![vec![0, 4000]]).expect("build matrix");
    let record = EcgRecord::new(FormatTag::Rdt, 250.0, signals);

    let err = Dispatcher::builtin()
        .write(FormatTag::Wfdb212, &record, temp.path(), "rec")
        .unwrap_err();
    assert_eq!(err.kind(), ecgconv::error::ErrorKind::WriteFailure);
    assert!(!temp.path().join("rec.hea").exists());
}

#[test]
fn handwritten_header_with_byte_offset_is_read() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::write_file(
        &temp.path().join("hand.hea"),
        "# comment line\nhand 2 250 2\nhand.dat 16+4 100/mV 12 0 0 0 0 II\nhand.dat 16+4 100/mV 12 0 0 0 0 v5\n",
    );
    let mut data = vec![0xAA; 4];
    for value in [1i16, -1, 2, -2] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    common::write_file(&temp.path().join("hand.dat"), data);

    let request = ReadRequest::new(FormatTag::Wfdb, "hand.hea", temp.path(), "hand");
    let record = Dispatcher::builtin().read(&request).expect("read handwritten record");
    assert_eq!(record.signals().channel(0), &[1, 2]);
    assert_eq!(record.signals().channel(1), &[-1, -2]);
    assert_eq!(record.adu_gain(), 100);
    assert_eq!(record.sampling_rate(), 250.0);
    assert_eq!(record.lead_names(), Some("II,V5"));
}

#[test]
fn oversized_signal_count_fails_conversion_with_sentinel() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::write_file(&temp.path().join("rec.hea"), "rec 100000000000 500 10\n");

    let dispatcher = Dispatcher::builtin();
    let request =
        ConvertRequest::new(FormatTag::Wfdb, FormatTag::Rdt, "rec.hea", temp.path(), temp.path());
    let err = conversion::convert(&dispatcher, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceParseFailure);
    assert_eq!(conversion::convert_or_sentinel(&dispatcher, &request), -1);
    assert!(!temp.path().join("rec.rdt").exists());
}

#[test]
fn overflowing_sample_count_is_a_parse_error() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::write_file(
        &temp.path().join("rec.hea"),
        "rec 2 500 9223372036854775808\nrec.dat 16 200 16 0 0 0 0 I\nrec.dat 16 200 16 0 0 0 0 II\n",
    );
    common::write_file(&temp.path().join("rec.dat"), vec![0u8; 8]);

    let err = read_wfdb(temp.path(), "rec", 0).unwrap_err();
    assert!(matches!(err, EcgError::FormatParse { .. }), "{err}");
    assert!(err.to_string().contains("overflows"), "{err}");
}

#[test]
fn failed_header_write_leaves_no_data_file() {
    let temp = tempfile::tempdir().expect("create temp dir");
    // A directory in the header's place makes the header write fail.
    fs::create_dir(temp.path().join("rec.hea")).expect("create blocking dir");

    let record = common::two_lead_record();
    let err = write_wfdb(temp.path(), "rec", WfdbStorage::Fmt16, &record).unwrap_err();
    assert!(matches!(err, EcgError::Io(_)), "{err}");
    assert!(!temp.path().join("rec.dat").exists());
}
