use ecgconv::format::WfdbStorage;
use ecgconv::ir::io_rdt::{from_rdt_slice, to_rdt_bytes};
use ecgconv::ir::io_wfdb::{decode_samples, encode_samples, read_wfdb, write_wfdb};
use proptest::prelude::*;

mod proptest_helpers;

fn storage_range(storage: WfdbStorage) -> (i32, i32) {
    match storage {
        WfdbStorage::Fmt212 => (-2048, 2047),
        WfdbStorage::Fmt16 | WfdbStorage::Fmt61 => (i16::MIN as i32, i16::MAX as i32),
    }
}

fn arb_storage() -> impl Strategy<Value = WfdbStorage> {
    prop_oneof![
        Just(WfdbStorage::Fmt16),
        Just(WfdbStorage::Fmt61),
        Just(WfdbStorage::Fmt212),
    ]
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn rdt_roundtrip_preserves_matrix_rate_and_gain(
        record in proptest_helpers::arb_record(12, 64, i16::MIN as i32, i16::MAX as i32)
    ) {
        let bytes = to_rdt_bytes(&record).expect("encode rdt");
        let loaded = from_rdt_slice(&bytes).expect("decode rdt");

        prop_assert_eq!(&loaded.signals, record.signals());
        prop_assert_eq!(loaded.sampling_rate, record.sampling_rate());
        prop_assert_eq!(loaded.adu_gain, Some(record.adu_gain()));
        prop_assert_eq!(bytes.len(), 8 + record.number_of_points() * 2);
    }

    #[test]
    fn rdt_refuses_samples_outside_i16(
        record in proptest_helpers::arb_record(4, 16, -100, 100),
        wide in prop_oneof![i32::MIN..(i16::MIN as i32), (i16::MAX as i32 + 1)..=i32::MAX],
    ) {
        let mut rows = record.signals().to_rows();
        rows[0][0] = wide;
        let widened = ecgconv::ir::EcgRecord::new(
            record.source_format(),
            record.sampling_rate(),
            ecgconv::ir::SignalMatrix::from_rows(rows).expect("same shape"),
        );
        prop_assert!(to_rdt_bytes(&widened).is_err());
    }

    #[test]
    fn wfdb_sample_codec_roundtrips_in_range(
        (storage, samples) in arb_storage().prop_flat_map(|storage| {
            let (lo, hi) = storage_range(storage);
            (Just(storage), prop::collection::vec(lo..=hi, 0..200))
        })
    ) {
        let bytes = encode_samples(storage, &samples).expect("in-range samples encode");
        let expected_len = match storage {
            WfdbStorage::Fmt212 => samples.len().div_ceil(2) * 3,
            _ => samples.len() * 2,
        };
        prop_assert_eq!(bytes.len(), expected_len);

        let mut decoded = decode_samples(storage, &bytes);
        // 212 pads an odd count with one zero sample
        decoded.truncate(samples.len());
        prop_assert_eq!(decoded, samples);
    }

    #[test]
    fn wfdb_212_refuses_wide_samples(
        mut samples in prop::collection::vec(-2048i32..=2047, 1..50),
        wide in prop_oneof![-40000i32..-2048, 2048i32..40000],
        slot in any::<prop::sample::Index>(),
    ) {
        let idx = slot.index(samples.len());
        samples[idx] = wide;
        prop_assert!(encode_samples(WfdbStorage::Fmt212, &samples).is_err());
    }

    #[test]
    fn wfdb_record_roundtrip_preserves_matrix(
        (storage, record) in arb_storage().prop_flat_map(|storage| {
            let (lo, hi) = storage_range(storage);
            (Just(storage), proptest_helpers::arb_record(8, 40, lo, hi))
        })
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        write_wfdb(dir.path(), "rec", storage, &record).expect("write wfdb");
        let loaded = read_wfdb(dir.path(), "rec", 0).expect("read wfdb");

        prop_assert_eq!(&loaded.signals, record.signals());
        prop_assert_eq!(loaded.sampling_rate, record.sampling_rate());
        prop_assert_eq!(loaded.adu_gain, Some(record.adu_gain()));
        prop_assert_eq!(loaded.allocated_channels, record.channel_count());
    }
}
