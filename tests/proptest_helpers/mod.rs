#![allow(dead_code)]

use ecgconv::format::FormatTag;
use ecgconv::ir::{EcgRecord, SignalMatrix};
use ecgconv::leads::LeadName;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Sampling rates every format stores exactly.
pub const RATES: [f64; 5] = [125.0, 250.0, 360.0, 500.0, 1000.0];

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Channel-major rows of equal length with values in `lo..=hi`.
pub fn arb_rows(
    max_channels: usize,
    max_samples: usize,
    lo: i32,
    hi: i32,
) -> BoxedStrategy<Vec<Vec<i32>>> {
    (1..=max_channels, 1..=max_samples)
        .prop_flat_map(move |(channels, samples)| {
            prop::collection::vec(prop::collection::vec(lo..=hi, samples), channels)
        })
        .boxed()
}

pub fn arb_matrix(
    max_channels: usize,
    max_samples: usize,
    lo: i32,
    hi: i32,
) -> BoxedStrategy<SignalMatrix> {
    arb_rows(max_channels, max_samples, lo, hi)
        .prop_map(|rows| SignalMatrix::from_rows(rows).expect("rows share a length"))
        .boxed()
}

/// Records with a stored-exactly rate and a gain that fits 16 bits.
pub fn arb_record(
    max_channels: usize,
    max_samples: usize,
    lo: i32,
    hi: i32,
) -> BoxedStrategy<EcgRecord> {
    (
        arb_matrix(max_channels, max_samples, lo, hi),
        prop::sample::select(RATES.to_vec()),
        1u32..=2000,
    )
        .prop_map(|(signals, rate, gain)| {
            EcgRecord::new(FormatTag::Rdt, rate, signals).with_adu_gain(gain)
        })
        .boxed()
}

/// Any vocabulary label, as written in the canonical form.
pub fn arb_lead() -> BoxedStrategy<String> {
    prop::sample::select(LeadName::ALL.to_vec())
        .prop_map(|lead| lead.as_str().to_string())
        .boxed()
}

/// Labels that are not in the vocabulary.
pub fn arb_unknown_label() -> BoxedStrategy<String> {
    "[A-Za-z0-9?]{1,6}"
        .prop_filter("must not be a vocabulary entry", |label| {
            label.parse::<LeadName>().is_err()
        })
        .boxed()
}

pub fn arb_source_format() -> BoxedStrategy<FormatTag> {
    prop::sample::select(FormatTag::ALL.to_vec()).boxed()
}
