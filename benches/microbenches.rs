//! Criterion microbenches for ecgconv codecs.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - RDT encoding and decoding (to_rdt_bytes, from_rdt_slice)
//! - WFDB 212 sample packing (encode_samples, decode_samples)
//! - Lead-name normalization
//! - Synthetic record generation

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use ecgconv::format::{FormatTag, WfdbStorage};
use ecgconv::ir::io_rdt::{from_rdt_slice, to_rdt_bytes};
use ecgconv::ir::io_wfdb::{decode_samples, encode_samples};
use ecgconv::ir::EcgRecord;
use ecgconv::leads::normalize_lead_names;
use ecgconv::sample::{generate_record, SampleOptions};

/// Ten seconds of twelve-lead signal at 500 Hz.
fn fixture_record() -> EcgRecord {
    let opts = SampleOptions {
        seed: Some(1),
        noise_uv: 20.0,
        ..Default::default()
    };
    generate_record(&opts, FormatTag::Rdt).expect("generate fixture")
}

fn bench_rdt(c: &mut Criterion) {
    let record = fixture_record();
    let bytes = to_rdt_bytes(&record).expect("encode fixture");

    let mut group = c.benchmark_group("rdt");
    group.throughput(Throughput::Elements(record.number_of_points() as u64));

    group.bench_function("to_rdt_bytes", |b| {
        b.iter(|| black_box(to_rdt_bytes(black_box(&record)).unwrap()))
    });
    group.bench_function("from_rdt_slice", |b| {
        b.iter(|| black_box(from_rdt_slice(black_box(&bytes)).unwrap()))
    });

    group.finish();
}

fn bench_wfdb_212(c: &mut Criterion) {
    // Fixture amplitudes stay well inside 12 bits at the default gain.
    let samples: Vec<i32> = fixture_record().signals().interleaved().collect();
    let packed = encode_samples(WfdbStorage::Fmt212, &samples).expect("pack fixture");

    let mut group = c.benchmark_group("wfdb_212");
    group.throughput(Throughput::Elements(samples.len() as u64));

    group.bench_function("encode_samples", |b| {
        b.iter(|| black_box(encode_samples(WfdbStorage::Fmt212, black_box(&samples)).unwrap()))
    });
    group.bench_function("decode_samples", |b| {
        b.iter(|| black_box(decode_samples(WfdbStorage::Fmt212, black_box(&packed))))
    });

    group.finish();
}

fn bench_lead_normalize(c: &mut Criterion) {
    let valid: Vec<String> = ecgconv::leads::TWELVE_LEAD
        .split(',')
        .map(str::to_string)
        .collect();
    let mut invalid = valid.clone();
    invalid[11] = "MLII".to_string();

    let mut group = c.benchmark_group("lead_normalize");
    group.bench_function("valid_twelve", |b| {
        b.iter(|| normalize_lead_names(Some(black_box(valid.as_slice())), 12, FormatTag::Hl7))
    });
    group.bench_function("fallback_twelve", |b| {
        b.iter(|| normalize_lead_names(Some(black_box(invalid.as_slice())), 12, FormatTag::Hl7))
    });
    group.finish();
}

fn bench_sample_generation(c: &mut Criterion) {
    let opts = SampleOptions {
        duration_secs: 2.0,
        seed: Some(1),
        noise_uv: 20.0,
        ..Default::default()
    };

    let mut group = c.benchmark_group("sample");
    group.throughput(Throughput::Elements((opts.channels * 1000) as u64));
    group.bench_function("generate_record", |b| {
        b.iter(|| black_box(generate_record(black_box(&opts), FormatTag::Wfdb).unwrap()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_rdt,
    bench_wfdb_212,
    bench_lead_normalize,
    bench_sample_generation
);
criterion_main!(benches);
