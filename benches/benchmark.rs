//! Performance benchmarks for porec
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use porec::core::flags::FLAG_UNMAPPED;
use porec::core::{
    digest, AlignmentRecord, AnnotateOptions, Concatemer, ConcatemerAlignGroup, ContactAnnotator,
    CoordinateRecord, EnzymeCutter,
};

/// Deterministic pseudo-random read (64-bit LCG)
fn synthetic_read(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            b"ACGT"[(state >> 62) as usize]
        })
        .collect()
}

/// Benchmark cut-site search for palindromic, ambiguous and asymmetric sites
fn bench_cut_sites(c: &mut Criterion) {
    let read = synthetic_read(100_000, 42);
    let mut group = c.benchmark_group("cut_sites");
    group.throughput(Throughput::Bytes(read.len() as u64));
    for name in ["NlaIII", "DpnII", "HinfI", "BsaI"] {
        let cutter = EnzymeCutter::from_name(name).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &read, |b, read| {
            b.iter(|| black_box(cutter.get_cut_sites(black_box(read))))
        });
    }
    group.finish();
}

/// Benchmark digestion of reads of increasing length
fn bench_digest(c: &mut Criterion) {
    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let mut group = c.benchmark_group("digest");
    for len in [1_000usize, 10_000, 100_000] {
        let mut concatemer = Concatemer::new("read", synthetic_read(len, len as u64));
        concatemer.quality = Some(vec![30; len]);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &concatemer, |b, c| {
            b.iter(|| black_box(digest(black_box(c), &cutter)))
        });
    }
    group.finish();
}

/// Benchmark contact annotation for a high-order concatemer
fn bench_annotate(c: &mut Criterion) {
    let total = 50;
    let records: Vec<AlignmentRecord> = (0..total)
        .map(|idx| {
            let coords = CoordinateRecord {
                start: idx * 200,
                end: idx * 200 + 200,
                concatemer_length: total * 200,
                sub_read_index: idx,
                sub_read_total: total,
            };
            let record = AlignmentRecord::new(coords.read_id("read"), "read", coords, 0);
            if idx % 7 == 3 {
                AlignmentRecord::new(coords.read_id("read"), "read", coords, FLAG_UNMAPPED)
            } else {
                let pos = (idx as u64 * 7_919) % 200_000;
                record.with_reference(format!("chr{}", idx % 3 + 1), pos, Some(pos + 200))
            }
        })
        .collect();
    let group = ConcatemerAlignGroup::new("read", records).unwrap();

    let mut bench = c.benchmark_group("annotate");
    for merge_distance in [0u64, 5_000] {
        let annotator = ContactAnnotator::new(AnnotateOptions {
            merge_distance,
            ..Default::default()
        })
        .unwrap();
        bench.bench_with_input(
            BenchmarkId::from_parameter(merge_distance),
            &group,
            |b, group| b.iter(|| black_box(annotator.annotate(black_box(group)))),
        );
    }
    bench.finish();
}

criterion_group!(benches, bench_cut_sites, bench_digest, bench_annotate);
criterion_main!(benches);
