//! Benchmarks for the per-tick decode path
//!
//! Every poll re-decodes the header, rebuilds the variable directory and
//! copies one data buffer, so these bound the loop's CPU cost per tick.
//!
//! Platform: Cross-platform (synthetic segments, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pitlane::reader::DEFAULT_EVENT_TIMEOUT;
use pitlane::schema::parse_variable_directory;
use pitlane::test_utils::{MemorySegment, ProducerImage, ScriptedEvent};
use pitlane::{
    FrameReader, FreshnessPolicy, FreshnessState, HEADER_SIZE, SharedSegment, parse_header,
};
use std::hint::black_box;

/// Typical live buffer length for a car with a full CarIdx set
const BUF_LEN: i32 = 4_096;

fn segment_with_vars(num_vars: usize) -> MemorySegment {
    let buffer_offset = 64 * 1024;
    let mut image = ProducerImage::new(128 * 1024)
        .buffer_len(BUF_LEN)
        .buffer(100, buffer_offset)
        .buffer(101, buffer_offset + BUF_LEN)
        .buffer(102, buffer_offset + 2 * BUF_LEN)
        .session_info("WeekendInfo:\n  TrackName: spa\n");

    for index in 0..num_vars {
        image = image.variable_with_meta(
            &format!("Var{index}"),
            4,
            (index * 4) as i32,
            1,
            "Synthetic telemetry variable",
            "m/s",
        );
    }
    image.into_segment()
}

fn bench_header_decode(c: &mut Criterion) {
    let segment = segment_with_vars(0);
    let bytes = segment.read_at(0, HEADER_SIZE).expect("header bytes");

    c.bench_function("parse_header", |b| {
        b.iter(|| black_box(parse_header(black_box(&bytes)).unwrap()))
    });
}

fn bench_directory_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("directory_rebuild");

    for num_vars in [50usize, 250] {
        let segment = segment_with_vars(num_vars);
        let header = parse_header(&segment.read_at(0, HEADER_SIZE).unwrap()).unwrap();

        group.bench_function(BenchmarkId::from_parameter(num_vars), |b| {
            b.iter(|| black_box(parse_variable_directory(&segment, &header).unwrap()))
        });
    }

    group.finish();
}

fn bench_frame_read(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime");
    let segment = segment_with_vars(250);
    let header = parse_header(&segment.read_at(0, HEADER_SIZE).unwrap()).unwrap();
    let event = ScriptedEvent::signaled();
    let reader = FrameReader::new(FreshnessPolicy::AlwaysRead, DEFAULT_EVENT_TIMEOUT);

    let mut group = c.benchmark_group("frame_read");
    group.throughput(Throughput::Bytes(BUF_LEN as u64));

    group.bench_function("latest_buffer", |b| {
        let mut freshness = FreshnessState::new();
        b.iter(|| {
            let index = pitlane::select_latest_buffer(&header).unwrap();
            let frame = runtime
                .block_on(reader.read_frame(&segment, &header, index, &event, &mut freshness))
                .unwrap();
            black_box(frame)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_header_decode, bench_directory_rebuild, bench_frame_read);
criterion_main!(benches);
