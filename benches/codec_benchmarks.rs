// ABOUTME: Benchmarks for frame serialisation, CRC computation, and decode across payload sizes.
// ABOUTME: Payload sizes span the empty-control-frame case up to the 250-byte gateway read chunk cap.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serialink::codec::{Command, Frame};
use std::time::Duration;

fn payload_sizes() -> Vec<usize> {
    vec![0, 16, 64, 128, 250]
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    group.measurement_time(Duration::from_secs(5));

    for size in payload_sizes() {
        let frame = Frame::new(Command::Publish, false, vec![0xAB; size]);
        group.bench_with_input(BenchmarkId::new("publish", size), &frame, |b, frame| {
            b.iter(|| black_box(frame).serialize())
        });
    }

    group.finish();
}

fn bench_compute_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_crc");
    group.measurement_time(Duration::from_secs(5));

    for size in payload_sizes() {
        let frame = Frame::new(Command::Publish, true, vec![0xCD; size]);
        group.bench_with_input(BenchmarkId::new("publish", size), &frame, |b, frame| {
            b.iter(|| black_box(frame).compute_crc())
        });
    }

    group.finish();
}

fn bench_from_wire(c: &mut Criterion) {
    let mut group = c.benchmark_group("from_wire");
    group.measurement_time(Duration::from_secs(5));

    for size in payload_sizes() {
        let frame = Frame::new(Command::Publish, false, vec![0xEF; size]);
        let wire = frame.serialize();
        let length = wire[0];
        let command_byte = wire[1];
        let payload = wire[2..wire.len() - 4].to_vec();
        let crc = u32::from_le_bytes(wire[wire.len() - 4..].try_into().unwrap());

        group.bench_with_input(BenchmarkId::new("publish", size), &size, |b, _| {
            b.iter(|| {
                Frame::from_wire(
                    black_box(length),
                    black_box(command_byte),
                    black_box(payload.clone()),
                    black_box(crc),
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_control_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_frames");

    group.bench_function("connack_serialize", |b| {
        let frame = Frame::control(Command::Connack);
        b.iter(|| black_box(&frame).serialize())
    });

    group.bench_function("acknowledge_serialize", |b| {
        let frame = Frame::acknowledge(true);
        b.iter(|| black_box(&frame).serialize())
    });

    group.finish();
}

criterion_group!(benches, bench_serialize, bench_compute_crc, bench_from_wire, bench_control_frames);
criterion_main!(benches);
