// benches/scan_benchmarks.rs
//! Benchmarks for the scan hot path: scaling and ring writes

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use daq_hal::acquisition::{RingCursor, ScanBuffer};
use daq_hal::calibration::{CalCoef, CustomScale, ScalingPipeline};
use daq_hal::{ChannelDescriptor, DeviceCapabilities, InputMode, Range, ScanFlags};

fn pipeline_apply_benchmark(c: &mut Criterion) {
    let caps = DeviceCapabilities::simulated_usb();
    let descriptors: Vec<ChannelDescriptor> = (0..8)
        .map(|ch| ChannelDescriptor::analog(ch, InputMode::SingleEnded, Range::Bip10Volts))
        .collect();
    let cal = vec![
        CalCoef {
            slope: 1.0012,
            offset: -1.8
        };
        8
    ];
    let custom = vec![CustomScale::default(); 8];
    let pipeline = ScalingPipeline::build(&caps, &descriptors, &cal, &custom, ScanFlags::DEFAULT);

    let codes: Vec<u16> = (0..4096u32).map(|i| (i * 17 % 65536) as u16).collect();

    c.bench_function("pipeline_apply_4096", |b| {
        b.iter(|| {
            let mut acc = 0.0f64;
            for (i, &code) in codes.iter().enumerate() {
                acc += pipeline.apply(i % 8, black_box(code));
            }
            black_box(acc)
        })
    });
}

fn ring_write_benchmark(c: &mut Criterion) {
    let buffer = ScanBuffer::new(8 * 1024);
    let samples: Vec<f64> = (0..4096).map(|i| i as f64 * 0.001).collect();

    c.bench_function("ring_push_4096", |b| {
        b.iter(|| {
            let mut cursor = RingCursor::new(1024, 8, true);
            cursor.push_samples(&buffer, black_box(&samples));
            black_box(cursor.groups_written())
        })
    });
}

criterion_group!(benches, pipeline_apply_benchmark, ring_write_benchmark);
criterion_main!(benches);
