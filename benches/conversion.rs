use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use tsi_capture_rs::acquisition::camera::types::IDENTITY_MATRIX;
use tsi_capture_rs::acquisition::camera::{FilterPhase, SensorType};
use tsi_capture_rs::acquisition::color::{
    BayerColorSdk, ChannelOrder, ColorProcessor, ColorProcessorParams, ColorProcessorSdk,
};
use tsi_capture_rs::acquisition::convert::{normalize_min_max, shift_to_8bit};

const BIT_DEPTH: u32 = 12;

fn generate_mock_frame(width: usize, height: usize) -> Vec<u16> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push(((x * 7 + y * 13) % 4096) as u16);
        }
    }
    data
}

fn benchmark_mono_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("mono_normalization");

    let sizes = vec![
        (640, 480, "640x480"),
        (1440, 1080, "1440x1080"),
        (2448, 2048, "2448x2048"),
    ];

    for (width, height, label) in sizes {
        let frame = generate_mock_frame(width, height);

        group.bench_with_input(BenchmarkId::new("bit_shift", label), &frame, |b, data| {
            b.iter(|| shift_to_8bit(black_box(data), BIT_DEPTH));
        });
        group.bench_with_input(BenchmarkId::new("min_max", label), &frame, |b, data| {
            b.iter(|| normalize_min_max(black_box(data)));
        });
    }

    group.finish();
}

fn benchmark_color_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("color_transform");
    group.sample_size(20);

    let (width, height) = (1440, 1080);
    let frame = generate_mock_frame(width, height);
    let params = ColorProcessorParams {
        sensor_type: SensorType::Bayer,
        filter_phase: FilterPhase::BayerRed,
        color_correction_matrix: IDENTITY_MATRIX,
        white_balance_matrix: IDENTITY_MATRIX,
        bit_depth: BIT_DEPTH,
    };

    for (order, label) in [(ChannelOrder::Rgb, "rgb"), (ChannelOrder::Bgr, "bgr")] {
        let mut sdk = BayerColorSdk::new();
        let Ok(mut processor) = sdk.create_processor(&params) else {
            continue;
        };
        processor.set_output_order(order);

        group.bench_with_input(BenchmarkId::from_parameter(label), &frame, |b, data| {
            b.iter(|| {
                let _ = processor.transform_to_24(black_box(data), width, height);
            });
        });

        let _ = processor.dispose();
        let _ = sdk.dispose();
    }

    group.finish();
}

criterion_group!(benches, benchmark_mono_normalization, benchmark_color_transform);
criterion_main!(benches);
