//! Layer system and compositing benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vellum_core::color::lut::LinearRgba;
use vellum_core::layer::{BlendMode, LayerOptions, LayerStack};
use vellum_core::render::surface::Surface;

fn bench_layer_stack_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("layer_stack_creation");

    for size in [256.0f32, 512.0, 1024.0, 2048.0].iter() {
        group.bench_with_input(BenchmarkId::new("size", format!("{size}x{size}")), size, |b, &size| {
            b.iter(|| black_box(LayerStack::new(size, size, 1.0)))
        });
    }

    group.finish();
}

fn bench_pixel_operations(c: &mut Criterion) {
    let mut surface = Surface::new(1024, 1024);
    let color = LinearRgba::new(1.0, 0.5, 0.25, 1.0);

    c.bench_function("set_pixel_1000", |b| {
        b.iter(|| {
            for i in 0..1000 {
                surface.set((i % 1024) as i32, (i / 1024) as i32, color);
            }
        })
    });

    c.bench_function("blend_pixel_1000", |b| {
        b.iter(|| {
            for i in 0..1000 {
                surface.blend_pixel((i % 1024) as i32, (i / 1024) as i32, color);
            }
        })
    });
}

fn bench_blend_modes(c: &mut Criterion) {
    let base = LinearRgba::new(0.5, 0.5, 0.5, 1.0);
    let top = LinearRgba::new(0.8, 0.3, 0.6, 0.7);

    let mut group = c.benchmark_group("blend_modes");
    let modes = [BlendMode::Normal, BlendMode::Multiply, BlendMode::Screen, BlendMode::Overlay, BlendMode::SoftLight];

    for mode in modes.iter() {
        group.bench_function(mode.name(), |b| {
            b.iter(|| {
                for _ in 0..1000 {
                    black_box(mode.blend(top, base));
                }
            })
        });
    }

    group.finish();
}

fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite_layer_stack");

    for layer_count in [2usize, 5, 10].iter() {
        group.bench_with_input(BenchmarkId::new("layers", layer_count), layer_count, |b, &layer_count| {
            let mut stack = LayerStack::new(256.0, 256.0, 1.0);
            for i in 0..layer_count {
                let id = stack.add_layer(format!("layer-{i}"), LayerOptions::default());
                let layer = stack.get_mut(id).unwrap();
                let color = LinearRgba::new(i as f32 / layer_count as f32, 0.5, 1.0 - i as f32 / layer_count as f32, 0.5);
                layer.surface.fill_rect(0, 0, 256, 256, color);
            }

            b.iter(|| {
                let mut target = Surface::new(256, 256);
                stack.composite_to(&mut target, None);
                black_box(&target);
            })
        });
    }

    group.finish();
}

fn bench_resize_preserve(c: &mut Criterion) {
    c.bench_function("resize_stack_preserve_512_to_1024", |b| {
        b.iter(|| {
            let mut stack = LayerStack::new(512.0, 512.0, 1.0);
            stack.add_layer("base", LayerOptions::default());
            stack.resize_stack(1024.0, 1024.0, 1.0, true);
            black_box(&stack);
        })
    });
}

criterion_group!(
    benches,
    bench_layer_stack_creation,
    bench_pixel_operations,
    bench_blend_modes,
    bench_composite,
    bench_resize_preserve,
);
criterion_main!(benches);
