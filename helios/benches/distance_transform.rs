use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use helios::Buffer2;
use helios::bench::{DISTANCE_INFINITY, distance_transform};

/// Field with a centered clipped disc covering ~1/9 of the area.
fn disc_field(size: usize) -> Buffer2<f32> {
    let radius = size as f32 / 6.0;
    let centre = size as f32 / 2.0;
    let mut field = Buffer2::new_filled(size, size, 0.0f32);
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - centre;
            let dy = y as f32 - centre;
            if dx * dx + dy * dy <= radius * radius {
                field[(x, y)] = DISTANCE_INFINITY;
            }
        }
    }
    field
}

fn bench_distance_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_transform");
    for size in [256usize, 1024] {
        let template = disc_field(size);
        group.bench_function(format!("disc_{size}x{size}"), |b| {
            b.iter(|| {
                let mut field = template.clone();
                black_box(distance_transform(&mut field))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_distance_transform);
criterion_main!(benches);
