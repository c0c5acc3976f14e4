use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use par_marching_cubes::{
    ExtractionConfig, ExtractionContext, GridSize, ScalarField,
    scan::{exclusive_scan, exclusive_scan_serial},
};

pub fn bench_compute_isosurface(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_isosurface");
    for log2 in [5, 6, 7] {
        let grid = GridSize::uniform(log2).unwrap();
        let radius = grid.dims()[0] as f32 * 0.4;
        let field = ScalarField::sphere(grid, radius);

        for skip_empty_voxels in [true, false] {
            let config = ExtractionConfig::new(grid).with_skip_empty_voxels(skip_empty_voxels);
            let mut ctx = ExtractionContext::new(config).unwrap();
            let label = if skip_empty_voxels { "compacted" } else { "full" };

            group.bench_with_input(BenchmarkId::new(label, 1 << log2), &field, |b, field| {
                b.iter(|| {
                    black_box(ctx.compute_isosurface(field).unwrap());
                })
            });
        }
    }
    group.finish();
}

pub fn bench_exclusive_scan(c: &mut Criterion) {
    let input: Vec<u32> = (0..1u32 << 21).map(|i| i % 16).collect();
    let mut output = vec![0; input.len()];

    c.bench_function("exclusive_scan", |b| {
        b.iter(|| exclusive_scan(black_box(&input), &mut output))
    });
    c.bench_function("exclusive_scan_serial", |b| {
        b.iter(|| exclusive_scan_serial(black_box(&input), &mut output))
    });
}

criterion_group!(benches, bench_compute_isosurface, bench_exclusive_scan);
criterion_main!(benches);
