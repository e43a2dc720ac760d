//! Benchmarks for structural metrics and reordering

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reorder_bench::reordering::{Reordering, ReverseCuthillMckee};
use reorder_bench::{
    CompressedBackend, CooMatrix, CoordinateBackend, ParameterSet, StructuralMetrics,
};

const BLOCK_SIZES: [usize; 5] = [4, 8, 16, 32, 64];

/// 2D five-point Laplacian on a `k x k` grid
fn laplacian_2d(k: usize) -> CooMatrix {
    let n = k * k;
    let mut triplets = Vec::with_capacity(5 * n);
    for i in 0..k {
        for j in 0..k {
            let row = i * k + j;
            triplets.push((row, row, 4.0));
            if i > 0 {
                triplets.push((row, row - k, -1.0));
            }
            if i + 1 < k {
                triplets.push((row, row + k, -1.0));
            }
            if j > 0 {
                triplets.push((row, row - 1, -1.0));
            }
            if j + 1 < k {
                triplets.push((row, row + 1, -1.0));
            }
        }
    }
    CooMatrix::from_triplets(n, n, &triplets)
}

fn bench_metrics_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural_metrics");

    for k in [32, 128] {
        let matrix = laplacian_2d(k);
        let compressed = CompressedBackend::from_coo(&matrix);

        group.bench_with_input(BenchmarkId::new("compressed", k), &compressed, |b, backend| {
            b.iter(|| black_box(StructuralMetrics::compute(backend, &BLOCK_SIZES)))
        });
        group.bench_with_input(BenchmarkId::new("coordinate", k), &matrix, |b, m| {
            b.iter(|| black_box(StructuralMetrics::compute(&CoordinateBackend::new(m), &BLOCK_SIZES)))
        });
    }

    group.finish();
}

fn bench_rcm(c: &mut Criterion) {
    let params = ParameterSet::default();
    let matrix = laplacian_2d(64);
    c.bench_function("rcm_laplacian_64", |b| {
        b.iter(|| black_box(ReverseCuthillMckee.compute(&matrix, &params)))
    });
}

criterion_group!(benches, bench_metrics_backends, bench_rcm);
criterion_main!(benches);
