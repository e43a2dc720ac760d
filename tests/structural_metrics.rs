//! Integration tests for structural metrics across storage backends

use proptest::prelude::*;
use reorder_bench::metrics::compute_metrics;
use reorder_bench::{
    bandwidth, fill_density, occupancy_density, CompressedBackend, CooMatrix, CoordinateBackend,
    MetricsBackend, StructuralMetrics,
};

/// Nonzeros at (1,1),(1,2),(2,2),(3,3),(4,3),(4,4), 1-based
fn banded_4x4() -> CooMatrix {
    CooMatrix::from_triplets(
        4,
        4,
        &[
            (0, 0, 1.0),
            (0, 1, 1.0),
            (1, 1, 1.0),
            (2, 2, 1.0),
            (3, 2, 1.0),
            (3, 3, 1.0),
        ],
    )
}

#[test]
fn test_bandwidth_equal_on_both_backends() {
    let m = banded_4x4();
    assert_eq!(bandwidth(&CompressedBackend::from_coo(&m)), 1);
    assert_eq!(bandwidth(&CoordinateBackend::new(&m)), 1);
}

#[test]
fn test_identity_block_densities() {
    let m = CooMatrix::identity(4);
    let compressed = CompressedBackend::from_coo(&m);
    let coordinate = CoordinateBackend::new(&m);

    for (block, fill, occupancy) in [(1, 1.0, 0.25), (2, 0.5, 0.5), (4, 0.25, 1.0)] {
        assert_eq!(fill_density(&compressed, block).unwrap(), fill);
        assert_eq!(fill_density(&coordinate, block).unwrap(), fill);
        assert_eq!(occupancy_density(&compressed, block).unwrap(), occupancy);
        assert_eq!(occupancy_density(&coordinate, block).unwrap(), occupancy);
    }
}

#[test]
fn test_duplicates_counted_once() {
    // the same position twice must not inflate nnz on the coordinate path
    let m = CooMatrix::from_triplets(3, 3, &[(0, 0, 1.0), (0, 0, 2.0), (2, 1, 1.0)]);
    let a = StructuralMetrics::compute(&CompressedBackend::from_coo(&m), &[2]).unwrap();
    let b = StructuralMetrics::compute(&CoordinateBackend::new(&m), &[2]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.nnz, 2);
    assert_eq!(a.bandwidth, 1);
}

#[test]
fn test_empty_and_rectangular() {
    let empty = CooMatrix::from_triplets(5, 5, &[]);
    let metrics = compute_metrics(&empty, MetricsBackend::Coordinate, &[4]).unwrap();
    assert_eq!(metrics.bandwidth, 0);
    assert_eq!(metrics.block_density[&4], 0.0);

    let wide = CooMatrix::from_triplets(2, 6, &[(0, 5, 1.0), (1, 0, 1.0)]);
    let a = compute_metrics(&wide, MetricsBackend::Compressed, &[2, 4]).unwrap();
    let b = compute_metrics(&wide, MetricsBackend::Coordinate, &[2, 4]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.bandwidth, 5);
}

#[test]
fn test_zero_block_size_rejected() {
    let m = CooMatrix::identity(2);
    assert!(fill_density(&CoordinateBackend::new(&m), 0).is_err());
    assert!(compute_metrics(&m, MetricsBackend::Compressed, &[0]).is_err());
}

#[test]
fn test_json_columns() {
    let m = CooMatrix::identity(4);
    let metrics = compute_metrics(&m, MetricsBackend::Compressed, &[1, 2, 4]).unwrap();
    assert_eq!(metrics.block_density_json().unwrap(), r#"{"1":1.0,"2":0.5,"4":0.25}"#);
    assert_eq!(metrics.block_occupancy_json().unwrap(), r#"{"1":0.25,"2":0.5,"4":1.0}"#);
}

fn arb_matrix() -> impl Strategy<Value = CooMatrix> {
    (1usize..24, 1usize..24).prop_flat_map(|(rows, cols)| {
        prop::collection::vec((0..rows, 0..cols, -10.0f64..10.0), 0..80)
            .prop_map(move |triplets| CooMatrix::from_triplets(rows, cols, &triplets))
    })
}

proptest! {
    #[test]
    fn prop_backends_agree(m in arb_matrix(), block in 1usize..9) {
        let a = StructuralMetrics::compute(&CompressedBackend::from_coo(&m), &[block]).unwrap();
        let b = StructuralMetrics::compute(&CoordinateBackend::new(&m), &[block]).unwrap();
        prop_assert_eq!(a.bandwidth, b.bandwidth);
        prop_assert_eq!(a.nnz, b.nnz);
        prop_assert!((a.block_density[&block] - b.block_density[&block]).abs() < 1e-12);
        prop_assert!((a.block_occupancy[&block] - b.block_occupancy[&block]).abs() < 1e-12);
    }

    #[test]
    fn prop_densities_in_unit_interval(m in arb_matrix(), block in 1usize..9) {
        let backend = CoordinateBackend::new(&m);
        let fill = fill_density(&backend, block).unwrap();
        let occupancy = occupancy_density(&backend, block).unwrap();
        prop_assert!((0.0..=1.0).contains(&fill));
        prop_assert!((0.0..=1.0).contains(&occupancy));
    }
}
