//! Property tests: every builtin technique yields a valid permutation

use proptest::prelude::*;
use reorder_bench::reordering::{create_reordering, IdentityOrdering, Reordering, ReverseCuthillMckee};
use reorder_bench::{bandwidth, Builtin, CooMatrix, CoordinateBackend, ParameterSet, ReorderType};

fn arb_square() -> impl Strategy<Value = CooMatrix> {
    (1usize..40).prop_flat_map(|n| {
        prop::collection::vec((0..n, 0..n), 0..120).prop_map(move |pos| {
            let triplets: Vec<_> = pos.into_iter().map(|(r, c)| (r, c, 1.0)).collect();
            CooMatrix::from_triplets(n, n, &triplets)
        })
    })
}

fn assert_is_permutation(order: &[usize], n: usize) {
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, (1..=n).collect::<Vec<_>>());
}

/// Path graph 0-1-2-...-n-1 with vertex labels scrambled
fn scrambled_path(labels: &[usize]) -> CooMatrix {
    let n = labels.len();
    let mut triplets = Vec::new();
    for i in 0..n {
        triplets.push((labels[i], labels[i], 2.0));
        if i + 1 < n {
            triplets.push((labels[i], labels[i + 1], -1.0));
            triplets.push((labels[i + 1], labels[i], -1.0));
        }
    }
    CooMatrix::from_triplets(n, n, &triplets)
}

#[test]
fn test_rcm_recovers_path_bandwidth() {
    let m = scrambled_path(&[3, 7, 0, 5, 1, 6, 2, 4]);
    let before = bandwidth(&CoordinateBackend::new(&m));
    let p = ReverseCuthillMckee.compute(&m, &ParameterSet::default()).unwrap();
    let reordered = p.apply(&m, ReorderType::TwoD).unwrap();
    assert!(before > 1);
    assert_eq!(bandwidth(&CoordinateBackend::new(&reordered)), 1);
}

#[test]
fn test_factory_rejects_kernels() {
    assert!(create_reordering(Builtin::Rcm).is_ok());
    assert!(create_reordering(Builtin::CpuSpmv).is_err());
}

proptest! {
    #[test]
    fn prop_identity_is_valid(m in arb_square()) {
        let p = IdentityOrdering.compute(&m, &ParameterSet::default()).unwrap();
        assert_is_permutation(p.as_slice(), m.n_rows);
        prop_assert_eq!(p.apply(&m, ReorderType::OneD).unwrap(), m);
    }

    #[test]
    fn prop_rcm_is_valid(m in arb_square()) {
        let p = ReverseCuthillMckee.compute(&m, &ParameterSet::default()).unwrap();
        assert_is_permutation(p.as_slice(), m.n_rows);

        // symmetric relabelling preserves the entry count
        let reordered = p.apply(&m, ReorderType::TwoD).unwrap();
        prop_assert_eq!(reordered.nnz(), m.nnz());
    }

    #[test]
    fn prop_inverse_undoes_order(m in arb_square()) {
        let p = ReverseCuthillMckee.compute(&m, &ParameterSet::default()).unwrap();
        let inv = p.inverse();
        for (new, &old) in p.as_slice().iter().enumerate() {
            prop_assert_eq!(inv[old - 1], new);
        }
    }
}
