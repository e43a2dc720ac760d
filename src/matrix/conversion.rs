//! Conversion from the coordinate model to sprs storage

use sprs::{CsMat, TriMat};

use crate::matrix::CooMatrix;

/// Converts a coordinate matrix to sprs CSR storage
///
/// Entries sharing a position are summed, as every compressed format does.
pub fn to_sprs_csr(matrix: &CooMatrix) -> CsMat<f64> {
    let tri = TriMat::from_triplets(
        (matrix.n_rows, matrix.n_cols),
        matrix.row_idx.clone(),
        matrix.col_idx.clone(),
        matrix.values.clone(),
    );
    tri.to_csr()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sprs_sorts_and_sums_duplicates() {
        let coo = CooMatrix::from_triplets(
            3,
            3,
            &[(2, 0, 4.0), (0, 2, 2.0), (0, 0, 1.0), (0, 2, 0.5)],
        );
        let csr = to_sprs_csr(&coo);

        assert!(csr.is_csr());
        assert_eq!(csr.nnz(), 3);
        assert_eq!(csr.get(0, 2), Some(&2.5));
        assert_eq!(csr.get(2, 0), Some(&4.0));
    }
}
