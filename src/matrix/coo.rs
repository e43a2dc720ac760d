//! Coordinate (COO) sparse matrix, the harness' in-memory matrix model

use std::fmt;

use crate::error::{HarnessError, Result};

/// A sparse matrix stored as a coordinate list
///
/// The COO format stores a sparse matrix using three parallel arrays:
/// - row_idx: 0-based row index of each stored entry
/// - col_idx: 0-based column index of each stored entry
/// - values: value of each stored entry
///
/// Indices are 0-based in memory; the Matrix Market boundary converts from
/// and to 1-based indices. A matrix is never mutated once loaded; applying a
/// permutation produces a new matrix.
#[derive(Clone, PartialEq)]
pub struct CooMatrix {
    /// Number of rows in the matrix
    pub n_rows: usize,

    /// Number of columns in the matrix
    pub n_cols: usize,

    /// Row indices (size: nnz)
    pub row_idx: Vec<usize>,

    /// Column indices (size: nnz)
    pub col_idx: Vec<usize>,

    /// Stored values (size: nnz)
    pub values: Vec<f64>,
}

impl CooMatrix {
    /// Creates a new COO matrix with the given dimensions and entries
    ///
    /// # Panics
    ///
    /// Panics if the arrays have different lengths or an index is out of
    /// bounds. Use [`CooMatrix::try_new`] for untrusted input.
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        row_idx: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        match Self::try_new(n_rows, n_cols, row_idx, col_idx, values) {
            Ok(matrix) => matrix,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates a new COO matrix, validating lengths and index bounds
    pub fn try_new(
        n_rows: usize,
        n_cols: usize,
        row_idx: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if row_idx.len() != col_idx.len() || col_idx.len() != values.len() {
            return Err(HarnessError::input(format!(
                "coordinate arrays differ in length ({}, {}, {})",
                row_idx.len(),
                col_idx.len(),
                values.len()
            )));
        }
        if let Some(&r) = row_idx.iter().find(|&&r| r >= n_rows) {
            return Err(HarnessError::input(format!(
                "row index {} out of bounds (n_rows = {})",
                r, n_rows
            )));
        }
        if let Some(&c) = col_idx.iter().find(|&&c| c >= n_cols) {
            return Err(HarnessError::input(format!(
                "column index {} out of bounds (n_cols = {})",
                c, n_cols
            )));
        }

        Ok(Self {
            n_rows,
            n_cols,
            row_idx,
            col_idx,
            values,
        })
    }

    /// Creates a matrix from `(row, col, value)` triplets (0-based)
    pub fn from_triplets(n_rows: usize, n_cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let row_idx = triplets.iter().map(|t| t.0).collect();
        let col_idx = triplets.iter().map(|t| t.1).collect();
        let values = triplets.iter().map(|t| t.2).collect();
        Self::new(n_rows, n_cols, row_idx, col_idx, values)
    }

    /// Creates an identity matrix of the given size
    pub fn identity(n: usize) -> Self {
        let idx: Vec<usize> = (0..n).collect();
        Self {
            n_rows: n,
            n_cols: n,
            row_idx: idx.clone(),
            col_idx: idx,
            values: vec![1.0; n],
        }
    }

    /// Returns the number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Whether the matrix is square
    pub fn is_square(&self) -> bool {
        self.n_rows == self.n_cols
    }

    /// Iterator over the stored `(row, col, value)` entries
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.row_idx
            .iter()
            .zip(&self.col_idx)
            .zip(&self.values)
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// Symmetric adjacency lists of the off-diagonal pattern
    ///
    /// Entry `(i, j)` contributes `j` to `i`'s list and `i` to `j`'s list,
    /// so unsymmetric patterns are treated as `A + A^T`. Lists are sorted
    /// and deduplicated.
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let n = self.n_rows.max(self.n_cols);
        let mut adj = vec![Vec::new(); n];
        for (r, c, _) in self.iter() {
            if r != c {
                adj[r].push(c);
                adj[c].push(r);
            }
        }
        for list in &mut adj {
            list.sort_unstable();
            list.dedup();
        }
        adj
    }
}

impl fmt::Debug for CooMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CooMatrix {{")?;
        writeln!(f, "  dimensions: {} × {}", self.n_rows, self.n_cols)?;
        writeln!(f, "  nnz: {}", self.nnz())?;

        let max_entries = 8.min(self.nnz());
        if max_entries > 0 {
            write!(f, "  entries: ")?;
            for (r, c, v) in self.iter().take(max_entries) {
                write!(f, "({}, {}, {:?}) ", r, c, v)?;
            }
            if self.nnz() > max_entries {
                write!(f, "... ({} more)", self.nnz() - max_entries)?;
            }
            writeln!(f)?;
        }

        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matrix() {
        let m = CooMatrix::new(3, 3, vec![0, 1, 2], vec![0, 2, 1], vec![1.0, 2.0, 3.0]);
        assert_eq!(m.n_rows, 3);
        assert_eq!(m.nnz(), 3);
        assert!(m.is_square());
    }

    #[test]
    fn test_try_new_rejects_out_of_bounds() {
        let err = CooMatrix::try_new(2, 2, vec![0, 2], vec![0, 1], vec![1.0, 1.0]).unwrap_err();
        assert!(err.to_string().contains("row index 2 out of bounds"));

        let err = CooMatrix::try_new(2, 2, vec![0, 1], vec![0, 5], vec![1.0, 1.0]).unwrap_err();
        assert!(err.to_string().contains("column index 5"));
    }

    #[test]
    #[should_panic(expected = "coordinate arrays differ in length")]
    fn test_inconsistent_lengths() {
        CooMatrix::new(2, 2, vec![0, 1], vec![0], vec![1.0, 1.0]);
    }

    #[test]
    fn test_identity() {
        let m = CooMatrix::identity(4);
        assert_eq!(m.row_idx, vec![0, 1, 2, 3]);
        assert_eq!(m.col_idx, vec![0, 1, 2, 3]);
        assert_eq!(m.values, vec![1.0; 4]);
    }

    #[test]
    fn test_adjacency_symmetrizes() {
        // 0 -> 1 only stored one way, plus a diagonal
        let m = CooMatrix::from_triplets(3, 3, &[(0, 1, 1.0), (2, 2, 1.0), (1, 2, 1.0)]);
        let adj = m.adjacency();
        assert_eq!(adj[0], vec![1]);
        assert_eq!(adj[1], vec![0, 2]);
        assert_eq!(adj[2], vec![1]);
    }
}
