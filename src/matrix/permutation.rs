//! Row/column permutations produced by reorder techniques
//!
//! A permutation is stored 1-based, matching the on-disk `permutation.g`
//! convention: position `i` holds the original index that moves to `i`.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{HarnessError, Result};
use crate::matrix::CooMatrix;

/// Which axes a permutation is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderType {
    /// Permute rows only
    OneD,
    /// Permute rows and columns symmetrically
    TwoD,
}

impl ReorderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReorderType::OneD => "1D",
            ReorderType::TwoD => "2D",
        }
    }
}

impl fmt::Display for ReorderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated 1-based permutation of `1..=n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    order: Vec<usize>,
}

impl Permutation {
    /// Validate a 1-based index sequence
    ///
    /// Fails unless `order` contains every integer in `1..=order.len()`
    /// exactly once.
    pub fn from_one_based(order: Vec<usize>) -> Result<Self> {
        let n = order.len();
        let mut seen = vec![false; n];
        for &p in &order {
            if p == 0 || p > n {
                return Err(HarnessError::input(format!(
                    "permutation entry {} outside 1..={}",
                    p, n
                )));
            }
            if std::mem::replace(&mut seen[p - 1], true) {
                return Err(HarnessError::input(format!(
                    "permutation entry {} appears more than once",
                    p
                )));
            }
        }
        Ok(Self { order })
    }

    /// Build from a 0-based ordering (as produced by in-process techniques)
    pub fn from_zero_based(order: &[usize]) -> Result<Self> {
        Self::from_one_based(order.iter().map(|&i| i + 1).collect())
    }

    /// The identity permutation `[1, 2, ..., n]`
    pub fn identity(n: usize) -> Self {
        Self {
            order: (1..=n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The 1-based entries
    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// Inverse mapping, 0-based: `inverse()[old] == new`
    pub fn inverse(&self) -> Vec<usize> {
        let mut inv = vec![0; self.order.len()];
        for (new, &old) in self.order.iter().enumerate() {
            inv[old - 1] = new;
        }
        inv
    }

    /// Read a permutation file and check it against the matrix dimension
    pub fn read<P: AsRef<Path>>(path: P, expected_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            HarnessError::input(format!(
                "failed to read permutation {}: {}",
                path.display(),
                e
            ))
        })?;
        let order = content
            .split_whitespace()
            .map(|tok| {
                tok.parse::<usize>().map_err(|_| {
                    HarnessError::input(format!("invalid permutation entry '{}'", tok))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if order.len() != expected_len {
            return Err(HarnessError::input(format!(
                "permutation has {} entries, matrix dimension is {}",
                order.len(),
                expected_len
            )));
        }
        Self::from_one_based(order)
    }

    /// Write one 1-based index per line
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = String::with_capacity(self.order.len() * 4);
        for p in &self.order {
            out.push_str(&p.to_string());
            out.push('\n');
        }
        let mut file = fs::File::create(path)?;
        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Apply to a matrix, producing a new matrix
    ///
    /// `OneD` moves row `order[i]` to row `i`; `TwoD` does the same for
    /// columns. Entry order is preserved.
    pub fn apply(&self, matrix: &CooMatrix, reorder_type: ReorderType) -> Result<CooMatrix> {
        if self.len() != matrix.n_rows {
            return Err(HarnessError::input(format!(
                "permutation length {} does not match {} rows",
                self.len(),
                matrix.n_rows
            )));
        }
        if reorder_type == ReorderType::TwoD && !matrix.is_square() {
            return Err(HarnessError::input(format!(
                "2D reordering requires a square matrix, got {}x{}",
                matrix.n_rows, matrix.n_cols
            )));
        }

        let inv = self.inverse();
        let row_idx = matrix.row_idx.iter().map(|&r| inv[r]).collect();
        let col_idx = match reorder_type {
            ReorderType::OneD => matrix.col_idx.clone(),
            ReorderType::TwoD => matrix.col_idx.iter().map(|&c| inv[c]).collect(),
        };

        CooMatrix::try_new(
            matrix.n_rows,
            matrix.n_cols,
            row_idx,
            col_idx,
            matrix.values.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validation() {
        assert!(Permutation::from_one_based(vec![2, 3, 1]).is_ok());
        assert!(Permutation::from_one_based(vec![]).is_ok());
        assert!(Permutation::from_one_based(vec![1, 1, 2]).is_err());
        assert!(Permutation::from_one_based(vec![0, 1, 2]).is_err());
        assert!(Permutation::from_one_based(vec![1, 2, 4]).is_err());
    }

    #[test]
    fn test_inverse() {
        let p = Permutation::from_one_based(vec![3, 1, 2]).unwrap();
        // old index 2 (0-based) sits at new position 0
        assert_eq!(p.inverse(), vec![1, 2, 0]);
    }

    #[test]
    fn test_apply_one_d_moves_rows_only() {
        let m = CooMatrix::from_triplets(3, 3, &[(0, 1, 1.0), (2, 2, 2.0)]);
        let p = Permutation::from_one_based(vec![3, 2, 1]).unwrap();
        let r = p.apply(&m, ReorderType::OneD).unwrap();
        assert_eq!(r.row_idx, vec![2, 0]);
        assert_eq!(r.col_idx, vec![1, 2]);
    }

    #[test]
    fn test_apply_two_d_is_symmetric() {
        let m = CooMatrix::from_triplets(3, 3, &[(0, 1, 1.0), (2, 2, 2.0)]);
        let p = Permutation::from_one_based(vec![3, 2, 1]).unwrap();
        let r = p.apply(&m, ReorderType::TwoD).unwrap();
        assert_eq!(r.row_idx, vec![2, 0]);
        assert_eq!(r.col_idx, vec![1, 0]);
        assert_eq!(r.values, m.values);
    }

    #[test]
    fn test_identity_apply_is_noop() {
        let m = CooMatrix::from_triplets(3, 3, &[(0, 1, 1.0), (1, 2, 2.0), (2, 0, 3.0)]);
        let r = Permutation::identity(3).apply(&m, ReorderType::TwoD).unwrap();
        assert_eq!(r, m);
    }

    #[test]
    fn test_file_round_trip_and_length_check() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("permutation.g");
        let p = Permutation::from_one_based(vec![2, 4, 1, 3]).unwrap();
        p.write(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2\n4\n1\n3\n");
        assert_eq!(Permutation::read(&path, 4).unwrap(), p);

        let err = Permutation::read(&path, 5).unwrap_err();
        assert!(err.to_string().contains("4 entries"));
    }
}
