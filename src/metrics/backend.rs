//! Storage backends feeding the metrics engine

use std::fmt;
use std::str::FromStr;

use log::info;
use sprs::CsMat;

use super::{CoordinateList, CoordinateSource, StructuralMetrics};
use crate::error::{HarnessError, Result};
use crate::matrix::{to_sprs_csr, CooMatrix};

/// Which storage the metrics are extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsBackend {
    /// Compressed sparse row storage (GraphBLAS-style extraction)
    #[default]
    Compressed,
    /// Raw triplets (SciPy COO-style extraction)
    Coordinate,
}

impl MetricsBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsBackend::Compressed => "compressed",
            MetricsBackend::Coordinate => "coordinate",
        }
    }
}

impl fmt::Display for MetricsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricsBackend {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "compressed" | "csr" | "graphblas" => Ok(MetricsBackend::Compressed),
            "coordinate" | "coo" | "scipy" => Ok(MetricsBackend::Coordinate),
            other => Err(HarnessError::config(format!(
                "unknown metrics backend '{}' (expected compressed or coordinate)",
                other
            ))),
        }
    }
}

/// Metrics source over sprs CSR storage
///
/// Duplicate triplets are summed when the compressed matrix is built, so
/// every position is extracted once.
pub struct CompressedBackend {
    matrix: CsMat<f64>,
}

impl CompressedBackend {
    pub fn new(matrix: CsMat<f64>) -> Self {
        Self { matrix }
    }

    pub fn from_coo(matrix: &CooMatrix) -> Self {
        Self::new(to_sprs_csr(matrix))
    }
}

impl CoordinateSource for CompressedBackend {
    fn shape(&self) -> (usize, usize) {
        self.matrix.shape()
    }

    fn to_coordinate_list(&self) -> CoordinateList {
        let nnz = self.matrix.nnz();
        let mut list = CoordinateList {
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
            vals: Vec::with_capacity(nnz),
        };
        for (&v, (r, c)) in self.matrix.iter() {
            list.rows.push(r);
            list.cols.push(c);
            list.vals.push(v);
        }
        list
    }
}

/// Metrics source over the raw coordinate list
///
/// Positions are deduplicated (values summed) on extraction so duplicate
/// triplets do not inflate nnz or fill.
pub struct CoordinateBackend<'a> {
    matrix: &'a CooMatrix,
}

impl<'a> CoordinateBackend<'a> {
    pub fn new(matrix: &'a CooMatrix) -> Self {
        Self { matrix }
    }
}

impl CoordinateSource for CoordinateBackend<'_> {
    fn shape(&self) -> (usize, usize) {
        (self.matrix.n_rows, self.matrix.n_cols)
    }

    fn to_coordinate_list(&self) -> CoordinateList {
        let mut entries: Vec<(usize, usize, f64)> = self.matrix.iter().collect();
        entries.sort_by_key(|&(r, c, _)| (r, c));

        let mut list = CoordinateList {
            rows: Vec::with_capacity(entries.len()),
            cols: Vec::with_capacity(entries.len()),
            vals: Vec::with_capacity(entries.len()),
        };
        for (r, c, v) in entries {
            let n = list.rows.len();
            if n > 0 && list.rows[n - 1] == r && list.cols[n - 1] == c {
                list.vals[n - 1] += v;
            } else {
                list.rows.push(r);
                list.cols.push(c);
                list.vals.push(v);
            }
        }
        list
    }
}

/// Compute structural metrics of `matrix` through the selected backend
pub fn compute_metrics(
    matrix: &CooMatrix,
    backend: MetricsBackend,
    block_sizes: &[usize],
) -> Result<StructuralMetrics> {
    info!("Computing structural metrics with the {} backend", backend);
    match backend {
        MetricsBackend::Compressed => {
            StructuralMetrics::compute(&CompressedBackend::from_coo(matrix), block_sizes)
        }
        MetricsBackend::Coordinate => {
            StructuralMetrics::compute(&CoordinateBackend::new(matrix), block_sizes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!("coo".parse::<MetricsBackend>().unwrap(), MetricsBackend::Coordinate);
        assert_eq!(
            "GraphBLAS".parse::<MetricsBackend>().unwrap(),
            MetricsBackend::Compressed
        );
        assert!("dense".parse::<MetricsBackend>().is_err());
        assert_eq!(MetricsBackend::default().to_string(), "compressed");
    }

    #[test]
    fn test_coordinate_backend_merges_duplicates() {
        let m = CooMatrix::from_triplets(2, 2, &[(1, 1, 1.0), (0, 1, 2.0), (1, 1, 3.0)]);
        let list = CoordinateBackend::new(&m).to_coordinate_list();
        assert_eq!(list.rows, vec![0, 1]);
        assert_eq!(list.cols, vec![1, 1]);
        assert_eq!(list.vals, vec![2.0, 4.0]);
    }

    #[test]
    fn test_backends_extract_the_same_list() {
        let m = CooMatrix::from_triplets(
            4,
            3,
            &[(3, 0, 1.0), (0, 2, 2.0), (3, 0, 1.0), (1, 1, 5.0)],
        );
        let a = CompressedBackend::from_coo(&m).to_coordinate_list();
        let b = CoordinateBackend::new(&m).to_coordinate_list();
        assert_eq!(a, b);
        assert_eq!(CompressedBackend::from_coo(&m).shape(), (4, 3));
    }
}
