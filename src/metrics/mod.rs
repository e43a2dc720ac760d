//! Structural metrics of a (reordered) sparse matrix
//!
//! The engine works on a plain coordinate list. Storage backends only need to
//! expose their shape and a coordinate extraction through
//! [`CoordinateSource`]; the formulas below never see the backend itself, so
//! two backends holding the same matrix report identical numbers.
//!
//! Two block metrics are computed per tile size `B`:
//!
//! - occupancy: occupied tiles / total tiles, where the matrix is covered by
//!   `ceil(rows/B) x ceil(cols/B)` tiles
//! - fill: nnz / (occupied tiles x B^2), i.e. how dense the occupied tiles are

pub mod backend;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

pub use backend::{compute_metrics, CompressedBackend, CoordinateBackend, MetricsBackend};

/// Parallel row/column/value arrays, 0-based, one entry per stored position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateList {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub vals: Vec<f64>,
}

impl CoordinateList {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Anything that can hand the engine a coordinate list
pub trait CoordinateSource {
    /// `(rows, cols)`
    fn shape(&self) -> (usize, usize);

    /// Stored positions, each position at most once
    fn to_coordinate_list(&self) -> CoordinateList;
}

/// Maximum `|row - col|` over stored entries, 0 for an empty matrix
pub fn bandwidth<S: CoordinateSource + ?Sized>(source: &S) -> usize {
    bandwidth_of(&source.to_coordinate_list())
}

/// Fraction of `B x B` tiles holding at least one entry
pub fn occupancy_density<S: CoordinateSource + ?Sized>(source: &S, block_size: usize) -> Result<f64> {
    let coords = source.to_coordinate_list();
    occupancy_of(source.shape(), &coords, block_size)
}

/// Entries per occupied tile area, `nnz / (occupied * B^2)`
pub fn fill_density<S: CoordinateSource + ?Sized>(source: &S, block_size: usize) -> Result<f64> {
    let coords = source.to_coordinate_list();
    fill_of(&coords, block_size)
}

fn bandwidth_of(coords: &CoordinateList) -> usize {
    coords
        .rows
        .iter()
        .zip(&coords.cols)
        .map(|(&r, &c)| r.abs_diff(c))
        .max()
        .unwrap_or(0)
}

fn occupied_tiles(coords: &CoordinateList, block_size: usize) -> usize {
    coords
        .rows
        .iter()
        .zip(&coords.cols)
        .map(|(&r, &c)| (r / block_size, c / block_size))
        .collect::<HashSet<_>>()
        .len()
}

fn check_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 {
        return Err(HarnessError::config("block size must be positive"));
    }
    Ok(())
}

fn occupancy_of(shape: (usize, usize), coords: &CoordinateList, block_size: usize) -> Result<f64> {
    check_block_size(block_size)?;
    if coords.is_empty() {
        return Ok(0.0);
    }
    let (rows, cols) = shape;
    let total = rows.div_ceil(block_size) * cols.div_ceil(block_size);
    Ok(occupied_tiles(coords, block_size) as f64 / total as f64)
}

fn fill_of(coords: &CoordinateList, block_size: usize) -> Result<f64> {
    check_block_size(block_size)?;
    if coords.is_empty() {
        return Ok(0.0);
    }
    let occupied = occupied_tiles(coords, block_size);
    let area = (block_size * block_size) as f64;
    Ok(coords.len() as f64 / (occupied as f64 * area))
}

/// All structural metrics recorded for one matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralMetrics {
    pub bandwidth: usize,
    pub nnz: usize,
    /// Fill density keyed by block size
    pub block_density: BTreeMap<usize, f64>,
    /// Occupancy density keyed by block size
    pub block_occupancy: BTreeMap<usize, f64>,
}

impl StructuralMetrics {
    /// Compute every metric from a single coordinate extraction
    pub fn compute<S: CoordinateSource + ?Sized>(source: &S, block_sizes: &[usize]) -> Result<Self> {
        let shape = source.shape();
        let coords = source.to_coordinate_list();

        let mut block_density = BTreeMap::new();
        let mut block_occupancy = BTreeMap::new();
        for &b in block_sizes {
            block_density.insert(b, fill_of(&coords, b)?);
            block_occupancy.insert(b, occupancy_of(shape, &coords, b)?);
        }

        Ok(Self {
            bandwidth: bandwidth_of(&coords),
            nnz: coords.len(),
            block_density,
            block_occupancy,
        })
    }

    /// `block_density` column value: `{"4": .., "8": ..}`
    pub fn block_density_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.block_density)?)
    }

    /// `block_occupancy` column value, same layout as `block_density`
    pub fn block_occupancy_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.block_occupancy)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CooMatrix;

    #[test]
    fn test_bandwidth() {
        let m = CooMatrix::from_triplets(3, 3, &[(0, 0, 1.0), (1, 0, 1.0), (2, 2, 1.0)]);
        assert_eq!(bandwidth(&CoordinateBackend::new(&m)), 1);

        let empty = CooMatrix::from_triplets(3, 3, &[]);
        assert_eq!(bandwidth(&CoordinateBackend::new(&empty)), 0);

        let corner = CooMatrix::from_triplets(5, 5, &[(4, 0, 1.0)]);
        assert_eq!(bandwidth(&CoordinateBackend::new(&corner)), 4);
    }

    #[test]
    fn test_identity_fill_density() {
        let m = CooMatrix::identity(4);
        let src = CoordinateBackend::new(&m);
        assert_eq!(fill_density(&src, 1).unwrap(), 1.0);
        assert_eq!(fill_density(&src, 2).unwrap(), 0.5);
        assert_eq!(fill_density(&src, 4).unwrap(), 0.25);
    }

    #[test]
    fn test_identity_occupancy_density() {
        let m = CooMatrix::identity(4);
        let src = CoordinateBackend::new(&m);
        assert_eq!(occupancy_density(&src, 1).unwrap(), 0.25);
        assert_eq!(occupancy_density(&src, 2).unwrap(), 0.5);
        assert_eq!(occupancy_density(&src, 4).unwrap(), 1.0);
    }

    #[test]
    fn test_partial_tiles_count_toward_total() {
        // 5x5 with B = 4 gives a 2x2 tile grid
        let m = CooMatrix::from_triplets(5, 5, &[(4, 4, 1.0)]);
        let src = CoordinateBackend::new(&m);
        assert_eq!(occupancy_density(&src, 4).unwrap(), 0.25);
        assert_eq!(fill_density(&src, 4).unwrap(), 1.0 / 16.0);
    }

    #[test]
    fn test_empty_and_zero_block_size() {
        let empty = CooMatrix::from_triplets(4, 4, &[]);
        let src = CoordinateBackend::new(&empty);
        assert_eq!(fill_density(&src, 4).unwrap(), 0.0);
        assert_eq!(occupancy_density(&src, 4).unwrap(), 0.0);

        let m = CooMatrix::identity(4);
        let err = fill_density(&CoordinateBackend::new(&m), 0).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        assert!(occupancy_density(&CoordinateBackend::new(&m), 0).is_err());
    }

    #[test]
    fn test_compute_and_json() {
        let m = CooMatrix::identity(4);
        let metrics = StructuralMetrics::compute(&CoordinateBackend::new(&m), &[1, 2, 4]).unwrap();
        assert_eq!(metrics.bandwidth, 0);
        assert_eq!(metrics.nnz, 4);
        assert_eq!(
            metrics.block_density_json().unwrap(),
            r#"{"1":1.0,"2":0.5,"4":0.25}"#
        );
        assert_eq!(
            metrics.block_occupancy_json().unwrap(),
            r#"{"1":0.25,"2":0.5,"4":1.0}"#
        );
    }
}
