//! In-process reordering techniques
//!
//! Each technique maps a matrix to a [`Permutation`] of its rows. Applying
//! the permutation and writing the reordered matrix is the stage runner's
//! job, so a technique only has to decide the order.

pub mod rcm;

use crate::error::{HarnessError, Result};
use crate::matrix::{CooMatrix, Permutation};
use crate::params::ParameterSet;
use crate::registry::Builtin;

pub use rcm::ReverseCuthillMckee;

/// A technique computing a row permutation for a matrix
pub trait Reordering {
    /// Compute the permutation
    ///
    /// # Arguments
    ///
    /// * `matrix` - Matrix to reorder
    /// * `params` - Caller-supplied technique parameters
    fn compute(&self, matrix: &CooMatrix, params: &ParameterSet) -> Result<Permutation>;
}

/// Keeps the original order; the baseline every other technique is compared to
pub struct IdentityOrdering;

impl Reordering for IdentityOrdering {
    fn compute(&self, matrix: &CooMatrix, _params: &ParameterSet) -> Result<Permutation> {
        Ok(Permutation::identity(matrix.n_rows))
    }
}

/// Create the reordering for a builtin technique
pub fn create_reordering(builtin: Builtin) -> Result<Box<dyn Reordering>> {
    match builtin {
        Builtin::Identity => Ok(Box::new(IdentityOrdering)),
        Builtin::Rcm => Ok(Box::new(ReverseCuthillMckee)),
        other => Err(HarnessError::config(format!(
            "{:?} is not a reordering technique",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ordering() {
        let m = CooMatrix::from_triplets(4, 4, &[(0, 3, 1.0), (2, 1, 1.0)]);
        let p = IdentityOrdering
            .compute(&m, &ParameterSet::default())
            .unwrap();
        assert_eq!(p.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_create_reordering() {
        let m = CooMatrix::identity(3);
        let params = ParameterSet::default();
        for builtin in [Builtin::Identity, Builtin::Rcm] {
            let p = create_reordering(builtin).unwrap().compute(&m, &params).unwrap();
            assert_eq!(p.len(), 3);
        }
        assert!(create_reordering(Builtin::Mock).is_err());
    }
}
