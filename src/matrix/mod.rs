// Matrix data structures, Matrix Market I/O and permutations

pub mod conversion;
pub mod coo;
pub mod market;
pub mod permutation;

pub use conversion::to_sprs_csr;
pub use coo::CooMatrix;
pub use market::MatrixMarketIO;
pub use permutation::{Permutation, ReorderType};
