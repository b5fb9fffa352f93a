//! Matrix conversion utilities for the lmbopt-rs library.
//!
//! The public API works with ndarray; decompositions (SVD for the damped
//! step, Cholesky for the surrogate model) are done with nalgebra. These
//! helpers move data across that boundary.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Convert an ndarray Array2 to a nalgebra DMatrix.
///
/// # Arguments
///
/// * `arr` - The ndarray Array2 to convert
///
/// # Returns
///
/// * A nalgebra DMatrix with the same shape and data
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    // nalgebra is column-major, ndarray row-major by default
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert an ndarray Array1 to a nalgebra DVector.
pub fn ndarray_vec_to_nalgebra(arr: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(arr.len(), arr.iter().copied())
}

/// Convert a nalgebra DVector to an ndarray Array1.
pub fn nalgebra_vec_to_ndarray(vec: &DVector<f64>) -> Array1<f64> {
    vec.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_matrix_conversion_keeps_layout() {
        let arr = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mat = ndarray_to_nalgebra(&arr);
        assert_eq!(mat.nrows(), 2);
        assert_eq!(mat.ncols(), 3);
        assert_eq!(mat[(0, 2)], 3.0);
        assert_eq!(mat[(1, 0)], 4.0);
        assert_eq!(mat[(1, 2)], 6.0);
    }

    #[test]
    fn test_vector_roundtrip() {
        let arr = array![1.5, -2.5, 0.0];
        let vec = ndarray_vec_to_nalgebra(&arr);
        assert_eq!(vec.len(), 3);
        assert_eq!(vec[1], -2.5);
        assert_eq!(nalgebra_vec_to_ndarray(&vec), arr);
    }

    #[test]
    fn test_empty_inputs() {
        let arr: Array2<f64> = Array2::zeros((0, 0));
        assert_eq!(ndarray_to_nalgebra(&arr).len(), 0);
        let v: Array1<f64> = Array1::zeros(0);
        assert_eq!(ndarray_vec_to_nalgebra(&v).len(), 0);
    }
}
