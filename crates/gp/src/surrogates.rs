use crate::errors::Result;
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView2};
use std::fmt;

/// A trait for fitted gaussian process models, exact or approximate, used to
/// compare them through a common interface.
pub trait GpSurrogate<F: Float>: fmt::Display + Sync + Send {
    /// Input dimension and number of training points
    fn dims(&self) -> (usize, usize);

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    fn predict(&self, x: &ArrayView2<F>) -> Result<Array1<F>>;

    /// Predict latent variances at n given `x` points of nx components specified as a (n, nx) matrix.
    fn predict_var(&self, x: &ArrayView2<F>) -> Result<Array1<F>>;

    /// Predict both output values and latent variances
    fn predict_valvar(&self, x: &ArrayView2<F>) -> Result<(Array1<F>, Array1<F>)> {
        Ok((self.predict(x)?, self.predict_var(x)?))
    }

    /// Gram matrix (exact or approximate) of the covariance kernel at given `x` points
    fn compute_kernel(&self, x: &ArrayView2<F>) -> Result<Array2<F>>;
}
