//! A module for metrics to evaluate the approximate models against data or against
//! the exact gaussian process they stand for.

use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{ArrayBase, Data, Ix1, Ix2};

fn check_same_len<F: Float>(
    actual: &ArrayBase<impl Data<Elem = F>, Ix1>,
    expected: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<()> {
    if actual.len() != expected.len() {
        return Err(GpError::DimensionMismatch(format!(
            "cannot compare {} predictions with {} targets",
            actual.len(),
            expected.len()
        )));
    }
    if expected.is_empty() {
        return Err(GpError::InvalidData("no values to compare".to_string()));
    }
    Ok(())
}

/// Root mean squared error between predictions `y_pred` and targets `y_true`
pub fn rmse<F: Float>(
    y_pred: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y_true: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<F> {
    check_same_len(y_pred, y_true)?;
    let sse = (y_pred - y_true).mapv(|v| v * v).sum();
    Ok((sse / F::cast(y_true.len())).sqrt())
}

/// Coefficient of determination `R2 = 1 - SSE / SST`.
///
/// Fails with [`GpError::InvalidData`] when targets are constant.
pub fn r2_score<F: Float>(
    y_pred: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y_true: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<F> {
    check_same_len(y_pred, y_true)?;
    let mean = y_true.sum() / F::cast(y_true.len());
    let sst = y_true.mapv(|v| (v - mean) * (v - mean)).sum();
    if sst <= F::zero() {
        return Err(GpError::InvalidData(
            "R2 score undefined for constant targets".to_string(),
        ));
    }
    let sse = (y_pred - y_true).mapv(|v| v * v).sum();
    Ok(F::one() - sse / sst)
}

/// Relative Frobenius error `||approx - exact||_F / ||exact||_F` between two Gram matrices
pub fn relative_frobenius_error<F: Float>(
    approx: &ArrayBase<impl Data<Elem = F>, Ix2>,
    exact: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<F> {
    if approx.shape() != exact.shape() {
        return Err(GpError::DimensionMismatch(format!(
            "cannot compare {:?} matrix with {:?} matrix",
            approx.shape(),
            exact.shape()
        )));
    }
    let norm = exact.mapv(|v| v * v).sum().sqrt();
    if norm <= F::zero() {
        return Err(GpError::InvalidData(
            "relative error undefined for a null reference matrix".to_string(),
        ));
    }
    let diff = (approx - exact).mapv(|v| v * v).sum().sqrt();
    Ok(diff / norm)
}
