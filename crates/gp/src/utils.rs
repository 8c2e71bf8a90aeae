use crate::errors::{GpError, Result};
use linfa::Float;
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{Array2, ArrayBase, Data, Ix1, Ix2};

/// Check that (x, y) is a usable training set: at least one point of at least one
/// component, as many targets as points and only finite values.
pub(crate) fn check_training_data<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<()> {
    check_inputs(x)?;
    if x.nrows() != y.len() {
        return Err(GpError::DimensionMismatch(format!(
            "{} training inputs but {} training outputs",
            x.nrows(),
            y.len()
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(GpError::InvalidData(
            "training outputs contain NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Check inputs are a non empty (n, nx) matrix of finite values
pub(crate) fn check_inputs<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(GpError::InvalidData(format!(
            "inputs should be a non empty (n, nx) matrix, got ({}, {})",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(GpError::InvalidData(
            "inputs contain NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Check `x` points have the `expected` number of components
pub(crate) fn check_dim<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    expected: usize,
) -> Result<()> {
    if x.ncols() != expected {
        Err(GpError::DimensionMismatch(format!(
            "expected points of dimension {expected}, got {}",
            x.ncols()
        )))
    } else {
        Ok(())
    }
}

/// Lower Cholesky factor L of a symmetric matrix `a = L L^T`.
///
/// Fails with [`GpError::SingularMatrix`] naming the `what` matrix when `a` is not
/// numerically positive definite (failed factorization or null/non finite pivot).
pub(crate) fn cholesky_lower<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    what: &str,
) -> Result<Array2<F>> {
    let l = a
        .cholesky()
        .map_err(|e| GpError::SingularMatrix(format!("{what} is not positive definite ({e})")))?;
    if l.diag().iter().any(|v| !v.is_finite() || *v <= F::zero()) {
        return Err(GpError::SingularMatrix(format!(
            "{what} is not positive definite (null pivot)"
        )));
    }
    Ok(l)
}

/// Inverse of a lower triangular matrix
pub(crate) fn lower_inverse<F: Float>(l: &Array2<F>) -> Result<Array2<F>> {
    Ok(l.solve_triangular(&Array2::<F>::eye(l.nrows()), UPLO::Lower)?)
}
