//! Stateful regressors wrapping the fit/predict workflow of the approximate models.
//!
//! A regressor starts unfitted, is fitted by [`Regressor::fit`] and re-fitted by further
//! calls which discard the previous model. Predicting before a successful fit fails with
//! [`GpError::NotFitted`]. Invalid hyperparameters or data are rejected before anything
//! is computed and leave the regressor untouched, whereas a numerical failure during
//! the computations leaves it unfitted.

use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::rff::RandomFourierFeatures;
use crate::rff_algorithm::RffGaussianProcess;
use crate::rff_parameters::{RffGpParams, RffParams};
use crate::sparse_algorithm::SparseGaussianProcess;
use crate::sparse_parameters::{Inducings, SgpParams};
use crate::utils::{check_inputs, check_training_data};
use linfa::prelude::{DatasetBase, Fit, Float};
use linfa::ParamGuard;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// A trait for regressors following the unfitted/fitted life cycle
pub trait Regressor<F: Float> {
    /// Fit the regressor on (n, nx) inputs `x` and n outputs `y`
    fn fit(&mut self, x: &ArrayView2<F>, y: &ArrayView1<F>) -> Result<()>;

    /// Predictive means and latent variances at (n, nx) `x` points
    fn predict(&self, x: &ArrayView2<F>) -> Result<(Array1<F>, Array1<F>)>;

    /// Whether the regressor has been successfully fitted
    fn is_fitted(&self) -> bool;
}

fn is_numerical(err: &GpError) -> bool {
    matches!(err, GpError::SingularMatrix(_) | GpError::LinalgError(_))
}

/// Store a successful fit, a numerical failure discards the previous model
fn refit<M>(slot: &mut Option<M>, fitted: Result<M>) -> Result<()> {
    match fitted {
        Ok(model) => {
            *slot = Some(model);
            Ok(())
        }
        Err(err) => {
            if is_numerical(&err) {
                *slot = None;
            }
            Err(err)
        }
    }
}

fn fitted_model<'a, M>(slot: &'a Option<M>, name: &str) -> Result<&'a M> {
    slot.as_ref()
        .ok_or_else(|| GpError::NotFitted(name.to_string()))
}

/// Stateful inducing points (Nyström) regressor
#[derive(Clone, Debug)]
pub struct NystromRegressor<F: Float> {
    params: SgpParams<F>,
    model: Option<SparseGaussianProcess<F>>,
}

impl<F: Float> NystromRegressor<F> {
    /// Unfitted regressor with given kernel and inducing points specification
    pub fn new(kernel: Kernel<F>, inducings: Inducings<F>) -> Self {
        Self::with_params(SparseGaussianProcess::params(kernel, inducings))
    }

    /// Unfitted regressor with given parameters
    pub fn with_params(params: SgpParams<F>) -> Self {
        NystromRegressor {
            params,
            model: None,
        }
    }

    /// Parameters used by next fit
    pub fn params(&self) -> &SgpParams<F> {
        &self.params
    }

    /// Replace parameters used by next fit, current model is kept
    pub fn set_params(&mut self, params: SgpParams<F>) {
        self.params = params;
    }

    /// Fitted model, `None` when unfitted
    pub fn model(&self) -> Option<&SparseGaussianProcess<F>> {
        self.model.as_ref()
    }

    /// Nyström approximation of the Gram matrix at `x` points
    pub fn compute_kernel(&self, x: &ArrayView2<F>) -> Result<Array2<F>> {
        fitted_model(&self.model, "NystromRegressor")?.compute_kernel(x)
    }
}

impl<F: Float> Regressor<F> for NystromRegressor<F> {
    fn fit(&mut self, x: &ArrayView2<F>, y: &ArrayView1<F>) -> Result<()> {
        let params = self.params.check_ref()?;
        check_training_data(x, y)?;
        let fitted = params.fit(&DatasetBase::new(x.view(), y.view()));
        refit(&mut self.model, fitted)
    }

    fn predict(&self, x: &ArrayView2<F>) -> Result<(Array1<F>, Array1<F>)> {
        fitted_model(&self.model, "NystromRegressor")?.predict_valvar(x)
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }
}

/// Stateful random Fourier features regressor
#[derive(Clone, Debug)]
pub struct RffRegressor<F: Float> {
    params: RffGpParams<F>,
    model: Option<RffGaussianProcess<F>>,
}

impl<F: Float> RffRegressor<F> {
    /// Unfitted regressor with given kernel and number of random features
    pub fn new(kernel: Kernel<F>, n_features: usize) -> Self {
        Self::with_params(RffGaussianProcess::params(kernel, n_features))
    }

    /// Unfitted regressor with given parameters
    pub fn with_params(params: RffGpParams<F>) -> Self {
        RffRegressor {
            params,
            model: None,
        }
    }

    /// Parameters used by next fit
    pub fn params(&self) -> &RffGpParams<F> {
        &self.params
    }

    /// Replace parameters used by next fit, current model is kept
    pub fn set_params(&mut self, params: RffGpParams<F>) {
        self.params = params;
    }

    /// Fitted model, `None` when unfitted
    pub fn model(&self) -> Option<&RffGaussianProcess<F>> {
        self.model.as_ref()
    }

    /// Random features approximation of the Gram matrix at `x` points
    pub fn compute_kernel(&self, x: &ArrayView2<F>) -> Result<Array2<F>> {
        fitted_model(&self.model, "RffRegressor")?.compute_kernel(x)
    }
}

impl<F: Float> Regressor<F> for RffRegressor<F> {
    fn fit(&mut self, x: &ArrayView2<F>, y: &ArrayView1<F>) -> Result<()> {
        let params = self.params.check_ref()?;
        check_training_data(x, y)?;
        let fitted = params.fit(&DatasetBase::new(x.view(), y.view()));
        refit(&mut self.model, fitted)
    }

    fn predict(&self, x: &ArrayView2<F>) -> Result<(Array1<F>, Array1<F>)> {
        fitted_model(&self.model, "RffRegressor")?.predict_valvar(x)
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }
}

/// Stateful random Fourier features mapper: frequencies and phases are drawn
/// by [`FourierFeatureMapper::fit`] and frozen until the next fit.
#[derive(Clone, Debug)]
pub struct FourierFeatureMapper<F: Float> {
    params: RffParams<F>,
    mapper: Option<RandomFourierFeatures<F>>,
}

impl<F: Float> FourierFeatureMapper<F> {
    /// Unfitted mapper approximating `kernel` with `n_features` random features
    pub fn new(kernel: Kernel<F>, n_features: usize) -> Self {
        Self::with_params(RandomFourierFeatures::params(kernel, n_features))
    }

    /// Unfitted mapper with given parameters
    pub fn with_params(params: RffParams<F>) -> Self {
        FourierFeatureMapper {
            params,
            mapper: None,
        }
    }

    /// Fitted mapper, `None` when unfitted
    pub fn mapper(&self) -> Option<&RandomFourierFeatures<F>> {
        self.mapper.as_ref()
    }

    /// Whether frequencies and phases have been drawn
    pub fn is_fitted(&self) -> bool {
        self.mapper.is_some()
    }

    /// Draw frequencies and phases for the input dimension of `x`
    pub fn fit(&mut self, x: &ArrayView2<F>) -> Result<()> {
        let params = self.params.check_ref()?;
        check_inputs(x)?;
        let fitted = params.fit(&DatasetBase::from(x.view()));
        refit(&mut self.mapper, fitted)
    }

    /// Map (n, nx) points to (n, n_features) features
    pub fn transform(&self, x: &ArrayView2<F>) -> Result<Array2<F>> {
        fitted_model(&self.mapper, "FourierFeatureMapper")?.transform(x)
    }

    /// Random features approximation of the Gram matrix at `x` points
    pub fn compute_kernel(&self, x: &ArrayView2<F>) -> Result<Array2<F>> {
        fitted_model(&self.mapper, "FourierFeatureMapper")?.compute_kernel(x)
    }
}
