use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::parameters::{GpParams, GpValidParams};
use crate::surrogates::GpSurrogate;
use crate::utils::{check_dim, check_training_data, cholesky_lower};

use linfa::prelude::{DatasetBase, Fit, Float, PredictInplace};
use linfa_linalg::triangular::*;
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix1, Ix2};

use log::debug;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "persistent")]
use std::fs;
#[cfg(feature = "persistent")]
use std::io::Write;
use std::time::Instant;

/// Exact gaussian process regression with given hyperparameters.
///
/// Training requires the Cholesky factorization of the (N, N) regularized covariance
/// matrix `K + (noise + jitter) I`, hence `O(N^3)` in time and `O(N^2)` in memory.
/// It is the reference the [`SparseGaussianProcess`](crate::SparseGaussianProcess) and
/// [`RffGaussianProcess`](crate::RffGaussianProcess) approximations are compared against
/// on moderate size datasets.
///
/// # Example
///
/// ```
/// use lowrank_gp::{GaussianProcess, Kernel};
/// use linfa::prelude::{Dataset, Fit};
/// use ndarray::{arr1, arr2, Array, Axis};
///
/// let xt = arr2(&[[0.0], [1.0], [2.0], [3.0], [4.0]]);
/// let yt = arr1(&[0.0, 1.0, 1.5, 0.9, 1.0]);
///
/// let gp = GaussianProcess::params(Kernel::rbf(1.0))
///     .noise_variance(1e-4)
///     .fit(&Dataset::new(xt, yt))
///     .expect("GP fitted");
///
/// let x = Array::linspace(0., 4., 20).insert_axis(Axis(1));
/// let (mean, var) = gp.predict_valvar(&x).expect("GP prediction");
/// assert_eq!(mean.len(), 20);
/// assert!(var.iter().all(|v| *v >= 0.));
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct GaussianProcess<F: Float> {
    /// Covariance kernel
    kernel: Kernel<F>,
    /// Gaussian noise variance
    noise: F,
    /// Reduced log marginal likelihood
    likelihood: F,
    /// Lower Cholesky factor of K + (noise + jitter) I
    k_chol: Array2<F>,
    /// Solution of (K + (noise + jitter) I) alpha = y
    alpha: Array1<F>,
    /// Training inputs
    xtrain: Array2<F>,
    /// Parameters used to fit this model
    params: GpValidParams<F>,
}

impl<F: Float> fmt::Display for GaussianProcess<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GP(kernel={}, noise variance={}, likelihood={})",
            self.kernel, self.noise, self.likelihood
        )
    }
}

impl<F: Float> GaussianProcess<F> {
    /// Gp parameters contructor
    pub fn params(kernel: Kernel<F>) -> GpParams<F> {
        GpParams::new(kernel)
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n scalar output values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        check_dim(x, self.xtrain.ncols())?;
        let kx = self.kernel.matrix(x, &self.xtrain)?;
        Ok(kx.dot(&self.alpha))
    }

    /// Predict latent variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n variance values as a vector (n,).
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        check_dim(x, self.xtrain.ncols())?;
        let kx = self.kernel.matrix(&self.xtrain, x)?;
        let v = self.k_chol.solve_triangular(&kx, UPLO::Lower)?;
        let var = self.kernel.diag(x) - v.mapv(|v| v * v).sum_axis(Axis(0));
        Ok(var.mapv(|v| v.max(F::zero())))
    }

    /// Predict both output values and latent variances at n given `x` points.
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        Ok((self.predict(x)?, self.predict_var(x)?))
    }

    /// Exact Gram matrix k(x, x)
    pub fn compute_kernel(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        check_dim(x, self.xtrain.ncols())?;
        self.kernel.matrix(x, x)
    }

    /// Covariance kernel
    pub fn kernel(&self) -> &Kernel<F> {
        &self.kernel
    }

    /// Noise variance
    pub fn noise_variance(&self) -> F {
        self.noise
    }

    /// Reduced log marginal likelihood (constant term ignored)
    pub fn likelihood(&self) -> F {
        self.likelihood
    }

    /// Retrieve input dimension and number of training points
    pub fn dims(&self) -> (usize, usize) {
        (self.xtrain.ncols(), self.xtrain.nrows())
    }

    /// Parameters used to fit this model
    pub fn params_used(&self) -> &GpValidParams<F> {
        &self.params
    }
}

#[cfg(feature = "persistent")]
impl<F: Float + Serialize + for<'de> Deserialize<'de>> GaussianProcess<F> {
    /// Save GP model in given file as json.
    pub fn save(&self, path: &str) -> Result<()> {
        let mut file = fs::File::create(path)?;
        let bytes = serde_json::to_vec(self)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Load GP model from given json file.
    pub fn load(path: &str) -> Result<Box<Self>> {
        let data = fs::read(path)?;
        let gp = serde_json::from_slice(&data)?;
        Ok(Box::new(gp))
    }
}

impl<F: Float> GpSurrogate<F> for GaussianProcess<F> {
    fn dims(&self) -> (usize, usize) {
        self.dims()
    }

    fn predict(&self, x: &ArrayView2<F>) -> Result<Array1<F>> {
        self.predict(x)
    }

    fn predict_var(&self, x: &ArrayView2<F>) -> Result<Array1<F>> {
        self.predict_var(x)
    }

    fn compute_kernel(&self, x: &ArrayView2<F>) -> Result<Array2<F>> {
        self.compute_kernel(x)
    }
}

impl<F, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for GaussianProcess<F>
where
    F: Float,
    D: Data<Elem = F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        let values = self.predict(x).expect("GP Prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError>
    for GpValidParams<F>
{
    type Object = GaussianProcess<F>;

    /// Fit GP with given hyperparameters
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = dataset.records();
        let y = dataset.targets();
        check_training_data(x, y)?;

        let now = Instant::now();
        let n = x.nrows();
        let k = self.kernel.matrix(x, x)? + Array2::<F>::eye(n) * (self.noise + self.jitter);
        let k_chol = cholesky_lower(&k, "K + noise I")?;

        let y2 = y.to_owned().insert_axis(Axis(1));
        let ly = k_chol.solve_triangular(&y2, UPLO::Lower)?;
        let alpha = k_chol
            .t()
            .solve_triangular(&ly, UPLO::Upper)?
            .remove_axis(Axis(1));

        // log p(y) = -1/2 y^T alpha - sum(log(diag(L))) (- n/2 log(2 pi) ignored)
        let likelihood =
            -F::cast(0.5) * ly.mapv(|v| v * v).sum() - k_chol.diag().mapv(|v| v.ln()).sum();
        debug!("GP fit elapsed = {:?}", now.elapsed());

        Ok(GaussianProcess {
            kernel: self.kernel.clone(),
            noise: self.noise,
            likelihood,
            k_chol,
            alpha,
            xtrain: x.to_owned(),
            params: self.clone(),
        })
    }
}
