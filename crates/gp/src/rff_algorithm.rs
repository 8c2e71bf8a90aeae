use crate::blr::{BayesianLinearRegression, BlrParams};
use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::rff::RandomFourierFeatures;
use crate::rff_parameters::{RffGpParams, RffGpValidParams};
use crate::surrogates::GpSurrogate;
use crate::utils::check_training_data;
use linfa::prelude::{Dataset, DatasetBase, Fit, Float, PredictInplace};
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Data, Ix1, Ix2};

use log::{debug, info};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "persistent")]
use std::fs;
#[cfg(feature = "persistent")]
use std::io::Write;
use std::time::Instant;

/// Gaussian process regression approximated with random Fourier features.
///
/// Inputs are mapped to `M` random Fourier features `phi(x)` such that
/// `k(x, x') ≈ s2 phi(x).phi(x')`, then a bayesian linear regression with weights prior
/// `N(0, s2 I)` is fitted in feature space. Training is `O(NM^2)` in time and `O(NM)`
/// in memory, prediction is `O(M^2)` per point.
///
/// # Example
///
/// ```
/// use ndarray::{Array, Axis};
/// use ndarray_rand::rand::SeedableRng;
/// use ndarray_rand::RandomExt;
/// use ndarray_rand::rand_distr::Uniform;
/// use linfa::prelude::{Dataset, Fit};
/// use rand_xoshiro::Xoshiro256Plus;
///
/// use lowrank_gp::{Kernel, RffGaussianProcess};
///
/// let mut rng = Xoshiro256Plus::seed_from_u64(0);
/// let xt = Array::random_using((200, 1), Uniform::new(-3., 3.), &mut rng);
/// let yt = xt.column(0).mapv(f64::sin);
///
/// let gp = RffGaussianProcess::params(Kernel::rbf(1.), 100)
///     .noise_variance(1e-3)
///     .seed(Some(0))
///     .fit(&Dataset::new(xt, yt))
///     .expect("RFF GP fitted");
///
/// let x = Array::linspace(-2., 2., 10).insert_axis(Axis(1));
/// let (_mean, var) = gp.predict_valvar(&x).expect("RFF GP prediction");
/// assert!(var.iter().all(|v| *v >= 0.));
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct RffGaussianProcess<F: Float> {
    /// Random features mapper
    mapper: RandomFourierFeatures<F>,
    /// Regression in feature space
    blr: BayesianLinearRegression<F>,
    /// Number of training points
    n_train: usize,
    /// Parameters used to fit this model
    params: RffGpValidParams<F>,
}

impl<F: Float> fmt::Display for RffGaussianProcess<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RffGP(kernel={}, features={}, noise variance={}, likelihood={})",
            self.params.kernel(),
            self.mapper.n_features(),
            self.blr.noise_variance(),
            self.blr.likelihood()
        )
    }
}

impl<F: Float> RffGaussianProcess<F> {
    /// RFF GP parameters constructor
    pub fn params(kernel: Kernel<F>, n_features: usize) -> RffGpParams<F> {
        RffGpParams::new(kernel, n_features)
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let phi = self.mapper.transform(x)?;
        self.blr.predict(&phi)
    }

    /// Predict latent variances at n given `x` points of nx components specified as a (n, nx) matrix.
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let phi = self.mapper.transform(x)?;
        self.blr.predict_var(&phi)
    }

    /// Predict both output values and latent variances, features are computed once.
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        let phi = self.mapper.transform(x)?;
        Ok((self.blr.predict(&phi)?, self.blr.predict_var(&phi)?))
    }

    /// Random features approximation of the Gram matrix at `x` points
    pub fn compute_kernel(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.mapper.compute_kernel(x)
    }

    /// Random features mapper
    pub fn mapper(&self) -> &RandomFourierFeatures<F> {
        &self.mapper
    }

    /// Regression in feature space
    pub fn regression(&self) -> &BayesianLinearRegression<F> {
        &self.blr
    }

    /// Reduced log marginal likelihood (constant term ignored)
    pub fn likelihood(&self) -> F {
        self.blr.likelihood()
    }

    /// Retrieve input dimension and number of training points
    pub fn dims(&self) -> (usize, usize) {
        (self.mapper.input_dim(), self.n_train)
    }

    /// Parameters used to fit this model
    pub fn params_used(&self) -> &RffGpValidParams<F> {
        &self.params
    }
}

#[cfg(feature = "persistent")]
impl<F: Float + Serialize + for<'de> Deserialize<'de>> RffGaussianProcess<F> {
    /// Save RFF GP model in given file as json.
    pub fn save(&self, path: &str) -> Result<()> {
        let mut file = fs::File::create(path)?;
        let bytes = serde_json::to_vec(self)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Load RFF GP model from given json file.
    pub fn load(path: &str) -> Result<Box<Self>> {
        let data = fs::read(path)?;
        let gp = serde_json::from_slice(&data)?;
        Ok(Box::new(gp))
    }
}

impl<F: Float> GpSurrogate<F> for RffGaussianProcess<F> {
    fn dims(&self) -> (usize, usize) {
        self.dims()
    }

    fn predict(&self, x: &ArrayView2<F>) -> Result<Array1<F>> {
        self.predict(x)
    }

    fn predict_var(&self, x: &ArrayView2<F>) -> Result<Array1<F>> {
        self.predict_var(x)
    }

    fn predict_valvar(&self, x: &ArrayView2<F>) -> Result<(Array1<F>, Array1<F>)> {
        self.predict_valvar(x)
    }

    fn compute_kernel(&self, x: &ArrayView2<F>) -> Result<Array2<F>> {
        self.compute_kernel(x)
    }
}

impl<F, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for RffGaussianProcess<F>
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

        let values = self.predict(x).expect("RFF GP Prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError>
    for RffGpValidParams<F>
{
    type Object = RffGaussianProcess<F>;

    /// Draw random features then fit the regression in feature space
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = dataset.records();
        let y = dataset.targets();
        check_training_data(x, y)?;

        let now = Instant::now();
        let mapper = self.mapper().fit(&DatasetBase::from(x.view()))?;
        let phi = mapper.transform(x)?;
        let blr = BlrParams::new()
            .prior_variance(self.kernel().variance())
            .noise_variance(self.noise_variance())
            .fit(&Dataset::new(phi, y.to_owned()))?;
        debug!(
            "RFF GP fit with {} features elapsed = {:?}",
            mapper.n_features(),
            now.elapsed()
        );
        info!("RFF GP fitted: likelihood = {}", blr.likelihood());

        Ok(RffGaussianProcess {
            mapper,
            blr,
            n_train: x.nrows(),
            params: self.clone(),
        })
    }
}
