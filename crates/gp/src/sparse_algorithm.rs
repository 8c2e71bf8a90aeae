use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::sparse_parameters::{Inducings, SgpParams, SgpValidParams, SolveStrategy, SparseMethod};
use crate::surrogates::GpSurrogate;
use crate::utils::{check_dim, check_inputs, check_training_data, cholesky_lower, lower_inverse};
use linfa::prelude::{DatasetBase, Fit, Float, PredictInplace};
use linfa_linalg::triangular::*;
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix1, Ix2, Zip};
use ndarray_rand::rand::seq::SliceRandom;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use log::{debug, info, warn};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "persistent")]
use std::fs;
#[cfg(feature = "persistent")]
use std::io::Write;
use std::time::Instant;

/// Woodbury data computed during training and used for prediction
///
/// Name came from [Woodbury matrix identity](https://en.wikipedia.org/wiki/Woodbury_matrix_identity)
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
#[derive(Clone, Debug)]
pub(crate) struct WoodburyData<F: Float> {
    /// Weights of the inducing points covariances in the predictive mean (nz, 1)
    vec: Array2<F>,
    /// Matrix of the quadratic form removed from the prior variance (nz, nz)
    inv: Array2<F>,
}

/// Sparse gaussian process considers a set of `M` inducing points to build the Nyström
/// low-rank approximation `K ≈ Knm Kmm^-1 Kmn` of the `N x N` covariance matrix.
///
/// The regularized system `(noise I + Knm Kmm^-1 Kmn)^-1` is solved with the
/// Woodbury identity
///
/// `(noise I + Knm Kmm^-1 Kmn)^-1 = noise^-1 (I - Knm (noise Kmm + Kmn Knm)^-1 Kmn)`
///
/// where only `M x M` matrices are factorized. With `M < N`, we get `O(NM^2)` complexity
/// instead of `O(N^3)` in time processing and `O(NM)` instead of `O(N^2)` in memory space.
///
/// # Implementation
///
/// [`SparseGaussianProcess`] inducing points definition can be either random or provided by the user through
/// the [`Inducings`] specification. The used sparse method is specified with the [`SparseMethod`]:
/// the default DTC method is the plain Nyström regression, FITC corrects the diagonal of the
/// low-rank covariance and VFE only differs from DTC by its likelihood.
/// Hyperparameters (kernel, noise variance) are given, not estimated.
///
/// # Example
///
/// ```
/// use ndarray::{Array, Axis};
/// use ndarray_rand::rand::SeedableRng;
/// use ndarray_rand::RandomExt;
/// use ndarray_rand::rand_distr::{Normal, Uniform};
/// use linfa::prelude::{Dataset, Fit};
/// use rand_xoshiro::Xoshiro256Plus;
///
/// use lowrank_gp::{Inducings, Kernel, SparseGaussianProcess};
///
/// let mut rng = Xoshiro256Plus::seed_from_u64(42);
/// let xt = Array::random_using((500, 1), Uniform::new(-3., 3.), &mut rng);
/// let noise = Array::random_using(500, Normal::new(0., 0.1).unwrap(), &mut rng);
/// let yt = xt.column(0).mapv(f64::sin) + noise;
///
/// let sgp = SparseGaussianProcess::params(Kernel::rbf(1.), Inducings::Randomized(30))
///     .noise_variance(0.01)
///     .seed(Some(42))
///     .fit(&Dataset::new(xt, yt))
///     .expect("SGP fitted");
///
/// let x = Array::linspace(-2.5, 2.5, 50).insert_axis(Axis(1));
/// let (mean, var) = sgp.predict_valvar(&x).expect("SGP prediction");
/// let err = (&mean - &x.column(0).mapv(f64::sin)).mapv(f64::abs);
/// assert!(err.iter().all(|e| *e < 0.1));
/// assert!(var.iter().all(|v| *v >= 0. && *v < 0.1));
/// ```
///
/// # Reference
///
/// Joaquin Quiñonero-Candela and Carl Edward Rasmussen.
/// [A Unifying View of Sparse Approximate Gaussian Process Regression](https://www.jmlr.org/papers/volume6/quinonero-candela05a/quinonero-candela05a.pdf).
/// Journal of Machine Learning Research 6 (2005), 1939-1959.
///
/// Matthias Bauer, Mark van der Wilk, and Carl Edward Rasmussen.
/// [Understanding Probabilistic Sparse Gaussian Process Approximations](https://arxiv.org/pdf/1606.04820.pdf).
/// In: Advances in Neural Information Processing Systems. Ed. by D. Lee et al. Vol. 29. Curran Associates, Inc., 2016
///
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct SparseGaussianProcess<F: Float> {
    /// Covariance kernel
    kernel: Kernel<F>,
    /// Sparse method used
    method: SparseMethod,
    /// Gaussian noise variance
    noise: F,
    /// Reduced log marginal likelihood
    likelihood: F,
    /// Inducing points
    inducings: Array2<F>,
    /// Lower Cholesky factor of Kmm + jitter I
    kmm_chol: Array2<F>,
    /// Data used for prediction
    w_data: WoodburyData<F>,
    /// Input dimension and number of training points
    dims: (usize, usize),
    /// Parameters used to fit this model
    params: SgpValidParams<F>,
}

impl<F: Float> fmt::Display for SparseGaussianProcess<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SGP(kernel={}, method={:?}, inducings={}, noise variance={}, likelihood={})",
            self.kernel,
            self.method,
            self.inducings.nrows(),
            self.noise,
            self.likelihood
        )
    }
}

impl<F: Float> SparseGaussianProcess<F> {
    /// Sgp parameters contructor
    pub fn params(kernel: Kernel<F>, inducings: Inducings<F>) -> SgpParams<F> {
        SgpParams::new(kernel, inducings)
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n scalar output values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        check_dim(x, self.dims.0)?;
        let kx = self.kernel.matrix(x, &self.inducings)?;
        let mu = kx.dot(&self.w_data.vec).remove_axis(Axis(1));
        Ok(mu)
    }

    /// Predict latent variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n variance values as a vector (n,).
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        check_dim(x, self.dims.0)?;
        let kx = self.kernel.matrix(&self.inducings, x)?;
        let kxx = self.kernel.diag(x);
        let var = kxx - (self.w_data.inv.t().dot(&kx) * &kx).sum_axis(Axis(0));
        Ok(var.mapv(|v| v.max(F::zero())))
    }

    /// Predict both output values and latent variances at n given `x` points.
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        Ok((self.predict(x)?, self.predict_var(x)?))
    }

    /// Nyström approximation `Kxz Kzz^-1 Kzx` of the Gram matrix at given `x` points,
    /// where `Kzz` includes the jitter.
    pub fn compute_kernel(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        check_dim(x, self.dims.0)?;
        let kzx = self.kernel.matrix(&self.inducings, x)?;
        let v = self.kmm_chol.solve_triangular(&kzx, UPLO::Lower)?;
        Ok(v.t().dot(&v))
    }

    /// Covariance kernel
    pub fn kernel(&self) -> &Kernel<F> {
        &self.kernel
    }

    /// Sparse method
    pub fn method(&self) -> SparseMethod {
        self.method
    }

    /// Noise variance
    pub fn noise_variance(&self) -> F {
        self.noise
    }

    /// Reduced log marginal likelihood (constant term ignored)
    pub fn likelihood(&self) -> F {
        self.likelihood
    }

    /// Inducing points
    pub fn inducings(&self) -> &Array2<F> {
        &self.inducings
    }

    /// Retrieve input dimension and number of training points
    pub fn dims(&self) -> (usize, usize) {
        self.dims
    }

    /// Parameters used to fit this model
    pub fn params_used(&self) -> &SgpValidParams<F> {
        &self.params
    }
}

#[cfg(feature = "persistent")]
impl<F: Float + Serialize + for<'de> Deserialize<'de>> SparseGaussianProcess<F> {
    /// Save SGP model in given file as json.
    pub fn save(&self, path: &str) -> Result<()> {
        let mut file = fs::File::create(path)?;
        let bytes = serde_json::to_vec(self)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Load SGP model from given json file.
    pub fn load(path: &str) -> Result<Box<Self>> {
        let data = fs::read(path)?;
        let sgp = serde_json::from_slice(&data)?;
        Ok(Box::new(sgp))
    }
}

impl<F: Float> GpSurrogate<F> for SparseGaussianProcess<F> {
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

impl<F, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for SparseGaussianProcess<F>
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

        let values = self.predict(x).expect("SGP Prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError>
    for SgpValidParams<F>
{
    type Object = SparseGaussianProcess<F>;

    /// Fit SGP with given hyperparameters
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let xtrain = dataset.records();
        let ytrain = dataset.targets();
        check_training_data(xtrain, ytrain)?;

        let z = match self.inducings() {
            Inducings::Randomized(n) => {
                let mut rng = match self.seed() {
                    Some(seed) => Xoshiro256Plus::seed_from_u64(*seed),
                    None => Xoshiro256Plus::from_entropy(),
                };
                make_inducings(*n, &xtrain.view(), &mut rng)?
            }
            Inducings::Located(z) => {
                if self.seed().is_some() {
                    warn!("Inducing points are given, random seed is not used");
                }
                check_inputs(z)?;
                check_dim(z, xtrain.ncols())?;
                z.to_owned()
            }
        };

        let now = Instant::now();
        let ytrain = ytrain.to_owned().insert_axis(Axis(1));
        let (likelihood, w_data, kmm_chol) =
            self.reduced_likelihood(&xtrain.view(), &ytrain.view(), &z)?;
        debug!(
            "SGP {:?} fit with {} inducing points ({:?} solve) elapsed = {:?}",
            self.method(),
            z.nrows(),
            self.solver(),
            now.elapsed()
        );
        info!("SGP fitted: likelihood = {likelihood}");

        Ok(SparseGaussianProcess {
            kernel: self.kernel().clone(),
            method: self.method(),
            noise: self.noise_variance(),
            likelihood,
            inducings: z,
            kmm_chol,
            w_data,
            dims: (xtrain.ncols(), xtrain.nrows()),
            params: self.clone(),
        })
    }
}

impl<F: Float> SgpValidParams<F> {
    /// Compute reduced likelihood and prediction data.
    ///
    /// The training covariance is approximated by `Qnn + Λ` where `Qnn = Knm Kmm^-1 Kmn` and
    /// `Λ = noise I` (DTC, VFE) or `Λ = diag(Knn - Qnn) + noise I` (FITC).
    fn reduced_likelihood(
        &self,
        xtrain: &ArrayView2<F>,
        ytrain: &ArrayView2<F>,
        z: &Array2<F>,
    ) -> Result<(F, WoodburyData<F>, Array2<F>)> {
        let kernel = self.kernel();
        let noise = self.noise_variance();
        let nz = z.nrows();

        let kmm = kernel.matrix(z, z)? + Array2::<F>::eye(nz) * self.jitter();
        let kmn = kernel.matrix(z, xtrain)?;

        // Compute (lower) Cholesky decomposition: Kmm = U U^T
        let u = cholesky_lower(&kmm, "Kmm + jitter I")?;

        // Compute cholesky decomposition: Qnn = V^T V
        let ui = lower_inverse(&u)?;
        let v = ui.dot(&kmn);

        // Diagonal of the training covariance not captured by the low-rank part
        let knn = kernel.diag(xtrain);
        let qnn = (v.to_owned() * &v).sum_axis(Axis(0));
        let residual = (knn - &qnn).mapv(|r| r.max(F::zero()));

        let nu = match self.method() {
            SparseMethod::Fitc => residual.mapv(|r| r + noise),
            SparseMethod::Dtc | SparseMethod::Vfe => Array1::from_elem(xtrain.nrows(), noise),
        };

        let (mut likelihood, w_data) = match self.solver() {
            SolveStrategy::Woodbury => woodbury_solve(&ui, &v, &nu, ytrain)?,
            SolveStrategy::Direct => direct_solve(&ui, &v, &nu, ytrain)?,
        };

        if self.method() == SparseMethod::Vfe {
            // Variational trace penalty -1/2 noise^-1 tr(Knn - Qnn)
            likelihood -= F::cast(0.5) * residual.sum() / noise;
        }

        Ok((likelihood, w_data, u))
    }
}

/// Solve with the Woodbury identity, only (nz, nz) matrices are factorized.
/// `ui` is the inverse of Kmm Cholesky factor, `v = ui Kmn` and `nu` the diagonal of Λ.
fn woodbury_solve<F: Float>(
    ui: &Array2<F>,
    v: &Array2<F>,
    nu: &Array1<F>,
    ytrain: &ArrayView2<F>,
) -> Result<(F, WoodburyData<F>)> {
    let nz = v.nrows();
    // Compute beta, the effective noise precision
    let beta = nu.mapv(|n| F::one() / n);

    // Compute (lower) Cholesky decomposition: A = I + V diag(beta) V^T = L L^T
    let v_beta = v.to_owned() * beta.to_owned().insert_axis(Axis(0));
    let a = Array2::<F>::eye(nz) + v_beta.dot(&v.t());
    let l = cholesky_lower(&a, "I + V diag(beta) V^T")?;
    let li = lower_inverse(&l)?;

    // Compute beta y and b
    let by = ytrain.to_owned() * beta.insert_axis(Axis(1));
    let b = li.dot(v).dot(&by);

    // Compute marginal log-likelihood
    // constant term ignored in reduced likelihood
    let term1 = nu.mapv(|n| n.ln()).sum();
    let term2 = F::cast(2.) * l.diag().mapv(|d| d.ln()).sum();
    let term3 = by.t().dot(ytrain)[[0, 0]];
    let term4 = -(b.to_owned() * &b).sum();
    let likelihood = -F::cast(0.5) * (term1 + term2 + term3 + term4);

    // Store Woodbury vectors for prediction step
    let li_ui = li.dot(ui);
    let li_ui_t = li_ui.t();
    let w_data = WoodburyData {
        vec: li_ui_t.dot(&b),
        inv: (ui.t()).dot(ui) - li_ui_t.dot(&li_ui),
    };

    Ok((likelihood, w_data))
}

/// Solve by factorizing the (n, n) matrix `Qnn + Λ = V^T V + diag(nu)`
fn direct_solve<F: Float>(
    ui: &Array2<F>,
    v: &Array2<F>,
    nu: &Array1<F>,
    ytrain: &ArrayView2<F>,
) -> Result<(F, WoodburyData<F>)> {
    let c = v.t().dot(v) + Array2::from_diag(nu);
    let lc = cholesky_lower(&c, "Qnn + noise I")?;

    let ly = lc.solve_triangular(ytrain, UPLO::Lower)?;
    let alpha = lc.t().solve_triangular(&ly, UPLO::Upper)?;

    let likelihood = -F::cast(0.5) * ly.mapv(|v| v * v).sum() - lc.diag().mapv(|d| d.ln()).sum();

    // Knm Kmm^-1 = V^T ui, then Kmm^-1 - Sigma = Kmm^-1 Kmn (Qnn + Λ)^-1 Knm Kmm^-1
    let w = lc.solve_triangular(&v.t().dot(ui), UPLO::Lower)?;
    let w_data = WoodburyData {
        vec: ui.t().dot(&v.dot(&alpha)),
        inv: w.t().dot(&w),
    };

    Ok((likelihood, w_data))
}

/// Select `n_inducing` distinct rows of `xt` at random.
///
/// Fails when more inducing points than training points are requested.
fn make_inducings<F: Float>(
    n_inducing: usize,
    xt: &ArrayView2<F>,
    rng: &mut Xoshiro256Plus,
) -> Result<Array2<F>> {
    if n_inducing > xt.nrows() {
        return Err(GpError::InvalidHyperparameter(format!(
            "{} inducing points requested, only {} training points available",
            n_inducing,
            xt.nrows()
        )));
    }
    let mut indices = (0..xt.nrows()).collect::<Vec<_>>();
    indices.shuffle(rng);
    let mut z = Array2::zeros((n_inducing, xt.ncols()));
    let idx = indices[..n_inducing].to_vec();
    Zip::from(z.rows_mut())
        .and(&Array1::from_vec(idx))
        .for_each(|mut zi, i| zi.assign(&xt.row(*i)));
    Ok(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GaussianProcess;

    use approx::assert_abs_diff_eq;
    use linfa::prelude::Dataset;
    use ndarray::{array, Array};
    use ndarray_rand::rand_distr::{Normal, Uniform};
    use ndarray_rand::RandomExt;
    use paste::paste;

    const PI: f64 = std::f64::consts::PI;

    fn f_obj(x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        x.mapv(|v| (3. * PI * v).sin() + 0.3 * (9. * PI * v).cos() + 0.5 * (7. * PI * v).sin())
    }

    fn make_test_data(
        nt: usize,
        eta2: f64,
        rng: &mut Xoshiro256Plus,
    ) -> (Array2<f64>, Array1<f64>) {
        let normal = Normal::new(0., eta2.sqrt()).unwrap();
        let gaussian_noise = Array::<f64, _>::random_using((nt, 1), normal, rng);
        let xt = 2. * Array::<f64, _>::random_using((nt, 1), Uniform::new(0., 1.), rng) - 1.;
        let yt = f_obj(&xt) + gaussian_noise;
        (xt, yt.remove_axis(Axis(1)))
    }

    fn relative_error(actual: &Array1<f64>, expected: &Array1<f64>) -> f64 {
        let diff = actual - expected;
        diff.dot(&diff).sqrt() / expected.dot(expected).sqrt()
    }

    #[test]
    fn test_sgp_default() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let nt = 200;
        let eta2: f64 = 0.01;
        let (xt, yt) = make_test_data(nt, eta2, &mut rng);

        let xplot = Array::linspace(-1.0, 1.0, 100).insert_axis(Axis(1));
        let n_inducings = 60;

        let inducings = Inducings::Randomized(n_inducings);
        let sgp = SparseGaussianProcess::params(Kernel::rbf(0.1), inducings)
            .noise_variance(eta2)
            .seed(Some(42))
            .fit(&Dataset::new(xt, yt))
            .expect("SGP fitted");
        assert_eq!(sgp.inducings().nrows(), n_inducings);
        assert_eq!(sgp.dims(), (1, nt));

        let sgp_vals = sgp.predict(&xplot).unwrap();
        let yplot = f_obj(&xplot).remove_axis(Axis(1));
        let rmse = (yplot - &sgp_vals).mapv(|v| v * v).mean().unwrap().sqrt();
        assert!(rmse < 0.2, "rmse = {rmse}");
        let sgp_vars = sgp.predict_var(&xplot).unwrap();
        assert!(sgp_vars.iter().all(|v| *v >= 0. && *v <= 1.));
    }

    #[test]
    fn test_inducings_seeded_selection() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let (xt, yt) = make_test_data(50, 0.01, &mut rng);
        let fit = |seed| {
            SparseGaussianProcess::params(Kernel::rbf(0.1), Inducings::Randomized(10))
                .seed(Some(seed))
                .fit(&Dataset::new(xt.clone(), yt.clone()))
                .expect("SGP fitted")
        };
        let (sgp1, sgp2) = (fit(7), fit(7));
        assert_eq!(sgp1.inducings(), sgp2.inducings());
        assert_eq!(sgp1.predict(&xt).unwrap(), sgp2.predict(&xt).unwrap());
        // rows of the training set, without replacement
        let mut picked = sgp1.inducings().column(0).to_vec();
        picked.sort_by(|a, b| a.partial_cmp(b).unwrap());
        picked.dedup();
        assert_eq!(picked.len(), 10);
        assert!(picked.iter().all(|z| xt.column(0).iter().any(|x| x == z)));
    }

    macro_rules! test_sgp_converges_to_exact {
        ($method:ident, $kind:ident, $solver:ident) => {
            paste! {
                #[test]
                fn [<test_ $method:snake _ $kind:snake _ $solver:snake _converges_to_exact_gp>]() {
                    let mut rng = Xoshiro256Plus::seed_from_u64(42);
                    let (xt, yt) = make_test_data(20, 0.1, &mut rng);
                    let kernel = Kernel::new(crate::KernelKind::$kind, 0.3).with_variance(1.5);
                    let xtest = Array::linspace(-0.9, 0.9, 25).insert_axis(Axis(1));

                    let gp = GaussianProcess::params(kernel.clone())
                        .noise_variance(0.1)
                        .jitter(0.)
                        .fit(&Dataset::new(xt.clone(), yt.clone()))
                        .expect("GP fitted");
                    let sgp = SparseGaussianProcess::params(kernel, Inducings::Located(xt.clone()))
                        .noise_variance(0.1)
                        .sparse_method(SparseMethod::$method)
                        .solver(SolveStrategy::$solver)
                        .fit(&Dataset::new(xt, yt))
                        .expect("SGP fitted");

                    let (gp_mean, gp_var) = gp.predict_valvar(&xtest).unwrap();
                    let (sgp_mean, sgp_var) = sgp.predict_valvar(&xtest).unwrap();
                    assert!(relative_error(&sgp_mean, &gp_mean) < 1e-3);
                    assert_abs_diff_eq!(sgp_var, gp_var, epsilon = 1e-3);
                }
            }
        };
    }

    test_sgp_converges_to_exact!(Dtc, SquaredExponential, Woodbury);
    test_sgp_converges_to_exact!(Dtc, AbsoluteExponential, Woodbury);
    test_sgp_converges_to_exact!(Fitc, SquaredExponential, Woodbury);
    test_sgp_converges_to_exact!(Vfe, AbsoluteExponential, Woodbury);
    test_sgp_converges_to_exact!(Dtc, SquaredExponential, Direct);
    test_sgp_converges_to_exact!(Fitc, AbsoluteExponential, Direct);
    test_sgp_converges_to_exact!(Vfe, SquaredExponential, Direct);

    macro_rules! test_woodbury_vs_direct {
        ($method:ident) => {
            paste! {
                #[test]
                fn [<test_woodbury_vs_direct_ $method:snake>]() {
                    let mut rng = Xoshiro256Plus::seed_from_u64(3);
                    let (xt, yt) = make_test_data(60, 0.01, &mut rng);
                    let xtest = Array::linspace(-1., 1., 30).insert_axis(Axis(1));
                    let inducings = Inducings::Randomized(12);
                    let params = SparseGaussianProcess::params(Kernel::rbf(0.1), inducings)
                        .noise_variance(0.05)
                        .sparse_method(SparseMethod::$method)
                        .seed(Some(11));

                    let fast = params
                        .clone()
                        .fit(&Dataset::new(xt.clone(), yt.clone()))
                        .expect("SGP fitted");
                    let slow = params
                        .solver(SolveStrategy::Direct)
                        .fit(&Dataset::new(xt, yt))
                        .expect("SGP fitted");

                    assert_eq!(fast.inducings(), slow.inducings());
                    let (fast_mean, fast_var) = fast.predict_valvar(&xtest).unwrap();
                    let (slow_mean, slow_var) = slow.predict_valvar(&xtest).unwrap();
                    assert_abs_diff_eq!(fast_mean, slow_mean, epsilon = 1e-6);
                    assert_abs_diff_eq!(fast_var, slow_var, epsilon = 1e-6);
                    assert_abs_diff_eq!(fast.likelihood(), slow.likelihood(), epsilon = 1e-5);
                }
            }
        };
    }

    test_woodbury_vs_direct!(Dtc);
    test_woodbury_vs_direct!(Fitc);
    test_woodbury_vs_direct!(Vfe);

    #[test]
    fn test_vfe_likelihood_lower_than_dtc() {
        let mut rng = Xoshiro256Plus::seed_from_u64(5);
        let (xt, yt) = make_test_data(80, 0.01, &mut rng);
        let params = SparseGaussianProcess::params(Kernel::rbf(0.1), Inducings::Randomized(8))
            .seed(Some(5));
        let dtc = params
            .clone()
            .fit(&Dataset::new(xt.clone(), yt.clone()))
            .expect("SGP fitted");
        let vfe = params
            .sparse_method(SparseMethod::Vfe)
            .fit(&Dataset::new(xt.clone(), yt))
            .expect("SGP fitted");
        assert!(vfe.likelihood() < dtc.likelihood());
        assert_abs_diff_eq!(
            vfe.predict(&xt).unwrap(),
            dtc.predict(&xt).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_compute_kernel_nystrom() {
        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        let x = Array::random_using((10, 2), Uniform::new(0., 1.), &mut rng);
        let y = Array1::<f64>::zeros(10);
        let kernel = Kernel::rbf(0.5);
        let exact = kernel.matrix(&x, &x).unwrap();

        let sgp = SparseGaussianProcess::params(kernel.clone(), Inducings::Located(x.clone()))
            .jitter(1e-8)
            .fit(&Dataset::new(x.clone(), y.clone()))
            .expect("SGP fitted");
        assert_abs_diff_eq!(sgp.compute_kernel(&x).unwrap(), exact, epsilon = 1e-5);

        let sgp = SparseGaussianProcess::params(kernel, Inducings::Randomized(5))
            .seed(Some(0))
            .fit(&Dataset::new(x.clone(), y))
            .expect("SGP fitted");
        let nystrom = sgp.compute_kernel(&x).unwrap();
        assert_abs_diff_eq!(nystrom, nystrom.t(), epsilon = 1e-12);
        // low-rank approximation from below on the diagonal
        assert!(Zip::from(&nystrom.diag())
            .and(&exact.diag())
            .all(|a, e| *a <= *e + 1e-9));
    }

    #[test]
    fn test_invalid_inducings() {
        let xt = array![[0.], [1.], [2.]];
        let yt = array![0., 1., 2.];
        let res = SparseGaussianProcess::params(Kernel::rbf(1.), Inducings::Randomized(0))
            .fit(&Dataset::new(xt.clone(), yt.clone()));
        assert!(matches!(res, Err(GpError::InvalidHyperparameter(_))));

        let res = SparseGaussianProcess::params(Kernel::rbf(1.), Inducings::Randomized(4))
            .fit(&Dataset::new(xt.clone(), yt.clone()));
        assert!(matches!(res, Err(GpError::InvalidHyperparameter(_))));

        let inducings = Inducings::Located(array![[0., 1.]]);
        let res = SparseGaussianProcess::params(Kernel::rbf(1.), inducings)
            .fit(&Dataset::new(xt.clone(), yt.clone()));
        assert!(matches!(res, Err(GpError::DimensionMismatch(_))));

        let inducings = Inducings::Located(array![[0.], [0.]]);
        let res = SparseGaussianProcess::params(Kernel::rbf(1.), inducings)
            .jitter(0.)
            .fit(&Dataset::new(xt.clone(), yt.clone()));
        assert!(matches!(res, Err(GpError::SingularMatrix(_))));

        let sgp = SparseGaussianProcess::params(Kernel::rbf(1.), Inducings::Randomized(2))
            .fit(&Dataset::new(xt, yt))
            .expect("SGP fitted");
        assert!(matches!(
            sgp.predict(&array![[0., 1.]]),
            Err(GpError::DimensionMismatch(_))
        ));
    }

    #[cfg(feature = "persistent")]
    #[test]
    fn test_save_load() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let (xt, yt) = make_test_data(50, 0.01, &mut rng);
        let sgp = SparseGaussianProcess::params(Kernel::rbf(0.1), Inducings::Randomized(10))
            .seed(Some(42))
            .fit(&Dataset::new(xt.clone(), yt))
            .expect("SGP fitted");
        let test_dir = "target/tests";
        std::fs::create_dir_all(test_dir).ok();
        let file_path = format!("{test_dir}/sgp.json");
        sgp.save(&file_path).expect("SGP saved");
        let loaded = SparseGaussianProcess::<f64>::load(&file_path).expect("SGP loaded");
        assert_abs_diff_eq!(
            sgp.predict(&xt).unwrap(),
            loaded.predict(&xt).unwrap(),
            epsilon = 1e-12
        );
    }
}
