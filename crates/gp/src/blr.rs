//! Bayesian linear regression on explicit features.
//!
//! Given a (n, m) feature matrix `phi`, a gaussian prior `w ~ N(0, S)` on the weights
//! and a gaussian noise of variance `noise`, the weights posterior is gaussian with
//! precision `A = phi^T phi / noise + S^-1`. `A` is factorized once at fit time.

use crate::errors::{GpError, Result};
use crate::parameters::GP_DEFAULT_NOISE;
use crate::utils::{check_dim, check_training_data, cholesky_lower, lower_inverse};
use linfa::prelude::{DatasetBase, Fit, Float};
use linfa::ParamGuard;
use linfa_linalg::triangular::*;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};

use log::debug;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Gaussian prior covariance of the regression weights
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub enum WeightPrior<F: Float> {
    /// `S = v I`
    Isotropic(F),
    /// Full (m, m) covariance matrix
    Full(Array2<F>),
}

impl<F: Float> Default for WeightPrior<F> {
    fn default() -> WeightPrior<F> {
        WeightPrior::Isotropic(F::one())
    }
}

/// A set of validated bayesian linear regression parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct BlrValidParams<F: Float> {
    prior: WeightPrior<F>,
    noise: F,
}

impl<F: Float> Default for BlrValidParams<F> {
    fn default() -> BlrValidParams<F> {
        BlrValidParams {
            prior: WeightPrior::default(),
            noise: F::cast(GP_DEFAULT_NOISE),
        }
    }
}

impl<F: Float> BlrValidParams<F> {
    /// Get weights prior
    pub fn prior(&self) -> &WeightPrior<F> {
        &self.prior
    }

    /// Get noise variance
    pub fn noise_variance(&self) -> F {
        self.noise
    }
}

/// The set of hyperparameters of the [bayesian linear regression](struct.BayesianLinearRegression.html).
#[derive(Clone, Debug, Default)]
pub struct BlrParams<F: Float>(BlrValidParams<F>);

impl<F: Float> BlrParams<F> {
    /// Default parameters: unit isotropic prior
    pub fn new() -> BlrParams<F> {
        Self::default()
    }

    /// Set isotropic prior `S = variance I` (variance > 0)
    pub fn prior_variance(mut self, variance: F) -> Self {
        self.0.prior = WeightPrior::Isotropic(variance);
        self
    }

    /// Set full (m, m) prior covariance, it has to be positive definite
    pub fn prior_covariance(mut self, covariance: Array2<F>) -> Self {
        self.0.prior = WeightPrior::Full(covariance);
        self
    }

    /// Set noise variance (> 0).
    pub fn noise_variance(mut self, noise: F) -> Self {
        self.0.noise = noise;
        self
    }
}

impl<F: Float> From<BlrValidParams<F>> for BlrParams<F> {
    fn from(valid: BlrValidParams<F>) -> Self {
        BlrParams(valid)
    }
}

impl<F: Float> ParamGuard for BlrParams<F> {
    type Checked = BlrValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if !self.0.noise.is_finite() || self.0.noise <= F::zero() {
            return Err(GpError::InvalidHyperparameter(format!(
                "noise variance should be strictly positive, got {}",
                self.0.noise
            )));
        }
        match &self.0.prior {
            WeightPrior::Isotropic(v) if !v.is_finite() || *v <= F::zero() => {
                Err(GpError::InvalidHyperparameter(format!(
                    "prior variance should be strictly positive, got {v}"
                )))
            }
            WeightPrior::Full(s) if !s.is_square() || s.is_empty() => {
                Err(GpError::InvalidHyperparameter(format!(
                    "prior covariance should be a non empty square matrix, got {:?}",
                    s.shape()
                )))
            }
            WeightPrior::Full(s) if s.iter().any(|v| !v.is_finite()) => {
                Err(GpError::InvalidHyperparameter(
                    "prior covariance contains NaN or infinite values".to_string(),
                ))
            }
            _ => Ok(&self.0),
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Fitted bayesian linear regression
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct BayesianLinearRegression<F: Float> {
    /// Posterior mean of the weights
    weights: Array1<F>,
    /// Lower Cholesky factor of the posterior precision A
    a_chol: Array2<F>,
    /// Noise variance
    noise: F,
    /// Reduced log marginal likelihood
    likelihood: F,
}

impl<F: Float> BayesianLinearRegression<F> {
    /// BLR parameters constructor
    pub fn params() -> BlrParams<F> {
        BlrParams::new()
    }

    /// Posterior mean of the weights
    pub fn weights(&self) -> &Array1<F> {
        &self.weights
    }

    /// Noise variance
    pub fn noise_variance(&self) -> F {
        self.noise
    }

    /// Reduced log marginal likelihood of the training outputs (constant term ignored)
    pub fn likelihood(&self) -> F {
        self.likelihood
    }

    /// Number of features
    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    /// Predictive mean `phi w` at (n, m) features `phi`
    pub fn predict(&self, phi: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        check_dim(phi, self.n_features())?;
        Ok(phi.dot(&self.weights))
    }

    /// Latent predictive variance `diag(phi A^-1 phi^T)` at (n, m) features `phi`
    pub fn predict_var(&self, phi: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        check_dim(phi, self.n_features())?;
        let v = self
            .a_chol
            .solve_triangular(&phi.t().to_owned(), UPLO::Lower)?;
        Ok(v.mapv(|v| v * v).sum_axis(Axis(0)))
    }
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError>
    for BlrValidParams<F>
{
    type Object = BayesianLinearRegression<F>;

    /// Compute the weights posterior given features as records and outputs as targets
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let phi = dataset.records();
        let y = dataset.targets();
        check_training_data(phi, y)?;
        let (n, m) = phi.dim();

        // Prior precision S^-1 and log |S|
        let (prior_precision, prior_logdet) = match &self.prior {
            WeightPrior::Isotropic(v) => (Array2::<F>::eye(m) / *v, F::cast(m) * v.ln()),
            WeightPrior::Full(s) => {
                if s.nrows() != m {
                    return Err(GpError::DimensionMismatch(format!(
                        "prior covariance is ({0}, {0}) but there are {m} features",
                        s.nrows()
                    )));
                }
                let ls = cholesky_lower(s, "prior covariance")?;
                let lsi = lower_inverse(&ls)?;
                (
                    lsi.t().dot(&lsi),
                    F::cast(2.) * ls.diag().mapv(|d| d.ln()).sum(),
                )
            }
        };

        let a = phi.t().dot(phi) / self.noise + prior_precision;
        let a_chol = cholesky_lower(&a, "posterior precision A")?;

        let rhs = phi.t().dot(y).insert_axis(Axis(1)) / self.noise;
        let u = a_chol.solve_triangular(&rhs, UPLO::Lower)?;
        let weights = a_chol
            .t()
            .solve_triangular(&u, UPLO::Upper)?
            .remove_axis(Axis(1));

        // log N(y | 0, phi S phi^T + noise I) with Woodbury identity and determinant lemma
        let quad = y.dot(y) / self.noise - u.mapv(|v| v * v).sum();
        let logdet = F::cast(2.) * a_chol.diag().mapv(|d| d.ln()).sum()
            + prior_logdet
            + F::cast(n) * self.noise.ln();
        let likelihood = -F::cast(0.5) * (quad + logdet);
        debug!("BLR fitted with {n} points and {m} features");

        Ok(BayesianLinearRegression {
            weights,
            a_chol,
            noise: self.noise,
            likelihood,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use linfa::prelude::Dataset;
    use ndarray::{array, Array};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_blr_is_gp_with_linear_kernel() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let phi = Array::random_using((20, 3), Uniform::new(-1., 1.), &mut rng);
        let eps = Array::random_using(20, Uniform::new(-0.1, 0.1), &mut rng);
        let y = phi.dot(&array![1., -2., 0.5]) + eps;
        let phi_test = Array::random_using((5, 3), Uniform::new(-1., 1.), &mut rng);
        let (s2, noise) = (2., 0.05);

        let blr = BayesianLinearRegression::params()
            .prior_variance(s2)
            .noise_variance(noise)
            .fit(&Dataset::new(phi.clone(), y.clone()))
            .expect("BLR fitted");

        // k(x, x') = s2 x.x'
        let k = phi.dot(&phi.t()) * s2 + Array2::<f64>::eye(20) * noise;
        let l = cholesky_lower(&k, "K").unwrap();
        let li = lower_inverse(&l).unwrap();
        let kinv = li.t().dot(&li);
        let ks = phi_test.dot(&phi.t()) * s2;
        let mean = ks.dot(&kinv).dot(&y);
        let cov = phi_test.dot(&phi_test.t()) * s2 - ks.dot(&kinv).dot(&ks.t());
        let var = cov.diag().to_owned();
        let likelihood = -0.5 * y.dot(&kinv).dot(&y) - l.diag().mapv(f64::ln).sum();

        assert_abs_diff_eq!(blr.predict(&phi_test).unwrap(), mean, epsilon = 1e-8);
        assert_abs_diff_eq!(blr.predict_var(&phi_test).unwrap(), var, epsilon = 1e-8);
        assert_abs_diff_eq!(blr.likelihood(), likelihood, epsilon = 1e-8);
    }

    #[test]
    fn test_full_prior() {
        let phi = array![[1., 0.], [0., 1.], [1., 1.]];
        let y = array![1., 2., 3.];
        let iso = BayesianLinearRegression::params()
            .prior_variance(0.5)
            .fit(&Dataset::new(phi.clone(), y.clone()))
            .expect("BLR fitted");
        let full = BayesianLinearRegression::params()
            .prior_covariance(Array2::<f64>::eye(2) * 0.5)
            .fit(&Dataset::new(phi.clone(), y.clone()))
            .expect("BLR fitted");
        assert_abs_diff_eq!(iso.weights(), full.weights(), epsilon = 1e-12);
        assert_abs_diff_eq!(iso.likelihood(), full.likelihood(), epsilon = 1e-12);

        let res = BayesianLinearRegression::params()
            .prior_covariance(array![[1., 1.], [1., 1.]])
            .fit(&Dataset::new(phi.clone(), y.clone()));
        assert!(matches!(res, Err(GpError::SingularMatrix(_))));

        let res = BayesianLinearRegression::params()
            .prior_covariance(Array2::<f64>::eye(3))
            .fit(&Dataset::new(phi.clone(), y.clone()));
        assert!(matches!(res, Err(GpError::DimensionMismatch(_))));

        let res = BayesianLinearRegression::params()
            .prior_variance(0.)
            .fit(&Dataset::new(phi, y));
        assert!(matches!(res, Err(GpError::InvalidHyperparameter(_))));
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let blr = BayesianLinearRegression::params()
            .fit(&Dataset::new(array![[1., 0.], [0., 1.]], array![1., 2.]))
            .expect("BLR fitted");
        assert!(matches!(
            blr.predict(&array![[1., 2., 3.]]),
            Err(GpError::DimensionMismatch(_))
        ));
    }
}
