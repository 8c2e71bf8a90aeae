use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::parameters::{GP_DEFAULT_JITTER, GP_DEFAULT_NOISE};
use linfa::{Float, ParamGuard};
use ndarray::Array2;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// SGP inducing points specification
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
#[non_exhaustive]
pub enum Inducings<F: Float> {
    /// `usize` points are selected randomly (without replacement) in the training dataset
    Randomized(usize),
    /// Points are given as a (npoints, nx) matrix
    Located(Array2<F>),
}
impl<F: Float> Default for Inducings<F> {
    fn default() -> Inducings<F> {
        Self::Randomized(10)
    }
}

impl<F: Float> Inducings<F> {
    /// Number of inducing points
    pub fn len(&self) -> usize {
        match self {
            Inducings::Randomized(n) => *n,
            Inducings::Located(z) => z.nrows(),
        }
    }

    /// Whether no inducing point is specified
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// SGP algorithm method specification
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum SparseMethod {
    #[default]
    /// Deterministic Training Conditional (a.k.a. projected process or Nyström regression)
    Dtc,
    /// Fully Independent Training Conditional method
    Fitc,
    /// Variational Free Energy method
    Vfe,
}

/// Strategy used to solve the regularized low-rank system at training time
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum SolveStrategy {
    /// Woodbury identity: only (M, M) matrices are factorized, `O(NM^2)`
    #[default]
    Woodbury,
    /// The (N, N) low-rank regularized covariance is formed and factorized, `O(N^3)`.
    /// Only meant for small datasets and cross-checking.
    Direct,
}

/// A set of validated SGP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct SgpValidParams<F: Float> {
    /// Covariance kernel
    kernel: Kernel<F>,
    /// Gaussian homoscedastic noise variance
    noise: F,
    /// Inducing points
    z: Inducings<F>,
    /// Method
    method: SparseMethod,
    /// Solve strategy
    solver: SolveStrategy,
    /// Jitter added to Kmm diagonal
    jitter: F,
    /// Random generator seed
    seed: Option<u64>,
}

impl<F: Float> Default for SgpValidParams<F> {
    fn default() -> SgpValidParams<F> {
        SgpValidParams {
            kernel: Kernel::default(),
            noise: F::cast(GP_DEFAULT_NOISE),
            z: Inducings::default(),
            method: SparseMethod::default(),
            solver: SolveStrategy::default(),
            jitter: F::cast(GP_DEFAULT_JITTER),
            seed: None,
        }
    }
}

impl<F: Float> SgpValidParams<F> {
    /// Get covariance kernel k(x, x')
    pub fn kernel(&self) -> &Kernel<F> {
        &self.kernel
    }

    /// Get noise variance
    pub fn noise_variance(&self) -> F {
        self.noise
    }

    /// Get inducing points
    pub fn inducings(&self) -> &Inducings<F> {
        &self.z
    }

    /// Get used sparse method
    pub fn method(&self) -> SparseMethod {
        self.method
    }

    /// Get solve strategy
    pub fn solver(&self) -> SolveStrategy {
        self.solver
    }

    /// Get jitter
    pub fn jitter(&self) -> F {
        self.jitter
    }

    /// Get seed
    pub fn seed(&self) -> Option<&u64> {
        self.seed.as_ref()
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [SGP algorithm](struct.SparseGaussianProcess.html).
pub struct SgpParams<F: Float>(SgpValidParams<F>);

impl<F: Float> SgpParams<F> {
    /// A constructor for SGP parameters given a kernel and inducing points
    pub fn new(kernel: Kernel<F>, inducings: Inducings<F>) -> SgpParams<F> {
        Self(SgpValidParams {
            kernel,
            z: inducings,
            ..Default::default()
        })
    }

    /// A constructor for SGP parameters from validated parameters
    pub fn new_from_valid(params: &SgpValidParams<F>) -> Self {
        Self(params.clone())
    }

    /// Set covariance kernel.
    pub fn kernel(mut self, kernel: Kernel<F>) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set noise variance (> 0).
    pub fn noise_variance(mut self, noise: F) -> Self {
        self.0.noise = noise;
        self
    }

    /// Specify the sparse method
    pub fn sparse_method(mut self, method: SparseMethod) -> Self {
        self.0.method = method;
        self
    }

    /// Specify the solve strategy
    pub fn solver(mut self, solver: SolveStrategy) -> Self {
        self.0.solver = solver;
        self
    }

    /// Specify nz inducing points as (nz, x_dim) matrix.
    pub fn inducings(mut self, z: Array2<F>) -> Self {
        self.0.z = Inducings::Located(z);
        self
    }

    /// Specify nz number of inducing points which will be picked randomly in the input training dataset.
    pub fn n_inducings(mut self, nz: usize) -> Self {
        self.0.z = Inducings::Randomized(nz);
        self
    }

    /// Set jitter (>= 0) added to the inducing points covariance diagonal.
    ///
    /// Jitter is used to improve numerical stability
    pub fn jitter(mut self, jitter: F) -> Self {
        self.0.jitter = jitter;
        self
    }

    /// Set random generator seed used to select inducing points.
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.0.seed = seed;
        self
    }
}

impl<F: Float> From<SgpValidParams<F>> for SgpParams<F> {
    fn from(valid: SgpValidParams<F>) -> Self {
        SgpParams(valid)
    }
}

impl<F: Float> ParamGuard for SgpParams<F> {
    type Checked = SgpValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        self.0.kernel.validate()?;
        if self.0.z.is_empty() {
            return Err(GpError::InvalidHyperparameter(
                "number of inducing points should be strictly positive".to_string(),
            ));
        }
        if !self.0.noise.is_finite() || self.0.noise <= F::zero() {
            return Err(GpError::InvalidHyperparameter(format!(
                "noise variance should be strictly positive, got {}",
                self.0.noise
            )));
        }
        if !self.0.jitter.is_finite() || self.0.jitter < F::zero() {
            return Err(GpError::InvalidHyperparameter(format!(
                "jitter should be positive or null, got {}",
                self.0.jitter
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_check_params() {
        let params = SgpParams::new(Kernel::rbf(1.), Inducings::Randomized(5));
        assert!(params.check_ref().is_ok());

        let params = SgpParams::new(Kernel::rbf(1.), Inducings::Randomized(0));
        assert!(matches!(
            params.check_ref(),
            Err(GpError::InvalidHyperparameter(_))
        ));

        let params = SgpParams::new(Kernel::rbf(1.), Inducings::Located(Array2::zeros((0, 1))));
        assert!(matches!(
            params.check_ref(),
            Err(GpError::InvalidHyperparameter(_))
        ));

        let params = SgpParams::new(Kernel::laplace(1.), Inducings::Located(array![[0.]]))
            .noise_variance(0.);
        assert!(matches!(
            params.check_ref(),
            Err(GpError::InvalidHyperparameter(_))
        ));

        let params = SgpParams::new(Kernel::laplace(1.), Inducings::default()).jitter(-1e-6);
        assert!(params.check().is_err());
    }
}
