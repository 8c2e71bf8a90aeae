use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use linfa::{Float, ParamGuard};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Default jitter added to the diagonal of covariance matrices before factorization
pub const GP_DEFAULT_JITTER: f64 = 1e-6;
/// Default variance of the gaussian noise on training outputs
pub const GP_DEFAULT_NOISE: f64 = 1e-2;

/// A set of validated exact GP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct GpValidParams<F: Float> {
    /// Covariance kernel
    pub(crate) kernel: Kernel<F>,
    /// Gaussian homoscedastic noise variance
    pub(crate) noise: F,
    /// Jitter added to the diagonal to improve numerical stability
    pub(crate) jitter: F,
}

impl<F: Float> Default for GpValidParams<F> {
    fn default() -> GpValidParams<F> {
        GpValidParams {
            kernel: Kernel::default(),
            noise: F::cast(GP_DEFAULT_NOISE),
            jitter: F::cast(GP_DEFAULT_JITTER),
        }
    }
}

impl<F: Float> GpValidParams<F> {
    /// Get covariance kernel k(x, x')
    pub fn kernel(&self) -> &Kernel<F> {
        &self.kernel
    }

    /// Get noise variance
    pub fn noise_variance(&self) -> F {
        self.noise
    }

    /// Get jitter
    pub fn jitter(&self) -> F {
        self.jitter
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [exact GP algorithm](struct.GaussianProcess.html).
///
/// Hyperparameters are given, not estimated.
pub struct GpParams<F: Float>(GpValidParams<F>);

impl<F: Float> GpParams<F> {
    /// A constructor for GP parameters given a covariance kernel
    pub fn new(kernel: Kernel<F>) -> GpParams<F> {
        Self(GpValidParams {
            kernel,
            ..Default::default()
        })
    }

    /// A constructor for GP parameters from validated parameters
    pub fn new_from_valid(params: &GpValidParams<F>) -> Self {
        Self(params.clone())
    }

    /// Set covariance kernel.
    pub fn kernel(mut self, kernel: Kernel<F>) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set noise variance (>= 0).
    pub fn noise_variance(mut self, noise: F) -> Self {
        self.0.noise = noise;
        self
    }

    /// Set jitter (>= 0).
    ///
    /// Jitter is used to improve numerical stability
    pub fn jitter(mut self, jitter: F) -> Self {
        self.0.jitter = jitter;
        self
    }
}

impl<F: Float> From<GpValidParams<F>> for GpParams<F> {
    fn from(valid: GpValidParams<F>) -> Self {
        GpParams(valid)
    }
}

impl<F: Float> ParamGuard for GpParams<F> {
    type Checked = GpValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        self.0.kernel.validate()?;
        if !self.0.noise.is_finite() || self.0.noise < F::zero() {
            return Err(GpError::InvalidHyperparameter(format!(
                "noise variance should be positive or null, got {}",
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
