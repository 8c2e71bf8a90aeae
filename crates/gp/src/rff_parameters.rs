use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::parameters::GP_DEFAULT_NOISE;
use linfa::{Float, ParamGuard};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Default number of random Fourier features
pub const RFF_DEFAULT_N_FEATURES: usize = 100;

fn check_rff<F: Float>(kernel: &Kernel<F>, n_features: usize) -> Result<()> {
    kernel.validate()?;
    if n_features == 0 {
        return Err(GpError::InvalidHyperparameter(
            "number of random features should be strictly positive".to_string(),
        ));
    }
    Ok(())
}

/// A set of validated random Fourier features mapper parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct RffValidParams<F: Float> {
    /// Shift-invariant kernel to approximate
    pub(crate) kernel: Kernel<F>,
    /// Number of random features
    pub(crate) n_features: usize,
    /// Random generator seed
    pub(crate) seed: Option<u64>,
}

impl<F: Float> Default for RffValidParams<F> {
    fn default() -> RffValidParams<F> {
        RffValidParams {
            kernel: Kernel::default(),
            n_features: RFF_DEFAULT_N_FEATURES,
            seed: None,
        }
    }
}

impl<F: Float> RffValidParams<F> {
    /// Get kernel
    pub fn kernel(&self) -> &Kernel<F> {
        &self.kernel
    }

    /// Get number of random features
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get seed
    pub fn seed(&self) -> Option<&u64> {
        self.seed.as_ref()
    }
}

/// The set of hyperparameters of the
/// [random Fourier features mapper](struct.RandomFourierFeatures.html).
#[derive(Clone, Debug)]
pub struct RffParams<F: Float>(RffValidParams<F>);

impl<F: Float> RffParams<F> {
    /// A constructor for RFF mapper parameters given the kernel to approximate
    /// and the number of random features
    pub fn new(kernel: Kernel<F>, n_features: usize) -> RffParams<F> {
        Self(RffValidParams {
            kernel,
            n_features,
            seed: None,
        })
    }

    /// Set kernel
    pub fn kernel(mut self, kernel: Kernel<F>) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set number of random features
    pub fn n_features(mut self, n_features: usize) -> Self {
        self.0.n_features = n_features;
        self
    }

    /// Set random generator seed used to draw frequencies and phases
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.0.seed = seed;
        self
    }
}

impl<F: Float> From<RffValidParams<F>> for RffParams<F> {
    fn from(valid: RffValidParams<F>) -> Self {
        RffParams(valid)
    }
}

impl<F: Float> ParamGuard for RffParams<F> {
    type Checked = RffValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        check_rff(&self.0.kernel, self.0.n_features)?;
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// A set of validated RFF gaussian process parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct RffGpValidParams<F: Float> {
    /// Random features mapper parameters
    pub(crate) mapper: RffValidParams<F>,
    /// Gaussian homoscedastic noise variance
    pub(crate) noise: F,
}

impl<F: Float> Default for RffGpValidParams<F> {
    fn default() -> RffGpValidParams<F> {
        RffGpValidParams {
            mapper: RffValidParams::default(),
            noise: F::cast(GP_DEFAULT_NOISE),
        }
    }
}

impl<F: Float> RffGpValidParams<F> {
    /// Get kernel
    pub fn kernel(&self) -> &Kernel<F> {
        &self.mapper.kernel
    }

    /// Get number of random features
    pub fn n_features(&self) -> usize {
        self.mapper.n_features
    }

    /// Get noise variance
    pub fn noise_variance(&self) -> F {
        self.noise
    }

    /// Get seed
    pub fn seed(&self) -> Option<&u64> {
        self.mapper.seed()
    }

    /// Get random features mapper parameters
    pub fn mapper(&self) -> &RffValidParams<F> {
        &self.mapper
    }
}

/// The set of hyperparameters of the
/// [RFF gaussian process](struct.RffGaussianProcess.html):
/// a random Fourier features mapper followed by a bayesian linear regression
/// with an isotropic weight prior of the kernel signal variance.
#[derive(Clone, Debug)]
pub struct RffGpParams<F: Float>(RffGpValidParams<F>);

impl<F: Float> RffGpParams<F> {
    /// A constructor for RFF GP parameters given the kernel to approximate
    /// and the number of random features
    pub fn new(kernel: Kernel<F>, n_features: usize) -> RffGpParams<F> {
        Self(RffGpValidParams {
            mapper: RffValidParams {
                kernel,
                n_features,
                seed: None,
            },
            ..Default::default()
        })
    }

    /// A constructor for RFF GP parameters from validated parameters
    pub fn new_from_valid(params: &RffGpValidParams<F>) -> Self {
        Self(params.clone())
    }

    /// Set kernel
    pub fn kernel(mut self, kernel: Kernel<F>) -> Self {
        self.0.mapper.kernel = kernel;
        self
    }

    /// Set number of random features
    pub fn n_features(mut self, n_features: usize) -> Self {
        self.0.mapper.n_features = n_features;
        self
    }

    /// Set noise variance (> 0).
    pub fn noise_variance(mut self, noise: F) -> Self {
        self.0.noise = noise;
        self
    }

    /// Set random generator seed used to draw frequencies and phases
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.0.mapper.seed = seed;
        self
    }
}

impl<F: Float> From<RffGpValidParams<F>> for RffGpParams<F> {
    fn from(valid: RffGpValidParams<F>) -> Self {
        RffGpParams(valid)
    }
}

impl<F: Float> ParamGuard for RffGpParams<F> {
    type Checked = RffGpValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        check_rff(&self.0.mapper.kernel, self.0.mapper.n_features)?;
        if !self.0.noise.is_finite() || self.0.noise <= F::zero() {
            return Err(GpError::InvalidHyperparameter(format!(
                "noise variance should be strictly positive, got {}",
                self.0.noise
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
