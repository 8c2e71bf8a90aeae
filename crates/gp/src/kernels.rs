//! A module for the stationary kernels used to model the covariance between outputs.
//!
//! The following kernel kinds are implemented:
//! * squared exponential (a.k.a. RBF),
//! * absolute exponential (a.k.a. Laplace or exponential).
//!
//! A [`Kernel`] couples a [`KernelKind`] with its hyperparameters: length-scale(s) and
//! signal variance. Besides covariance evaluation, a kernel knows how to sample its
//! spectral density (the Fourier dual given by Bochner's theorem), which is used to
//! build random Fourier features.

use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Ix2, Zip};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::{Cauchy, StandardNormal};
use ndarray_rand::RandomExt;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kernel kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum KernelKind {
    /// k(x, y) = s2 * exp( - sum_k ((x_k - y_k) / l_k)^2 / 2 )
    #[default]
    SquaredExponential,
    /// k(x, y) = s2 * exp( - sum_k |x_k - y_k| / l_k )
    AbsoluteExponential,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelKind::SquaredExponential => write!(f, "SquaredExponential"),
            KernelKind::AbsoluteExponential => write!(f, "AbsoluteExponential"),
        }
    }
}

impl FromStr for KernelKind {
    type Err = GpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rbf" | "squared_exponential" | "squaredexponential" | "gaussian" => {
                Ok(KernelKind::SquaredExponential)
            }
            "laplace" | "exponential" | "absolute_exponential" | "absoluteexponential" => {
                Ok(KernelKind::AbsoluteExponential)
            }
            _ => Err(GpError::InvalidHyperparameter(format!(
                "Bad kernel kind '{s}', should be one of 'rbf' or 'laplace'"
            ))),
        }
    }
}

/// A stationary kernel: its kind and its hyperparameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct Kernel<F: Float> {
    kind: KernelKind,
    /// Length-scale, either a single value (isotropic) or one per input dimension
    length_scales: Array1<F>,
    /// Signal variance s2, the value of k(x, x)
    variance: F,
}

impl<F: Float> Default for Kernel<F> {
    fn default() -> Self {
        Kernel::new(KernelKind::default(), F::one())
    }
}

impl<F: Float> fmt::Display for Kernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}(length_scales={}, variance={})",
            self.kind, self.length_scales, self.variance
        )
    }
}

impl<F: Float> Kernel<F> {
    /// Isotropic kernel of given kind and length-scale with a unit signal variance
    pub fn new(kind: KernelKind, length_scale: F) -> Self {
        Kernel {
            kind,
            length_scales: Array1::from_elem(1, length_scale),
            variance: F::one(),
        }
    }

    /// Squared exponential (RBF) kernel
    pub fn rbf(length_scale: F) -> Self {
        Self::new(KernelKind::SquaredExponential, length_scale)
    }

    /// Absolute exponential (Laplace) kernel
    pub fn laplace(length_scale: F) -> Self {
        Self::new(KernelKind::AbsoluteExponential, length_scale)
    }

    /// Isotropic kernel given its `gamma` parameterization:
    /// `gamma = 1 / (2 l^2)` for the squared exponential, `gamma = 1 / l` for the
    /// absolute exponential.
    ///
    /// A non positive gamma gives a non positive length-scale rejected at validation.
    pub fn from_gamma(kind: KernelKind, gamma: F) -> Self {
        let length_scale = if gamma > F::zero() {
            match kind {
                KernelKind::SquaredExponential => F::one() / (F::cast(2.) * gamma).sqrt(),
                KernelKind::AbsoluteExponential => F::one() / gamma,
            }
        } else {
            gamma
        };
        Self::new(kind, length_scale)
    }

    /// Set signal variance
    pub fn with_variance(mut self, variance: F) -> Self {
        self.variance = variance;
        self
    }

    /// Set one length-scale per input dimension (anisotropic kernel)
    pub fn with_length_scales(mut self, length_scales: Array1<F>) -> Self {
        self.length_scales = length_scales;
        self
    }

    /// Kernel kind
    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Length-scale(s)
    pub fn length_scales(&self) -> &Array1<F> {
        &self.length_scales
    }

    /// Signal variance
    pub fn variance(&self) -> F {
        self.variance
    }

    /// `gamma` parameter of an isotropic kernel (see [`Kernel::from_gamma`]),
    /// `None` when length-scales are given per dimension.
    pub fn gamma(&self) -> Option<F> {
        if self.length_scales.len() != 1 {
            return None;
        }
        let l = self.length_scales[0];
        Some(match self.kind {
            KernelKind::SquaredExponential => F::one() / (F::cast(2.) * l * l),
            KernelKind::AbsoluteExponential => F::one() / l,
        })
    }

    /// Check hyperparameters: strictly positive finite length-scales and variance
    pub fn validate(&self) -> Result<()> {
        if self.length_scales.is_empty() {
            return Err(GpError::InvalidHyperparameter(
                "kernel length-scales should not be empty".to_string(),
            ));
        }
        if self
            .length_scales
            .iter()
            .any(|l| !l.is_finite() || *l <= F::zero())
        {
            return Err(GpError::InvalidHyperparameter(format!(
                "kernel length-scales should be strictly positive, got {}",
                self.length_scales
            )));
        }
        if !self.variance.is_finite() || self.variance <= F::zero() {
            return Err(GpError::InvalidHyperparameter(format!(
                "kernel variance should be strictly positive, got {}",
                self.variance
            )));
        }
        Ok(())
    }

    /// Length-scales broadcasted to `dim` components.
    /// Fails when anisotropic length-scales do not match `dim`.
    pub(crate) fn scales(&self, dim: usize) -> Result<Array1<F>> {
        match self.length_scales.len() {
            1 => Ok(Array1::from_elem(dim, self.length_scales[0])),
            n if n == dim => Ok(self.length_scales.to_owned()),
            n => Err(GpError::DimensionMismatch(format!(
                "kernel has {n} length-scales but points have {dim} components"
            ))),
        }
    }

    /// Kernel value from the componentwise differences `d` between two points,
    /// `scales` being already broadcasted to the point dimension.
    ///
    /// Exponents are always non positive: large distances underflow to zero, never overflow.
    fn covariance(&self, scales: &Array1<F>, d: impl Iterator<Item = F>) -> F {
        let mut dist = F::zero();
        for (v, &l) in d.zip(scales) {
            dist += match self.kind {
                KernelKind::SquaredExponential => (v / l) * (v / l),
                KernelKind::AbsoluteExponential => v.abs() / l,
            };
        }
        match self.kind {
            KernelKind::SquaredExponential => self.variance * F::exp(F::cast(-0.5) * dist),
            KernelKind::AbsoluteExponential => self.variance * F::exp(-dist),
        }
    }

    /// Compute kernel values given differences `d` (n, nx) between pairs of points.
    /// Returns n kernel values.
    pub fn value(&self, d: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.validate()?;
        let scales = self.scales(d.ncols())?;
        let d = d.view();
        let mut r = Array1::zeros(d.nrows());
        Zip::from(&mut r)
            .and(d.rows())
            .par_for_each(|r, di| *r = self.covariance(&scales, di.iter().copied()));
        Ok(r)
    }

    /// Gram matrix `K[i, j] = k(a_i, b_j)` between (na, nx) `a` and (nb, nx) `b` points.
    ///
    /// Entries are computed in place, without materializing pairwise differences.
    /// Fails with [`GpError::DimensionMismatch`] when `a` and `b` points have different
    /// number of components.
    pub fn matrix(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        self.validate()?;
        if a.ncols() != b.ncols() {
            return Err(GpError::DimensionMismatch(format!(
                "cannot compute kernel between points of dimension {} and {}",
                a.ncols(),
                b.ncols()
            )));
        }
        let scales = self.scales(a.ncols())?;
        let (a, b) = (a.view(), b.view());
        let mut k = Array2::zeros((a.nrows(), b.nrows()));
        Zip::indexed(&mut k).par_for_each(|(i, j), kij| {
            let (ai, bj) = (a.row(i), b.row(j));
            let d = ai.iter().zip(bj.iter()).map(|(&u, &v)| u - v);
            *kij = self.covariance(&scales, d);
        });
        Ok(k)
    }

    /// Kernel diagonal `k(x_i, x_i)`, constant for stationary kernels
    pub fn diag(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::from_elem(x.nrows(), self.variance)
    }

    /// Sample `n` frequency vectors of `dim` components from the spectral density of the
    /// unit variance kernel, returned as a (n, dim) matrix:
    /// * squared exponential: w ~ N(0, diag(1 / l_k^2)), i.e. N(0, 2 gamma I),
    /// * absolute exponential: w_k ~ Cauchy(0, 1 / l_k), i.e. Cauchy(0, gamma).
    pub fn sample_spectral_density<R: Rng>(
        &self,
        n: usize,
        dim: usize,
        rng: &mut R,
    ) -> Result<Array2<F>> {
        self.validate()?;
        let scales = self.scales(dim)?;
        let w: Array2<f64> = match self.kind {
            KernelKind::SquaredExponential => Array::random_using((n, dim), StandardNormal, rng),
            KernelKind::AbsoluteExponential => {
                let cauchy = Cauchy::new(0., 1.).map_err(|e| {
                    GpError::InvalidHyperparameter(format!("Cauchy distribution: {e}"))
                })?;
                Array::random_using((n, dim), cauchy, rng)
            }
        };
        Ok(w.mapv(F::cast) / scales.insert_axis(Axis(0)))
    }
}
