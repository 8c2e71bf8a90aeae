//! Random Fourier features approximating shift-invariant kernels.
//!
//! By Bochner's theorem a stationary kernel is the Fourier transform of a probability
//! density p(w) (its spectral density), so that
//! `k(x, y) = s2 E_w[cos(w.(x - y))]`. Drawing `M` frequencies `w_j ~ p(w)` and phases
//! `b_j ~ U[0, 2 pi)` gives the feature map `phi(x)_j = sqrt(2 / M) cos(w_j.x + b_j)`
//! with `s2 phi(x).phi(y)` an unbiased Monte Carlo estimate of `k(x, y)`.
//!
//! # Reference
//!
//! Ali Rahimi and Benjamin Recht.
//! [Random Features for Large-Scale Kernel Machines](https://people.eecs.berkeley.edu/~brecht/papers/07.rah.rec.nips.pdf).
//! In: Advances in Neural Information Processing Systems 20 (2007).

use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::rff_parameters::{RffParams, RffValidParams};
use crate::utils::{check_dim, check_inputs};
use linfa::prelude::{DatasetBase, Fit, Float};
use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

use log::debug;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A fitted random Fourier features mapper.
///
/// Frequencies and phases are drawn once at fit time and frozen: transforming the
/// same points twice gives bit-identical features.
///
/// # Example
///
/// ```
/// use linfa::prelude::{DatasetBase, Fit};
/// use ndarray::Array;
/// use ndarray_rand::RandomExt;
/// use ndarray_rand::rand_distr::Uniform;
///
/// use lowrank_gp::{Kernel, RandomFourierFeatures};
///
/// let x = Array::random((20, 3), Uniform::new(0., 1.));
/// let rff = RandomFourierFeatures::params(Kernel::rbf(0.5), 500)
///     .seed(Some(42))
///     .fit(&DatasetBase::from(x.clone()))
///     .expect("RFF fitted");
/// let phi = rff.transform(&x).expect("Features");
/// assert_eq!(phi.dim(), (20, 500));
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct RandomFourierFeatures<F: Float> {
    /// Kernel signal variance
    variance: F,
    /// (n_features, nx) frequencies
    frequencies: Array2<F>,
    /// (n_features,) phases in [0, 2 pi)
    phases: Array1<F>,
}

impl<F: Float> RandomFourierFeatures<F> {
    /// RFF mapper parameters constructor
    pub fn params(kernel: Kernel<F>, n_features: usize) -> RffParams<F> {
        RffParams::new(kernel, n_features)
    }

    /// Number of random features
    pub fn n_features(&self) -> usize {
        self.frequencies.nrows()
    }

    /// Input dimension seen at fit time
    pub fn input_dim(&self) -> usize {
        self.frequencies.ncols()
    }

    /// Frozen (n_features, nx) frequencies
    pub fn frequencies(&self) -> &Array2<F> {
        &self.frequencies
    }

    /// Frozen phases
    pub fn phases(&self) -> &Array1<F> {
        &self.phases
    }

    /// Map (n, nx) points `x` to (n, n_features) features
    /// `phi[i, j] = sqrt(2 / M) cos(w_j.x_i + b_j)`.
    pub fn transform(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        check_inputs(x)?;
        check_dim(x, self.input_dim())?;
        let scale = (F::cast(2.) / F::cast(self.n_features())).sqrt();
        let mut phi = x.dot(&self.frequencies.t()) + &self.phases.view().insert_axis(Axis(0));
        phi.par_mapv_inplace(|v| scale * v.cos());
        Ok(phi)
    }

    /// Monte Carlo approximation `s2 phi(x) phi(x)^T` of the Gram matrix at `x` points
    pub fn compute_kernel(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        let phi = self.transform(x)?;
        Ok(phi.dot(&phi.t()) * self.variance)
    }
}

impl<F: Float> RffValidParams<F> {
    fn draw(&self, dim: usize) -> Result<RandomFourierFeatures<F>> {
        let mut rng = match self.seed() {
            Some(seed) => Xoshiro256Plus::seed_from_u64(*seed),
            None => Xoshiro256Plus::from_entropy(),
        };
        let (kernel, n) = (self.kernel(), self.n_features());
        let frequencies = kernel.sample_spectral_density(n, dim, &mut rng)?;
        let two_pi = 2. * std::f64::consts::PI;
        let phases: Array1<f64> = Array::random_using(n, Uniform::new(0., two_pi), &mut rng);
        Ok(RandomFourierFeatures {
            variance: kernel.variance(),
            frequencies,
            phases: phases.mapv(F::cast),
        })
    }
}

impl<F: Float, D: Data<Elem = F>, T> Fit<ArrayBase<D, Ix2>, T, GpError> for RffValidParams<F> {
    type Object = RandomFourierFeatures<F>;

    /// Draw frequencies and phases for the input dimension of the given records
    fn fit(&self, dataset: &DatasetBase<ArrayBase<D, Ix2>, T>) -> Result<Self::Object> {
        let x = dataset.records();
        check_inputs(x)?;
        let rff = self.draw(x.ncols())?;
        debug!(
            "RFF drawn: {} features for {} input dimensions ({} kernel)",
            rff.n_features(),
            rff.input_dim(),
            self.kernel().kind()
        );
        Ok(rff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::relative_frobenius_error;
    use crate::KernelKind;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use paste::paste;

    fn unit_cube(n: usize, dim: usize, seed: u64) -> Array2<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        Array::random_using((n, dim), Uniform::new(0., 1.), &mut rng)
    }

    fn rff_error(kernel: &Kernel<f64>, x: &Array2<f64>, n_features: usize, seed: u64) -> f64 {
        let rff = RandomFourierFeatures::params(kernel.clone(), n_features)
            .seed(Some(seed))
            .fit(&DatasetBase::from(x.clone()))
            .expect("RFF fitted");
        let exact = kernel.matrix(x, x).unwrap();
        relative_frobenius_error(&rff.compute_kernel(x).unwrap(), &exact).unwrap()
    }

    #[test]
    fn test_rbf_gram_approximation() {
        let x = unit_cube(100, 4, 0);
        let kernel = Kernel::rbf(1. / 2f64.sqrt());
        let err = rff_error(&kernel, &x, 1000, 42);
        assert!(err < 0.1, "relative error = {err}");
    }

    #[test]
    fn test_laplace_gram_approximation() {
        let x = unit_cube(100, 2, 1);
        let kernel = Kernel::laplace(2.).with_variance(3.);
        let err = rff_error(&kernel, &x, 2000, 7);
        assert!(err < 0.1, "relative error = {err}");
    }

    macro_rules! test_error_decreases {
        ($kind:ident) => {
            paste! {
                #[test]
                fn [<test_ $kind:snake _error_decreases_with_features>]() {
                    let x = unit_cube(50, 3, 2);
                    let kernel = Kernel::new(KernelKind::$kind, 1.);
                    let seeds = 0..10;
                    let mean_error = |m| {
                        seeds.clone().map(|s| rff_error(&kernel, &x, m, s)).sum::<f64>() / 10.
                    };
                    let errors: Vec<f64> = [10, 100, 1000].iter().map(|m| mean_error(*m)).collect();
                    assert!(errors[0] > errors[1], "{errors:?}");
                    assert!(errors[1] > errors[2], "{errors:?}");
                }
            }
        };
    }

    test_error_decreases!(SquaredExponential);
    test_error_decreases!(AbsoluteExponential);

    #[test]
    fn test_transform_idempotent_and_seeded() {
        let x = unit_cube(10, 2, 3);
        let fit = |seed| {
            RandomFourierFeatures::params(Kernel::rbf(0.3), 64)
                .seed(Some(seed))
                .fit(&DatasetBase::from(x.clone()))
                .expect("RFF fitted")
        };
        let rff = fit(5);
        assert_eq!(rff.transform(&x).unwrap(), rff.transform(&x).unwrap());

        let other = fit(5);
        assert_eq!(rff.frequencies(), other.frequencies());
        assert_eq!(rff.phases(), other.phases());
        assert_eq!(rff.transform(&x).unwrap(), other.transform(&x).unwrap());

        assert_ne!(rff.frequencies(), fit(6).frequencies());
    }

    #[test]
    fn test_features_shape_and_range() {
        let x = unit_cube(15, 3, 4);
        let rff = RandomFourierFeatures::params(Kernel::laplace(1.), 32)
            .seed(Some(0))
            .fit(&DatasetBase::from(x.clone()))
            .expect("RFF fitted");
        assert_eq!(rff.frequencies().dim(), (32, 3));
        assert!(rff
            .phases()
            .iter()
            .all(|b| *b >= 0. && *b < 2. * std::f64::consts::PI));
        let phi = rff.transform(&x).unwrap();
        assert_eq!(phi.dim(), (15, 32));
        let bound = (2. / 32f64).sqrt();
        assert!(phi.iter().all(|v| v.abs() <= bound));
        // self similarity estimates average to the kernel variance
        let k = rff.compute_kernel(&x).unwrap();
        assert_abs_diff_eq!(k.diag().mean().unwrap(), 1., epsilon = 0.3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let x = unit_cube(5, 2, 5);
        let rff = RandomFourierFeatures::params(Kernel::rbf(1.), 8)
            .fit(&DatasetBase::from(x))
            .expect("RFF fitted");
        assert!(matches!(
            rff.transform(&array![[0., 1., 2.]]),
            Err(GpError::DimensionMismatch(_))
        ));

        let kernel = Kernel::rbf(1.).with_length_scales(array![1., 2.]);
        let res = RandomFourierFeatures::params(kernel, 8)
            .fit(&DatasetBase::from(unit_cube(5, 3, 6)));
        assert!(matches!(res, Err(GpError::DimensionMismatch(_))));

        let res = RandomFourierFeatures::params(Kernel::rbf(1.), 0)
            .fit(&DatasetBase::from(unit_cube(5, 3, 6)));
        assert!(matches!(res, Err(GpError::InvalidHyperparameter(_))));
    }
}
