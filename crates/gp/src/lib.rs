//! This library implements approximate [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process)
//! regression methods which make gaussian process regression tractable for a large number
//! of training points. Indeed the complexity of exact GP regression is in O(N^3) in processing
//! time and O(N^2) in memory where N is the number of training points.
//!
//! Two approximations are provided, both reducing the complexity to O(N.M^2) in time and
//! O(NM) in memory with M < N:
//!
//! * Sparse Gaussian Processes (SGPs) rely on M so-called inducing points to build a Nyström
//!   low-rank approximation of the covariance matrix. They are implemented by
//!   [SparseGaussianProcess] parameterized by [SgpParams].
//! * Random Fourier features approximate a stationary kernel with M random features by
//!   sampling its spectral density. Features are computed by [RandomFourierFeatures] and
//!   [RffGaussianProcess] fits a [BayesianLinearRegression] in feature space.
//!
//! The exact GP regression, implemented by [GaussianProcess] parameterized by [GpParams], is
//! the reference these approximations are compared with through the [GpSurrogate] trait
//! and the [metrics].
//!
//! Hyperparameters (kernel length-scales and variance, noise variance) are given, not estimated.
//! The available covariance kernels are the squared exponential (RBF) and the absolute
//! exponential (Laplace) ones, see [Kernel].
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
mod blr;
mod errors;
mod kernels;
pub mod metrics;
mod regressors;
mod rff;
mod rff_algorithm;
mod sparse_algorithm;
mod surrogates;

mod parameters;
mod rff_parameters;
mod sparse_parameters;
mod utils;

pub use algorithm::*;
pub use blr::*;
pub use errors::*;
pub use kernels::*;
pub use parameters::*;
pub use regressors::*;
pub use rff::*;
pub use rff_algorithm::*;
pub use rff_parameters::*;
pub use sparse_algorithm::*;
pub use sparse_parameters::*;
pub use surrogates::*;
